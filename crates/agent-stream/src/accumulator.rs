use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::event::{Event, EventKind, Metrics};

/// Progress of a tool call through the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Arguments may still be streaming.
    Started,
    /// The call ended. `result` is set only if the server sent one.
    Complete,
}

/// Aggregated view of one tool call, correlated by id.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: Option<String>,
    /// Argument text assembled from deltas, in arrival order.
    pub args: String,
    /// Arguments sent whole on the start event, if any.
    pub initial_args: Option<Value>,
    /// `None` until the call resolves.
    pub result: Option<Value>,
    pub todos: Option<Vec<Value>>,
    pub status: ToolCallStatus,
    #[serde(skip)]
    result_chunks: String,
}

impl ToolCall {
    fn new(id: &str, name: Option<String>, initial_args: Option<Value>) -> Self {
        Self {
            id: id.to_string(),
            name,
            args: String::new(),
            initial_args,
            result: None,
            todos: None,
            status: ToolCallStatus::Started,
            result_chunks: String::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == ToolCallStatus::Complete
    }

    /// Arguments as JSON: the assembled delta text when it parses, otherwise
    /// the arguments from the start event.
    pub fn parsed_args(&self) -> Option<Value> {
        if !self.args.trim().is_empty()
            && let Ok(value) = serde_json::from_str(&self.args)
        {
            return Some(value);
        }
        self.initial_args.clone()
    }
}

/// Todo list snapshot as streamed.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TodoUpdate {
    pub tool_call_id: Option<String>,
    pub todos: Vec<Value>,
}

/// Folds a run's events into queryable state.
///
/// Queries are valid at any point. While the stream is still being fed they
/// return a partial snapshot, not the final result. Events after `Done` are
/// still applied (servers may send trailing metrics).
#[derive(Clone, Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    reasoning: String,
    plan: String,
    tool_calls: Vec<ToolCall>,
    tool_index: HashMap<String, usize>,
    errors: Vec<String>,
    metrics: Option<Metrics>,
    metadata: Vec<Map<String, Value>>,
    usage: Option<Map<String, Value>>,
    todo_updates: Vec<TodoUpdate>,
    current_message_id: Option<String>,
    done: bool,
    completion_state: Option<String>,
    stop_reason: Option<String>,
    unresolved_tool_use_ids: Option<Vec<String>>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event.
    pub fn process(&mut self, event: &Event) {
        match &event.kind {
            EventKind::TextDelta { delta, .. } => self.text.push_str(delta),
            EventKind::ReasoningDelta { delta, .. } => self.reasoning.push_str(delta),
            EventKind::ReasoningStart { .. } | EventKind::ReasoningEnd { .. } => {
                close_section(&mut self.reasoning)
            }
            EventKind::PlanDelta { delta, .. } => self.plan.push_str(delta),
            EventKind::PlanStart { .. } | EventKind::PlanEnd { .. } => close_section(&mut self.plan),
            EventKind::ToolCallStart {
                tool_call_id,
                tool_name,
                args,
            } => self.start_tool_call(tool_call_id, tool_name.clone(), args.clone()),
            EventKind::ToolCallDelta {
                tool_call_id,
                args_delta,
            } => {
                if let Some(call) = self.tool_call_entry(tool_call_id) {
                    call.args.push_str(args_delta);
                }
            }
            EventKind::ToolCallEnd { tool_call_id } => {
                if let Some(call) = self.tool_call_entry(tool_call_id) {
                    call.status = ToolCallStatus::Complete;
                }
            }
            EventKind::ToolResultStart { tool_call_id } => {
                self.tool_call_entry(tool_call_id);
            }
            EventKind::ToolResultDelta {
                tool_call_id,
                delta,
            } => {
                if let Some(call) = self.tool_call_entry(tool_call_id) {
                    call.result_chunks.push_str(delta);
                }
            }
            EventKind::ToolResultEnd {
                tool_call_id,
                result,
            } => {
                if let Some(call) = self.tool_call_entry(tool_call_id) {
                    let result = if result.is_null() && !call.result_chunks.is_empty() {
                        Value::String(std::mem::take(&mut call.result_chunks))
                    } else {
                        result.clone()
                    };
                    call.result = Some(result);
                    call.status = ToolCallStatus::Complete;
                }
            }
            EventKind::TodoUpdate {
                tool_call_id,
                todos,
            } => {
                if let Some(id) = tool_call_id
                    && let Some(call) = self.tool_call_entry(id)
                {
                    call.todos = Some(todos.clone());
                }
                self.todo_updates.push(TodoUpdate {
                    tool_call_id: tool_call_id.clone(),
                    todos: todos.clone(),
                });
            }
            EventKind::MessageStart { message_id } => {
                self.current_message_id = message_id.clone();
            }
            EventKind::MessageEnd { .. } => self.current_message_id = None,
            EventKind::Metadata { payload } => {
                if let Some(Value::Object(usage)) = payload.get("usage") {
                    self.usage = Some(usage.clone());
                }
                self.metadata.push(payload.clone());
            }
            EventKind::Metrics(metrics) => self.metrics = Some(metrics.clone()),
            EventKind::Error { message } => self.errors.push(message.clone()),
            EventKind::Done {
                completion_state,
                stop_reason,
                unresolved_tool_use_ids,
            } => {
                self.done = true;
                if completion_state.is_some() {
                    self.completion_state = completion_state.clone();
                }
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason.clone();
                }
                if unresolved_tool_use_ids.is_some() {
                    self.unresolved_tool_use_ids = unresolved_tool_use_ids.clone();
                }
            }
            EventKind::TextStart { .. }
            | EventKind::TextEnd { .. }
            | EventKind::SandboxMetrics { .. }
            | EventKind::SandboxConnecting { .. }
            | EventKind::SandboxConnected { .. }
            | EventKind::Unknown { .. } => {}
        }
    }

    /// Assistant text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    /// Tool calls in the order their ids were first seen.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCall> {
        self.tool_index.get(id).map(|idx| &self.tool_calls[*idx])
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Inline error messages in arrival order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Latest metrics snapshot; each metrics event replaces the previous one.
    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn metadata(&self) -> &[Map<String, Value>] {
        &self.metadata
    }

    /// `usage` object of the most recent metadata event that carried one.
    pub fn usage(&self) -> Option<&Map<String, Value>> {
        self.usage.as_ref()
    }

    pub fn todo_updates(&self) -> &[TodoUpdate] {
        &self.todo_updates
    }

    pub fn current_message_id(&self) -> Option<&str> {
        self.current_message_id.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn completion_state(&self) -> Option<&str> {
        self.completion_state.as_deref()
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    pub fn unresolved_tool_use_ids(&self) -> Option<&[String]> {
        self.unresolved_tool_use_ids.as_deref()
    }

    // A repeated start keeps the record's position but resets it.
    fn start_tool_call(&mut self, id: &str, name: Option<String>, args: Option<Value>) {
        if id.is_empty() {
            return;
        }
        match self.tool_index.get(id) {
            Some(idx) => {
                debug!(tool_call_id = %id, "repeated tool-call-start; resetting record");
                self.tool_calls[*idx] = ToolCall::new(id, name, args);
            }
            None => {
                self.tool_index.insert(id.to_string(), self.tool_calls.len());
                self.tool_calls.push(ToolCall::new(id, name, args));
            }
        }
    }

    // Events may reference an id before (or without) its start event.
    fn tool_call_entry(&mut self, id: &str) -> Option<&mut ToolCall> {
        if id.is_empty() {
            return None;
        }
        let idx = match self.tool_index.get(id) {
            Some(idx) => *idx,
            None => {
                debug!(tool_call_id = %id, "tool call event before start; creating placeholder");
                let idx = self.tool_calls.len();
                self.tool_calls.push(ToolCall::new(id, None, None));
                self.tool_index.insert(id.to_string(), idx);
                idx
            }
        };
        self.tool_calls.get_mut(idx)
    }
}

fn close_section(buf: &mut String) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> Event {
        Event::from_json(value).expect("event")
    }

    fn feed(events: &[Value]) -> StreamAccumulator {
        let mut acc = StreamAccumulator::new();
        for value in events {
            acc.process(&event(value.clone()));
        }
        acc
    }

    #[test]
    fn fresh_accumulator_has_empty_defaults() {
        let acc = StreamAccumulator::new();
        assert_eq!(acc.text(), "");
        assert!(acc.tool_calls().is_empty());
        assert!(!acc.has_errors());
        assert!(acc.errors().is_empty());
        assert!(acc.metrics().is_none());
        assert!(!acc.is_done());
    }

    #[test]
    fn text_deltas_concatenate_in_order() {
        let acc = feed(&[
            json!({"type":"text-delta","delta":"a"}),
            json!({"type":"text-delta","delta":"b"}),
            json!({"type":"text-delta","delta":"c"}),
        ]);
        assert_eq!(acc.text(), "abc");
    }

    #[test]
    fn tool_call_assembles_args_and_result() {
        let acc = feed(&[
            json!({"type":"tool-call-start","toolCallId":"1","toolName":"x"}),
            json!({"type":"tool-call-delta","toolCallId":"1","delta":"{\"q\":"}),
            json!({"type":"tool-call-delta","toolCallId":"1","delta":"1}"}),
            json!({"type":"tool-result-end","toolCallId":"1","result":{"v":1}}),
        ]);
        assert_eq!(acc.tool_calls().len(), 1);
        let call = acc.tool_call("1").expect("call");
        assert_eq!(call.name.as_deref(), Some("x"));
        assert_eq!(call.args, "{\"q\":1}");
        assert_eq!(call.parsed_args(), Some(json!({"q":1})));
        assert_eq!(call.result, Some(json!({"v":1})));
        assert!(call.is_complete());
    }

    #[test]
    fn unseen_ids_create_placeholder_records() {
        let acc = feed(&[
            json!({"type":"tool-call-delta","toolCallId":"ghost","delta":"{}"}),
            json!({"type":"tool-result-end","toolCallId":"late","result":"ok"}),
        ]);
        let ghost = acc.tool_call("ghost").expect("placeholder");
        assert_eq!(ghost.name, None);
        assert_eq!(ghost.args, "{}");
        assert_eq!(ghost.result, None);
        assert_eq!(ghost.status, ToolCallStatus::Started);
        let late = acc.tool_call("late").expect("placeholder");
        assert_eq!(late.result, Some(json!("ok")));
        assert!(late.is_complete());
        let ids: Vec<&str> = acc.tool_calls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["ghost", "late"]);
    }

    #[test]
    fn repeated_start_resets_record_in_place() {
        let acc = feed(&[
            json!({"type":"tool-call-start","toolCallId":"a","toolName":"first"}),
            json!({"type":"tool-call-start","toolCallId":"b","toolName":"other"}),
            json!({"type":"tool-call-delta","toolCallId":"a","delta":"stale"}),
            json!({"type":"tool-call-start","toolCallId":"a","toolName":"second"}),
        ]);
        assert_eq!(acc.tool_calls().len(), 2);
        assert_eq!(acc.tool_calls()[0].id, "a");
        assert_eq!(acc.tool_calls()[0].name.as_deref(), Some("second"));
        assert_eq!(acc.tool_calls()[0].args, "");
    }

    #[test]
    fn errors_do_not_stop_accumulation() {
        let acc = feed(&[
            json!({"type":"text-delta","delta":"x"}),
            json!({"type":"error","error":"boom"}),
            json!({"type":"text-delta","delta":"y"}),
        ]);
        assert!(acc.has_errors());
        assert_eq!(acc.errors(), ["boom".to_string()]);
        assert_eq!(acc.text(), "xy");
    }

    #[test]
    fn done_is_idempotent_and_tolerates_trailing_events() {
        let mut acc = StreamAccumulator::new();
        let done = Event::done_sentinel();
        acc.process(&done);
        assert!(acc.is_done());
        acc.process(&done);
        assert!(acc.is_done());
        acc.process(&event(json!({"type":"metrics","tokens":1})));
        assert_eq!(acc.metrics().map(|m| &m.data), Some(&json!({"tokens":1})));
        assert!(acc.is_done());
    }

    #[test]
    fn metrics_are_last_write_wins() {
        let acc = feed(&[
            json!({"type":"metrics","tokens":1,"cost":2}),
            json!({"type":"metrics","tokens":5}),
        ]);
        assert_eq!(acc.metrics().map(|m| &m.data), Some(&json!({"tokens":5})));
    }

    #[test]
    fn result_chunks_fill_missing_result() {
        let acc = feed(&[
            json!({"type":"tool-call-start","toolCallId":"t","toolName":"read"}),
            json!({"type":"tool-call-end","toolCallId":"t"}),
            json!({"type":"tool-result-start","toolCallId":"t"}),
            json!({"type":"tool-result-delta","toolCallId":"t","delta":"li"}),
            json!({"type":"tool-result-delta","toolCallId":"t","delta":"ne"}),
        ]);
        assert_eq!(acc.tool_call("t").map(|c| c.status), Some(ToolCallStatus::Complete));
        assert_eq!(acc.tool_call("t").and_then(|c| c.result.clone()), None);
        let mut acc = acc;
        acc.process(&event(json!({"type":"tool-result-end","toolCallId":"t"})));
        assert_eq!(acc.tool_call("t").and_then(|c| c.result.clone()), Some(json!("line")));
    }

    #[test]
    fn tool_call_end_without_result_marks_completion() {
        let acc = feed(&[
            json!({"type":"tool-call-start","toolCallId":"c","toolName":"TodoWrite"}),
            json!({"type":"tool-call-end","toolCallId":"c"}),
        ]);
        let call = acc.tool_call("c").expect("call");
        assert!(call.is_complete());
        assert_eq!(call.status, ToolCallStatus::Complete);
        assert_eq!(call.result, None);
    }

    #[test]
    fn reasoning_and_plan_sections_are_newline_separated() {
        let acc = feed(&[
            json!({"type":"reasoning-start"}),
            json!({"type":"reasoning-delta","delta":"think"}),
            json!({"type":"reasoning-end"}),
            json!({"type":"thinking-delta","text":"more"}),
            json!({"type":"plan-delta","plan":"step 1"}),
            json!({"type":"plan-end"}),
        ]);
        assert_eq!(acc.reasoning(), "think\nmore");
        assert_eq!(acc.plan(), "step 1\n");
    }

    #[test]
    fn metadata_usage_and_todos_are_recorded() {
        let acc = feed(&[
            json!({"type":"metadata","payload":{"usage":{"input_tokens":3}}}),
            json!({"type":"metadata","session":"s1"}),
            json!({"type":"todo-update","toolCallId":"td","todos":[{"content":"a"}]}),
            json!({"type":"message-start","messageId":"m1"}),
        ]);
        assert_eq!(acc.metadata().len(), 2);
        assert_eq!(
            acc.usage().and_then(|u| u.get("input_tokens")),
            Some(&json!(3))
        );
        assert_eq!(acc.todo_updates().len(), 1);
        assert_eq!(
            acc.tool_call("td").and_then(|c| c.todos.clone()),
            Some(vec![json!({"content":"a"})])
        );
        assert_eq!(acc.current_message_id(), Some("m1"));
    }

    #[test]
    fn done_details_are_captured() {
        let acc = feed(&[json!({
            "type":"done","completion_state":"incomplete",
            "stop_reason":"max_turns","unresolved_tool_use_ids":["t1"]
        })]);
        assert!(acc.is_done());
        assert_eq!(acc.completion_state(), Some("incomplete"));
        assert_eq!(acc.stop_reason(), Some("max_turns"));
        assert_eq!(acc.unresolved_tool_use_ids(), Some(&["t1".to_string()][..]));
    }

    #[test]
    fn end_to_end_six_frame_scenario() {
        let mut parser = crate::parser::StreamParser::new();
        let body = concat!(
            "data: {\"type\":\"start\"}\n\n",
            "data: {\"type\":\"text-delta\",\"delta\":\"Hi\"}\n\n",
            "data: {\"type\":\"tool-call-start\",\"toolCallId\":\"7\",\"toolName\":\"lookup\"}\n\n",
            "data: {\"type\":\"tool-result-end\",\"toolCallId\":\"7\",\"result\":{\"ok\":true}}\n\n",
            "data: {\"type\":\"metrics\",\"tokens\":42}\n\n",
            "data: [DONE]\n\n",
        );
        let mut acc = StreamAccumulator::new();
        for event in parser.push_chunk(body.as_bytes()).iter().chain(parser.finish().iter()) {
            acc.process(event);
        }
        assert_eq!(acc.text(), "Hi");
        assert_eq!(acc.tool_calls().len(), 1);
        let call = acc.tool_call("7").expect("tool call 7");
        assert_eq!(call.result, Some(json!({"ok":true})));
        assert!(call.is_complete());
        assert_eq!(acc.metrics().map(|m| &m.data), Some(&json!({"tokens":42})));
        assert!(acc.is_done());
        assert!(!acc.has_errors());
    }
}
