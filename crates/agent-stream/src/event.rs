use std::fmt;

use serde_json::{Map, Value};

/// Normalized discriminator of an [`Event`], using the wire vocabulary of the
/// AI SDK UI message stream protocol.
///
/// Some wire types are known but carry nothing the accumulator uses, so they
/// decode to [`EventType::Unknown`] with the payload left in `raw`:
/// `source-url`, `source-document`, `message-delta`, the native
/// `content_block_stop`, and the AI SDK `start` / `finish` / `start-step` /
/// `finish-step` markers. [`PASSTHROUGH_TYPES`] lists them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    TextStart,
    TextDelta,
    TextEnd,
    ReasoningStart,
    ReasoningDelta,
    ReasoningEnd,
    PlanStart,
    PlanDelta,
    PlanEnd,
    ToolCallStart,
    ToolCallDelta,
    ToolCallEnd,
    ToolResultStart,
    ToolResultDelta,
    ToolResultEnd,
    TodoUpdate,
    MessageStart,
    MessageEnd,
    Metadata,
    Metrics,
    SandboxMetrics,
    SandboxConnecting,
    SandboxConnected,
    Error,
    Done,
    /// Unrecognized or passthrough discriminator; the wire string is in
    /// [`EventKind::Unknown`].
    Unknown,
}

/// Known wire types deliberately decoded as [`EventKind::Unknown`].
pub const PASSTHROUGH_TYPES: &[&str] = &[
    "source-url",
    "source-document",
    "message-delta",
    "content_block_stop",
    "start",
    "finish",
    "start-step",
    "finish-step",
];

impl EventType {
    /// Returns the wire string for this discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextStart => "text-start",
            Self::TextDelta => "text-delta",
            Self::TextEnd => "text-end",
            Self::ReasoningStart => "reasoning-start",
            Self::ReasoningDelta => "reasoning-delta",
            Self::ReasoningEnd => "reasoning-end",
            Self::PlanStart => "plan-start",
            Self::PlanDelta => "plan-delta",
            Self::PlanEnd => "plan-end",
            Self::ToolCallStart => "tool-call-start",
            Self::ToolCallDelta => "tool-call-delta",
            Self::ToolCallEnd => "tool-call-end",
            Self::ToolResultStart => "tool-result-start",
            Self::ToolResultDelta => "tool-result-delta",
            Self::ToolResultEnd => "tool-result-end",
            Self::TodoUpdate => "todo-update",
            Self::MessageStart => "message-start",
            Self::MessageEnd => "message-end",
            Self::Metadata => "metadata",
            Self::Metrics => "metrics",
            Self::SandboxMetrics => "sandbox_metrics",
            Self::SandboxConnecting => "sandbox-connecting",
            Self::SandboxConnected => "sandbox-connected",
            Self::Error => "error",
            Self::Done => "done",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usage / cost / latency snapshot carried by a metrics event.
///
/// `data` holds the metric fields themselves: the payload's `data` object when
/// present, otherwise every field of the frame except `type`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Metrics {
    pub data: Value,
}

impl Metrics {
    pub fn execution_time_ms(&self) -> Option<u64> {
        self.data.get("execution_time_ms").and_then(Value::as_u64)
    }

    pub fn input_tokens_used(&self) -> Option<u64> {
        self.data.get("input_tokens_used").and_then(Value::as_u64)
    }

    pub fn output_tokens_used(&self) -> Option<u64> {
        self.data.get("output_tokens_used").and_then(Value::as_u64)
    }

    /// Token cost in USD (`token_cost_usd` or `claude_token_cost_usd`).
    pub fn token_cost_usd(&self) -> Option<f64> {
        self.data
            .get("token_cost_usd")
            .or_else(|| self.data.get("claude_token_cost_usd"))
            .and_then(Value::as_f64)
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.data.get("stop_reason").and_then(Value::as_str)
    }

    pub fn completion_state(&self) -> Option<&str> {
        self.data.get("completion_state").and_then(Value::as_str)
    }

    pub fn unresolved_tool_use_ids(&self) -> Option<Vec<String>> {
        string_list(self.data.get("unresolved_tool_use_ids"))
    }
}

/// Typed fields of a decoded stream event.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    TextStart {
        id: Option<String>,
    },
    /// Incremental chunk of assistant text.
    TextDelta {
        delta: String,
        id: Option<String>,
    },
    TextEnd {
        id: Option<String>,
    },
    /// Reasoning or thinking block opened.
    ReasoningStart {
        id: Option<String>,
    },
    ReasoningDelta {
        delta: String,
        id: Option<String>,
    },
    ReasoningEnd {
        id: Option<String>,
    },
    PlanStart {
        id: Option<String>,
    },
    PlanDelta {
        delta: String,
        id: Option<String>,
    },
    PlanEnd {
        id: Option<String>,
    },
    /// A tool invocation has begun. `args` is set when the server sends the
    /// arguments up front instead of streaming them.
    ToolCallStart {
        tool_call_id: String,
        tool_name: Option<String>,
        args: Option<Value>,
    },
    /// Partial argument text for a tool call.
    ToolCallDelta {
        tool_call_id: String,
        args_delta: String,
    },
    ToolCallEnd {
        tool_call_id: String,
    },
    ToolResultStart {
        tool_call_id: String,
    },
    ToolResultDelta {
        tool_call_id: String,
        delta: String,
    },
    /// A tool call completed with `result` (`Null` when the server sent none).
    ToolResultEnd {
        tool_call_id: String,
        result: Value,
    },
    /// Todo list snapshot emitted by a todo-writing tool.
    TodoUpdate {
        tool_call_id: Option<String>,
        todos: Vec<Value>,
    },
    MessageStart {
        message_id: Option<String>,
    },
    MessageEnd {
        message_id: Option<String>,
    },
    Metadata {
        payload: Map<String, Value>,
    },
    Metrics(Metrics),
    SandboxMetrics {
        sandbox_execution_time_ms: Option<u64>,
    },
    SandboxConnecting {
        message: Option<String>,
    },
    SandboxConnected {
        sandbox_id: Option<String>,
        duration_ms: Option<u64>,
        message: Option<String>,
    },
    /// Error reported inline by the server. This is data, not a stream failure.
    Error {
        message: String,
    },
    /// Terminal marker.
    Done {
        completion_state: Option<String>,
        stop_reason: Option<String>,
        unresolved_tool_use_ids: Option<Vec<String>>,
    },
    /// Discriminator this crate does not know; only `raw` is meaningful.
    Unknown {
        event_type: String,
    },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::TextStart { .. } => EventType::TextStart,
            Self::TextDelta { .. } => EventType::TextDelta,
            Self::TextEnd { .. } => EventType::TextEnd,
            Self::ReasoningStart { .. } => EventType::ReasoningStart,
            Self::ReasoningDelta { .. } => EventType::ReasoningDelta,
            Self::ReasoningEnd { .. } => EventType::ReasoningEnd,
            Self::PlanStart { .. } => EventType::PlanStart,
            Self::PlanDelta { .. } => EventType::PlanDelta,
            Self::PlanEnd { .. } => EventType::PlanEnd,
            Self::ToolCallStart { .. } => EventType::ToolCallStart,
            Self::ToolCallDelta { .. } => EventType::ToolCallDelta,
            Self::ToolCallEnd { .. } => EventType::ToolCallEnd,
            Self::ToolResultStart { .. } => EventType::ToolResultStart,
            Self::ToolResultDelta { .. } => EventType::ToolResultDelta,
            Self::ToolResultEnd { .. } => EventType::ToolResultEnd,
            Self::TodoUpdate { .. } => EventType::TodoUpdate,
            Self::MessageStart { .. } => EventType::MessageStart,
            Self::MessageEnd { .. } => EventType::MessageEnd,
            Self::Metadata { .. } => EventType::Metadata,
            Self::Metrics(_) => EventType::Metrics,
            Self::SandboxMetrics { .. } => EventType::SandboxMetrics,
            Self::SandboxConnecting { .. } => EventType::SandboxConnecting,
            Self::SandboxConnected { .. } => EventType::SandboxConnected,
            Self::Error { .. } => EventType::Error,
            Self::Done { .. } => EventType::Done,
            Self::Unknown { .. } => EventType::Unknown,
        }
    }
}

/// One decoded protocol event.
///
/// `raw` is the JSON payload exactly as it arrived, so callers that need the
/// legacy JSON format can ignore `kind` entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub raw: Value,
}

impl Event {
    pub fn new(kind: EventKind, raw: Value) -> Self {
        Self { kind, raw }
    }

    /// Event produced by the `data: [DONE]` sentinel.
    pub fn done_sentinel() -> Self {
        Self {
            kind: EventKind::Done {
                completion_state: None,
                stop_reason: None,
                unresolved_tool_use_ids: None,
            },
            raw: Value::Object(Map::new()),
        }
    }

    /// Decodes one JSON payload.
    ///
    /// Returns `None` for runtime system messages (`subtype` of `init` or
    /// `success`), which carry nothing for the consumer. Unrecognized
    /// discriminators become [`EventKind::Unknown`].
    pub fn from_json(raw: Value) -> Option<Self> {
        let kind = match raw.as_object() {
            Some(obj) => {
                if matches!(
                    obj.get("subtype").and_then(Value::as_str),
                    Some("init" | "success")
                ) {
                    return None;
                }
                decode_kind(obj)
            }
            None => EventKind::Unknown {
                event_type: EventType::Unknown.as_str().to_string(),
            },
        };
        Some(Self { kind, raw })
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Text chunk when this is a text delta.
    pub fn text_delta(&self) -> Option<&str> {
        match &self.kind {
            EventKind::TextDelta { delta, .. } => Some(delta),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.kind, EventKind::Done { .. })
    }
}

fn decode_kind(obj: &Map<String, Value>) -> EventKind {
    let event_type = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(EventType::Unknown.as_str());
    let id = || str_field(obj, "id");

    match event_type {
        "text-start" => EventKind::TextStart { id: id() },
        "text-delta" => EventKind::TextDelta {
            delta: str_field(obj, "delta").unwrap_or_default(),
            id: id(),
        },
        "text-end" => EventKind::TextEnd { id: id() },
        "reasoning-start" | "thinking-start" => EventKind::ReasoningStart { id: id() },
        "reasoning-delta" | "thinking-delta" => EventKind::ReasoningDelta {
            delta: first_str(obj, &["delta", "text"]),
            id: id(),
        },
        "reasoning-end" | "thinking-end" => EventKind::ReasoningEnd { id: id() },
        "plan-start" => EventKind::PlanStart { id: id() },
        "plan-delta" => EventKind::PlanDelta {
            delta: first_str(obj, &["delta", "text", "plan"]),
            id: id(),
        },
        "plan-end" => EventKind::PlanEnd { id: id() },
        "tool-call-start" => EventKind::ToolCallStart {
            tool_call_id: tool_call_id(obj),
            tool_name: str_field(obj, "toolName"),
            args: obj
                .get("args")
                .or_else(|| obj.get("input"))
                .filter(|v| !v.is_null())
                .cloned(),
        },
        "tool-call-delta" => EventKind::ToolCallDelta {
            tool_call_id: tool_call_id(obj),
            args_delta: first_str(obj, &["delta", "argsTextDelta"]),
        },
        "tool-call-end" => EventKind::ToolCallEnd {
            tool_call_id: tool_call_id(obj),
        },
        "tool-result-start" => EventKind::ToolResultStart {
            tool_call_id: tool_call_id(obj),
        },
        "tool-result-delta" => EventKind::ToolResultDelta {
            tool_call_id: tool_call_id(obj),
            delta: str_field(obj, "delta").unwrap_or_default(),
        },
        "tool-result-end" => EventKind::ToolResultEnd {
            tool_call_id: tool_call_id(obj),
            result: obj.get("result").cloned().unwrap_or(Value::Null),
        },
        "todo-update" => EventKind::TodoUpdate {
            tool_call_id: str_field(obj, "toolCallId").or_else(|| str_field(obj, "tool_call_id")),
            todos: obj
                .get("todos")
                .and_then(Value::as_array)
                .map(|todos| todos.iter().filter(|t| t.is_object()).cloned().collect())
                .unwrap_or_default(),
        },
        "message-start" => EventKind::MessageStart {
            message_id: str_field(obj, "messageId"),
        },
        "message-end" => EventKind::MessageEnd {
            message_id: str_field(obj, "messageId"),
        },
        "metadata" => EventKind::Metadata {
            payload: nested_or_rest(obj, "payload"),
        },
        "metrics" | "run_metrics" => EventKind::Metrics(Metrics {
            data: Value::Object(nested_or_rest(obj, "data")),
        }),
        "sandbox_metrics" => EventKind::SandboxMetrics {
            sandbox_execution_time_ms: obj.get("sandbox_execution_time_ms").and_then(Value::as_u64),
        },
        "sandbox-connecting" => EventKind::SandboxConnecting {
            message: str_field(obj, "message"),
        },
        "sandbox-connected" => EventKind::SandboxConnected {
            sandbox_id: str_field(obj, "sandbox_id"),
            duration_ms: obj.get("duration_ms").and_then(Value::as_u64),
            message: str_field(obj, "message"),
        },
        "error" => EventKind::Error {
            message: error_message(obj),
        },
        "done" => EventKind::Done {
            completion_state: str_field(obj, "completion_state"),
            stop_reason: str_field(obj, "stop_reason"),
            unresolved_tool_use_ids: string_list(obj.get("unresolved_tool_use_ids")),
        },
        "content_block_delta" => decode_block_delta(obj),
        "content_block_start" => decode_block_start(obj),
        "message_start" => EventKind::MessageStart {
            message_id: obj
                .get("message")
                .and_then(|m| m.get("id"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        },
        "message_stop" | "message_complete" => EventKind::MessageEnd {
            message_id: str_field(obj, "message_id"),
        },
        "message_delta" => match obj
            .get("delta")
            .and_then(|d| d.get("text"))
            .and_then(Value::as_str)
        {
            Some(text) => EventKind::TextDelta {
                delta: text.to_string(),
                id: id(),
            },
            None => unknown(event_type),
        },
        "tool_use" => EventKind::ToolCallStart {
            tool_call_id: id().unwrap_or_default(),
            tool_name: str_field(obj, "name"),
            args: obj.get("input").filter(|v| !v.is_null()).cloned(),
        },
        "tool_result" => EventKind::ToolResultEnd {
            tool_call_id: str_field(obj, "tool_use_id")
                .or_else(id)
                .unwrap_or_default(),
            result: obj
                .get("content")
                .or_else(|| obj.get("result"))
                .cloned()
                .unwrap_or(Value::Null),
        },
        // PASSTHROUGH_TYPES and anything unrecognized.
        other => unknown(other),
    }
}

fn decode_block_delta(obj: &Map<String, Value>) -> EventKind {
    let delta = obj.get("delta");
    let delta_type = delta
        .and_then(|d| d.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let text = |key: &str| {
        delta
            .and_then(|d| d.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let id = str_field(obj, "id");

    match delta_type {
        "text_delta" => EventKind::TextDelta {
            delta: text("text"),
            id,
        },
        "thinking_delta" => EventKind::ReasoningDelta {
            delta: text("text"),
            id,
        },
        "plan_delta" => EventKind::PlanDelta {
            delta: text("text"),
            id,
        },
        "input_json_delta" => EventKind::ToolCallDelta {
            tool_call_id: id.unwrap_or_default(),
            args_delta: text("partial_json"),
        },
        _ => unknown("content_block_delta"),
    }
}

fn decode_block_start(obj: &Map<String, Value>) -> EventKind {
    let block = obj.get("content_block");
    let block_field = |key: &str| {
        block
            .and_then(|b| b.get(key))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    };
    let block_type = block_field("type")
        .or_else(|| str_field(obj, "block_type"))
        .unwrap_or_default();
    let id = str_field(obj, "id").or_else(|| block_field("id"));

    match block_type.as_str() {
        "text" => EventKind::TextStart { id },
        "thinking" => EventKind::ReasoningStart { id },
        "plan" => EventKind::PlanStart { id },
        "tool_use" => EventKind::ToolCallStart {
            tool_call_id: id.unwrap_or_default(),
            tool_name: block_field("name").or_else(|| str_field(obj, "name")),
            args: None,
        },
        _ => unknown("content_block_start"),
    }
}

fn unknown(event_type: &str) -> EventKind {
    EventKind::Unknown {
        event_type: event_type.to_string(),
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn tool_call_id(obj: &Map<String, Value>) -> String {
    str_field(obj, "toolCallId").unwrap_or_default()
}

fn nested_or_rest(obj: &Map<String, Value>, key: &str) -> Map<String, Value> {
    match obj.get(key) {
        Some(Value::Object(nested)) => nested.clone(),
        _ => obj
            .iter()
            .filter(|(k, _)| k.as_str() != "type")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

fn error_message(obj: &Map<String, Value>) -> String {
    match obj.get("error") {
        Some(Value::String(message)) => return message.clone(),
        Some(Value::Object(inner)) => {
            if let Some(message) = inner.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
        }
        _ => {}
    }
    str_field(obj, "message").unwrap_or_else(|| "Unknown error".to_string())
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect()
    })
}
