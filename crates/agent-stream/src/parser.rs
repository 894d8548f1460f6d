use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::errors::StreamError;
use crate::event::Event;
use crate::sse::{SseDecoder, SseFrame};

/// Payload of the terminal sentinel frame.
pub const DONE_SENTINEL: &str = "[DONE]";

const MALFORMED_PREVIEW_CHARS: usize = 200;

/// Boxed response body as produced by a transport.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamError>> + Send + 'static>>;

/// Boxed sequence of decoded events.
pub type EventStream =
    Pin<Box<dyn futures::Stream<Item = Result<Event, StreamError>> + Send + 'static>>;

/// Push-style parser turning response body chunks into events.
///
/// Malformed frames are dropped and logged; they never fail the stream.
#[derive(Debug, Default)]
pub struct StreamParser {
    decoder: SseDecoder,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one body chunk and returns the events it completed, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.decoder
            .push_chunk(chunk)
            .iter()
            .flat_map(frame_events)
            .collect()
    }

    /// Flushes whatever the body left unterminated.
    pub fn finish(&mut self) -> Vec<Event> {
        self.decoder
            .finish()
            .map(|frame| frame_events(&frame))
            .unwrap_or_default()
    }
}

/// Converts one SSE frame into events.
///
/// A frame with several `data:` lines is decoded as one JSON document first;
/// if that fails each line is decoded on its own, so servers that omit the
/// blank separator still produce one event per line.
pub fn frame_events(frame: &SseFrame) -> Vec<Event> {
    if frame.data_lines.len() > 1 {
        if let Ok(value) = serde_json::from_str::<Value>(frame.data().trim()) {
            return Event::from_json(value).into_iter().collect();
        }
        return frame
            .data_lines
            .iter()
            .filter_map(|line| decode_payload(line))
            .collect();
    }
    frame
        .data_lines
        .first()
        .and_then(|line| decode_payload(line))
        .into_iter()
        .collect()
}

fn decode_payload(payload: &str) -> Option<Event> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(Event::done_sentinel());
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => Event::from_json(value),
        Err(err) => {
            let preview: String = payload.chars().take(MALFORMED_PREVIEW_CHARS).collect();
            warn!(error = %err, payload = %preview, "dropping malformed stream frame");
            None
        }
    }
}

/// Lazily decodes a response body into events.
///
/// Events are yielded in arrival order as soon as their frame is complete.
/// A transport error is yielded once as `Err` and ends the sequence.
pub fn parse_stream<S, B, E>(body: S) -> impl futures::Stream<Item = Result<Event, StreamError>> + Send
where
    S: futures::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    struct State<S> {
        body: Pin<Box<S>>,
        parser: StreamParser,
        pending: VecDeque<Event>,
        emitted: u64,
        done: bool,
    }

    stream::try_unfold(
        State {
            body: Box::pin(body),
            parser: StreamParser::new(),
            pending: VecDeque::new(),
            emitted: 0,
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    trace!(seq = state.emitted, event_type = %event.event_type(), "stream event");
                    state.emitted = state.emitted.saturating_add(1);
                    return Ok(Some((event, state)));
                }
                if state.done {
                    debug!(events = state.emitted, "stream body exhausted");
                    return Ok(None);
                }

                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(state.parser.push_chunk(chunk.as_ref()));
                    }
                    Some(Err(err)) => {
                        let err: StreamError = err.into();
                        debug!(error = %err, events = state.emitted, "stream body failed");
                        return Err(err);
                    }
                    None => {
                        state.pending.extend(state.parser.finish());
                        state.done = true;
                    }
                }
            }
        },
    )
}

/// Boxed form of [`parse_stream`].
pub fn parse_stream_boxed<S, B, E>(body: S) -> EventStream
where
    S: futures::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    Box::pin(parse_stream(body))
}

/// Blocking counterpart of [`parse_stream`] over an iterator of body chunks.
pub fn parse_iter<I, B, E>(body: I) -> EventIter<I::IntoIter>
where
    I: IntoIterator<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<StreamError>,
{
    EventIter {
        body: body.into_iter(),
        parser: StreamParser::new(),
        pending: VecDeque::new(),
        done: false,
    }
}

/// Iterator returned by [`parse_iter`]. Not restartable.
pub struct EventIter<I> {
    body: I,
    parser: StreamParser,
    pending: VecDeque<Event>,
    done: bool,
}

impl<I, B, E> Iterator for EventIter<I>
where
    I: Iterator<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<StreamError>,
{
    type Item = Result<Event, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match self.body.next() {
                Some(Ok(chunk)) => self.pending.extend(self.parser.push_chunk(chunk.as_ref())),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                None => {
                    self.done = true;
                    self.pending.extend(self.parser.finish());
                }
            }
        }
    }
}
