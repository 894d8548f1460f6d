//! Common imports for typical usage.
pub use crate::{
    ClientConfig, Event, EventKind, EventType, RunClient, RunRequest, RunStream, StreamAccumulator,
    StreamError, StreamFormat, StreamItem, StreamParser, ToolCall, ToolCallStatus,
};
