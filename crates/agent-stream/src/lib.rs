//! Streaming client for agent runs that speak the AI SDK SSE protocol.
//!
//! A run's response body is a sequence of Server-Sent Events whose `data:`
//! payloads are JSON objects discriminated by `type`. [`StreamParser`] turns
//! raw bytes into typed [`Event`]s, and [`StreamAccumulator`] folds those
//! events into the run's final text, tool calls, errors and metrics.
//!
//! # Streaming a run
//!
//! ```no_run
//! use agent_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamError> {
//! let client = RunClient::from_env()?;
//! let mut run = client.create_run("Summarize yesterday's tickets").await?;
//!
//! while let Some(event) = run.next_event().await {
//!     if let Some(delta) = event?.text_delta() {
//!         print!("{delta}");
//!     }
//! }
//!
//! for call in run.accumulator().tool_calls() {
//!     println!("{} -> {:?}", call.id, call.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Parsing a captured body
//!
//! ```
//! use agent_stream::{StreamAccumulator, StreamParser};
//!
//! let mut parser = StreamParser::new();
//! let mut acc = StreamAccumulator::new();
//! let body = b"data: {\"type\":\"text-delta\",\"delta\":\"Hi\"}\n\ndata: [DONE]\n\n";
//! for event in parser.push_chunk(body).into_iter().chain(parser.finish()) {
//!     acc.process(&event);
//! }
//! assert_eq!(acc.text(), "Hi");
//! assert!(acc.is_done());
//! ```

/// Folds events into the final state of a run.
pub mod accumulator;
/// High-level entry point for starting and replying to runs.
pub mod client;
/// Client configuration and environment lookup.
pub mod config;
/// Public error types.
pub mod errors;
/// Typed stream events and their JSON decoding.
pub mod event;
/// Presentation of events as typed values, text, or raw JSON.
pub mod format;
/// Process-wide tracing setup for binaries.
pub mod observability;
/// Event decoding over chunked bodies.
pub mod parser;
/// Common imports for typical usage.
pub mod prelude;
/// Streaming handle for one run.
pub mod run;
/// Line-level Server-Sent Events framing.
pub mod sse;
/// Transport contract and the reqwest-backed implementation.
pub mod transport;

pub use accumulator::{StreamAccumulator, TodoUpdate, ToolCall, ToolCallStatus};
pub use client::{RunClient, RunRequest};
pub use config::ClientConfig;
pub use errors::StreamError;
pub use event::{Event, EventKind, EventType, Metrics, PASSTHROUGH_TYPES};
pub use format::{StreamFormat, StreamItem};
pub use observability::{ObservabilityConfig, init_observability, init_observability_with};
pub use parser::{
    ByteStream, EventIter, EventStream, StreamParser, frame_events, parse_iter, parse_stream,
};
pub use run::RunStream;
pub use sse::{SseDecoder, SseFrame};
pub use transport::{HttpTransport, StreamRequest, StreamTransport};
