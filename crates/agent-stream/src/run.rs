use futures::StreamExt as _;
use futures::stream;
use tracing::{Instrument as _, Span, debug};

use crate::accumulator::StreamAccumulator;
use crate::errors::StreamError;
use crate::event::Event;
use crate::format::{StreamFormat, StreamItem};
use crate::parser::{ByteStream, EventStream, parse_stream_boxed};

/// Streaming handle for one run.
///
/// Owns the open response body. Every event pulled through `next_event()` is
/// also folded into an internal [`StreamAccumulator`], so `text()` and
/// `accumulator()` report live progress. The connection is released when the
/// body is exhausted, when it fails, on `close()`, or when the handle drops.
pub struct RunStream {
    events: Option<EventStream>,
    accumulator: StreamAccumulator,
    span: Span,
}

impl RunStream {
    /// Wraps an open response body.
    pub fn new(body: ByteStream) -> Self {
        Self::from_events(parse_stream_boxed(body))
    }

    /// Wraps an already-decoded event sequence.
    pub fn from_events(events: EventStream) -> Self {
        Self {
            events: Some(events),
            accumulator: StreamAccumulator::new(),
            span: Span::none(),
        }
    }

    /// Records decoding and lifecycle logs of this run inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the body is exhausted or after a transport error
    /// has been returned.
    pub async fn next_event(&mut self) -> Option<Result<Event, StreamError>> {
        let events = self.events.as_mut()?;
        let next = events.next().instrument(self.span.clone()).await;
        match next {
            Some(Ok(event)) => {
                self.accumulator.process(&event);
                Some(Ok(event))
            }
            Some(Err(err)) => {
                self.close();
                Some(Err(err))
            }
            None => {
                self.close();
                None
            }
        }
    }

    /// Like `next_event()`, presented in `format`. Events the format skips
    /// are still accumulated.
    pub async fn next_item(&mut self, format: StreamFormat) -> Option<Result<StreamItem, StreamError>> {
        loop {
            match self.next_event().await? {
                Ok(event) => {
                    if let Some(item) = format.render(event) {
                        return Some(Ok(item));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }

    /// Assistant text received so far.
    pub fn text(&self) -> &str {
        self.accumulator.text()
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_none()
    }

    /// Releases the underlying connection. Idempotent.
    pub fn close(&mut self) {
        if self.events.take().is_some() {
            let _entered = self.span.enter();
            debug!(
                done = self.accumulator.is_done(),
                errors = self.accumulator.errors().len(),
                "run stream closed"
            );
        }
    }

    /// Drains the remaining events and returns the final accumulated state.
    pub async fn finish(mut self) -> Result<StreamAccumulator, StreamError> {
        while let Some(next) = self.next_event().await {
            next?;
        }
        Ok(std::mem::take(&mut self.accumulator))
    }

    /// Converts the handle into a plain event stream.
    pub fn into_stream(self) -> impl futures::Stream<Item = Result<Event, StreamError>> + Send {
        stream::unfold(self, |mut run| async move {
            let next = run.next_event().await?;
            Some((next, run))
        })
    }

    /// Converts the handle into a stream of presented items.
    pub fn into_items(
        self,
        format: StreamFormat,
    ) -> impl futures::Stream<Item = Result<StreamItem, StreamError>> + Send {
        stream::unfold(self, move |mut run| async move {
            let next = run.next_item(format).await?;
            Some((next, run))
        })
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        self.close();
    }
}
