use std::fmt;
use std::sync::Arc;

use tracing::{Instrument as _, debug, info_span};

use crate::config::ClientConfig;
use crate::errors::StreamError;
use crate::run::RunStream;
use crate::transport::{HttpTransport, StreamRequest, StreamTransport};

/// Parameters for starting a run.
///
/// `memory` and `history` default to on, matching the server's expectations
/// for a fresh run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunRequest {
    pub message: String,
    pub teammate_id: Option<u64>,
    pub instructions: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub memory: bool,
    pub history: bool,
}

impl RunRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            teammate_id: None,
            instructions: None,
            metadata: None,
            memory: true,
            history: true,
        }
    }

    pub fn teammate_id(mut self, teammate_id: u64) -> Self {
        self.teammate_id = Some(teammate_id);
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn memory(mut self, enabled: bool) -> Self {
        self.memory = enabled;
        self
    }

    pub fn history(mut self, enabled: bool) -> Self {
        self.history = enabled;
        self
    }

    fn into_body(self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("message".into(), self.message.into());
        body.insert("stream".into(), true.into());
        if let Some(teammate_id) = self.teammate_id {
            body.insert("teammate_id".into(), teammate_id.into());
        }
        if let Some(instructions) = self.instructions {
            body.insert("instructions".into(), instructions.into());
        }
        if let Some(metadata) = self.metadata {
            body.insert("metadata".into(), metadata);
        }
        body.insert("memory".into(), self.memory.into());
        body.insert("history".into(), self.history.into());
        serde_json::Value::Object(body)
    }
}

/// Entry point for starting streamed runs.
#[derive(Clone)]
pub struct RunClient {
    transport: Arc<dyn StreamTransport>,
}

impl RunClient {
    /// Creates a client backed by [`HttpTransport`].
    pub fn new(config: ClientConfig) -> Result<Self, StreamError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?)))
    }

    /// Creates a client from `M8TES_API_KEY` / `M8TES_BASE_URL`.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Uses a custom transport (proxies, tests).
    pub fn with_transport(transport: Arc<dyn StreamTransport>) -> Self {
        Self { transport }
    }

    /// Starts a run with default options and streams its events.
    pub async fn create_run(&self, message: impl Into<String>) -> Result<RunStream, StreamError> {
        self.start_run(RunRequest::new(message)).await
    }

    /// Starts a run with explicit options.
    pub async fn start_run(&self, request: RunRequest) -> Result<RunStream, StreamError> {
        self.open(StreamRequest::new("/runs", request.into_body()))
            .await
    }

    /// Sends a follow-up message to an existing run and streams the reply.
    pub async fn reply(
        &self,
        run_id: impl fmt::Display,
        message: impl Into<String>,
    ) -> Result<RunStream, StreamError> {
        let message: String = message.into();
        self.open(StreamRequest::new(
            format!("/runs/{run_id}/reply"),
            serde_json::json!({"message": message, "stream": true}),
        ))
        .await
    }

    /// Opens an arbitrary streaming endpoint.
    pub async fn open(&self, request: StreamRequest) -> Result<RunStream, StreamError> {
        let span = info_span!("run_stream", path = %request.path);
        debug!(parent: &span, "starting streamed request");
        let body = self
            .transport
            .open(request)
            .instrument(span.clone())
            .await?;
        Ok(RunStream::new(body).with_span(span))
    }
}
