/// Guidance attached to authentication failures.
pub(crate) const REAUTH_GUIDANCE: &str = "Invalid or expired API key. Try:\n  \
     • Refresh your credentials and set M8TES_API_KEY\n  \
     • Check that the API key is correct";

/// Failures that end a run stream.
///
/// Malformed frames are never reported here; they are dropped by the parser.
/// In-protocol `error` events are data, see `EventKind::Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Connection refused/reset, read failure, or timeout.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The server rejected the credentials (HTTP 401).
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        status_code: Option<u16>,
    },
    /// Any other non-2xx response.
    #[error("request failed with status {status_code}: {message}")]
    Status {
        status_code: u16,
        message: String,
        request_id: Option<String>,
    },
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl StreamError {
    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an authentication error carrying re-authentication guidance.
    pub fn authentication(status_code: Option<u16>) -> Self {
        Self::Authentication {
            message: REAUTH_GUIDANCE.to_string(),
            status_code,
        }
    }

    /// Maps a non-2xx HTTP status to its error category.
    pub fn from_status(status_code: u16, message: impl Into<String>, request_id: Option<String>) -> Self {
        if status_code == 401 {
            return Self::authentication(Some(status_code));
        }
        Self::Status {
            status_code,
            message: message.into(),
            request_id,
        }
    }

    /// True for failures in the network category (transport and HTTP status).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }

    /// True when the credentials were rejected.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// HTTP status associated with the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            Self::Authentication { status_code, .. } => *status_code,
            Self::Transport { .. } | Self::Config(_) => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::transport(format!("request timed out: {value}"));
        }
        if value.is_connect() {
            return Self::transport(format!("connection failed: {value}"));
        }
        if value.is_body() || value.is_decode() {
            return Self::transport(format!("stream read failed: {value}"));
        }
        Self::transport(format!("request failed: {value}"))
    }
}

impl From<std::convert::Infallible> for StreamError {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}
