use futures::StreamExt as _;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::StreamError;
use crate::parser::ByteStream;

/// A streaming request: API path relative to the base URL plus a JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    pub path: String,
    pub body: serde_json::Value,
}

impl StreamRequest {
    pub fn new(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            body,
        }
    }
}

/// Opens a streaming response body.
///
/// Implementations fail with a transport or authentication error when the
/// connection cannot be established or the server answers with a non-2xx
/// status. Read failures after that surface through the returned stream.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, request: StreamRequest) -> Result<ByteStream, StreamError>;
}

/// reqwest-backed transport using bearer auth.
///
/// No retries and no credential refresh; both belong to the caller.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, StreamError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl StreamTransport for HttpTransport {
    async fn open(&self, request: StreamRequest) -> Result<ByteStream, StreamError> {
        let url = self.config.url(&request.path);
        debug!(url = %url, "opening run stream");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&request.body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let err = error_from_response(status.as_u16(), &body);
            debug!(url = %url, status = status.as_u16(), error = %err, "run stream rejected");
            return Err(err);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from));
        Ok(Box::pin(body))
    }
}

/// Builds the error for a non-2xx response from its status and body.
///
/// Understands `{"error": {"message", "request_id"}}` and `{"detail"}`
/// bodies; anything else is used verbatim.
pub(crate) fn error_from_response(status: u16, body: &str) -> StreamError {
    let fallback = format!("HTTP {status}");
    let (message, request_id) = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => {
            let error = value.get("error");
            let message = error
                .and_then(|e| e.get("message"))
                .or_else(|| error.filter(|e| e.is_string()))
                .or_else(|| value.get("detail"))
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned);
            let request_id = error
                .and_then(|e| e.get("request_id"))
                .or_else(|| value.get("request_id"))
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned);
            (message.unwrap_or(fallback), request_id)
        }
        Err(_) if !body.trim().is_empty() => (body.trim().to_string(), None),
        Err(_) => (fallback, None),
    };
    StreamError::from_status(status, message, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_stream;
    use futures::TryStreamExt as _;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    // Serves one canned response and returns the raw request it received.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.expect("shutdown");
            request
        });
        (base, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.expect("read");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(ClientConfig::new("test-key").base_url(base)).expect("transport")
    }

    #[tokio::test]
    async fn streams_body_with_bearer_auth() {
        let body = "data: {\"type\":\"text-delta\",\"delta\":\"Hi\"}\n\ndata: [DONE]\n\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
        );
        let (base, server) = serve_once(response).await;

        let stream = transport(&base)
            .open(StreamRequest::new("/runs", serde_json::json!({"message":"hi","stream":true})))
            .await
            .expect("open");
        let events: Vec<crate::Event> = parse_stream(stream).try_collect().await.expect("events");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text_delta(), Some("Hi"));
        assert!(events[1].is_done());

        let request = server.await.expect("server");
        assert!(request.starts_with("POST /runs "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer test-key"));
        assert!(request.contains("\"stream\":true"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_error() {
        let body = r#"{"error":{"message":"bad key","request_id":"r1"}}"#;
        let response = format!(
            "HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (base, _server) = serve_once(response).await;
        let err = match transport(&base)
            .open(StreamRequest::new("runs", serde_json::json!({})))
            .await
        {
            Ok(_) => panic!("401 should fail"),
            Err(err) => err,
        };
        assert!(err.is_authentication());
        assert_eq!(err.status_code(), Some(401));
    }

    #[tokio::test]
    async fn server_error_maps_to_status_error() {
        let body = r#"{"detail":"overloaded"}"#;
        let response = format!(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (base, _server) = serve_once(response).await;
        let err = match transport(&base)
            .open(StreamRequest::new("runs", serde_json::json!({})))
            .await
        {
            Ok(_) => panic!("503 should fail"),
            Err(err) => err,
        };
        assert!(err.is_network());
        assert!(matches!(
            err,
            StreamError::Status { status_code: 503, ref message, .. } if message == "overloaded"
        ));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        drop(listener);
        let err = match transport(&base)
            .open(StreamRequest::new("runs", serde_json::json!({})))
            .await
        {
            Ok(_) => panic!("closed port should fail"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            StreamError::Transport { ref message } if message.starts_with("connection failed")
        ));
    }

    #[test]
    fn error_body_shapes() {
        let err = error_from_response(422, r#"{"error":{"message":"bad field","request_id":"abc"}}"#);
        assert_eq!(
            err,
            StreamError::Status {
                status_code: 422,
                message: "bad field".into(),
                request_id: Some("abc".into())
            }
        );
        let err = error_from_response(500, "upstream exploded");
        assert!(matches!(err, StreamError::Status { ref message, .. } if message == "upstream exploded"));
        let err = error_from_response(502, "");
        assert!(matches!(err, StreamError::Status { ref message, .. } if message == "HTTP 502"));
        assert!(error_from_response(401, "").is_authentication());
    }

    #[test]
    fn rejects_missing_api_key() {
        assert!(matches!(
            HttpTransport::new(ClientConfig::new("")),
            Err(StreamError::Config(_))
        ));
    }
}
