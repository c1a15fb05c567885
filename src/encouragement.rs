//! Client for the AI encouragement text service.
//!
//! Requests never fail from the caller's point of view: any problem with the
//! service resolves to a fixed fallback message.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_MESSAGE: &str = "One step at a time! 🌱";
pub const FALLBACK_MESSAGE: &str = "Just try for 1 minute! 🌱";
pub const UNSTUCK_FALLBACK_MESSAGE: &str = "Just open it. 📂";

const GENERATE_MESSAGE_PATH: &str = "/api/generate-message";
const GET_UNSTUCK_PATH: &str = "/api/get-unstuck";

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// Generated by the AI service.
    Ai,
    /// The service was unavailable or failed.
    Fallback,
    /// No task was given, so nothing was asked.
    Default,
}

impl MessageSource {
    fn from_server(source: Option<&str>) -> Self {
        match source {
            Some("fallback") => Self::Fallback,
            Some("default") => Self::Default,
            _ => Self::Ai,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncouragementMessage {
    pub message: String,
    pub source: MessageSource,
}

impl EncouragementMessage {
    fn fallback(message: &str) -> Self {
        Self {
            message: message.to_string(),
            source: MessageSource::Fallback,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequest<'a> {
    task_name: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    message: String,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Error, Debug)]
enum RequestError {
    #[error("no encouragement service configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("service returned an empty message")]
    Empty,
}

#[derive(Clone)]
pub struct EncouragementClient {
    client: Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl EncouragementClient {
    /// Creates a client for the service at `base_url`. Without a URL every
    /// request resolves to the fallback text.
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        Self::with_client(Client::new(), base_url, timeout)
    }

    fn with_client(client: Client, base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    /// Asks for a short encouragement for the given task.
    pub async fn request(&self, task_label: Option<&str>) -> EncouragementMessage {
        let task = task_label.map(str::trim).unwrap_or_default();
        if task.is_empty() {
            return EncouragementMessage {
                message: DEFAULT_MESSAGE.to_string(),
                source: MessageSource::Default,
            };
        }

        match self.post(GENERATE_MESSAGE_PATH, task).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Encouragement request failed, using fallback");
                EncouragementMessage::fallback(FALLBACK_MESSAGE)
            }
        }
    }

    /// Asks for a tiny first step for someone who cannot get started.
    pub async fn request_unstuck(&self, task_label: Option<&str>) -> EncouragementMessage {
        let task = task_label.map(str::trim).unwrap_or_default();
        match self.post(GET_UNSTUCK_PATH, task).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Unstuck request failed, using fallback");
                EncouragementMessage::fallback(UNSTUCK_FALLBACK_MESSAGE)
            }
        }
    }

    async fn post(&self, path: &str, task: &str) -> Result<EncouragementMessage, RequestError> {
        let base_url = self.base_url.as_deref().ok_or(RequestError::NotConfigured)?;
        let url = format!("{base_url}{path}");
        debug!(%url, "Requesting encouragement");

        let send = async {
            let response = self
                .client
                .post(&url)
                .json(&MessageRequest { task_name: task })
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(RequestError::Status(response.status()));
            }
            Ok::<_, RequestError>(response.json::<MessageResponse>().await?)
        };

        let body = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| RequestError::Timeout(self.timeout))??;

        let message = body.message.trim();
        if message.is_empty() {
            return Err(RequestError::Empty);
        }
        Ok(EncouragementMessage {
            message: message.to_string(),
            source: MessageSource::from_server(body.source.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Client that talks to the local test server directly, whatever proxy
    /// the environment configures.
    fn local_client(url: String, timeout: Duration) -> EncouragementClient {
        let client = Client::builder().no_proxy().build().unwrap();
        EncouragementClient::with_client(client, Some(url), timeout)
    }

    /// Serves one canned HTTP response and returns the base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{addr}")
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_empty_task_uses_default_without_network() {
        let client = EncouragementClient::new(None, Duration::from_secs(1));
        let message = client.request(Some("   ")).await;
        assert_eq!(message.source, MessageSource::Default);
        assert_eq!(message.message, DEFAULT_MESSAGE);
    }

    #[tokio::test]
    async fn test_unconfigured_uses_fallback() {
        let client = EncouragementClient::new(None, Duration::from_secs(1));
        let message = client.request(Some("Write report")).await;
        assert_eq!(message, EncouragementMessage::fallback(FALLBACK_MESSAGE));

        let unstuck = client.request_unstuck(None).await;
        assert_eq!(unstuck.message, UNSTUCK_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_ai_message() {
        let url = serve_once(
            "200 OK",
            r#"{"message":"Small steps count! 🚀","source":"gemini","taskName":"Write report"}"#,
        )
        .await;
        let client = local_client(format!("{url}/"), Duration::from_secs(5));

        let message = client.request(Some("Write report")).await;
        assert_eq!(message.source, MessageSource::Ai);
        assert_eq!(message.message, "Small steps count! 🚀");
    }

    #[tokio::test]
    async fn test_server_fallback_source_is_kept() {
        let url = serve_once("200 OK", r#"{"message":"You got this! ✨","source":"fallback"}"#).await;
        let client = local_client(url, Duration::from_secs(5));

        let message = client.request_unstuck(Some("Taxes")).await;
        assert_eq!(message.source, MessageSource::Fallback);
        assert_eq!(message.message, "You got this! ✨");
    }

    #[tokio::test]
    async fn test_error_status_uses_fallback() {
        let url = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = local_client(url, Duration::from_secs(5));

        let message = client.request(Some("Write report")).await;
        assert_eq!(message, EncouragementMessage::fallback(FALLBACK_MESSAGE));
    }

    #[tokio::test]
    async fn test_malformed_body_uses_fallback() {
        let url = serve_once("200 OK", r#"{"text":"missing message"}"#).await;
        let client = local_client(url, Duration::from_secs(5));

        let message = client.request(Some("Write report")).await;
        assert_eq!(message.source, MessageSource::Fallback);
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = local_client(format!("http://{addr}"), Duration::from_millis(200));
        let message = client.request(Some("Write report")).await;
        assert_eq!(message, EncouragementMessage::fallback(FALLBACK_MESSAGE));
    }
}
