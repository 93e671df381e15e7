//! Network seam for the pipeline.
//!
//! Every remote call goes through [`ImageTransport`] and comes back as a
//! tagged [`FetchOutcome`], so callers match on variants instead of poking
//! at HTTP error objects.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::trace;
use vitrine_config::HttpConfig;

/// Response body plus the server's `Content-Type`, if any.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Arc<[u8]>,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(
        mut self,
        content_type: impl Into<String>,
    ) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Result of one remote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(Payload),
    NotFound,
    Transport(TransportError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

#[async_trait]
pub trait ImageTransport: Send + Sync + fmt::Debug + 'static {
    /// Binary `GET`; the body is never decoded by the transport.
    async fn get(&self, url: &str) -> FetchOutcome;

    /// Body-less `POST`, used to trigger server-side work.
    async fn post(&self, url: &str) -> FetchOutcome;
}

/// [`ImageTransport`] over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(http: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(http.request_timeout)
            .user_agent(http.user_agent.clone())
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;
        Ok(Self { client })
    }

    async fn execute(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> FetchOutcome {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return FetchOutcome::Transport(request_error(url, &err));
            }
        };

        let status = response.status();
        trace!(%url, %status, "response received");
        if let Some(outcome) = status_outcome(url, status) {
            return outcome;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(bytes) => FetchOutcome::Success(Payload {
                bytes: Arc::from(bytes.as_ref()),
                content_type,
            }),
            Err(err) => FetchOutcome::Transport(request_error(url, &err)),
        }
    }
}

#[async_trait]
impl ImageTransport for HttpTransport {
    async fn get(&self, url: &str) -> FetchOutcome {
        self.execute(url, self.client.get(url)).await
    }

    async fn post(&self, url: &str) -> FetchOutcome {
        self.execute(url, self.client.post(url)).await
    }
}

/// Outcome decided by the status line alone. `None` means the body should
/// be read.
fn status_outcome(url: &str, status: StatusCode) -> Option<FetchOutcome> {
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Some(FetchOutcome::NotFound);
    }
    if !status.is_success() {
        return Some(FetchOutcome::Transport(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }));
    }
    None
}

fn request_error(url: &str, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://cache.test/cache/1";

    #[test]
    fn missing_and_gone_are_not_found() {
        for status in [StatusCode::NOT_FOUND, StatusCode::GONE] {
            assert_eq!(
                status_outcome(URL, status),
                Some(FetchOutcome::NotFound)
            );
        }
    }

    #[test]
    fn other_error_statuses_are_transport_failures() {
        for code in [400u16, 403, 500, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(
                status_outcome(URL, status),
                Some(FetchOutcome::Transport(TransportError::Status {
                    url: URL.to_string(),
                    status: code,
                }))
            );
        }
    }

    #[test]
    fn success_statuses_read_the_body() {
        assert_eq!(status_outcome(URL, StatusCode::OK), None);
        assert_eq!(status_outcome(URL, StatusCode::NO_CONTENT), None);
    }

    #[test]
    fn client_builds_from_default_config() {
        let http = vitrine_config::HttpConfig::default();
        assert!(HttpTransport::new(&http).is_ok());
    }
}
