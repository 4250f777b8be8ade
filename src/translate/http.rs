//! HTTP transport boundary.
//! Providers describe requests as plain values; a transport executes them with
//! per-request timeouts and a cancellation token raced against the call.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A single request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Wire shape of a request body. The body kind selects the HTTP method.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON POST.
    Json(serde_json::Value),
    /// x-www-form-urlencoded POST.
    Form(Vec<(String, String)>),
    /// GET, everything lives in the URL.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<Header>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn method(&self) -> &'static str {
        match self.body {
            RequestBody::Json(_) | RequestBody::Form(_) => "POST",
            RequestBody::None => "GET",
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Timeouts for one request.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Stretch `timeout` by 2s per 100 bytes of input.
    pub adaptive_timeout: bool,
    pub text_length_hint: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(5000),
            timeout: Duration::from_millis(45000),
            adaptive_timeout: true,
            text_length_hint: 0,
        }
    }
}

impl SessionConfig {
    /// Timeout after applying the adaptive length allowance.
    pub fn effective_timeout(&self) -> Duration {
        if !self.adaptive_timeout {
            return self.timeout;
        }
        let extra_ms = (self.text_length_hint / 100) as u64 * 2000;
        self.timeout + Duration::from_millis(extra_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Cancelled,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

/// Outcome of one transport call. `error` is set when no HTTP response arrived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub text: String,
    pub error: Option<TransportError>,
    /// Parsed `Retry-After` header (seconds form only).
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
            error: None,
            retry_after: None,
        }
    }

    pub fn transport_failure(error: TransportError) -> Self {
        Self {
            status: 0,
            text: String::new(),
            error: Some(error),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Executes provider requests. Implementations must return promptly once
/// `cancel` fires, reporting `TransportErrorKind::Cancelled`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(
        &self,
        request: &HttpRequest,
        session: &SessionConfig,
        cancel: &CancellationToken,
    ) -> HttpResponse;
}

/// Response bodies are cut off past this size.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// reqwest-backed transport with a pooled client.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(SessionConfig::default().connect_timeout)
            .build()?;
        Ok(Self { http })
    }

    async fn send(
        &self,
        request: &HttpRequest,
        session: &SessionConfig,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut builder = match &request.body {
            RequestBody::Json(body) => self.http.post(&request.url).json(body),
            RequestBody::Form(fields) => self.http.post(&request.url).form(fields),
            RequestBody::None => self.http.get(&request.url),
        };
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }

        let resp = builder.timeout(session.effective_timeout()).send().await?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let mut body = Vec::new();
        let mut chunks = resp.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            let room = MAX_BODY_BYTES - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                warn!(url = %request.url, limit = MAX_BODY_BYTES, "response body truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        let text = String::from_utf8_lossy(&body).into_owned();

        Ok(HttpResponse {
            status,
            text,
            error: None,
            retry_after,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        session: &SessionConfig,
        cancel: &CancellationToken,
    ) -> HttpResponse {
        debug!(method = request.method(), url = %request.url, "sending request");
        let result = tokio::select! {
            r = self.send(request, session) => r,
            _ = cancel.cancelled() => {
                return HttpResponse::transport_failure(TransportError {
                    kind: TransportErrorKind::Cancelled,
                    message: "request cancelled".into(),
                });
            }
        };

        match result {
            Ok(resp) => resp,
            Err(e) => {
                let kind = if e.is_timeout() {
                    TransportErrorKind::Timeout
                } else {
                    TransportErrorKind::Network
                };
                HttpResponse::transport_failure(TransportError {
                    kind,
                    message: e.to_string(),
                })
            }
        }
    }
}
