//! Error taxonomy for the translation pipeline.
//! Every failure a job can hit maps onto one `TranslateError` variant; the
//! `Display` text is what the overlay shows, details go to the reporter.

use std::time::Duration;

use thiserror::Error;

use super::http::{HttpResponse, TransportErrorKind};

/// Longest response snippet carried into user-facing messages.
const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("translator not ready")]
    NotReady,

    #[error(
        "{provider} text too long: {len} bytes (limit: {limit} bytes). Consider splitting into smaller chunks."
    )]
    TextTooLong {
        provider: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("Request timeout - text may be too long to process in time. Try shorter text or increase timeout.")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("Rate limited (HTTP 429): {snippet}")]
    RateLimited {
        snippet: String,
        retry_after: Option<Duration>,
    },

    #[error("HTTP 413 Payload Too Large - text exceeds API limits. Try splitting into smaller chunks.")]
    PayloadTooLarge,

    #[error("HTTP 414 URI Too Long - text too long for URL. This backend cannot handle text this long.")]
    UriTooLong,

    #[error("Client error (HTTP {status}): {snippet}")]
    Client { status: u16, snippet: String },

    #[error("Server error (HTTP {status}): {snippet}")]
    Server { status: u16, snippet: String },

    #[error("HTTP {status}: {snippet}")]
    Http { status: u16, snippet: String },

    #[error("{message}")]
    Parse {
        message: String,
        retryable: bool,
        retry_after: Option<Duration>,
    },

    #[error("failed to start translation worker: {0}")]
    Worker(String),
}

impl TranslateError {
    /// Transient failures that the engine may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Timeout
            | TranslateError::Network(_)
            | TranslateError::RateLimited { .. }
            | TranslateError::Server { .. } => true,
            TranslateError::Parse { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TranslateError::RateLimited { retry_after, .. } => *retry_after,
            TranslateError::Parse { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Terminal parse failure with a message.
    pub fn parse(message: impl Into<String>) -> Self {
        TranslateError::Parse {
            message: message.into(),
            retryable: false,
            retry_after: None,
        }
    }

    /// Parse failure the provider wants retried.
    pub fn parse_retryable(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        TranslateError::Parse {
            message: message.into(),
            retryable: true,
            retry_after,
        }
    }

    /// Categorise a failed transport call or a non-2xx response.
    ///
    /// Returns `None` for a successful response.
    pub fn from_response(resp: &HttpResponse) -> Option<Self> {
        if let Some(err) = &resp.error {
            return Some(match err.kind {
                TransportErrorKind::Timeout => TranslateError::Timeout,
                TransportErrorKind::Cancelled => TranslateError::Cancelled,
                TransportErrorKind::Network => TranslateError::Network(err.message.clone()),
            });
        }
        if resp.is_success() {
            return None;
        }

        let status = resp.status;
        let snippet = snippet(&resp.text);
        Some(match status {
            408 | 504 => TranslateError::Timeout,
            413 => TranslateError::PayloadTooLarge,
            414 => TranslateError::UriTooLong,
            429 => TranslateError::RateLimited {
                snippet,
                retry_after: resp.retry_after,
            },
            400..=499 => TranslateError::Client { status, snippet },
            500..=599 => TranslateError::Server { status, snippet },
            _ => TranslateError::Http { status, snippet },
        })
    }
}

/// Raw diagnostic string for the error reporter: status plus body or transport error.
pub fn technical_details(resp: &HttpResponse) -> String {
    match &resp.error {
        Some(err) => format!("transport error ({:?}): {}", err.kind, err.message),
        None => format!("http {}: {}", resp.status, snippet(&resp.text)),
    }
}

/// Trim a response body to a loggable snippet on a char boundary.
pub fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
