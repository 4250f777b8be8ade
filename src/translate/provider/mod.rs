//! Provider variants: the per-backend hooks the engine delegates to.
//! Every backend fills in `ProviderHooks`; `Provider` is the single dispatch point.

pub mod google;
pub mod niutrans;
pub mod openai;
pub mod qwen;
pub mod youdao;
pub mod zhipu;

use super::error::TranslateError;
use super::http::{Header, HttpResponse, RequestBody, SessionConfig};
use super::prompt::Prompt;
use super::{Backend, BackendConfig, Job, ProviderLimits};

/// Translated text, or the failure the provider read out of the response body.
pub type ParseResult = Result<String, TranslateError>;

/// Backend-specific protocol. All hooks are pure with respect to the config
/// except where a provider keeps runtime state (Google fallback, Youdao warning).
pub trait ProviderHooks: Send + Sync {
    /// Stable name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Checked once at init; an error aborts init.
    fn validate_config(&self, _cfg: &BackendConfig) -> Result<(), String> {
        Ok(())
    }

    /// Re-checked on every readiness query.
    fn has_valid_runtime_config(&self, _cfg: &BackendConfig) -> bool {
        true
    }

    fn limits(&self, _cfg: &BackendConfig) -> ProviderLimits {
        ProviderLimits::default()
    }

    /// Job-level checks that need provider knowledge (e.g. unsupported targets).
    /// Failures are terminal.
    fn check_job(&self, _job: &Job, _cfg: &BackendConfig) -> Result<(), TranslateError> {
        Ok(())
    }

    fn build_headers(&self, job: &Job, cfg: &BackendConfig) -> Vec<Header>;

    fn build_url(&self, job: &Job, cfg: &BackendConfig) -> String;

    fn build_body(&self, job: &Job, prompt: &Prompt, cfg: &BackendConfig) -> RequestBody;

    /// Parse a 2xx response.
    fn parse_response(&self, job: &Job, resp: &HttpResponse) -> ParseResult;

    /// Whether a failed HTTP exchange should be retried.
    fn should_retry(&self, resp: &HttpResponse) -> bool {
        default_should_retry(resp)
    }

    fn configure_session(&self, _job: &Job, session: &mut SessionConfig) {
        session.connect_timeout = SessionConfig::default().connect_timeout;
        session.timeout = SessionConfig::default().timeout;
    }

    fn connection_success_message(&self) -> String {
        format!("Success: {} connection test passed", self.name())
    }
}

/// Network error, 429, 408, status 0 or any 5xx.
pub fn default_should_retry(resp: &HttpResponse) -> bool {
    if resp.error.is_some() {
        return true;
    }
    matches!(resp.status, 0 | 408 | 429) || resp.status >= 500
}

/// Tagged union over the six backends.
pub enum Provider {
    OpenAi(openai::OpenAiProvider),
    Google(google::GoogleProvider),
    ZhipuGlm(zhipu::ZhipuProvider),
    QwenMt(qwen::QwenProvider),
    Niutrans(niutrans::NiutransProvider),
    Youdao(youdao::YoudaoProvider),
}

impl Provider {
    /// Fresh provider state for one worker generation.
    pub fn for_config(cfg: &BackendConfig) -> Self {
        match cfg.backend {
            Backend::OpenAi => Provider::OpenAi(openai::OpenAiProvider),
            Backend::Google => Provider::Google(google::GoogleProvider::new(!cfg.api_key.is_empty())),
            Backend::ZhipuGlm => Provider::ZhipuGlm(zhipu::ZhipuProvider),
            Backend::QwenMt => Provider::QwenMt(qwen::QwenProvider),
            Backend::Niutrans => Provider::Niutrans(niutrans::NiutransProvider),
            Backend::Youdao => Provider::Youdao(youdao::YoudaoProvider::new(youdao::Mode::from_config(cfg))),
        }
    }

    pub fn hooks(&self) -> &dyn ProviderHooks {
        match self {
            Provider::OpenAi(p) => p,
            Provider::Google(p) => p,
            Provider::ZhipuGlm(p) => p,
            Provider::QwenMt(p) => p,
            Provider::Niutrans(p) => p,
            Provider::Youdao(p) => p,
        }
    }
}

/// Chat-completions `messages` array shared by the OpenAI-shaped providers.
pub(crate) fn chat_messages(prompt: &Prompt) -> serde_json::Value {
    serde_json::to_value(&prompt.messages).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

/// `choices[0].message.content`, or the API's `error.message`.
pub(crate) fn parse_chat_completion(provider: &str, body: &str) -> ParseResult {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TranslateError::parse(format!("{provider} response parse error: {e}")))?;

    if let Some(content) = value
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
    {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(TranslateError::parse(format!("{provider} returned empty content")));
        }
        return Ok(trimmed.to_string());
    }

    if let Some(message) = value.pointer("/error/message").and_then(|v| v.as_str()) {
        return Err(TranslateError::parse(format!("{provider} API error: {message}")));
    }
    Err(TranslateError::parse(format!(
        "{provider} response missing choices[0].message.content"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::http::{TransportError, TransportErrorKind};

    #[test]
    fn default_retry_classification() {
        assert!(default_should_retry(&HttpResponse::new(429, "")));
        assert!(default_should_retry(&HttpResponse::new(408, "")));
        assert!(default_should_retry(&HttpResponse::new(502, "")));
        assert!(default_should_retry(&HttpResponse::new(0, "")));
        assert!(!default_should_retry(&HttpResponse::new(400, "")));
        assert!(!default_should_retry(&HttpResponse::new(401, "")));
        assert!(default_should_retry(&HttpResponse::transport_failure(TransportError {
            kind: TransportErrorKind::Network,
            message: "reset".into(),
        })));
    }

    #[test]
    fn every_backend_dispatches_to_its_provider() {
        let names: Vec<_> = [
            Backend::OpenAi,
            Backend::Google,
            Backend::ZhipuGlm,
            Backend::QwenMt,
            Backend::Niutrans,
            Backend::Youdao,
        ]
        .into_iter()
        .map(|backend| {
            let cfg = BackendConfig {
                backend,
                ..BackendConfig::default()
            };
            Provider::for_config(&cfg).hooks().name()
        })
        .collect();
        assert_eq!(names, ["OpenAI", "Google", "ZhipuGLM", "Qwen-MT", "Niutrans", "Youdao"]);
    }

    #[test]
    fn chat_completion_parsing() {
        let ok = r#"{"choices":[{"message":{"role":"assistant","content":" 你好 "}}]}"#;
        assert_eq!(parse_chat_completion("OpenAI", ok).unwrap(), "你好");

        let api_err = r#"{"error":{"message":"invalid api key"}}"#;
        let err = parse_chat_completion("OpenAI", api_err).unwrap_err();
        assert_eq!(err.to_string(), "OpenAI API error: invalid api key");
        assert!(!err.is_retryable());

        assert!(parse_chat_completion("OpenAI", "not json").is_err());
        assert!(parse_chat_completion("OpenAI", r#"{"choices":[]}"#).is_err());
    }
}
