//! OpenAI-compatible chat completions.

use serde_json::json;

use super::{chat_messages, parse_chat_completion, ParseResult, ProviderHooks};
use crate::translate::http::{Header, HttpResponse, RequestBody};
use crate::translate::prompt::Prompt;
use crate::translate::{BackendConfig, Job, ProviderLimits};

pub struct OpenAiProvider;

impl ProviderHooks for OpenAiProvider {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn validate_config(&self, cfg: &BackendConfig) -> Result<(), String> {
        if cfg.base_url.trim().is_empty() {
            return Err("OpenAI base URL is required".into());
        }
        if cfg.model.trim().is_empty() {
            return Err("OpenAI model is required".into());
        }
        Ok(())
    }

    fn has_valid_runtime_config(&self, cfg: &BackendConfig) -> bool {
        !cfg.api_key.is_empty() && !cfg.model.is_empty() && !cfg.base_url.is_empty()
    }

    fn limits(&self, _cfg: &BackendConfig) -> ProviderLimits {
        ProviderLimits {
            max_input_bytes: ProviderLimits::OPENAI,
        }
    }

    fn build_headers(&self, _job: &Job, cfg: &BackendConfig) -> Vec<Header> {
        vec![
            Header::new("Content-Type", "application/json"),
            Header::new("Authorization", format!("Bearer {}", cfg.api_key)),
        ]
    }

    fn build_url(&self, _job: &Job, cfg: &BackendConfig) -> String {
        normalize_url(&cfg.base_url)
    }

    fn build_body(&self, _job: &Job, prompt: &Prompt, cfg: &BackendConfig) -> RequestBody {
        RequestBody::Json(json!({
            "model": cfg.model,
            "messages": chat_messages(prompt),
            "temperature": 0.3,
        }))
    }

    fn parse_response(&self, _job: &Job, resp: &HttpResponse) -> ParseResult {
        parse_chat_completion(self.name(), &resp.text)
    }
}

/// Accepts a bare host, a `/v1` root or the full endpoint.
pub fn normalize_url(base_url: &str) -> String {
    let url = base_url.trim().trim_end_matches('/');
    if url.contains("/v1/chat/completions") {
        url.to_string()
    } else if url.ends_with("/v1") {
        format!("{url}/chat/completions")
    } else {
        format!("{url}/v1/chat/completions")
    }
}
