//! Qwen-MT on DashScope's OpenAI-compatible endpoint.
//! The model takes the raw text plus `translation_options` instead of a system prompt.

use std::time::Duration;

use serde_json::json;

use super::{parse_chat_completion, ParseResult, ProviderHooks};
use crate::translate::http::{Header, HttpResponse, RequestBody, SessionConfig};
use crate::translate::prompt::{effective_target, Prompt};
use crate::translate::{BackendConfig, Job, ProviderLimits};

pub const DEFAULT_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "qwen-mt-turbo";

pub struct QwenProvider;

impl ProviderHooks for QwenProvider {
    fn name(&self) -> &'static str {
        "Qwen-MT"
    }

    fn validate_config(&self, cfg: &BackendConfig) -> Result<(), String> {
        if cfg.model.trim().is_empty() {
            return Err("Qwen-MT model is required".into());
        }
        Ok(())
    }

    fn has_valid_runtime_config(&self, cfg: &BackendConfig) -> bool {
        !cfg.api_key.is_empty() && !cfg.model.is_empty()
    }

    fn limits(&self, _cfg: &BackendConfig) -> ProviderLimits {
        ProviderLimits {
            max_input_bytes: ProviderLimits::QWEN_MT,
        }
    }

    fn build_headers(&self, _job: &Job, cfg: &BackendConfig) -> Vec<Header> {
        vec![
            Header::new("Content-Type", "application/json"),
            Header::new("Authorization", format!("Bearer {}", cfg.api_key)),
        ]
    }

    fn build_url(&self, _job: &Job, cfg: &BackendConfig) -> String {
        if cfg.base_url.trim().is_empty() {
            DEFAULT_URL.to_string()
        } else {
            cfg.base_url.trim().to_string()
        }
    }

    fn build_body(&self, job: &Job, _prompt: &Prompt, cfg: &BackendConfig) -> RequestBody {
        RequestBody::Json(json!({
            "model": cfg.model,
            "messages": [{"role": "user", "content": job.text}],
            "translation_options": {
                "source_lang": "auto",
                "target_lang": target_name(effective_target(job, cfg)),
            },
        }))
    }

    fn parse_response(&self, _job: &Job, resp: &HttpResponse) -> ParseResult {
        parse_chat_completion(self.name(), &resp.text)
    }

    fn configure_session(&self, _job: &Job, session: &mut SessionConfig) {
        session.connect_timeout = Duration::from_millis(5000);
        session.timeout = Duration::from_millis(15000);
    }
}

fn target_name(lang: &str) -> &str {
    match lang.to_ascii_lowercase().as_str() {
        "en" | "en-us" => "English",
        "zh-cn" => "Chinese",
        "zh-tw" => "Chinese (Traditional)",
        _ => lang,
    }
}
