//! Zhipu GLM: chat-completions shape with its own sampling knobs.

use serde_json::json;

use super::{chat_messages, parse_chat_completion, ParseResult, ProviderHooks};
use crate::translate::http::{Header, HttpResponse, RequestBody};
use crate::translate::prompt::Prompt;
use crate::translate::{BackendConfig, Job, ProviderLimits};

pub const DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
pub const DEFAULT_MODEL: &str = "glm-4-flash";

pub struct ZhipuProvider;

impl ProviderHooks for ZhipuProvider {
    fn name(&self) -> &'static str {
        "ZhipuGLM"
    }

    fn validate_config(&self, cfg: &BackendConfig) -> Result<(), String> {
        if cfg.model.trim().is_empty() {
            return Err("Zhipu GLM model is required".into());
        }
        Ok(())
    }

    fn has_valid_runtime_config(&self, cfg: &BackendConfig) -> bool {
        !cfg.api_key.is_empty() && !cfg.model.is_empty()
    }

    fn limits(&self, _cfg: &BackendConfig) -> ProviderLimits {
        ProviderLimits {
            max_input_bytes: ProviderLimits::ZHIPU_GLM,
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

    fn build_body(&self, _job: &Job, prompt: &Prompt, cfg: &BackendConfig) -> RequestBody {
        RequestBody::Json(json!({
            "model": cfg.model,
            "messages": chat_messages(prompt),
            "temperature": 0.3,
            "top_p": 0.7,
            "stream": false,
        }))
    }

    fn parse_response(&self, _job: &Job, resp: &HttpResponse) -> ParseResult {
        parse_chat_completion(self.name(), &resp.text)
    }
}
