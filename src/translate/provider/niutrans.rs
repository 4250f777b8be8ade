//! Niutrans text translation (form POST, key in the body).

use std::time::Duration;

use serde::Deserialize;

use super::{ParseResult, ProviderHooks};
use crate::translate::error::TranslateError;
use crate::translate::http::{Header, HttpResponse, RequestBody, SessionConfig};
use crate::translate::prompt::{effective_target, Prompt};
use crate::translate::{BackendConfig, Job, ProviderLimits};

pub const DEFAULT_URL: &str = "https://api.niutrans.com/NiuTransServer/translation";

pub struct NiutransProvider;

#[derive(Deserialize)]
struct NiutransResponse {
    tgt_text: Option<String>,
    error_code: Option<serde_json::Value>,
    error_msg: Option<String>,
}

impl ProviderHooks for NiutransProvider {
    fn name(&self) -> &'static str {
        "Niutrans"
    }

    fn has_valid_runtime_config(&self, cfg: &BackendConfig) -> bool {
        !cfg.api_key.is_empty()
    }

    fn limits(&self, _cfg: &BackendConfig) -> ProviderLimits {
        ProviderLimits {
            max_input_bytes: ProviderLimits::NIUTRANS,
        }
    }

    fn build_headers(&self, _job: &Job, _cfg: &BackendConfig) -> Vec<Header> {
        Vec::new()
    }

    fn build_url(&self, _job: &Job, cfg: &BackendConfig) -> String {
        if cfg.base_url.trim().is_empty() {
            DEFAULT_URL.to_string()
        } else {
            cfg.base_url.trim().to_string()
        }
    }

    fn build_body(&self, job: &Job, _prompt: &Prompt, cfg: &BackendConfig) -> RequestBody {
        RequestBody::Form(vec![
            ("from".into(), "auto".into()),
            ("to".into(), target_code(effective_target(job, cfg)).into()),
            ("apikey".into(), cfg.api_key.clone()),
            ("src_text".into(), job.text.clone()),
        ])
    }

    fn parse_response(&self, _job: &Job, resp: &HttpResponse) -> ParseResult {
        let parsed: NiutransResponse = serde_json::from_str(&resp.text)
            .map_err(|e| TranslateError::parse(format!("Niutrans response parse error: {e}")))?;
        match parsed.tgt_text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => {
                let message = parsed
                    .error_msg
                    .unwrap_or_else(|| "Niutrans returned no translation".to_string());
                let message = match parsed.error_code {
                    Some(code) => format!("Niutrans error {}: {message}", code_text(&code)),
                    None => message,
                };
                Err(TranslateError::parse(message))
            }
        }
    }

    fn configure_session(&self, _job: &Job, session: &mut SessionConfig) {
        session.connect_timeout = Duration::from_millis(5000);
        session.timeout = Duration::from_millis(15000);
    }
}

fn target_code(lang: &str) -> &str {
    match lang.to_ascii_lowercase().as_str() {
        "en" | "en-us" => "en",
        "zh-cn" => "zh",
        "zh-tw" => "zh-TW",
        _ => lang,
    }
}

fn code_text(code: &serde_json::Value) -> String {
    match code {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job {
            id: 2,
            text: "おはよう".into(),
            source_lang: "ja".into(),
            target_lang: "zh-tw".into(),
        }
    }

    #[test]
    fn form_fields() {
        let cfg = BackendConfig {
            api_key: "nk".into(),
            ..BackendConfig::default()
        };
        let RequestBody::Form(fields) = NiutransProvider.build_body(&job(), &Prompt::default(), &cfg)
        else {
            panic!("expected form body");
        };
        assert!(fields.contains(&("to".to_string(), "zh-TW".to_string())));
        assert!(fields.contains(&("apikey".to_string(), "nk".to_string())));
        assert!(fields.contains(&("src_text".to_string(), "おはよう".to_string())));
        assert_eq!(NiutransProvider.build_url(&job(), &cfg), DEFAULT_URL);
    }

    #[test]
    fn parses_text_or_error_message() {
        let ok = HttpResponse::new(200, r#"{"from":"ja","to":"zh","tgt_text":"早上好"}"#);
        assert_eq!(NiutransProvider.parse_response(&job(), &ok).unwrap(), "早上好");

        let err = HttpResponse::new(200, r#"{"error_code":"13001","error_msg":"apikey is invalid"}"#);
        let e = NiutransProvider.parse_response(&job(), &err).unwrap_err();
        assert_eq!(e.to_string(), "Niutrans error 13001: apikey is invalid");
    }
}
