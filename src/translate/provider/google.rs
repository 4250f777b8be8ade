//! Google Translate: paid v2 API when a key is configured, with a sticky
//! fallback to the free `translate_a/single` endpoint once the paid API fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use super::{default_should_retry, ParseResult, ProviderHooks};
use crate::translate::error::TranslateError;
use crate::translate::http::{Header, HttpResponse, RequestBody, SessionConfig};
use crate::translate::prompt::{effective_target, Prompt};
use crate::translate::{BackendConfig, Job, ProviderLimits};

pub const PAID_URL: &str = "https://translation.googleapis.com/language/translate/v2";
pub const FREE_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub struct GoogleProvider {
    paid_working: AtomicBool,
    warned_fallback: AtomicBool,
}

impl GoogleProvider {
    /// `has_key` selects the paid API until it fails.
    pub fn new(has_key: bool) -> Self {
        Self {
            paid_working: AtomicBool::new(has_key),
            warned_fallback: AtomicBool::new(false),
        }
    }

    /// Paid API is used while a key is set and it has not failed this generation.
    pub fn uses_paid(&self, cfg: &BackendConfig) -> bool {
        !cfg.api_key.is_empty() && self.paid_working.load(Ordering::Acquire)
    }

    fn fall_back_to_free(&self) {
        if self.paid_working.swap(false, Ordering::AcqRel)
            && !self.warned_fallback.swap(true, Ordering::AcqRel)
        {
            warn!("Google Translate paid API failed, falling back to free tier");
        }
    }

    fn in_paid_mode(&self) -> bool {
        self.paid_working.load(Ordering::Acquire)
    }
}

impl ProviderHooks for GoogleProvider {
    fn name(&self) -> &'static str {
        "Google"
    }

    fn limits(&self, cfg: &BackendConfig) -> ProviderLimits {
        let max_input_bytes = if self.uses_paid(cfg) {
            ProviderLimits::GOOGLE_PAID
        } else {
            ProviderLimits::GOOGLE_FREE
        };
        ProviderLimits { max_input_bytes }
    }

    fn build_headers(&self, _job: &Job, cfg: &BackendConfig) -> Vec<Header> {
        if self.uses_paid(cfg) {
            vec![
                Header::new("Content-Type", "application/json"),
                Header::new("Authorization", format!("Bearer {}", cfg.api_key)),
            ]
        } else {
            Vec::new()
        }
    }

    fn build_url(&self, job: &Job, cfg: &BackendConfig) -> String {
        if self.uses_paid(cfg) {
            return PAID_URL.to_string();
        }
        let source = source_code(&job.source_lang);
        let target = normalize_language_code(effective_target(job, cfg));
        let params = [
            ("client", "gtx"),
            ("sl", source.as_str()),
            ("tl", target.as_str()),
            ("dt", "t"),
            ("q", job.text.as_str()),
        ];
        match reqwest::Url::parse_with_params(FREE_URL, &params) {
            Ok(url) => url.to_string(),
            Err(_) => FREE_URL.to_string(),
        }
    }

    fn build_body(&self, job: &Job, _prompt: &Prompt, cfg: &BackendConfig) -> RequestBody {
        if !self.uses_paid(cfg) {
            return RequestBody::None;
        }
        let mut body = json!({
            "q": job.text,
            "target": normalize_language_code(effective_target(job, cfg)),
            "format": "text",
        });
        let source = source_code(&job.source_lang);
        if source != "auto" {
            body["source"] = json!(source);
        }
        RequestBody::Json(body)
    }

    fn parse_response(&self, _job: &Job, resp: &HttpResponse) -> ParseResult {
        let value: serde_json::Value = serde_json::from_str(&resp.text)
            .map_err(|e| TranslateError::parse(format!("Google response parse error: {e}")))?;

        // Paid v2 shape.
        if let Some(text) = value
            .pointer("/data/translations/0/translatedText")
            .and_then(|v| v.as_str())
        {
            return Ok(text.to_string());
        }

        // Free shape: [[["segment", "source", ...], ...], ...]
        if let Some(segments) = value.get(0).and_then(|v| v.as_array()) {
            let text: String = segments
                .iter()
                .filter_map(|seg| seg.get(0).and_then(|s| s.as_str()))
                .collect();
            if !text.is_empty() {
                return Ok(text);
            }
        }

        if self.in_paid_mode() {
            self.fall_back_to_free();
            return Err(TranslateError::parse_retryable(
                "Google paid API returned an unreadable response",
                None,
            ));
        }
        Err(TranslateError::parse("Google response missing translation"))
    }

    fn should_retry(&self, resp: &HttpResponse) -> bool {
        if self.in_paid_mode() {
            self.fall_back_to_free();
            return true;
        }
        default_should_retry(resp)
    }

    fn configure_session(&self, _job: &Job, session: &mut SessionConfig) {
        session.connect_timeout = Duration::from_millis(5000);
        session.timeout = if self.in_paid_mode() {
            Duration::from_millis(45000)
        } else {
            Duration::from_millis(30000)
        };
    }
}

pub fn normalize_language_code(lang: &str) -> String {
    match lang.to_ascii_lowercase().as_str() {
        "en-us" => "en".to_string(),
        "ja-jp" => "ja".to_string(),
        "ko-kr" => "ko".to_string(),
        lower => lower.to_string(),
    }
}

fn source_code(lang: &str) -> String {
    if lang.is_empty() {
        "auto".to_string()
    } else {
        normalize_language_code(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(text: &str) -> Job {
        Job {
            id: 4,
            text: text.into(),
            source_lang: "ja".into(),
            target_lang: "en-us".into(),
        }
    }

    fn keyed() -> BackendConfig {
        BackendConfig {
            backend: crate::translate::Backend::Google,
            api_key: "gk".into(),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn free_tier_without_key() {
        let cfg = BackendConfig::default();
        let p = GoogleProvider::new(false);
        assert!(!p.uses_paid(&cfg));
        assert_eq!(p.limits(&cfg).max_input_bytes, ProviderLimits::GOOGLE_FREE);
        assert_eq!(p.build_body(&job("a"), &Prompt::default(), &cfg), RequestBody::None);
        let url = p.build_url(&job("こんにちは 世界"), &cfg);
        assert!(url.starts_with(FREE_URL));
        assert!(url.contains("sl=ja"));
        assert!(url.contains("tl=en"));
        assert!(!url.contains(' '));
        assert!(!p.should_retry(&HttpResponse::new(403, "forbidden")));
    }

    #[test]
    fn paid_failure_switches_to_free() {
        let cfg = keyed();
        let p = GoogleProvider::new(true);
        assert!(p.uses_paid(&cfg));
        assert_eq!(p.build_url(&job("x"), &cfg), PAID_URL);
        assert_eq!(p.limits(&cfg).max_input_bytes, ProviderLimits::GOOGLE_PAID);

        assert!(p.should_retry(&HttpResponse::new(403, "forbidden")));
        assert!(!p.uses_paid(&cfg));
        assert!(p.build_url(&job("x"), &cfg).starts_with(FREE_URL));
        // Free-tier client errors are terminal again.
        assert!(!p.should_retry(&HttpResponse::new(403, "forbidden")));
    }

    #[test]
    fn parses_both_response_shapes() {
        let p = GoogleProvider::new(false);
        let paid = HttpResponse::new(
            200,
            r#"{"data":{"translations":[{"translatedText":"Hello"}]}}"#,
        );
        assert_eq!(p.parse_response(&job("x"), &paid).unwrap(), "Hello");

        let free = HttpResponse::new(200, r#"[[["Hello. ","こんにちは。",null],["World","世界",null]],null,"ja"]"#);
        assert_eq!(p.parse_response(&job("x"), &free).unwrap(), "Hello. World");
    }

    #[test]
    fn language_codes_are_normalized() {
        assert_eq!(normalize_language_code("en-us"), "en");
        assert_eq!(normalize_language_code("ja-JP"), "ja");
        assert_eq!(normalize_language_code("zh-cn"), "zh-cn");
    }
}
