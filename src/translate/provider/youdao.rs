//! Youdao: v3-signed form requests, in plain text mode or the streaming
//! large-model mode (`youdao_large`), whose SSE body is scanned after the fact.

use std::sync::Once;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::{ParseResult, ProviderHooks};
use crate::translate::error::TranslateError;
use crate::translate::http::{Header, HttpResponse, RequestBody, SessionConfig};
use crate::translate::prompt::{effective_target, Prompt};
use crate::translate::{BackendConfig, Job, ProviderLimits};

pub const TEXT_URL: &str = "https://openapi.youdao.com/api";
pub const LARGE_MODEL_URL: &str = "https://openapi.youdao.com/llm_trans";
pub const TEXT_MODEL: &str = "youdao_text";
pub const LARGE_MODEL: &str = "youdao_large";

/// Youdao's "access frequency limited" code.
const ERROR_RATE_LIMITED: &str = "411";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Text,
    LargeModel,
}

impl Mode {
    pub fn from_config(cfg: &BackendConfig) -> Self {
        if cfg.model.trim() == LARGE_MODEL {
            Mode::LargeModel
        } else {
            Mode::Text
        }
    }
}

pub struct YoudaoProvider {
    mode: Mode,
    traditional_warning: Once,
}

impl YoudaoProvider {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            traditional_warning: Once::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl ProviderHooks for YoudaoProvider {
    fn name(&self) -> &'static str {
        "Youdao"
    }

    fn has_valid_runtime_config(&self, cfg: &BackendConfig) -> bool {
        !cfg.api_key.trim().is_empty() && !cfg.api_secret.trim().is_empty()
    }

    fn limits(&self, _cfg: &BackendConfig) -> ProviderLimits {
        ProviderLimits {
            max_input_bytes: ProviderLimits::YOUDAO,
        }
    }

    fn check_job(&self, job: &Job, cfg: &BackendConfig) -> Result<(), TranslateError> {
        let mode = self.mode;
        let target = effective_target(job, cfg);
        if map_target(target, mode).is_none() {
            return Err(TranslateError::ConfigInvalid(format!(
                "Youdao large model does not support target language '{target}'"
            )));
        }
        if mode == Mode::LargeModel && is_traditional(target) {
            self.traditional_warning.call_once(|| {
                warn!("Youdao large model mode does not support Traditional Chinese directly; using Simplified Chinese target");
            });
        }
        Ok(())
    }

    fn build_headers(&self, _job: &Job, _cfg: &BackendConfig) -> Vec<Header> {
        match self.mode {
            Mode::LargeModel => vec![Header::new("Accept", "text/event-stream")],
            Mode::Text => Vec::new(),
        }
    }

    fn build_url(&self, _job: &Job, cfg: &BackendConfig) -> String {
        let base = cfg.base_url.trim();
        if !base.is_empty() {
            return base.to_string();
        }
        match self.mode {
            Mode::LargeModel => LARGE_MODEL_URL.to_string(),
            Mode::Text => TEXT_URL.to_string(),
        }
    }

    fn build_body(&self, job: &Job, _prompt: &Prompt, cfg: &BackendConfig) -> RequestBody {
        let mode = self.mode;
        let app_key = cfg.api_key.trim();
        let salt = uuid::Uuid::new_v4().to_string();
        let curtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .to_string();
        let signature = sign(
            app_key,
            &sign_input(&job.text),
            &salt,
            &curtime,
            cfg.api_secret.trim(),
        );

        let text_field = match mode {
            Mode::Text => "q",
            Mode::LargeModel => "i",
        };
        let target = map_target(effective_target(job, cfg), mode).unwrap_or_else(|| "en".to_string());
        let mut fields = vec![
            (text_field.to_string(), job.text.clone()),
            ("from".to_string(), map_source(&job.source_lang, mode)),
            ("to".to_string(), target),
            ("appKey".to_string(), app_key.to_string()),
            ("salt".to_string(), salt),
            ("signType".to_string(), "v3".to_string()),
            ("curtime".to_string(), curtime),
            ("sign".to_string(), signature),
        ];
        if mode == Mode::LargeModel {
            fields.push(("handleOption".to_string(), "2".to_string()));
            fields.push(("streamType".to_string(), "full".to_string()));
        }
        RequestBody::Form(fields)
    }

    fn parse_response(&self, _job: &Job, resp: &HttpResponse) -> ParseResult {
        let trimmed = resp.text.trim_start();
        if trimmed.starts_with("data:") || trimmed.starts_with("event:") {
            parse_stream(&resp.text)
        } else {
            parse_text(&resp.text)
        }
    }

    fn configure_session(&self, _job: &Job, session: &mut SessionConfig) {
        session.connect_timeout = Duration::from_millis(5000);
        session.timeout = match self.mode {
            Mode::Text => Duration::from_millis(15000),
            Mode::LargeModel => Duration::from_millis(20000),
        };
    }
}

/// v3 signature: `sha256(appKey + input + salt + curtime + appSecret)` as lowercase hex.
pub fn sign(app_key: &str, input: &str, salt: &str, curtime: &str, app_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(app_key.as_bytes());
    hasher.update(input.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(curtime.as_bytes());
    hasher.update(app_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Text as signed: verbatim up to 20 chars, else first 10 + char count + last 10.
pub fn sign_input(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 20 {
        return text.to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 10..].iter().collect();
    format!("{head}{}{tail}", chars.len())
}

fn is_traditional(lang: &str) -> bool {
    matches!(lang.to_ascii_lowercase().as_str(), "zh-tw" | "zh-hk" | "zh-cht")
}

fn map_source(lang: &str, mode: Mode) -> String {
    let lower = lang.to_ascii_lowercase();
    match lower.as_str() {
        "" | "auto" => "auto".to_string(),
        "en" | "en-us" => "en".to_string(),
        "zh-cn" | "zh-hans" | "zh-sg" => "zh-CHS".to_string(),
        "zh-tw" | "zh-hk" | "zh-cht" => match mode {
            Mode::Text => "zh-CHT".to_string(),
            Mode::LargeModel => "zh-CHS".to_string(),
        },
        _ => lower,
    }
}

/// `None` when large-model mode cannot translate into `lang`.
fn map_target(lang: &str, mode: Mode) -> Option<String> {
    let lower = lang.to_ascii_lowercase();
    let mapped = match lower.as_str() {
        "" | "en" | "en-us" => "en",
        "zh-cn" | "zh-hans" | "zh-sg" => "zh-CHS",
        "zh-tw" | "zh-hk" | "zh-cht" => match mode {
            Mode::Text => "zh-CHT",
            Mode::LargeModel => "zh-CHS",
        },
        _ => {
            return match mode {
                Mode::Text => Some(lang.to_ascii_lowercase()),
                Mode::LargeModel => None,
            }
        }
    };
    Some(mapped.to_string())
}

fn parse_text(body: &str) -> ParseResult {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TranslateError::parse(format!("Youdao response parse error: {e}")))?;

    if let Some(code) = value.get("errorCode").and_then(Value::as_str) {
        if code == ERROR_RATE_LIMITED {
            return Err(TranslateError::parse_retryable(
                "Youdao error 411: access frequency limited",
                Some(Duration::from_secs(1)),
            ));
        }
        if code != "0" {
            return Err(TranslateError::parse(format!("Youdao error code {code}")));
        }
    }

    match value.pointer("/translation/0").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(TranslateError::parse("Youdao response missing translation")),
    }
}

/// Scan `data:` lines: the latest full translation wins, else the joined fragments.
fn parse_stream(body: &str) -> ParseResult {
    let mut last_full = String::new();
    let mut accumulated = String::new();
    let mut error: Option<(String, String)> = None;

    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        let Ok(event) = serde_json::from_str::<Value>(data) else {
            continue;
        };

        let full = ["transFull", "translation", "targetText"]
            .iter()
            .find_map(|key| find_string(&event, key).filter(|s| !s.is_empty()));
        let fragment = ["transIncre", "delta"]
            .iter()
            .find_map(|key| find_string(&event, key).filter(|s| !s.is_empty()));

        if full.is_none() && fragment.is_none() {
            if let (Some(code), Some(msg)) = (find_scalar(&event, "code"), find_string(&event, "msg")) {
                error = Some((code, msg.to_string()));
            }
            continue;
        }
        if let Some(full) = full {
            last_full = full.to_string();
        }
        if let Some(fragment) = fragment {
            accumulated.push_str(fragment);
        }
    }

    if !last_full.is_empty() {
        return Ok(last_full);
    }
    if !accumulated.is_empty() {
        return Ok(accumulated);
    }
    match error {
        Some((code, msg)) => Err(TranslateError::parse(format!("Youdao large model error {code}: {msg}"))),
        None => Err(TranslateError::parse("Youdao large model returned an empty result")),
    }
}

/// First string value under `key`, searched depth-first.
fn find_string<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => map
            .get(key)
            .and_then(Value::as_str)
            .or_else(|| map.values().find_map(|v| find_string(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_string(v, key)),
        _ => None,
    }
}

fn find_scalar(value: &Value, key: &str) -> Option<String> {
    let Value::Object(map) = value else {
        return None;
    };
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
