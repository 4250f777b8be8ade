//! Translation pipeline: capability trait, data model, backends, engine and session.

pub mod cache;
pub mod engine;
pub mod error;
pub mod glossary;
pub mod http;
pub mod masking;
pub mod prompt;
pub mod provider;
pub mod session;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use engine::LlmTranslator;
pub use error::TranslateError;

/// The six interchangeable cloud backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Google,
    #[serde(alias = "zhipu")]
    ZhipuGlm,
    #[serde(alias = "qwen")]
    QwenMt,
    Niutrans,
    Youdao,
}

impl Backend {
    /// Stable numeric id, used in session cache keys.
    pub fn id(self) -> u8 {
        match self {
            Backend::OpenAi => 0,
            Backend::Google => 1,
            Backend::ZhipuGlm => 2,
            Backend::QwenMt => 3,
            Backend::Niutrans => 4,
            Backend::Youdao => 5,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::OpenAi => "OpenAI",
            Backend::Google => "Google",
            Backend::ZhipuGlm => "ZhipuGLM",
            Backend::QwenMt => "Qwen-MT",
            Backend::Niutrans => "Niutrans",
            Backend::Youdao => "Youdao",
        };
        f.write_str(name)
    }
}

/// Immutable per-init backend configuration, produced by the config mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub backend: Backend,
    pub target_lang: String,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub api_secret: String,
    /// Custom system prompt template; empty selects the built-in one.
    pub prompt: String,
    pub max_concurrent_requests: usize,
    pub request_interval_seconds: f64,
    pub max_retries: u32,
    pub glossary_enabled: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: Backend::OpenAi,
            target_lang: String::new(),
            base_url: String::new(),
            model: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            prompt: String::new(),
            max_concurrent_requests: 1,
            request_interval_seconds: 0.0,
            max_retries: 0,
            glossary_enabled: false,
        }
    }
}

/// Per-provider input ceiling, checked before a request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderLimits {
    pub max_input_bytes: usize,
}

impl ProviderLimits {
    pub const GOOGLE_FREE: usize = 500;
    pub const GOOGLE_PAID: usize = 10_000;
    pub const OPENAI: usize = 15_000;
    pub const NIUTRANS: usize = 5_000;
    pub const YOUDAO: usize = 5_000;
    pub const ZHIPU_GLM: usize = 15_000;
    pub const QWEN_MT: usize = 15_000;
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: Self::OPENAI,
        }
    }
}

/// One queued translation request. `id == 0` never names a real job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

/// Outcome of a job, owned by the caller once drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completed {
    pub id: u64,
    pub text: String,
    pub failed: bool,
    pub original_text: String,
    pub error_message: String,
}

/// Capability contract shared by every backend and consumed by the UI/session.
pub trait Translator: Send {
    /// Validate `cfg` and start a fresh worker. Any previous worker is joined first.
    fn init(&mut self, cfg: BackendConfig) -> Result<(), TranslateError>;

    /// Worker running and the provider's runtime config is usable.
    fn is_ready(&self) -> bool;

    /// Stop and join the worker, discarding queued and finished work. Idempotent.
    fn shutdown(&mut self);

    /// Queue `text` for translation. Empty or whitespace-only text is rejected
    /// without consuming an id.
    fn submit(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<u64>;

    /// Take every buffered completion. Never blocks on the worker.
    fn drain(&self) -> Vec<Completed>;

    fn last_error(&self) -> String;

    /// Run one short request synchronously and describe the outcome.
    fn test_connection(&self) -> String;
}
