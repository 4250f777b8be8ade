//! Persisted settings (TOML) and the mapper that turns them into a `BackendConfig`.
//! Every field has a serde default so partial or older files still load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::translate::cache::DEFAULT_CAPACITY;
use crate::translate::glossary::Glossary;
use crate::translate::provider::{niutrans, qwen, youdao, zhipu};
use crate::translate::{Backend, BackendConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetLang {
    #[default]
    #[serde(rename = "en-us")]
    EnUs,
    #[serde(rename = "zh-cn")]
    ZhCn,
    #[serde(rename = "zh-tw")]
    ZhTw,
}

impl TargetLang {
    /// Language code passed to backends and used in cache keys.
    pub fn code(self) -> &'static str {
        match self {
            TargetLang::EnUs => "en-us",
            TargetLang::ZhCn => "zh-cn",
            TargetLang::ZhTw => "zh-tw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub translation: TranslationSettings,
    pub session: SessionSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub backend: Backend,
    pub target_lang: TargetLang,
    /// Replaces the built-in system prompt when non-empty.
    pub custom_prompt: String,
    pub max_concurrent_requests: i64,
    pub request_interval_seconds: f64,
    pub max_retries: i64,
    pub glossary_enabled: bool,
    /// Directory holding `zh-Hans.json` / `en-US.json`.
    pub glossary_dir: Option<PathBuf>,
    pub openai: OpenAiSettings,
    pub google: GoogleSettings,
    pub zhipu: ZhipuSettings,
    pub qwen: QwenSettings,
    pub niutrans: NiutransSettings,
    pub youdao: YoudaoSettings,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            target_lang: TargetLang::default(),
            custom_prompt: String::new(),
            max_concurrent_requests: 3,
            request_interval_seconds: 0.5,
            max_retries: 3,
            glossary_enabled: false,
            glossary_dir: None,
            openai: OpenAiSettings::default(),
            google: GoogleSettings::default(),
            zhipu: ZhipuSettings::default(),
            qwen: QwenSettings::default(),
            niutrans: NiutransSettings::default(),
            youdao: YoudaoSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GoogleSettings {
    /// Empty selects the free endpoint.
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ZhipuSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QwenSettings {
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NiutransSettings {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct YoudaoSettings {
    pub mode: youdao::Mode,
    pub app_key: String,
    pub app_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cache_enabled: bool,
    pub cache_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Output shape of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// `<config dir>/clarity/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("clarity").join("config.toml"))
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Missing file or bad TOML falls back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Write as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)
    }
}

impl TranslationSettings {
    /// Glossary from `glossary_dir`; empty when disabled or unset.
    pub fn load_glossary(&self) -> Glossary {
        match &self.glossary_dir {
            Some(dir) if self.glossary_enabled => Glossary::load_dir(dir),
            _ => Glossary::empty(),
        }
    }
}

/// Zhipu base URL: default when empty, otherwise trailing slashes stripped and the
/// chat path appended unless already present.
fn zhipu_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        zhipu::DEFAULT_URL.to_string()
    } else if base.contains("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/api/paas/v4/chat/completions")
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl BackendConfig {
    /// Map persisted settings to the engine's config, sanitizing numeric fields and
    /// filling per-backend URL and model defaults.
    pub fn from_settings(s: &TranslationSettings) -> Self {
        let interval = if s.request_interval_seconds.is_finite() && s.request_interval_seconds > 0.0 {
            s.request_interval_seconds
        } else {
            0.0
        };
        let mut out = BackendConfig {
            backend: s.backend,
            target_lang: s.target_lang.code().to_string(),
            prompt: s.custom_prompt.clone(),
            max_concurrent_requests: usize::try_from(s.max_concurrent_requests)
                .unwrap_or(0)
                .max(1),
            request_interval_seconds: interval,
            max_retries: u32::try_from(s.max_retries.max(0)).unwrap_or(u32::MAX),
            glossary_enabled: s.glossary_enabled,
            ..BackendConfig::default()
        };

        match s.backend {
            Backend::OpenAi => {
                out.base_url = s.openai.base_url.clone();
                out.model = s.openai.model.clone();
                out.api_key = s.openai.api_key.clone();
            }
            Backend::Google => {
                out.api_key = s.google.api_key.clone();
            }
            Backend::ZhipuGlm => {
                out.base_url = zhipu_url(&s.zhipu.base_url);
                out.model = or_default(&s.zhipu.model, zhipu::DEFAULT_MODEL);
                out.api_key = s.zhipu.api_key.clone();
            }
            Backend::QwenMt => {
                out.base_url = qwen::DEFAULT_URL.to_string();
                out.model = or_default(&s.qwen.model, qwen::DEFAULT_MODEL);
                out.api_key = s.qwen.api_key.clone();
            }
            Backend::Niutrans => {
                out.base_url = niutrans::DEFAULT_URL.to_string();
                out.api_key = s.niutrans.api_key.clone();
            }
            Backend::Youdao => {
                let (url, model) = match s.youdao.mode {
                    youdao::Mode::LargeModel => (youdao::LARGE_MODEL_URL, youdao::LARGE_MODEL),
                    youdao::Mode::Text => (youdao::TEXT_URL, youdao::TEXT_MODEL),
                };
                out.base_url = url.to_string();
                out.model = model.to_string();
                out.api_key = s.youdao.app_key.clone();
                out.api_secret = s.youdao.app_secret.clone();
            }
        }
        out
    }
}
