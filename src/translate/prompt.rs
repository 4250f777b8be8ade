//! Prompt construction: template substitution, language names, and
//! detection of the source language when the caller passes `auto`.

use serde::Serialize;

use super::{BackendConfig, Job};

/// Built-in system prompt, used when the config carries no custom prompt.
pub const DEFAULT_TEMPLATE: &str = "You are a professional translator familiar with the Dragon Quest series.
Translate the following Dragon Quest X dialogue into {target_lang}.
Preserve official DQX terminology and tone; when no official wording exists, lean on standard series phrasing.
Tags such as <dqxlq/> and <dqxrq/> are markers: keep them exactly as they appear.
Adhere to the glossary below when available:
{glossary}

Guidelines:
- Stay faithful to the source; add nothing and omit nothing.
- Retain the speaker's voice, era flavor, and the series' stylistic quirks.
- Output translation only, with no explanations.
Source text:
{source_text}";

/// Fallback when no target language is configured anywhere.
pub const FALLBACK_TARGET: &str = "zh-cn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    /// Content of the final user message (the text to translate).
    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Effective target language for a job: job, then config, then fallback.
pub fn effective_target<'a>(job: &'a Job, cfg: &'a BackendConfig) -> &'a str {
    if !job.target_lang.is_empty() {
        &job.target_lang
    } else if !cfg.target_lang.is_empty() {
        &cfg.target_lang
    } else {
        FALLBACK_TARGET
    }
}

/// Build the prompt for `job`. `glossary` is the optional terminology snippet.
pub fn build_prompt(job: &Job, cfg: &BackendConfig, glossary: Option<&str>) -> Prompt {
    let target = effective_target(job, cfg).to_string();
    let source_name = if job.source_lang.is_empty() || job.source_lang.eq_ignore_ascii_case("auto")
    {
        detect_language_name(&job.text).unwrap_or_else(|| "the source language".to_string())
    } else {
        language_display_name(&job.source_lang)
    };

    let glossary_block = match glossary {
        Some(g) if !g.trim().is_empty() => g.to_string(),
        _ => "(empty)".to_string(),
    };

    let replacements = [
        ("{target_lang}", language_display_name(&target)),
        ("{source_lang}", source_name),
        ("{glossary}", glossary_block),
        ("{source_text}", job.text.clone()),
    ];

    let template = if cfg.prompt.trim().is_empty() {
        DEFAULT_TEMPLATE
    } else {
        cfg.prompt.as_str()
    };
    let system = apply_replacements(template, &replacements);

    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: Role::System,
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: Role::User,
        content: job.text.clone(),
    });
    Prompt { messages }
}

/// Replace every occurrence of each placeholder. Substituted values are not
/// rescanned, so text containing `{glossary}` stays literal.
fn apply_replacements(template: &str, replacements: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    'scan: while !rest.is_empty() {
        for (placeholder, value) in replacements {
            if !placeholder.is_empty() && rest.starts_with(placeholder) {
                out.push_str(value);
                rest = &rest[placeholder.len()..];
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Human-readable name for a language code, as placed into prompts.
pub fn language_display_name(lang: &str) -> String {
    match lang.to_ascii_lowercase().as_str() {
        "en" | "en-us" | "en_us" => "English".to_string(),
        "zh-cn" | "zh-hans" => "Simplified Chinese".to_string(),
        "zh-tw" | "zh-hant" => "Traditional Chinese".to_string(),
        "ja" | "ja-jp" => "Japanese".to_string(),
        "" => "target language".to_string(),
        _ => lang.to_string(),
    }
}

/// English name of the detected language, if detection is reliable.
pub fn detect_language_name(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    if !info.is_reliable() {
        return None;
    }
    Some(info.lang().eng_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(text: &str, src: &str, dst: &str) -> Job {
        Job {
            id: 1,
            text: text.into(),
            source_lang: src.into(),
            target_lang: dst.into(),
        }
    }

    #[test]
    fn default_template_substitutes_placeholders() {
        let cfg = BackendConfig::default();
        let p = build_prompt(&job("こんにちは", "ja", "en-us"), &cfg, None);
        assert_eq!(p.messages.len(), 2);
        let system = &p.messages[0].content;
        assert!(system.contains("into English."));
        assert!(system.contains("(empty)"));
        assert!(system.ends_with("こんにちは"));
        assert_eq!(p.user_text(), "こんにちは");
    }

    #[test]
    fn custom_prompt_replaces_template() {
        let cfg = BackendConfig {
            prompt: "From {source_lang} to {target_lang}. Terms: {glossary}".into(),
            ..BackendConfig::default()
        };
        let p = build_prompt(&job("text", "ja", "zh-tw"), &cfg, Some("スライム => 史莱姆"));
        assert_eq!(
            p.messages[0].content,
            "From Japanese to Traditional Chinese. Terms: スライム => 史莱姆"
        );
    }

    #[test]
    fn target_falls_back_to_config_then_default() {
        let mut cfg = BackendConfig {
            prompt: "{target_lang}".into(),
            ..BackendConfig::default()
        };
        let p = build_prompt(&job("x", "en", ""), &cfg, None);
        assert_eq!(p.messages[0].content, "Simplified Chinese");
        cfg.target_lang = "en-us".into();
        let p = build_prompt(&job("x", "en", ""), &cfg, None);
        assert_eq!(p.messages[0].content, "English");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let cfg = BackendConfig {
            prompt: "{source_text}|{glossary}".into(),
            ..BackendConfig::default()
        };
        let p = build_prompt(&job("{glossary}", "en", "en"), &cfg, None);
        assert_eq!(p.messages[0].content, "{glossary}|(empty)");
    }

    #[test]
    fn messages_are_system_then_user() {
        let cfg = BackendConfig::default();
        let p = build_prompt(&job("hi", "en", "zh-cn"), &cfg, None);
        let roles: Vec<_> = p
            .messages
            .iter()
            .map(|m| serde_json::to_value(m.role).unwrap())
            .collect();
        assert_eq!(roles, vec![serde_json::json!("system"), serde_json::json!("user")]);
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(language_display_name("ko"), "ko");
        assert_eq!(language_display_name("EN-US"), "English");
        assert_eq!(language_display_name(""), "target language");
    }
}
