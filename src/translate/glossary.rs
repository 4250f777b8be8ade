//! Glossary loading and prompt snippets.
//! Each glossary language has a JSON object of `source term -> translation`;
//! jobs get the entries whose source term appears in their text.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Entries per snippet, so long dialogue does not bloat the prompt.
pub const MAX_SNIPPET_ENTRIES: usize = 10;

#[derive(Debug, Error)]
pub enum GlossaryError {
    #[error("glossary IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glossary parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("glossary must be a JSON object of strings")]
    Shape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub source: String,
    pub target: String,
}

/// Glossaries keyed by glossary language (`zh-Hans`, `en-US`).
#[derive(Debug, Default)]
pub struct Glossary {
    languages: HashMap<String, Vec<GlossaryEntry>>,
}

impl Glossary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `zh-Hans.json` and `en-US.json` from `dir`. Missing files are skipped.
    pub fn load_dir(dir: &Path) -> Self {
        let mut glossary = Self::empty();
        for (file, lang) in [("zh-Hans.json", "zh-Hans"), ("en-US.json", "en-US")] {
            let path = dir.join(file);
            if !path.exists() {
                debug!(path = %path.display(), "glossary file not found");
                continue;
            }
            match glossary.load_file(&path, lang) {
                Ok(count) => info!(lang, count, "glossary loaded"),
                Err(e) => warn!(path = %path.display(), error = %e, "glossary load failed"),
            }
        }
        glossary
    }

    /// Load one JSON file for `lang`, replacing any previous entries. Returns the entry count.
    pub fn load_file(&mut self, path: &Path, lang: &str) -> Result<usize, GlossaryError> {
        let content = std::fs::read_to_string(path)?;
        self.load_str(&content, lang)
    }

    pub fn load_str(&mut self, content: &str, lang: &str) -> Result<usize, GlossaryError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let object = value.as_object().ok_or(GlossaryError::Shape)?;

        let mut entries = Vec::with_capacity(object.len());
        for (source, target) in object {
            match target.as_str() {
                Some(t) if !source.is_empty() => entries.push(GlossaryEntry {
                    source: source.clone(),
                    target: t.to_string(),
                }),
                _ => warn!(key = %source, "skipping non-string glossary entry"),
            }
        }
        // Longer terms first so compound names win over their parts.
        entries.sort_by(|a, b| {
            b.source
                .chars()
                .count()
                .cmp(&a.source.chars().count())
                .then_with(|| a.source.cmp(&b.source))
        });
        let count = entries.len();
        self.languages.insert(lang.to_string(), entries);
        Ok(count)
    }

    pub fn entry_count(&self, target_lang: &str) -> usize {
        self.languages
            .get(glossary_language(target_lang))
            .map_or(0, Vec::len)
    }

    /// Exact lookup of a whole term.
    pub fn lookup(&self, term: &str, target_lang: &str) -> Option<&str> {
        self.languages
            .get(glossary_language(target_lang))?
            .iter()
            .find(|e| e.source == term)
            .map(|e| e.target.as_str())
    }

    /// Entries whose source term appears in `text`, at most `limit`.
    pub fn match_entries(&self, text: &str, target_lang: &str, limit: usize) -> Vec<&GlossaryEntry> {
        let Some(entries) = self.languages.get(glossary_language(target_lang)) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| text.contains(e.source.as_str()))
            .take(limit)
            .collect()
    }

    /// Prompt snippet, one `source => target` per line. Empty when nothing matches.
    pub fn build_snippet(&self, text: &str, target_lang: &str, limit: usize) -> String {
        self.match_entries(text, target_lang, limit)
            .iter()
            .map(|e| format!("{} => {}", e.source, e.target))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// zh-cn and zh-tw share the Simplified glossary; English targets use en-US.
fn glossary_language(target_lang: &str) -> &'static str {
    let lower = target_lang.to_ascii_lowercase();
    if lower.starts_with("zh") {
        "zh-Hans"
    } else {
        "en-US"
    }
}
