//! Per-window translation session: quote masking, result cache and job bookkeeping
//! in front of a `Translator`.

use std::collections::HashMap;

use tracing::debug;

use super::cache::{CacheKey, SessionCache, DEFAULT_CAPACITY};
use super::masking;
use super::{Backend, Translator};

/// Result of `TranslateSession::submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Served from cache; no job was created.
    Cached(String),
    Queued(u64),
    /// Translator missing or not ready, or the text was rejected.
    DroppedNotReady,
}

/// A drained result with quotes restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedEvent {
    pub job_id: u64,
    /// Translation on success, the original text on failure.
    pub text: String,
    pub failed: bool,
    pub error_message: String,
}

pub struct TranslateSession {
    cache: SessionCache,
    cache_enabled: bool,
    pending: HashMap<u64, CacheKey>,
}

impl TranslateSession {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: SessionCache::new(capacity),
            cache_enabled: true,
            pending: HashMap::new(),
        }
    }

    pub fn enable_cache(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.cache.set_capacity(capacity);
    }

    /// Drop cached translations and forget pending jobs.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.pending.clear();
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Mask `text`, answer from cache when possible, otherwise queue a job.
    pub fn submit<T: Translator + ?Sized>(
        &mut self,
        translator: Option<&T>,
        backend: Backend,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> SubmitOutcome {
        let masked = masking::mask(text);
        let key = SessionCache::compute_key(backend.id(), target_lang, &masked);

        if self.cache_enabled {
            if let Some(hit) = self.cache.get(&key) {
                debug!(%backend, target = target_lang, "session cache hit");
                return SubmitOutcome::Cached(masking::restore(hit));
            }
        }

        self.cache.make_room();

        let Some(translator) = translator.filter(|t| t.is_ready()) else {
            return SubmitOutcome::DroppedNotReady;
        };
        match translator.submit(&masked, source_lang, target_lang) {
            Some(job_id) if job_id != 0 => {
                self.pending.insert(job_id, key);
                SubmitOutcome::Queued(job_id)
            }
            _ => SubmitOutcome::DroppedNotReady,
        }
    }

    /// Drain `translator` and turn its results into events. Successful results for
    /// jobs this session queued are cached.
    pub fn drain<T: Translator + ?Sized>(&mut self, translator: &T) -> Vec<CompletedEvent> {
        translator
            .drain()
            .into_iter()
            .map(|done| {
                let key = self.pending.remove(&done.id);
                if done.failed {
                    return CompletedEvent {
                        job_id: done.id,
                        text: masking::unmask(&done.original_text),
                        failed: true,
                        error_message: done.error_message,
                    };
                }
                if let Some(key) = key {
                    self.cache.insert(key, done.text.clone());
                }
                CompletedEvent {
                    job_id: done.id,
                    text: masking::restore(&done.text),
                    failed: false,
                    error_message: String::new(),
                }
            })
            .collect()
    }
}

impl Default for TranslateSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty() {
        let session = TranslateSession::default();
        assert_eq!(session.cache_len(), 0);
        assert_eq!(session.pending_jobs(), 0);
    }

    #[test]
    fn missing_translator_drops() {
        let mut session = TranslateSession::new();
        let outcome = session.submit(None::<&dyn Translator>, Backend::OpenAi, "「hi」", "auto", "en-us");
        assert_eq!(outcome, SubmitOutcome::DroppedNotReady);
        assert_eq!(session.pending_jobs(), 0);
        assert_eq!(session.cache_len(), 0);
    }
}
