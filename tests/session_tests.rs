//! Session behaviour against a stub translator.

use parking_lot::Mutex;

use clarity_translate::translate::session::{CompletedEvent, SubmitOutcome, TranslateSession};
use clarity_translate::{Backend, BackendConfig, Completed, TranslateError, Translator};

/// Hands out sequential ids and returns whatever the test pushes into `finished`.
struct StubTranslator {
    ready: bool,
    next_id: Mutex<u64>,
    submitted: Mutex<Vec<String>>,
    finished: Mutex<Vec<Completed>>,
}

impl StubTranslator {
    fn ready() -> Self {
        Self {
            ready: true,
            next_id: Mutex::new(1),
            submitted: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::ready()
        }
    }

    fn finish(&self, id: u64, text: &str) {
        self.finished.lock().push(Completed {
            id,
            text: text.to_string(),
            ..Completed::default()
        });
    }

    fn fail(&self, id: u64, original: &str, error: &str) {
        self.finished.lock().push(Completed {
            id,
            failed: true,
            original_text: original.to_string(),
            error_message: error.to_string(),
            ..Completed::default()
        });
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }
}

impl Translator for StubTranslator {
    fn init(&mut self, _cfg: BackendConfig) -> Result<(), TranslateError> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn shutdown(&mut self) {}

    fn submit(&self, text: &str, _source_lang: &str, _target_lang: &str) -> Option<u64> {
        if text.trim().is_empty() {
            return None;
        }
        self.submitted.lock().push(text.to_string());
        let mut next = self.next_id.lock();
        let id = *next;
        *next += 1;
        Some(id)
    }

    fn drain(&self) -> Vec<Completed> {
        std::mem::take(&mut *self.finished.lock())
    }

    fn last_error(&self) -> String {
        String::new()
    }

    fn test_connection(&self) -> String {
        "Success: stub".to_string()
    }
}

fn queued(outcome: SubmitOutcome) -> u64 {
    match outcome {
        SubmitOutcome::Queued(id) => id,
        other => panic!("expected a queued job, got {other:?}"),
    }
}

#[test]
fn quotes_are_masked_on_the_wire_and_restored_on_completion() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::new();

    let id = queued(session.submit(Some(&stub), Backend::OpenAi, "「こんにちは」", "ja", "en-us"));
    assert_eq!(stub.submitted(), vec!["<dqxlq/>こんにちは<dqxrq/>".to_string()]);
    assert_eq!(session.pending_jobs(), 1);

    stub.finish(id, "<dqxlq/>Hello<dqxrq/>");
    let events = session.drain(&stub);
    assert_eq!(
        events,
        vec![CompletedEvent {
            job_id: id,
            text: "「Hello」".to_string(),
            failed: false,
            error_message: String::new(),
        }]
    );
    assert_eq!(session.pending_jobs(), 0);
}

#[test]
fn repeated_text_is_served_from_cache() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::new();

    let id = queued(session.submit(Some(&stub), Backend::Google, "宿屋", "auto", "en-us"));
    stub.finish(id, "Inn");
    session.drain(&stub);

    for _ in 0..2 {
        assert_eq!(
            session.submit(Some(&stub), Backend::Google, "宿屋", "auto", "en-us"),
            SubmitOutcome::Cached("Inn".to_string())
        );
    }
    assert_eq!(stub.submitted().len(), 1);

    // Different backend or target language is a different key.
    queued(session.submit(Some(&stub), Backend::Niutrans, "宿屋", "auto", "en-us"));
    queued(session.submit(Some(&stub), Backend::Google, "宿屋", "auto", "zh-cn"));
    assert_eq!(stub.submitted().len(), 3);
}

#[test]
fn cache_hit_restores_quotes_and_alignment() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::new();

    let id = queued(session.submit(Some(&stub), Backend::OpenAi, "「一行目\n二行目」", "ja", "en-us"));
    stub.finish(id, "<dqxlq/>Line one\nLine two<dqxrq/>");
    let events = session.drain(&stub);
    assert_eq!(events[0].text, "「Line one\n\u{3000}Line two」");

    assert_eq!(
        session.submit(Some(&stub), Backend::OpenAi, "「一行目\n二行目」", "ja", "en-us"),
        SubmitOutcome::Cached("「Line one\n\u{3000}Line two」".to_string())
    );
}

#[test]
fn failures_show_original_text_and_are_not_cached() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::new();

    let id = queued(session.submit(Some(&stub), Backend::OpenAi, "「失敗」", "ja", "en-us"));
    stub.fail(id, "<dqxlq/>失敗<dqxrq/>", "Server error (HTTP 502): bad gateway");
    let events = session.drain(&stub);
    assert!(events[0].failed);
    assert_eq!(events[0].text, "「失敗」");
    assert_eq!(events[0].error_message, "Server error (HTTP 502): bad gateway");
    assert_eq!(session.cache_len(), 0);

    queued(session.submit(Some(&stub), Backend::OpenAi, "「失敗」", "ja", "en-us"));
}

#[test]
fn not_ready_translator_creates_nothing() {
    let stub = StubTranslator::not_ready();
    let mut session = TranslateSession::new();

    assert_eq!(
        session.submit(Some(&stub), Backend::OpenAi, "text", "auto", "en-us"),
        SubmitOutcome::DroppedNotReady
    );
    assert!(stub.submitted().is_empty());
    assert_eq!(session.pending_jobs(), 0);
    assert_eq!(session.cache_len(), 0);
}

#[test]
fn full_cache_is_cleared_on_next_miss() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::with_capacity(3);

    for text in ["a", "b", "c"] {
        let id = queued(session.submit(Some(&stub), Backend::OpenAi, text, "auto", "en-us"));
        stub.finish(id, &text.to_uppercase());
    }
    session.drain(&stub);
    assert_eq!(session.cache_len(), 3);

    queued(session.submit(Some(&stub), Backend::OpenAi, "d", "auto", "en-us"));
    assert_eq!(session.cache_len(), 0);
    assert!(session.cache_len() <= 3);
}

#[test]
fn disabled_cache_always_queues() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::new();
    session.enable_cache(false);

    let id = queued(session.submit(Some(&stub), Backend::OpenAi, "x", "auto", "en-us"));
    stub.finish(id, "X");
    session.drain(&stub);
    queued(session.submit(Some(&stub), Backend::OpenAi, "x", "auto", "en-us"));
    assert_eq!(stub.submitted().len(), 2);
}

#[test]
fn foreign_results_pass_through_uncached() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::new();

    stub.finish(42, "<dqxlq/>direct<dqxrq/>");
    let events = session.drain(&stub);
    assert_eq!(events[0].job_id, 42);
    assert_eq!(events[0].text, "「direct」");
    assert_eq!(session.cache_len(), 0);
}

#[test]
fn clear_forgets_cache_and_pending_jobs() {
    let stub = StubTranslator::ready();
    let mut session = TranslateSession::new();

    let id = queued(session.submit(Some(&stub), Backend::OpenAi, "a", "auto", "en-us"));
    stub.finish(id, "A");
    session.drain(&stub);
    queued(session.submit(Some(&stub), Backend::OpenAi, "b", "auto", "en-us"));

    session.clear();
    assert_eq!(session.cache_len(), 0);
    assert_eq!(session.pending_jobs(), 0);
}
