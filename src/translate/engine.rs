//! Generic translation engine shared by every backend.
//! One dedicated worker thread per instance runs a current-thread tokio runtime
//! and processes jobs serially: rate-limit wait, build, send, classify, retry, publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{snippet, technical_details, TranslateError};
use super::glossary::{Glossary, MAX_SNIPPET_ENTRIES};
use super::http::{HttpRequest, HttpTransport, ReqwestTransport, SessionConfig};
use super::prompt::{build_prompt, effective_target};
use super::provider::{Provider, ProviderHooks};
use super::{BackendConfig, Completed, Job, Translator};
use crate::cancellation::{GenerationGuard, WorkerGeneration};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::report::{ErrorCategory, ErrorReporter};

/// Base step of the linear retry backoff.
const BACKOFF_STEP: Duration = Duration::from_millis(200);

/// Text used by `test_connection`.
const TEST_TEXT: &str = "Hello";

/// Configuration and provider state for one worker generation.
struct Active {
    cfg: BackendConfig,
    provider: Provider,
}

impl Active {
    fn hooks(&self) -> &dyn ProviderHooks {
        self.provider.hooks()
    }
}

struct Queued {
    job: Job,
    enqueued_at: Instant,
}

/// A failed attempt, classified.
struct RequestFailure {
    error: TranslateError,
    retryable: bool,
    details: String,
}

impl RequestFailure {
    fn terminal(error: TranslateError) -> Self {
        let details = error.to_string();
        Self {
            error,
            retryable: false,
            details,
        }
    }
}

/// Everything needed to run one request, shared by the worker and `test_connection`.
#[derive(Clone)]
struct RequestContext {
    active: Arc<Active>,
    transport: Arc<dyn HttpTransport>,
    glossary: Arc<Glossary>,
    metrics: Arc<MetricsRegistry>,
}

impl RequestContext {
    /// Checks that fail before any request is built. Never retried.
    fn precheck(&self, job: &Job) -> Result<(), RequestFailure> {
        let hooks = self.active.hooks();
        let limit = hooks.limits(&self.active.cfg).max_input_bytes;
        if limit > 0 && job.text.len() > limit {
            return Err(RequestFailure::terminal(TranslateError::TextTooLong {
                provider: hooks.name(),
                len: job.text.len(),
                limit,
            }));
        }
        hooks
            .check_job(job, &self.active.cfg)
            .map_err(RequestFailure::terminal)
    }

    fn build_request(&self, job: &Job) -> HttpRequest {
        let cfg = &self.active.cfg;
        let hooks = self.active.hooks();

        let glossary = cfg.glossary_enabled.then(|| {
            self.glossary
                .build_snippet(&job.text, effective_target(job, cfg), MAX_SNIPPET_ENTRIES)
        });
        let prompt = build_prompt(job, cfg, glossary.as_deref());

        HttpRequest {
            url: hooks.build_url(job, cfg),
            headers: hooks.build_headers(job, cfg),
            body: hooks.build_body(job, &prompt, cfg),
        }
    }

    /// Build, send and classify one attempt.
    async fn send(&self, job: &Job, cancel: &CancellationToken) -> Result<String, RequestFailure> {
        let hooks = self.active.hooks();
        let request = self.build_request(job);
        debug!(
            provider = hooks.name(),
            job_id = job.id,
            url = %request.url,
            body = ?request.body,
            "request built"
        );

        let mut session = SessionConfig {
            text_length_hint: job.text.len(),
            ..SessionConfig::default()
        };
        hooks.configure_session(job, &mut session);

        let span = self.metrics.span(metric_names::REQUEST_LATENCY);
        let resp = self.transport.execute(&request, &session, cancel).await;
        span.finish();

        if let Some(error) = TranslateError::from_response(&resp) {
            let retryable = match error {
                TranslateError::Cancelled => false,
                _ => hooks.should_retry(&resp),
            };
            return Err(RequestFailure {
                error,
                retryable,
                details: technical_details(&resp),
            });
        }

        hooks.parse_response(job, &resp).map_err(|error| RequestFailure {
            retryable: error.is_retryable(),
            details: format!("parse failure: {}", snippet(&resp.text)),
            error,
        })
    }
}

/// Minimum spacing between request starts. The first request never waits.
struct RateLimiter {
    interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: None,
        }
    }

    /// Sleep until the interval has passed. Returns false if cancelled meanwhile.
    async fn wait(&self, cancel: &CancellationToken) -> bool {
        let Some(last) = self.last_request else {
            return true;
        };
        let until = last + self.interval;
        if until <= Instant::now() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(until)) => true,
            _ = cancel.cancelled() => false,
        }
    }

    fn mark(&mut self) {
        self.last_request = Some(Instant::now());
    }
}

/// State moved into the worker thread.
struct Worker {
    ctx: RequestContext,
    guard: GenerationGuard,
    results: Arc<Mutex<Vec<Completed>>>,
    last_error: Arc<Mutex<String>>,
    reporter: ErrorReporter,
    max_retries: u32,
    interval: Duration,
}

impl Worker {
    async fn run(self, mut jobs: mpsc::UnboundedReceiver<Queued>) {
        let mut limiter = RateLimiter::new(self.interval);
        let token = self.guard.token().clone();

        loop {
            let queued = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = jobs.recv() => match next {
                    Some(queued) => queued,
                    None => break,
                },
            };
            self.ctx.metrics.record(
                metric_names::QUEUE_WAIT,
                queued.enqueued_at.elapsed().as_micros() as f64,
            );

            let span = self.ctx.metrics.span(metric_names::JOB_TOTAL);
            let Some(completed) = self.process(&queued.job, &mut limiter, &token).await else {
                break;
            };
            span.finish();

            if !self.guard.should_continue() {
                debug!(job_id = completed.id, "stale worker, dropping result");
                break;
            }
            self.results.lock().push(completed);
        }
    }

    /// Run one job to completion. `None` means the worker was cancelled.
    async fn process(
        &self,
        job: &Job,
        limiter: &mut RateLimiter,
        token: &CancellationToken,
    ) -> Option<Completed> {
        let name = self.ctx.active.hooks().name();
        let mut attempt: u32 = 0;

        loop {
            let outcome = match self.ctx.precheck(job) {
                Err(failure) => Err(failure),
                Ok(()) => {
                    let started = Instant::now();
                    if !limiter.wait(token).await {
                        return None;
                    }
                    self.ctx.metrics.record(
                        metric_names::RATE_LIMIT_WAIT,
                        started.elapsed().as_micros() as f64,
                    );
                    let outcome = self.ctx.send(job, token).await;
                    limiter.mark();
                    outcome
                }
            };

            let failure = match outcome {
                Ok(text) => {
                    self.ctx
                        .metrics
                        .record(metric_names::ATTEMPTS, f64::from(attempt + 1));
                    debug!(
                        provider = name,
                        job_id = job.id,
                        src = %job.source_lang,
                        dst = %job.target_lang,
                        translated = %text,
                        "translation complete"
                    );
                    return Some(Completed {
                        id: job.id,
                        text,
                        original_text: job.text.clone(),
                        ..Completed::default()
                    });
                }
                Err(failure) => failure,
            };

            if matches!(failure.error, TranslateError::Cancelled) || token.is_cancelled() {
                return None;
            }

            let message = failure.error.to_string();
            *self.last_error.lock() = message.clone();
            self.reporter
                .warning(category_for(&failure.error), message.clone(), failure.details);

            if !failure.retryable || attempt >= self.max_retries {
                self.ctx
                    .metrics
                    .record(metric_names::ATTEMPTS, f64::from(attempt + 1));
                warn!(
                    provider = name,
                    job_id = job.id,
                    attempts = attempt + 1,
                    error = %message,
                    "translation failed"
                );
                return Some(Completed {
                    id: job.id,
                    failed: true,
                    original_text: job.text.clone(),
                    error_message: message,
                    ..Completed::default()
                });
            }

            attempt += 1;
            let backoff = backoff_delay(attempt, failure.error.retry_after());
            warn!(
                provider = name,
                job_id = job.id,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %message,
                "retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = token.cancelled() => return None,
            }
        }
    }
}

/// `max(200ms * attempt, retry_after)`.
pub fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    let linear = BACKOFF_STEP * attempt;
    match retry_after {
        Some(hint) if hint > linear => hint,
        _ => linear,
    }
}

fn category_for(error: &TranslateError) -> ErrorCategory {
    match error {
        TranslateError::Timeout | TranslateError::Network(_) | TranslateError::Cancelled => {
            ErrorCategory::Network
        }
        TranslateError::ConfigInvalid(_) | TranslateError::NotReady => ErrorCategory::Configuration,
        _ => ErrorCategory::Translation,
    }
}

fn interval_from_seconds(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

/// The engine every backend runs on. The backend is chosen by `BackendConfig::backend` at init.
pub struct LlmTranslator {
    transport: Arc<dyn HttpTransport>,
    glossary: Arc<Glossary>,
    reporter: ErrorReporter,
    metrics: Arc<MetricsRegistry>,
    generations: WorkerGeneration,
    active: Option<Arc<Active>>,
    jobs: Option<mpsc::UnboundedSender<Queued>>,
    worker: Option<JoinHandle<()>>,
    next_id: AtomicU64,
    results: Arc<Mutex<Vec<Completed>>>,
    last_error: Arc<Mutex<String>>,
}

impl LlmTranslator {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            glossary: Arc::new(Glossary::empty()),
            reporter: ErrorReporter::disabled(),
            metrics: Arc::new(MetricsRegistry::new()),
            generations: WorkerGeneration::new(),
            active: None,
            jobs: None,
            worker: None,
            next_id: AtomicU64::new(1),
            results: Arc::new(Mutex::new(Vec::new())),
            last_error: Arc::new(Mutex::new(String::new())),
        }
    }

    /// Engine over the pooled reqwest transport.
    pub fn with_default_transport() -> Result<Self, TranslateError> {
        let transport =
            ReqwestTransport::new().map_err(|e| TranslateError::Worker(e.to_string()))?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn with_glossary(mut self, glossary: Arc<Glossary>) -> Self {
        self.glossary = glossary;
        self
    }

    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }

    fn set_last_error(&self, message: impl Into<String>) {
        *self.last_error.lock() = message.into();
    }

    fn request_context(&self, active: &Arc<Active>) -> RequestContext {
        RequestContext {
            active: Arc::clone(active),
            transport: Arc::clone(&self.transport),
            glossary: Arc::clone(&self.glossary),
            metrics: Arc::clone(&self.metrics),
        }
    }

    fn spawn_worker(&mut self, active: Arc<Active>) -> Result<(), TranslateError> {
        let guard = self.generations.cancel_and_advance();
        let generation = guard.my_generation();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            ctx: self.request_context(&active),
            guard,
            results: Arc::clone(&self.results),
            last_error: Arc::clone(&self.last_error),
            reporter: self.reporter.clone(),
            max_retries: active.cfg.max_retries,
            interval: interval_from_seconds(active.cfg.request_interval_seconds),
        };
        let provider = active.hooks().name();

        let handle = std::thread::Builder::new()
            .name("translate-worker".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(provider, error = %e, "failed to build worker runtime");
                        *worker.last_error.lock() = format!("failed to start translation worker: {e}");
                        return;
                    }
                };
                info!(provider, generation, "translation worker started");
                runtime.block_on(worker.run(rx));
                info!(provider, generation, "translation worker exited");
            })
            .map_err(|e| {
                self.generations.cancel();
                TranslateError::Worker(e.to_string())
            })?;

        self.jobs = Some(tx);
        self.worker = Some(handle);
        self.active = Some(active);
        Ok(())
    }
}

impl Translator for LlmTranslator {
    fn init(&mut self, mut cfg: BackendConfig) -> Result<(), TranslateError> {
        self.shutdown();
        self.set_last_error("");

        cfg.max_concurrent_requests = cfg.max_concurrent_requests.max(1);
        if !cfg.request_interval_seconds.is_finite() || cfg.request_interval_seconds < 0.0 {
            cfg.request_interval_seconds = 0.0;
        }

        let provider = Provider::for_config(&cfg);
        if let Err(reason) = provider.hooks().validate_config(&cfg) {
            warn!(provider = provider.hooks().name(), %reason, "invalid translator config");
            self.set_last_error(reason.clone());
            return Err(TranslateError::ConfigInvalid(reason));
        }

        info!(
            provider = provider.hooks().name(),
            max_retries = cfg.max_retries,
            interval_s = cfg.request_interval_seconds,
            max_concurrent = cfg.max_concurrent_requests,
            "initializing translator"
        );
        let active = Arc::new(Active { cfg, provider });
        self.spawn_worker(active).map_err(|e| {
            self.set_last_error(e.to_string());
            e
        })
    }

    fn is_ready(&self) -> bool {
        let worker_alive = self.worker.as_ref().is_some_and(|h| !h.is_finished());
        worker_alive
            && self.generations.is_running()
            && self
                .active
                .as_ref()
                .is_some_and(|a| a.hooks().has_valid_runtime_config(&a.cfg))
    }

    fn shutdown(&mut self) {
        self.generations.cancel();
        // Dropping the sender discards the queue once the receiver goes too.
        self.jobs = None;
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("translation worker panicked");
            }
        }
        self.results.lock().clear();
        self.active = None;
    }

    fn submit(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<u64> {
        if !self.is_ready() {
            self.set_last_error(TranslateError::NotReady.to_string());
            return None;
        }
        if text.trim().is_empty() {
            return None;
        }
        let jobs = self.jobs.as_ref()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queued = Queued {
            job: Job {
                id,
                text: text.to_string(),
                source_lang: source_lang.to_string(),
                target_lang: target_lang.to_string(),
            },
            enqueued_at: Instant::now(),
        };
        if jobs.send(queued).is_err() {
            self.set_last_error(TranslateError::NotReady.to_string());
            return None;
        }
        debug!(job_id = id, "job queued");
        Some(id)
    }

    fn drain(&self) -> Vec<Completed> {
        std::mem::take(&mut *self.results.lock())
    }

    fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    fn test_connection(&self) -> String {
        let Some(active) = self.active.as_ref() else {
            return "Error: translator not initialized".to_string();
        };
        let hooks = active.hooks();
        if !hooks.has_valid_runtime_config(&active.cfg) {
            return format!("Error: Missing configuration for {}", hooks.name());
        }

        let target = if active.cfg.target_lang.is_empty() {
            super::prompt::FALLBACK_TARGET.to_string()
        } else {
            active.cfg.target_lang.clone()
        };
        let job = Job {
            id: 0,
            text: TEST_TEXT.to_string(),
            source_lang: "auto".to_string(),
            target_lang: target,
        };

        let ctx = self.request_context(active);
        let cancel = self.generations.token().child_token();
        let run_request = || -> Result<String, RequestFailure> {
            ctx.precheck(&job)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| RequestFailure::terminal(TranslateError::Worker(e.to_string())))?;
            runtime.block_on(ctx.send(&job, &cancel))
        };

        // Runtimes cannot nest: inside an async caller the request gets its own thread.
        let outcome = if tokio::runtime::Handle::try_current().is_ok() {
            std::thread::scope(|scope| scope.spawn(run_request).join()).unwrap_or_else(|_| {
                Err(RequestFailure::terminal(TranslateError::Worker(
                    "connection test thread panicked".into(),
                )))
            })
        } else {
            run_request()
        };
        match outcome {
            Ok(text) if !text.is_empty() => {
                info!(provider = hooks.name(), "connection test passed");
                hooks.connection_success_message()
            }
            Ok(_) => "Error: Test translation returned empty result".to_string(),
            Err(failure) => {
                warn!(provider = hooks.name(), error = %failure.error, "connection test failed");
                format!("Error: Test translation failed - {}", failure.error)
            }
        }
    }
}

impl Drop for LlmTranslator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
