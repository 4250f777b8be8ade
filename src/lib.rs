//! Clarity translate: asynchronous multi-backend translation pipeline for a
//! game-text overlay. Six cloud backends share one worker engine; a session layer
//! in front of it caches results and protects quote markers.

pub mod cancellation;
pub mod config;
pub mod metrics;
pub mod report;
pub mod translate;

use tracing_subscriber::EnvFilter;

pub use config::{LogFormat, LoggingConfig, Settings};
pub use report::{ErrorReport, ErrorReporter};
pub use translate::session::{CompletedEvent, SubmitOutcome, TranslateSession};
pub use translate::{Backend, BackendConfig, Completed, LlmTranslator, TranslateError, Translator};

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
/// Fails if a global subscriber is already set.
pub fn init_tracing(
    logging: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("clarity_translate={}", logging.level))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    match logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}
