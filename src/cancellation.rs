//! Worker generations for the translation engine.
//! A stale worker (re-init or shutdown since it started) must not publish results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Owned by a translator. Each `init` advances the generation, cancels the
/// previous worker and issues a fresh token.
pub struct WorkerGeneration {
    current_token: RwLock<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl WorkerGeneration {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        // Generation 0 never has a running worker.
        token.cancel();
        Self {
            current_token: RwLock::new(token),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel the current worker, advance generation, return the guard for the next one.
    pub fn cancel_and_advance(&self) -> GenerationGuard {
        let mut current = self.current_token.write();
        let fresh = CancellationToken::new();
        std::mem::replace(&mut *current, fresh.clone()).cancel();
        GenerationGuard {
            my_generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            generation: Arc::clone(&self.generation),
            token: fresh,
        }
    }

    /// Cancel the current worker without advancing. The running flag drops to false.
    pub fn cancel(&self) {
        self.current_token.read().cancel();
    }

    /// Token of the live generation, for requests made outside the worker.
    pub fn token(&self) -> CancellationToken {
        self.current_token.read().clone()
    }

    /// A live generation exists and has not been cancelled.
    pub fn is_running(&self) -> bool {
        !self.current_token.read().is_cancelled()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for WorkerGeneration {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that a worker checks before publishing.
/// If the generation has advanced past `my_generation`, the worker is stale.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    /// No newer `init` has happened since this worker started.
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Safe to publish: not cancelled and still current.
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}
