//! Latency and retry histograms for the translation worker.
//! Each metric keeps a sliding window of recent samples; percentiles are
//! computed on demand.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Well-known metric names.
pub mod metric_names {
    /// Submit to dequeue, microseconds.
    pub const QUEUE_WAIT: &str = "queue_wait";
    /// Rate-limiter sleep before a request, microseconds.
    pub const RATE_LIMIT_WAIT: &str = "rate_limit_wait";
    /// One HTTP exchange, microseconds.
    pub const REQUEST_LATENCY: &str = "request_latency";
    /// Dequeue to publish, microseconds.
    pub const JOB_TOTAL: &str = "job_total";
    /// Attempts per job (count, not time).
    pub const ATTEMPTS: &str = "attempts";
}

const DEFAULT_WINDOW: usize = 1024;

/// Records elapsed microseconds under `name` when finished.
pub struct TimingSpan {
    name: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn finish(self) -> f64 {
        let micros = self.started.elapsed().as_micros() as f64;
        self.registry.record(self.name, micros);
        micros
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

/// Nearest-rank percentile over sorted samples.
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    let rank = ((p.clamp(0.0, 100.0) / 100.0) * last as f64).round() as usize;
    sorted[rank.min(last)]
}

fn sorted_samples(window: &VecDeque<f64>) -> Vec<f64> {
    let mut samples: Vec<f64> = window.iter().copied().collect();
    samples.sort_by(f64::total_cmp);
    samples
}

pub struct MetricsRegistry {
    windows: Mutex<HashMap<&'static str, VecDeque<f64>>>,
    window_len: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW)
    }

    /// `window_len` samples are kept per metric; older ones are dropped.
    pub fn with_capacity(window_len: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_len: window_len.max(1),
        }
    }

    pub fn record(&self, name: &'static str, value: f64) {
        let mut windows = self.windows.lock();
        let window = windows
            .entry(name)
            .or_insert_with(|| VecDeque::with_capacity(self.window_len));
        if window.len() == self.window_len {
            window.pop_front();
        }
        window.push_back(value);
        tracing::trace!(metric = name, value, "metric recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Percentile (0-100); 0.0 for an unknown metric.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        self.windows
            .lock()
            .get(name)
            .map_or(0.0, |window| nearest_rank(&sorted_samples(window), p))
    }

    pub fn count(&self, name: &str) -> usize {
        self.windows.lock().get(name).map_or(0, VecDeque::len)
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.windows
            .lock()
            .iter()
            .map(|(name, window)| {
                let sorted = sorted_samples(window);
                let summary = MetricSummary {
                    p50: nearest_rank(&sorted, 50.0),
                    p95: nearest_rank(&sorted, 95.0),
                    p99: nearest_rank(&sorted, 99.0),
                    count: sorted.len(),
                };
                ((*name).to_string(), summary)
            })
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_recorded_samples() {
        let reg = MetricsRegistry::new();
        for v in 1..=100 {
            reg.record(metric_names::REQUEST_LATENCY, v as f64);
        }
        assert_eq!(reg.percentile(metric_names::REQUEST_LATENCY, 50.0), 51.0);
        assert_eq!(reg.percentile(metric_names::REQUEST_LATENCY, 99.0), 99.0);
        assert_eq!(reg.count(metric_names::REQUEST_LATENCY), 100);
        assert_eq!(reg.percentile("missing", 50.0), 0.0);
    }

    #[test]
    fn window_drops_oldest_samples() {
        let reg = MetricsRegistry::with_capacity(4);
        for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
            reg.record(metric_names::ATTEMPTS, v);
        }
        let summary = reg.summary();
        let attempts = &summary[metric_names::ATTEMPTS];
        assert_eq!(attempts.count, 4);
        assert_eq!(attempts.p99, 4.0);
    }

    #[test]
    fn span_records_on_finish() {
        let reg = Arc::new(MetricsRegistry::new());
        reg.span(metric_names::JOB_TOTAL).finish();
        assert_eq!(reg.count(metric_names::JOB_TOTAL), 1);
    }
}
