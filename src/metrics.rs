//! Request metrics and periodic summaries for the prediction service.

use crate::types::prediction::{Classification, PredictionResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept for percentile estimates
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector shared by all request handlers
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Predictions classified as churn
    pub churn_predictions: AtomicU64,
    /// Requests that ended in an error response
    pub failed_requests: AtomicU64,
    pub reloads: AtomicU64,
    pub failed_reloads: AtomicU64,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Calibrated confidence histogram, 10 buckets of 10 points
    confidence_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            churn_predictions: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
            failed_reloads: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a served prediction
    pub fn record_prediction(&self, elapsed: Duration, result: &PredictionResult) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if result.classification == Classification::Churn {
            self.churn_predictions.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(elapsed.as_micros() as u64);
            if latencies.len() > LATENCY_WINDOW {
                latencies.drain(0..LATENCY_WINDOW / 2);
            }
        }

        let bucket = (result.calibrated_probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reload outcome
    pub fn record_reload(&self, success: bool) {
        if success {
            self.reloads.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_reloads.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Latency percentiles over the retained window
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted = self
            .latencies
            .read()
            .map(|latencies| latencies.clone())
            .unwrap_or_default();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Calibrated confidence histogram
    pub fn confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Predictions per second since start
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log a summary of everything recorded so far
    pub fn log_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let churn = self.churn_predictions.load(Ordering::Relaxed);
        let churn_rate = if predictions > 0 {
            churn as f64 / predictions as f64 * 100.0
        } else {
            0.0
        };
        let latency = self.latency_stats();

        info!(
            predictions,
            churn_predictions = churn,
            churn_rate = format!("{churn_rate:.1}%"),
            failed_requests = self.failed_requests.load(Ordering::Relaxed),
            reloads = self.reloads.load(Ordering::Relaxed),
            failed_reloads = self.failed_reloads.load(Ordering::Relaxed),
            throughput = format!("{:.2} req/s", self.throughput()),
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            "Service metrics"
        );

        let distribution = self.confidence_distribution();
        let total: u64 = distribution.iter().sum();
        if total > 0 {
            for (i, count) in distribution.iter().enumerate().filter(|(_, c)| **c > 0) {
                info!(
                    bucket = format!("{}-{}%", i * 10, (i + 1) * 10),
                    count = *count,
                    share = format!("{:.1}%", *count as f64 / total as f64 * 100.0),
                    "Confidence distribution"
                );
            }
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Prediction latency statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    /// Create a reporter; the interval is at least one second
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Run until the task is dropped
    pub async fn start(self) {
        let mut interval = tokio::time::interval(self.interval);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.log_summary();
        }
    }
}
