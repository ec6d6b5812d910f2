//! Prometheus-compatible metrics endpoint

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::state::AppState;
use teddy_pcm::EncodeOutcome;

/// Metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Server start time
    start_time: Instant,
    /// Total requests processed
    request_count: RwLock<u64>,
    /// Requests by endpoint
    requests_by_endpoint: RwLock<HashMap<String, u64>>,
    /// Batches prepared
    batches_prepared: RwLock<u64>,
    /// Files converted into a part
    files_converted: RwLock<u64>,
    /// Files skipped, by error kind
    file_failures: RwLock<HashMap<String, u64>>,
    /// PCM bytes produced
    pcm_bytes_produced: RwLock<u64>,
    /// Bytes served from prepared batches
    bytes_served: RwLock<u64>,
    /// Request errors by type
    errors_by_type: RwLock<HashMap<String, u64>>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            request_count: RwLock::new(0),
            requests_by_endpoint: RwLock::new(HashMap::new()),
            batches_prepared: RwLock::new(0),
            files_converted: RwLock::new(0),
            file_failures: RwLock::new(HashMap::new()),
            pcm_bytes_produced: RwLock::new(0),
            bytes_served: RwLock::new(0),
            errors_by_type: RwLock::new(HashMap::new()),
        }
    }

    /// Record a request
    pub fn record_request(&self, endpoint: &str) {
        *self.request_count.write() += 1;
        *self
            .requests_by_endpoint
            .write()
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    /// Record the result of one orchestrated batch
    pub fn record_outcome(&self, outcome: &EncodeOutcome) {
        *self.batches_prepared.write() += 1;
        *self.files_converted.write() += outcome.batch.len() as u64;
        *self.pcm_bytes_produced.write() += outcome.batch.total_bytes() as u64;

        if !outcome.failures.is_empty() {
            let mut failures = self.file_failures.write();
            for failure in &outcome.failures {
                *failures
                    .entry(failure.kind.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    /// Record bytes served
    pub fn record_bytes(&self, bytes: u64) {
        *self.bytes_served.write() += bytes;
    }

    /// Record error
    pub fn record_error(&self, error_type: &str) {
        *self
            .errors_by_type
            .write()
            .entry(error_type.to_string())
            .or_insert(0) += 1;
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self, cached_batches: usize, cached_bytes: usize) -> String {
        let mut output = String::new();

        output.push_str("# HELP teddy_pcm_uptime_seconds Server uptime in seconds\n");
        output.push_str("# TYPE teddy_pcm_uptime_seconds counter\n");
        output.push_str(&format!("teddy_pcm_uptime_seconds {}\n", self.uptime_secs()));

        output.push_str(
            "\n# HELP teddy_pcm_start_time_seconds Server start time as Unix timestamp\n",
        );
        output.push_str("# TYPE teddy_pcm_start_time_seconds gauge\n");
        output.push_str(&format!(
            "teddy_pcm_start_time_seconds {}\n",
            std::time::SystemTime::UNIX_EPOCH
                .elapsed()
                .unwrap_or(Duration::ZERO)
                .as_secs()
                .saturating_sub(self.uptime_secs())
        ));

        // Requests
        output.push_str("\n# HELP teddy_pcm_requests_total Total number of HTTP requests\n");
        output.push_str("# TYPE teddy_pcm_requests_total counter\n");
        output.push_str(&format!(
            "teddy_pcm_requests_total {}\n",
            *self.request_count.read()
        ));

        output.push_str("\n# HELP teddy_pcm_requests_by_endpoint Requests by endpoint\n");
        output.push_str("# TYPE teddy_pcm_requests_by_endpoint counter\n");
        for (endpoint, count) in self.requests_by_endpoint.read().iter() {
            output.push_str(&format!(
                "teddy_pcm_requests_by_endpoint{{endpoint=\"{}\"}} {}\n",
                endpoint, count
            ));
        }

        // Pipeline
        output.push_str("\n# HELP teddy_pcm_batches_total Batches prepared\n");
        output.push_str("# TYPE teddy_pcm_batches_total counter\n");
        output.push_str(&format!(
            "teddy_pcm_batches_total {}\n",
            *self.batches_prepared.read()
        ));

        output.push_str("\n# HELP teddy_pcm_files_converted_total Files packed into a part\n");
        output.push_str("# TYPE teddy_pcm_files_converted_total counter\n");
        output.push_str(&format!(
            "teddy_pcm_files_converted_total {}\n",
            *self.files_converted.read()
        ));

        output.push_str("\n# HELP teddy_pcm_file_failures_total Files skipped by error kind\n");
        output.push_str("# TYPE teddy_pcm_file_failures_total counter\n");
        for (kind, count) in self.file_failures.read().iter() {
            output.push_str(&format!(
                "teddy_pcm_file_failures_total{{kind=\"{}\"}} {}\n",
                kind, count
            ));
        }

        output.push_str("\n# HELP teddy_pcm_pcm_bytes_total PCM bytes produced\n");
        output.push_str("# TYPE teddy_pcm_pcm_bytes_total counter\n");
        output.push_str(&format!(
            "teddy_pcm_pcm_bytes_total {}\n",
            *self.pcm_bytes_produced.read()
        ));

        output.push_str("\n# HELP teddy_pcm_bytes_served_total Bytes served from prepared batches\n");
        output.push_str("# TYPE teddy_pcm_bytes_served_total counter\n");
        output.push_str(&format!(
            "teddy_pcm_bytes_served_total {}\n",
            *self.bytes_served.read()
        ));

        // Cache
        output.push_str("\n# HELP teddy_pcm_cached_batches Prepared batches held in memory\n");
        output.push_str("# TYPE teddy_pcm_cached_batches gauge\n");
        output.push_str(&format!("teddy_pcm_cached_batches {}\n", cached_batches));

        output.push_str("\n# HELP teddy_pcm_cached_bytes PCM bytes held in memory\n");
        output.push_str("# TYPE teddy_pcm_cached_bytes gauge\n");
        output.push_str(&format!("teddy_pcm_cached_bytes {}\n", cached_bytes));

        // Errors
        output.push_str("\n# HELP teddy_pcm_errors_total Request errors by type\n");
        output.push_str("# TYPE teddy_pcm_errors_total counter\n");
        for (error_type, count) in self.errors_by_type.read().iter() {
            output.push_str(&format!(
                "teddy_pcm_errors_total{{type=\"{}\"}} {}\n",
                error_type, count
            ));
        }

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.record_request("/metrics");
    let prometheus_output = state
        .metrics
        .export_prometheus(state.batches.len(), state.batches.memory_usage());

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        prometheus_output,
    )
        .into_response()
}
