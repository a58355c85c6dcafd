//! Prometheus metrics for per-service query health.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `release_watch_query_result_total` | Counter | `id`, `type`, `result` |
//! | `release_watch_query_liveness` | Gauge | `id` |

#[cfg(test)]
use mockall::automock;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::service::status::Liveness;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    Encoding(String),
}

/// Which query a counter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    LatestVersionQuery,
    DeployedVersionQuery,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::LatestVersionQuery => "latest_version",
            Counter::DeployedVersionQuery => "deployed_version",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    Success,
    Fail,
}

impl QueryResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryResult::Success => "SUCCESS",
            QueryResult::Fail => "FAIL",
        }
    }
}

/// Process-wide sink for query counters and the liveness gauge.
#[cfg_attr(test, automock)]
pub trait MetricsSink: Send + Sync {
    /// Zero every counter of a newly tracked service
    fn init_service(&self, service_id: &str);

    fn increment_counter(&self, counter: Counter, service_id: &str, result: QueryResult);

    fn set_liveness(&self, service_id: &str, liveness: Liveness);
}

/// [`MetricsSink`] backed by a Prometheus registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    query_result_total: CounterVec,
    query_liveness: GaugeVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let query_result_total = CounterVec::new(
            Opts::new(
                "release_watch_query_result_total",
                "Version queries by service, query type and result",
            ),
            &["id", "type", "result"],
        )?;
        registry.register(Box::new(query_result_total.clone()))?;

        let query_liveness = GaugeVec::new(
            Opts::new(
                "release_watch_query_liveness",
                "Health of the latest query: 0 failed, 1 healthy, 2 regex, 3 semver, 4 older version",
            ),
            &["id"],
        )?;
        registry.register(Box::new(query_liveness.clone()))?;

        Ok(Self {
            registry,
            query_result_total,
            query_liveness,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}

impl MetricsSink for PrometheusMetrics {
    fn init_service(&self, service_id: &str) {
        for counter in [Counter::LatestVersionQuery, Counter::DeployedVersionQuery] {
            for result in [QueryResult::Success, QueryResult::Fail] {
                self.query_result_total
                    .with_label_values(&[service_id, counter.as_str(), result.as_str()])
                    .reset();
            }
        }
    }

    fn increment_counter(&self, counter: Counter, service_id: &str, result: QueryResult) {
        self.query_result_total
            .with_label_values(&[service_id, counter.as_str(), result.as_str()])
            .inc();
    }

    fn set_liveness(&self, service_id: &str, liveness: Liveness) {
        self.query_liveness
            .with_label_values(&[service_id])
            .set(liveness.as_gauge());
    }
}
