//! Collaborator fakes for tracking tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Instant;

use release_watch::error::QueryError;
use release_watch::metrics::{Counter, MetricsSink, QueryResult};
use release_watch::notify::{Notifier, NotifyError, WebHookSender};
use release_watch::service::ServiceInfo;
use release_watch::service::deployed_version::{DeployedVersionExecutor, Lookup};
use release_watch::service::latest_version::{LatestVersionLookup, LatestVersionSource};
use release_watch::service::status::Liveness;
use release_watch::webhook::WebHook;

/// Latest-version source answering from a fixed version per lookup url.
///
/// Every query is reported on a channel as `(url, instant)`.
pub struct FakeSource {
    versions: HashMap<String, String>,
    queries: UnboundedSender<(String, Instant)>,
}

impl FakeSource {
    pub fn new() -> (Self, UnboundedReceiver<(String, Instant)>) {
        let (queries, rx) = unbounded_channel();
        (
            Self {
                versions: HashMap::new(),
                queries,
            },
            rx,
        )
    }

    pub fn with_version(mut self, url: &str, version: &str) -> Self {
        self.versions.insert(url.to_string(), version.to_string());
        self
    }
}

#[async_trait]
impl LatestVersionSource for FakeSource {
    async fn latest_version(
        &self,
        lookup: &LatestVersionLookup,
        _semantic_versioning: bool,
    ) -> Result<String, QueryError> {
        let _ = self.queries.send((lookup.url.clone(), Instant::now()));
        self.versions
            .get(&lookup.url)
            .cloned()
            .ok_or_else(|| QueryError::Empty {
                url: lookup.url.clone(),
            })
    }
}

/// Executor that always reports the same deployed version
pub struct FixedExecutor(pub String);

#[async_trait]
impl DeployedVersionExecutor for FixedExecutor {
    async fn query(&self, _lookup: &Lookup, _use_cache: bool) -> Result<String, QueryError> {
        Ok(self.0.clone())
    }
}

/// Notifier and webhook sender that report each delivery on a channel
pub struct RecordingDelivery {
    deliveries: UnboundedSender<String>,
}

impl RecordingDelivery {
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (deliveries, rx) = unbounded_channel();
        (Self { deliveries }, rx)
    }
}

#[async_trait]
impl Notifier for RecordingDelivery {
    async fn send(
        &self,
        _title: &str,
        _message: &str,
        info: &ServiceInfo,
    ) -> Result<(), NotifyError> {
        let _ = self
            .deliveries
            .send(format!("notify {} {}", info.id, info.latest_version));
        Ok(())
    }
}

#[async_trait]
impl WebHookSender for RecordingDelivery {
    async fn send(&self, hook: &WebHook, info: &ServiceInfo) -> Result<(), NotifyError> {
        let _ = self
            .deliveries
            .send(format!("webhook {} {} {}", info.id, hook.id, info.latest_version));
        Ok(())
    }
}

/// Metrics sink keeping the last liveness and counter totals in memory
#[derive(Default)]
pub struct InMemoryMetrics {
    liveness: Mutex<HashMap<String, Liveness>>,
    counters: Mutex<HashMap<(String, &'static str, &'static str), u64>>,
}

impl InMemoryMetrics {
    pub fn liveness(&self, service_id: &str) -> Option<Liveness> {
        self.liveness.lock().unwrap().get(service_id).copied()
    }

    pub fn counter(&self, counter: Counter, service_id: &str, result: QueryResult) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(&(service_id.to_string(), counter.as_str(), result.as_str()))
            .copied()
            .unwrap_or_default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn init_service(&self, service_id: &str) {
        let mut counters = self.counters.lock().unwrap();
        for counter in [Counter::LatestVersionQuery, Counter::DeployedVersionQuery] {
            for result in [QueryResult::Success, QueryResult::Fail] {
                counters.insert(
                    (service_id.to_string(), counter.as_str(), result.as_str()),
                    0,
                );
            }
        }
    }

    fn increment_counter(&self, counter: Counter, service_id: &str, result: QueryResult) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry((service_id.to_string(), counter.as_str(), result.as_str()))
            .or_default() += 1;
    }

    fn set_liveness(&self, service_id: &str, liveness: Liveness) {
        self.liveness
            .lock()
            .unwrap()
            .insert(service_id.to_string(), liveness);
    }
}
