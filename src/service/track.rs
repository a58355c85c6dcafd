//! Per-service polling loop
//!
//! Each service gets one task, started `stagger` after the previous one.
//! A task waits out its stagger (idle), then polls forever; a new release
//! fans out to every notifier and webhook as detached tasks before the loop
//! goes back to sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, warn};

use crate::config::SERVICE_STAGGER_DELAY;
use crate::error::{QueryErrorKind, RefreshError};
use crate::metrics::{Counter, MetricsSink, QueryResult};
use crate::notify::{Notifier, WebHookSender};
use crate::service::Service;
use crate::service::deployed_version::{DeployedVersionExecutor, LookupOverrides};
use crate::service::latest_version::LatestVersionSource;
use crate::service::status::Liveness;

/// Runs the tracking loops and owns their collaborators.
pub struct Tracker {
    source: Arc<dyn LatestVersionSource>,
    executor: Arc<dyn DeployedVersionExecutor>,
    notifiers: Vec<Arc<dyn Notifier>>,
    webhook_sender: Arc<dyn WebHookSender>,
    metrics: Arc<dyn MetricsSink>,
    stagger: Duration,
}

impl Tracker {
    pub fn new(
        source: Arc<dyn LatestVersionSource>,
        executor: Arc<dyn DeployedVersionExecutor>,
        webhook_sender: Arc<dyn WebHookSender>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            source,
            executor,
            notifiers: Vec::new(),
            webhook_sender,
            metrics,
            stagger: SERVICE_STAGGER_DELAY,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Start one tracking task per service, in order, `stagger` apart.
    ///
    /// The tasks never finish on their own.
    pub fn track_all(self: &Arc<Self>, services: Vec<Arc<Service>>) -> Vec<JoinHandle<()>> {
        services
            .into_iter()
            .enumerate()
            .map(|(i, service)| {
                let delay = self.stagger * i as u32;
                let tracker = Arc::clone(self);
                let span = service.span().clone();
                tokio::spawn(
                    async move {
                        sleep(delay).await;
                        tracker.track(service).await;
                    }
                    .instrument(span),
                )
            })
            .collect()
    }

    async fn track(&self, service: Arc<Service>) {
        debug!(
            "Tracking {} at {} every {} (auto_approve={})",
            service.id,
            service.latest_version.service_url(),
            service.options.interval(),
            service.dashboard.auto_approve()
        );
        self.metrics.init_service(&service.id);

        loop {
            self.run_cycle(&service).await;
            sleep(service.options.interval_duration()).await;
        }
    }

    /// One poll of `service`: refresh the deployed version, query the latest
    /// release, fan out a new one, and record liveness.
    pub async fn run_cycle(&self, service: &Arc<Service>) -> Liveness {
        self.refresh_deployed(service).await;

        let liveness = match service.check_latest(self.source.as_ref()).await {
            Ok(new_release) => {
                if new_release {
                    self.fan_out(service);
                }
                self.metrics.increment_counter(
                    Counter::LatestVersionQuery,
                    &service.id,
                    QueryResult::Success,
                );
                Liveness::Healthy
            }
            Err(e) => {
                warn!(parent: service.span(), "{}", e);
                let kind = e.kind();
                if kind == QueryErrorKind::Generic {
                    self.metrics.increment_counter(
                        Counter::LatestVersionQuery,
                        &service.id,
                        QueryResult::Fail,
                    );
                }
                Liveness::from(kind)
            }
        };

        self.metrics.set_liveness(&service.id, liveness);
        service.status.set_liveness(liveness);
        liveness
    }

    async fn refresh_deployed(&self, service: &Service) {
        let Some(lookup) = service.deployed_version.as_ref() else {
            return;
        };

        let result = match lookup
            .refresh(self.executor.as_ref(), &LookupOverrides::default())
            .await
        {
            Ok(_) => QueryResult::Success,
            Err(RefreshError::Invalid(errs)) => {
                error!(parent: service.span(), "deployed_version invalid:\n{}", errs);
                QueryResult::Fail
            }
            Err(RefreshError::Query(e)) => {
                warn!(parent: service.span(), "deployed_version: {}", e);
                QueryResult::Fail
            }
        };
        self.metrics
            .increment_counter(Counter::DeployedVersionQuery, &service.id, result);
    }

    /// Dispatch a new release to every notifier and webhook without waiting.
    fn fan_out(&self, service: &Service) {
        let info = service.info();
        let span = service.span().clone();

        for notifier in &self.notifiers {
            let notifier = Arc::clone(notifier);
            let info = info.clone();
            tokio::spawn(
                async move {
                    if let Err(e) = notifier.send("", "", &info).await {
                        error!("{}", e);
                    }
                }
                .instrument(span.clone()),
            );
        }

        for hook in service.webhook.values() {
            let sender = Arc::clone(&self.webhook_sender);
            let hook = hook.clone();
            let info = info.clone();
            tokio::spawn(
                async move {
                    let delay = hook.delay_duration();
                    if !delay.is_zero() {
                        debug!("WebHook {} delayed by {:?}", hook.id, delay);
                        sleep(delay).await;
                    }
                    if let Err(e) = sender.send(&hook, &info).await
                        && !hook.silent_fails()
                    {
                        error!("{}", e);
                    }
                }
                .instrument(span.clone()),
            );
        }
    }
}
