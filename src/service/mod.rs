//! Tracked services and their lookups
//!
//! - [`latest_version`]: where new releases come from
//! - [`deployed_version`]: what is actually running, with per-call overrides
//! - [`track`]: the per-service polling loop

pub mod dashboard;
pub mod deployed_version;
pub mod http;
pub mod latest_version;
pub mod options;
pub mod status;
pub mod track;

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{Span, info};

use crate::error::{ErrorTree, QueryError};
use crate::semver::{compare_versions, parse_version};
use crate::template;
use crate::webhook::{self, WebHook, WebHooks};

use dashboard::{DashboardDefaults, DashboardOptions};
use deployed_version::{Lookup, LookupDefaults};
use latest_version::{LatestVersionDefaults, LatestVersionLookup, LatestVersionSource};
use options::{Options, OptionsDefaults};
use status::Status;

/// Declared defaults shared by every service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceDefaults {
    pub options: OptionsDefaults,
    pub latest_version: LatestVersionDefaults,
    pub deployed_version: LookupDefaults,
    pub dashboard: DashboardDefaults,
}

impl ServiceDefaults {
    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        errs.section_result("options", self.options.check_values());
        errs.into_result()
    }

    /// Freeze these defaults and the Main webhooks for linking into services.
    pub fn link(&self, webhook_defaults: Arc<WebHook>, webhook_main: &WebHooks) -> ServiceLinks {
        ServiceLinks {
            options: Arc::new(self.options.clone()),
            latest_version: Arc::new(self.latest_version.clone()),
            deployed_version: Arc::new(self.deployed_version.clone()),
            dashboard: Arc::new(self.dashboard.clone()),
            webhook_defaults,
            webhook_main: webhook_main
                .iter()
                .map(|(id, hook)| (id.clone(), Arc::new(hook.clone())))
                .collect(),
        }
    }
}

/// Shared, read-only defaults every service links to.
#[derive(Debug, Clone)]
pub struct ServiceLinks {
    pub options: Arc<OptionsDefaults>,
    pub latest_version: Arc<LatestVersionDefaults>,
    pub deployed_version: Arc<LookupDefaults>,
    pub dashboard: Arc<DashboardDefaults>,
    pub webhook_defaults: Arc<WebHook>,
    pub webhook_main: IndexMap<String, Arc<WebHook>>,
}

/// A service whose releases are tracked.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Service {
    #[serde(skip)]
    pub id: String,
    pub options: Options,
    pub latest_version: LatestVersionLookup,
    pub deployed_version: Option<Lookup>,
    pub dashboard: DashboardOptions,
    pub webhook: WebHooks,

    #[serde(skip)]
    pub status: Arc<Status>,
    #[serde(skip, default = "Span::none")]
    span: Span,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            id: String::new(),
            options: Options::default(),
            latest_version: LatestVersionLookup::default(),
            deployed_version: None,
            dashboard: DashboardOptions::default(),
            webhook: WebHooks::new(),
            status: Arc::new(Status::default()),
            span: Span::none(),
        }
    }
}

impl Service {
    /// Give the service its id and fresh status, and link every part to its defaults.
    pub fn init(&mut self, id: &str, links: &ServiceLinks) {
        self.id = id.to_string();
        self.status = Arc::new(Status::new(id));
        self.span = tracing::info_span!("service", id = %id);

        self.options.defaults = Arc::clone(&links.options);
        self.latest_version.init(Arc::clone(&links.latest_version));
        self.dashboard.defaults = Arc::clone(&links.dashboard);
        if let Some(lookup) = self.deployed_version.as_mut() {
            lookup.init(
                self.options.clone(),
                Arc::clone(&self.status),
                Arc::clone(&links.deployed_version),
            );
        }
        for (hook_id, hook) in self.webhook.iter_mut() {
            hook.init(
                hook_id,
                links.webhook_main.get(hook_id).cloned(),
                Some(Arc::clone(&links.webhook_defaults)),
            );
        }
    }

    /// Logging context for everything done on this service's behalf
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        errs.section_result("options", self.options.check_values());
        errs.section_result("latest_version", self.latest_version.check_values());
        if let Some(lookup) = self.deployed_version.as_mut() {
            errs.section_result("deployed_version", lookup.check_values());
        }
        errs.section_result("dashboard", self.dashboard.check_values());
        errs.section_result("webhook", webhook::check_webhooks(&mut self.webhook));
        errs.into_result()
    }

    /// Values available to templates and notifiers.
    pub fn info(&self) -> ServiceInfo {
        let mut info = ServiceInfo {
            id: self.id.clone(),
            url: self.latest_version.service_url(),
            web_url: String::new(),
            latest_version: self.status.latest_version(),
            deployed_version: self.status.deployed_version(),
        };
        info.web_url = template::render(&self.dashboard.web_url, &info);
        info
    }

    /// Query the latest release and record it.
    ///
    /// Returns `true` only for a release newer than the one already seen.
    /// The first successful query records without announcing.
    pub async fn check_latest(&self, source: &dyn LatestVersionSource) -> Result<bool, QueryError> {
        let semantic_versioning = self.options.semantic_versioning();
        let version = source
            .latest_version(&self.latest_version, semantic_versioning)
            .await?;
        self.status.set_last_queried(Utc::now());

        let previous = self.status.latest_version();
        if version == previous {
            return Ok(false);
        }

        if semantic_versioning {
            if parse_version(&version).is_none() {
                return Err(QueryError::SemanticVersion { version });
            }
            let deployed = self.status.deployed_version();
            let current = if deployed.is_empty() {
                previous.as_str()
            } else {
                deployed.as_str()
            };
            if !current.is_empty()
                && compare_versions(&version, current) == Some(Ordering::Less)
            {
                return Err(QueryError::QueriedVersionOlder {
                    queried: version,
                    current: current.to_string(),
                });
            }
        }

        let first = previous.is_empty();
        self.status.set_latest_version(&version);
        // Without a deployed lookup, nothing but a webhook can hold the deployed version back
        if self.deployed_version.is_none() && (first || self.webhook.is_empty()) {
            self.status.set_deployed_version(&version);
        }

        if first {
            info!(parent: &self.span, "Latest Release - {:?}", version);
            return Ok(false);
        }
        info!(parent: &self.span, "New Release - {:?}", version);
        Ok(true)
    }
}

/// Snapshot of a service handed to templates, notifiers and webhooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    pub id: String,
    pub url: String,
    pub web_url: String,
    pub latest_version: String,
    pub deployed_version: String,
}

impl ServiceInfo {
    /// Template variable lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "service_id" => Some(&self.id),
            "service_url" => Some(&self.url),
            "web_url" => Some(&self.web_url),
            "version" => Some(&self.latest_version),
            "deployed_version" => Some(&self.deployed_version),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::latest_version::MockLatestVersionSource;

    fn service(yaml: &str) -> Service {
        let config = Config::from_yaml(yaml).unwrap();
        config.service.into_values().next().unwrap()
    }

    fn source_returning(versions: &'static [&'static str]) -> MockLatestVersionSource {
        let mut source = MockLatestVersionSource::new();
        let mut next = versions.iter();
        source
            .expect_latest_version()
            .times(versions.len())
            .returning(move |_, _| Ok(next.next().copied().unwrap_or_default().to_string()));
        source
    }

    const ARGUS: &str = r#"
service:
  argus:
    latest_version:
      type: github
      url: release-argus/Argus
    dashboard:
      web_url: "https://github.com/release-argus/Argus/releases/tag/{{ version }}"
"#;

    #[test]
    fn init_shares_status_with_deployed_lookup() {
        let service = service(
            r#"
service:
  argus:
    options:
      semantic_versioning: false
    deployed_version:
      method: GET
      url: https://example.com/version
"#,
        );

        let lookup = service.deployed_version.as_ref().unwrap();
        service.status.set_deployed_version("1.0.0");

        assert_eq!(service.id, "argus");
        assert_eq!(lookup.status.service_id(), "argus");
        assert_eq!(lookup.status.deployed_version(), "1.0.0");
        assert!(!lookup.options.semantic_versioning());
    }

    #[test]
    fn init_links_latest_version_defaults() {
        let service = service(
            r#"
defaults:
  service:
    latest_version:
      access_token: shared-token
      use_prerelease: true
service:
  argus:
    latest_version:
      type: github
      url: release-argus/Argus
      use_prerelease: false
"#,
        );

        assert_eq!(service.latest_version.access_token(), Some("shared-token"));
        assert!(!service.latest_version.use_prerelease());
        assert!(!service.latest_version.allow_invalid_certs());
    }

    #[tokio::test]
    async fn check_latest_records_first_release_without_announcing() {
        let service = service(ARGUS);
        let source = source_returning(&["1.0.0", "1.0.0", "1.1.0"]);

        assert!(!service.check_latest(&source).await.unwrap());
        assert_eq!(service.status.latest_version(), "1.0.0");
        assert_eq!(service.status.deployed_version(), "1.0.0");
        assert!(service.status.summary().last_queried.is_some());

        assert!(!service.check_latest(&source).await.unwrap());
        assert!(service.check_latest(&source).await.unwrap());
        assert_eq!(service.status.latest_version(), "1.1.0");
    }

    #[tokio::test]
    async fn check_latest_rejects_regressions_and_non_semantic_versions() {
        let service = service(ARGUS);
        let source = source_returning(&["2.0.0", "1.9.0", "latest"]);

        service.check_latest(&source).await.unwrap();

        let err = service.check_latest(&source).await.unwrap_err();
        assert!(err.to_string().starts_with("queried version"));

        let err = service.check_latest(&source).await.unwrap_err();
        assert!(err.to_string().ends_with("semantic version"));
        assert_eq!(service.status.latest_version(), "2.0.0");
    }

    #[tokio::test]
    async fn info_renders_web_url_with_current_versions() {
        let service = service(ARGUS);
        let source = source_returning(&["1.2.0"]);
        service.check_latest(&source).await.unwrap();

        let info = service.info();

        assert_eq!(info.url, "https://github.com/release-argus/Argus");
        assert_eq!(
            info.web_url,
            "https://github.com/release-argus/Argus/releases/tag/1.2.0"
        );
        assert_eq!(info.get("service_id"), Some("argus"));
        assert_eq!(info.get("unknown"), None);
    }

    #[test]
    fn check_values_nests_each_part() {
        let mut service = service(
            r#"
service:
  broken:
    options:
      interval: soon
    latest_version:
      type: github
      url: owner/repo
    deployed_version:
      url: https://example.com/version
"#,
        );

        let errs = service.check_values().unwrap_err();

        assert_eq!(
            errs.lines(),
            vec![
                "options:",
                "  interval: \"soon\" <invalid> (Use 'AhBmCs' duration format)",
                "deployed_version:",
                "  method: <required> (here)",
            ]
        );
    }
}
