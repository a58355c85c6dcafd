use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{ConfigError, ErrorTree};
use crate::resolve::resolve;
use crate::service::{Service, ServiceDefaults};
use crate::webhook::{self, WebHook, WebHooks};

// =============================================================================
// Time-related constants
// =============================================================================

/// Delay between starting each service's tracking task
pub const SERVICE_STAGGER_DELAY: Duration = Duration::from_secs(2);

/// How long a deployed-version response may be reused by a cache-allowed query
pub const QUERY_CACHE_TTL: Duration = Duration::from_secs(5);

// =============================================================================
// Hard defaults
// =============================================================================

pub const DEFAULT_INTERVAL: &str = "10m";
pub const DEFAULT_SEMANTIC_VERSIONING: bool = true;
pub const DEFAULT_ALLOW_INVALID_CERTS: bool = false;
pub const DEFAULT_USE_PRERELEASE: bool = false;
pub const DEFAULT_AUTO_APPROVE: bool = false;
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_LOG_TIMESTAMPS: bool = false;
pub const DEFAULT_WEBHOOK_DELAY: &str = "0s";
pub const DEFAULT_WEBHOOK_MAX_TRIES: u8 = 3;
/// 0 accepts any 2XX response
pub const DEFAULT_WEBHOOK_DESIRED_STATUS_CODE: u16 = 0;
pub const DEFAULT_WEBHOOK_SILENT_FAILS: bool = false;

pub const LOG_LEVELS: &[&str] = &["ERROR", "WARN", "INFO", "VERBOSE", "DEBUG"];

/// Log settings group
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    pub timestamps: Option<bool>,
    pub level: Option<String>,
}

/// Process settings: command-line flags over the config file over hard defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    #[serde(skip)]
    pub from_flags: LogSettings,
}

impl Settings {
    pub fn log_level(&self) -> String {
        resolve(
            self.from_flags.level.as_deref(),
            self.log.level.as_deref(),
            DEFAULT_LOG_LEVEL,
        )
        .to_uppercase()
    }

    pub fn log_timestamps(&self) -> bool {
        resolve(
            self.from_flags.timestamps,
            self.log.timestamps,
            DEFAULT_LOG_TIMESTAMPS,
        )
    }

    pub fn check_values(&self) -> Result<(), ErrorTree> {
        let mut log = ErrorTree::new();
        let level = self.log_level();
        if !LOG_LEVELS.contains(&level.as_str()) {
            log.push(format!(
                "level: {level:?} <invalid> (only ERROR, WARN, INFO, VERBOSE or DEBUG are allowed)"
            ));
        }

        let mut errs = ErrorTree::new();
        errs.section("log", log);
        errs.into_result()
    }
}

/// User-declared defaults, one tier above the hard defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub service: ServiceDefaults,
    pub webhook: WebHook,
}

impl Defaults {
    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        errs.section_result("service", self.service.check_values());
        errs.section_result("webhook", self.webhook.check_values());
        errs.into_result()
    }
}

/// Top-level config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
    pub defaults: Defaults,
    pub webhook: WebHooks,
    pub service: IndexMap<String, Service>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a config and link every entity to its defaults.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.init();
        Ok(config)
    }

    fn init(&mut self) {
        let webhook_defaults = Arc::new(self.defaults.webhook.clone());
        for (id, hook) in self.webhook.iter_mut() {
            hook.init(id, None, Some(Arc::clone(&webhook_defaults)));
        }
        let links = self.defaults.service.link(webhook_defaults, &self.webhook);
        for (id, service) in self.service.iter_mut() {
            service.init(id, &links);
        }
    }

    /// Validate everything, aggregating failures per section.
    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        errs.section_result("settings", self.settings.check_values());
        errs.section_result("defaults", self.defaults.check_values());
        errs.section_result("webhook", webhook::check_webhooks(&mut self.webhook));

        let mut services = ErrorTree::new();
        let mut ids: Vec<&String> = self.service.keys().collect();
        ids.sort();
        let ids: Vec<String> = ids.into_iter().cloned().collect();
        for id in ids {
            if let Some(service) = self.service.get_mut(&id) {
                services.section_result(id.clone(), service.check_values());
            }
        }
        errs.section("service", services);

        errs.into_result()?;
        // Shared copies were taken before normalization
        self.init();
        Ok(())
    }

    /// Services in config order, ready to be tracked.
    pub fn into_services(self) -> Vec<Arc<Service>> {
        self.service.into_values().map(Arc::new).collect()
    }
}
