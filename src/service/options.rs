use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{DEFAULT_INTERVAL, DEFAULT_SEMANTIC_VERSIONING};
use crate::duration;
use crate::error::ErrorTree;
use crate::resolve::resolve;

/// Declared defaults for [`Options`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptionsDefaults {
    pub interval: Option<String>,
    pub semantic_versioning: Option<bool>,
}

/// Polling options of a service.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    pub interval: Option<String>,
    pub semantic_versioning: Option<bool>,
    #[serde(skip)]
    pub defaults: Arc<OptionsDefaults>,
}

impl Options {
    pub fn new(
        interval: Option<String>,
        semantic_versioning: Option<bool>,
        defaults: Arc<OptionsDefaults>,
    ) -> Self {
        Self {
            interval,
            semantic_versioning,
            defaults,
        }
    }

    pub fn interval(&self) -> String {
        resolve(
            self.interval.as_deref(),
            self.defaults.interval.as_deref(),
            DEFAULT_INTERVAL,
        )
        .to_string()
    }

    /// Interval between queries. Unparseable values fall back to the hard default.
    pub fn interval_duration(&self) -> Duration {
        duration::parse(&self.interval())
            .or_else(|_| duration::parse(DEFAULT_INTERVAL))
            .unwrap_or(Duration::from_secs(600))
    }

    pub fn semantic_versioning(&self) -> bool {
        resolve(
            self.semantic_versioning,
            self.defaults.semantic_versioning,
            DEFAULT_SEMANTIC_VERSIONING,
        )
    }

    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        if let Some(err) = self.interval.as_mut().and_then(check_interval) {
            errs.push(err);
        }
        errs.into_result()
    }
}

impl OptionsDefaults {
    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        if let Some(err) = self.interval.as_mut().and_then(check_interval) {
            errs.push(err);
        }
        errs.into_result()
    }
}

/// A well-formed, non-zero polling interval.
fn check_interval(interval: &mut String) -> Option<String> {
    if let Some(err) = duration::check("interval", interval) {
        return Some(err);
    }
    match duration::parse(interval) {
        Ok(d) if d.is_zero() => Some(format!(
            "interval: {interval:?} <invalid> (must be greater than 0s)"
        )),
        _ => None,
    }
}
