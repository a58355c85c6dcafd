//! Per-call overrides and the refresh decision for deployed-version lookups

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::{ErrorTree, RefreshError};
use crate::service::deployed_version::query::DeployedVersionExecutor;
use crate::service::deployed_version::{BasicAuth, Header, Lookup};
use crate::service::options::Options;
use crate::service::status::Status;

/// Transient values that supersede a stored [`Lookup`] for one call.
///
/// Every field is the raw string supplied by the caller; `None` keeps the
/// stored value. `basic_auth` and `headers` are JSON patches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOverrides {
    pub allow_invalid_certs: Option<String>,
    pub basic_auth: Option<String>,
    pub body: Option<String>,
    pub headers: Option<String>,
    pub json: Option<String>,
    pub method: Option<String>,
    pub regex: Option<String>,
    pub regex_template: Option<String>,
    pub semantic_versioning: Option<String>,
    pub url: Option<String>,
}

/// Result of a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub version: String,
    /// The change was committed to the shared status and should be announced
    pub announce: bool,
}

#[derive(Debug, Deserialize)]
struct BasicAuthPatch {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HeaderPatch {
    key: String,
    value: Option<String>,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Patch `previous` credentials with a JSON payload.
///
/// Keys missing from the payload keep their previous value. A malformed
/// payload is logged and `previous` is returned unchanged.
pub fn basic_auth_from_str(
    json: Option<&str>,
    previous: Option<&BasicAuth>,
    service_id: &str,
) -> Option<BasicAuth> {
    let Some(json) = json else {
        return previous.cloned();
    };

    let patch: BasicAuthPatch = match serde_json::from_str(json) {
        Ok(patch) => patch,
        Err(e) => {
            error!(service = service_id, "Failed converting JSON - {:?}: {}", json, e);
            return previous.cloned();
        }
    };

    let previous = previous.cloned().unwrap_or_default();
    Some(BasicAuth {
        username: patch.username.unwrap_or(previous.username),
        password: patch.password.unwrap_or(previous.password),
    })
}

/// Patch `previous` headers with a JSON array of `{"key", "value"}` objects.
///
/// Headers are matched by key (case-insensitive). A matched header takes the
/// patch value, or keeps its own when the patch omits `value`. Unmatched
/// patch entries are appended, unmentioned previous headers are kept. A
/// malformed payload is logged and `previous` is returned unchanged.
pub fn headers_from_str(json: Option<&str>, previous: &[Header], service_id: &str) -> Vec<Header> {
    let Some(json) = json else {
        return previous.to_vec();
    };

    let patches: Vec<HeaderPatch> = match serde_json::from_str(json) {
        Ok(patches) => patches,
        Err(e) => {
            error!(service = service_id, "Failed converting JSON - {:?}: {}", json, e);
            return previous.to_vec();
        }
    };

    let mut headers = previous.to_vec();
    for patch in patches {
        match headers
            .iter_mut()
            .find(|h| h.key.eq_ignore_ascii_case(&patch.key))
        {
            Some(header) => {
                if let Some(value) = patch.value {
                    header.value = value;
                }
            }
            None => headers.push(Header {
                key: patch.key,
                value: patch.value.unwrap_or_default(),
            }),
        }
    }
    headers
}

impl Lookup {
    /// Build a new Lookup from this one with `overrides` applied.
    ///
    /// The result shares this lookup's declared defaults but gets a fresh
    /// status, so nothing done with it reaches the stored one.
    pub fn apply_overrides(&self, overrides: &LookupOverrides) -> Result<Lookup, ErrorTree> {
        let service_id = self.status.service_id();

        let allow_invalid_certs = match overrides.allow_invalid_certs.as_deref() {
            Some(value) => parse_bool(value),
            None => self.allow_invalid_certs,
        };
        let semantic_versioning = match overrides.semantic_versioning.as_deref() {
            Some(value) => parse_bool(value),
            None => self.options.semantic_versioning,
        };
        let options = Options::new(
            self.options.interval.clone(),
            semantic_versioning,
            Arc::clone(&self.options.defaults),
        );

        let mut lookup = Lookup {
            method: overrides.method.clone().unwrap_or_else(|| self.method.clone()),
            url: overrides.url.clone().unwrap_or_else(|| self.url.clone()),
            allow_invalid_certs,
            basic_auth: basic_auth_from_str(
                overrides.basic_auth.as_deref(),
                self.basic_auth.as_ref(),
                service_id,
            ),
            headers: headers_from_str(overrides.headers.as_deref(), &self.headers, service_id),
            body: overrides.body.clone().or_else(|| self.body.clone()),
            json: overrides.json.clone().unwrap_or_else(|| self.json.clone()),
            regex: overrides.regex.clone().unwrap_or_else(|| self.regex.clone()),
            regex_template: overrides
                .regex_template
                .clone()
                .or_else(|| self.regex_template.clone()),
            options,
            status: Arc::new(Status::new(service_id)),
            defaults: Arc::clone(&self.defaults),
        };

        lookup.check_values().inspect_err(|errs| {
            error!(service = service_id, "Overrides failed validity check:\n{}", errs);
        })?;
        Ok(lookup)
    }

    /// Query the deployed version, with `overrides` applied for this call only.
    ///
    /// A changed version is committed to the shared status (and announced)
    /// only when none of the query-shaping overrides were given: headers,
    /// url, json, regex, regex_template, or a semantic-versioning toggle that
    /// differs from the stored one.
    pub async fn refresh(
        &self,
        executor: &dyn DeployedVersionExecutor,
        overrides: &LookupOverrides,
    ) -> Result<RefreshOutcome, RefreshError> {
        let lookup = self
            .apply_overrides(overrides)
            .map_err(RefreshError::Invalid)?;
        debug!(service = self.status.service_id(), "Refreshing with:\n{:?}", lookup);

        let overrides_present = overrides.headers.is_some()
            || self.options.semantic_versioning() != lookup.options.semantic_versioning()
            || overrides.url.is_some()
            || overrides.json.is_some()
            || overrides.regex.is_some()
            || overrides.regex_template.is_some();

        let version = executor.query(&lookup, !overrides_present).await?;

        let announce = !overrides_present && version != self.status.deployed_version();
        if announce {
            info!(
                service = self.status.service_id(),
                "Deployed version updated to {:?}", version
            );
            self.status.set_deployed_version(&version);
            self.status.announce_update();
        }

        Ok(RefreshOutcome { version, announce })
    }
}
