//! Latest-release lookup: where a service's newest published version comes from

#[cfg(test)]
use mockall::automock;

use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::config::{DEFAULT_ALLOW_INVALID_CERTS, DEFAULT_USE_PRERELEASE};
use crate::error::{ErrorTree, QueryError};
use crate::resolve::{first_non_empty, resolve};
use crate::semver::find_semantic_max;
use crate::service::http::{HttpQuerier, extract_with_regex};
use crate::template;

pub const SUPPORTED_TYPES: &[&str] = &["github", "url"];

/// Declared defaults for [`LatestVersionLookup`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LatestVersionDefaults {
    pub access_token: Option<String>,
    pub allow_invalid_certs: Option<bool>,
    pub use_prerelease: Option<bool>,
}

/// Where to look for new releases.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LatestVersionLookup {
    /// `github` (owner/repo releases) or `url` (any page)
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub access_token: Option<String>,
    pub allow_invalid_certs: Option<bool>,
    pub use_prerelease: Option<bool>,
    pub regex: String,

    #[serde(skip)]
    pub defaults: Arc<LatestVersionDefaults>,
}

impl LatestVersionLookup {
    pub fn init(&mut self, defaults: Arc<LatestVersionDefaults>) {
        self.defaults = defaults;
    }

    /// Token sent to GitHub, if any is set here or in the defaults
    pub fn access_token(&self) -> Option<&str> {
        let token = first_non_empty([
            self.access_token.as_deref().unwrap_or_default(),
            self.defaults.access_token.as_deref().unwrap_or_default(),
        ]);
        (!token.is_empty()).then_some(token)
    }

    pub fn allow_invalid_certs(&self) -> bool {
        resolve(
            self.allow_invalid_certs,
            self.defaults.allow_invalid_certs,
            DEFAULT_ALLOW_INVALID_CERTS,
        )
    }

    pub fn use_prerelease(&self) -> bool {
        resolve(
            self.use_prerelease,
            self.defaults.use_prerelease,
            DEFAULT_USE_PRERELEASE,
        )
    }

    /// Human-facing URL of the service being tracked
    pub fn service_url(&self) -> String {
        match self.kind.as_str() {
            "github" => format!("https://github.com/{}", self.url),
            _ => self.url.clone(),
        }
    }

    pub fn check_values(&self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        if !SUPPORTED_TYPES.contains(&self.kind.as_str()) {
            errs.push(format!(
                "type: {:?} <invalid> (supported types = {:?})",
                self.kind, SUPPORTED_TYPES
            ));
        }
        if self.url.is_empty() {
            errs.push("url: <required> (here)");
        } else if !template::check(&self.url) {
            errs.push(format!(
                "url: {:?} <invalid> (didn't pass templating)",
                self.url
            ));
        }
        if !self.regex.is_empty() && Regex::new(&self.regex).is_err() {
            errs.push(format!("regex: {:?} <invalid> (invalid RegEx)", self.regex));
        }
        errs.into_result()
    }
}

/// Source of a service's latest released version.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait LatestVersionSource: Send + Sync {
    /// Fetches the newest version for `lookup`
    ///
    /// # Arguments
    /// * `lookup` - Where and how to look
    /// * `semantic_versioning` - Pick the semantic maximum instead of publish order
    async fn latest_version(
        &self,
        lookup: &LatestVersionLookup,
        semantic_versioning: bool,
    ) -> Result<String, QueryError>;
}

/// Response from GitHub Releases API
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

impl HttpQuerier {
    async fn get_text(
        &self,
        lookup: &LatestVersionLookup,
        url: &str,
        accept: Option<&str>,
    ) -> Result<String, QueryError> {
        let mut request = self.client(lookup.allow_invalid_certs()).get(url);
        if let Some(accept) = accept {
            request = request.header("Accept", accept);
        }
        if let Some(token) = lookup.access_token() {
            request = request.header("Authorization", format!("token {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("{} returned status {}", url, status);
            return Err(QueryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    async fn github_latest(
        &self,
        lookup: &LatestVersionLookup,
        semantic_versioning: bool,
    ) -> Result<String, QueryError> {
        let url = format!("{}/repos/{}/releases", self.github_base_url, lookup.url);
        let body = self
            .get_text(lookup, &url, Some("application/vnd.github+json"))
            .await?;

        let releases: Vec<Release> =
            serde_json::from_str(&body).map_err(|e| QueryError::Json {
                path: "tag_name".to_string(),
                url: url.clone(),
                details: e.to_string(),
            })?;

        let regex = match lookup.regex.as_str() {
            "" => None,
            pattern => Some(Regex::new(pattern).map_err(|source| QueryError::RegexInvalid {
                pattern: pattern.to_string(),
                source,
            })?),
        };

        let tags: Vec<String> = releases
            .into_iter()
            .filter(|r| !r.draft && (lookup.use_prerelease() || !r.prerelease))
            .map(|r| r.tag_name)
            .filter(|tag| regex.as_ref().is_none_or(|re| re.is_match(tag)))
            .collect();

        if tags.is_empty() && regex.is_some() {
            return Err(QueryError::RegexNoMatch {
                pattern: lookup.regex.clone(),
                target: url,
            });
        }

        let chosen = if semantic_versioning {
            find_semantic_max(&tags).or_else(|| tags.first().cloned())
        } else {
            tags.first().cloned()
        };

        chosen
            .map(|tag| tag.strip_prefix('v').map(str::to_string).unwrap_or(tag))
            .ok_or(QueryError::Empty { url })
    }

    async fn url_latest(&self, lookup: &LatestVersionLookup) -> Result<String, QueryError> {
        let body = self.get_text(lookup, &lookup.url, None).await?;
        let version = if lookup.regex.is_empty() {
            body.trim().to_string()
        } else {
            extract_with_regex(&lookup.regex, None, &body, &lookup.url)?
        };

        if version.is_empty() {
            return Err(QueryError::Empty {
                url: lookup.url.clone(),
            });
        }
        Ok(version)
    }
}

#[async_trait::async_trait]
impl LatestVersionSource for HttpQuerier {
    async fn latest_version(
        &self,
        lookup: &LatestVersionLookup,
        semantic_versioning: bool,
    ) -> Result<String, QueryError> {
        match lookup.kind.as_str() {
            "github" => self.github_latest(lookup, semantic_versioning).await,
            _ => self.url_latest(lookup).await,
        }
    }
}
