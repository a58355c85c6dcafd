//! HTTP client shared by the latest-version and deployed-version queries

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use regex::Regex;
use tracing::debug;

use crate::config::QUERY_CACHE_TTL;
use crate::error::QueryError;

/// Default base URL for the GitHub API
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

struct CachedBody {
    fetched_at: Instant,
    body: String,
}

/// Executes version queries over HTTP.
///
/// Holds one strict client and one that tolerates invalid certificates,
/// selected per lookup.
pub struct HttpQuerier {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    pub(crate) github_base_url: String,
    cache: Mutex<HashMap<String, CachedBody>>,
}

impl HttpQuerier {
    /// Creates a new HttpQuerier against a custom GitHub API base URL
    pub fn new(github_base_url: &str) -> Result<Self, reqwest::Error> {
        let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        Ok(Self {
            client: reqwest::Client::builder().user_agent(user_agent).build()?,
            insecure_client: reqwest::Client::builder()
                .user_agent(user_agent)
                .danger_accept_invalid_certs(true)
                .build()?,
            github_base_url: github_base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn client(&self, allow_invalid_certs: bool) -> &reqwest::Client {
        if allow_invalid_certs {
            &self.insecure_client
        } else {
            &self.client
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, CachedBody>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A response body fetched for `key` within the cache TTL
    pub(crate) fn cached(&self, key: &str) -> Option<String> {
        let cache = self.lock_cache();
        let entry = cache.get(key)?;
        if entry.fetched_at.elapsed() < QUERY_CACHE_TTL {
            debug!("Using cached response for {}", key);
            Some(entry.body.clone())
        } else {
            None
        }
    }

    pub(crate) fn store(&self, key: String, body: String) {
        let mut cache = self.lock_cache();
        cache.retain(|_, entry| entry.fetched_at.elapsed() < QUERY_CACHE_TTL);
        cache.insert(
            key,
            CachedBody {
                fetched_at: Instant::now(),
                body,
            },
        );
    }
}

/// Extract a version from `text` with `pattern`.
///
/// With a template, `$1`-style references are expanded from the first match.
/// Without one, capture group 1 is used when the pattern has it, else the whole match.
pub(crate) fn extract_with_regex(
    pattern: &str,
    template: Option<&str>,
    text: &str,
    target: &str,
) -> Result<String, QueryError> {
    let re = Regex::new(pattern).map_err(|source| QueryError::RegexInvalid {
        pattern: pattern.to_string(),
        source,
    })?;
    let captures = re.captures(text).ok_or_else(|| QueryError::RegexNoMatch {
        pattern: pattern.to_string(),
        target: target.to_string(),
    })?;

    if let Some(template) = template.filter(|t| !t.is_empty()) {
        let mut expanded = String::new();
        captures.expand(template, &mut expanded);
        return Ok(expanded);
    }

    let matched = captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Ok(matched)
}
