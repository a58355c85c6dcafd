#[cfg(test)]
use mockall::automock;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::QueryError;
use crate::semver::parse_version;
use crate::service::deployed_version::Lookup;
use crate::service::http::{HttpQuerier, extract_with_regex};

/// Runs a deployed-version query.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait DeployedVersionExecutor: Send + Sync {
    /// Fetch and extract the version `lookup` describes
    ///
    /// # Arguments
    /// * `lookup` - Request and extraction settings
    /// * `use_cache` - Whether a recently fetched response may be reused
    async fn query(&self, lookup: &Lookup, use_cache: bool) -> Result<String, QueryError>;
}

impl HttpQuerier {
    async fn fetch_deployed(&self, lookup: &Lookup, use_cache: bool) -> Result<String, QueryError> {
        let body = lookup.body.as_deref().unwrap_or_default();
        let cache_key = cache_key(lookup, body);
        if use_cache && let Some(cached) = self.cached(&cache_key) {
            return Ok(cached);
        }

        let client = self.client(lookup.allow_invalid_certs());
        let mut request = match lookup.method.as_str() {
            "POST" => client.post(&lookup.url).body(body.to_string()),
            _ => client.get(&lookup.url),
        };
        for header in &lookup.headers {
            request = request.header(header.key.as_str(), header.value.as_str());
        }
        if let Some(auth) = &lookup.basic_auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(
                service = lookup.status.service_id(),
                "{} returned status {}", lookup.url, status
            );
            return Err(QueryError::Status {
                status: status.as_u16(),
                url: lookup.url.clone(),
            });
        }

        let text = response.text().await?;
        if use_cache {
            self.store(cache_key, text.clone());
        }
        Ok(text)
    }
}

/// Everything that shapes the request, so a lookup with different credentials,
/// headers or certificate handling never reuses another's response.
fn cache_key(lookup: &Lookup, body: &str) -> String {
    let mut headers: Vec<String> = lookup
        .headers
        .iter()
        .map(|h| format!("{}={}", h.key.to_lowercase(), h.value))
        .collect();
    headers.sort();
    let auth = lookup
        .basic_auth
        .as_ref()
        .map(|a| format!("{}:{}", a.username, a.password))
        .unwrap_or_default();
    format!(
        "{} {} {} {:?} {} {}",
        lookup.method,
        lookup.url,
        body,
        headers,
        auth,
        lookup.allow_invalid_certs()
    )
}

/// Pull the version out of a response body.
///
/// JSON path first, then regex over the result. With semantic versioning on,
/// the result must parse as a semantic version.
pub fn extract_version(lookup: &Lookup, body: &str) -> Result<String, QueryError> {
    let mut version = body.to_string();

    if !lookup.json.is_empty() {
        version = select_json(&lookup.json, body, &lookup.url)?;
    }

    if !lookup.regex.is_empty() {
        version = extract_with_regex(
            &lookup.regex,
            lookup.regex_template.as_deref(),
            &version,
            &lookup.url,
        )?;
    }

    let version = version.trim().to_string();
    if version.is_empty() {
        return Err(QueryError::Empty {
            url: lookup.url.clone(),
        });
    }

    if lookup.options.semantic_versioning() && parse_version(&version).is_none() {
        return Err(QueryError::SemanticVersion { version });
    }

    Ok(version)
}

fn select_json(path: &str, body: &str, url: &str) -> Result<String, QueryError> {
    let json_error = |details: String| QueryError::Json {
        path: path.to_string(),
        url: url.to_string(),
        details,
    };

    let value: Value = serde_json::from_str(body).map_err(|e| json_error(e.to_string()))?;
    let selector = format!("$.{path}");
    let selected =
        jsonpath_lib::select(&value, &selector).map_err(|e| json_error(format!("{e:?}")))?;

    match selected.first() {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(json_error(format!("value is not a scalar: {other}"))),
        None => Err(json_error("path not found".to_string())),
    }
}

#[async_trait::async_trait]
impl DeployedVersionExecutor for HttpQuerier {
    async fn query(&self, lookup: &Lookup, use_cache: bool) -> Result<String, QueryError> {
        let body = self.fetch_deployed(lookup, use_cache).await?;
        let version = extract_version(lookup, &body)?;
        debug!(
            service = lookup.status.service_id(),
            "Deployed version {:?} from {}", version, lookup.url
        );
        Ok(version)
    }
}
