//! Deployed-version lookup: what version a service is actually running
//!
//! - [`refresh`]: per-call overrides and the persist/announce decision
//! - [`query`]: executor trait and its HTTP implementation

pub mod query;
pub mod refresh;

use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;

use crate::config::DEFAULT_ALLOW_INVALID_CERTS;
use crate::error::ErrorTree;
use crate::resolve::resolve;
use crate::service::options::Options;
use crate::service::status::Status;
use crate::template;

pub use query::DeployedVersionExecutor;
pub use refresh::{LookupOverrides, RefreshOutcome};

pub const SUPPORTED_METHODS: &[&str] = &["GET", "POST"];

/// Basic auth credentials for the request
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Request header
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Header {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupDefaults {
    pub allow_invalid_certs: Option<bool>,
}

/// Query definition for a service's deployed version.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Lookup {
    pub method: String,
    pub url: String,
    pub allow_invalid_certs: Option<bool>,
    pub basic_auth: Option<BasicAuth>,
    pub headers: Vec<Header>,
    pub body: Option<String>,
    /// Dotted path into a JSON response, e.g. `data.version`
    pub json: String,
    pub regex: String,
    /// `$1`-style expansion of the regex match
    pub regex_template: Option<String>,

    #[serde(skip)]
    pub options: Options,
    #[serde(skip)]
    pub status: Arc<Status>,
    #[serde(skip)]
    pub defaults: Arc<LookupDefaults>,
}

/// Equal when every query-affecting value matches. Status is ignored.
impl PartialEq for Lookup {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.url == other.url
            && self.allow_invalid_certs == other.allow_invalid_certs
            && self.basic_auth == other.basic_auth
            && self.headers == other.headers
            && self.body == other.body
            && self.json == other.json
            && self.regex == other.regex
            && self.regex_template == other.regex_template
            && self.options == other.options
            && self.defaults == other.defaults
    }
}

impl Lookup {
    /// Link to the service's options, status and declared defaults.
    pub fn init(
        &mut self,
        options: Options,
        status: Arc<Status>,
        defaults: Arc<LookupDefaults>,
    ) {
        self.options = options;
        self.status = status;
        self.defaults = defaults;
    }

    pub fn allow_invalid_certs(&self) -> bool {
        resolve(
            self.allow_invalid_certs,
            self.defaults.allow_invalid_certs,
            DEFAULT_ALLOW_INVALID_CERTS,
        )
    }

    /// Structural checks; upper-cases the method in place.
    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();

        self.method = self.method.to_uppercase();
        if self.method.is_empty() {
            errs.push("method: <required> (here)");
        } else if !SUPPORTED_METHODS.contains(&self.method.as_str()) {
            errs.push(format!(
                "method: {:?} <invalid> (only {} are allowed)",
                self.method,
                SUPPORTED_METHODS.join(", ")
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
        if self.regex_template.as_deref().is_some_and(|t| !t.is_empty()) && self.regex.is_empty()
        {
            errs.push("regex_template: <invalid> (only usable with a regex)");
        }

        errs.into_result()
    }
}
