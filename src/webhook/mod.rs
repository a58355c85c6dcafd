//! Outgoing webhooks fired when a service's version changes
//!
//! A webhook under a service may reference a top-level one of the same name
//! (its Main). Every value resolves self, then Main, then the declared
//! defaults, then the hard default.

mod verify;

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::config::{
    DEFAULT_ALLOW_INVALID_CERTS, DEFAULT_WEBHOOK_DELAY, DEFAULT_WEBHOOK_DESIRED_STATUS_CODE,
    DEFAULT_WEBHOOK_MAX_TRIES, DEFAULT_WEBHOOK_SILENT_FAILS,
};
use crate::duration;
use crate::resolve::{first_non_empty, first_some};

pub use verify::check_webhooks;

pub const SUPPORTED_TYPES: &[&str] = &["github", "gitlab"];

/// Webhooks keyed by id, in declaration order
pub type WebHooks = IndexMap<String, WebHook>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebHook {
    #[serde(skip)]
    pub id: String,
    /// Signing scheme, `github` or `gitlab`
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub allow_invalid_certs: Option<bool>,
    pub secret: String,
    pub custom_headers: IndexMap<String, String>,
    /// 0 accepts any 2XX
    pub desired_status_code: Option<u16>,
    pub delay: String,
    pub max_tries: Option<u8>,
    pub silent_fails: Option<bool>,

    #[serde(skip)]
    pub main: Option<Arc<WebHook>>,
    #[serde(skip)]
    pub defaults: Option<Arc<WebHook>>,
}

impl WebHook {
    /// Link to the top-level webhook of the same id (if any) and the declared defaults.
    pub fn init(&mut self, id: &str, main: Option<Arc<WebHook>>, defaults: Option<Arc<WebHook>>) {
        self.id = id.to_string();
        self.main = main;
        self.defaults = defaults;
    }

    fn main(&self) -> Option<&WebHook> {
        self.main.as_deref()
    }

    fn defaults(&self) -> Option<&WebHook> {
        self.defaults.as_deref()
    }

    fn resolve_str<'a>(&'a self, field: impl Fn(&'a WebHook) -> &'a str) -> &'a str {
        first_non_empty([
            field(self),
            self.main().map(&field).unwrap_or_default(),
            self.defaults().map(&field).unwrap_or_default(),
        ])
    }

    fn resolve_opt<T: Copy>(&self, field: impl Fn(&WebHook) -> Option<T>) -> Option<T> {
        first_some([
            field(self),
            self.main().and_then(&field),
            self.defaults().and_then(&field),
        ])
    }

    pub fn kind(&self) -> &str {
        self.resolve_str(|h| h.kind.as_str())
    }

    pub fn url(&self) -> &str {
        self.resolve_str(|h| h.url.as_str())
    }

    pub fn secret(&self) -> &str {
        self.resolve_str(|h| h.secret.as_str())
    }

    pub fn delay(&self) -> &str {
        match self.resolve_str(|h| h.delay.as_str()) {
            "" => DEFAULT_WEBHOOK_DELAY,
            delay => delay,
        }
    }

    pub fn delay_duration(&self) -> Duration {
        duration::parse(self.delay()).unwrap_or_default()
    }

    pub fn allow_invalid_certs(&self) -> bool {
        self.resolve_opt(|h| h.allow_invalid_certs)
            .unwrap_or(DEFAULT_ALLOW_INVALID_CERTS)
    }

    pub fn desired_status_code(&self) -> u16 {
        self.resolve_opt(|h| h.desired_status_code)
            .unwrap_or(DEFAULT_WEBHOOK_DESIRED_STATUS_CODE)
    }

    pub fn max_tries(&self) -> u8 {
        self.resolve_opt(|h| h.max_tries)
            .unwrap_or(DEFAULT_WEBHOOK_MAX_TRIES)
    }

    pub fn silent_fails(&self) -> bool {
        self.resolve_opt(|h| h.silent_fails)
            .unwrap_or(DEFAULT_WEBHOOK_SILENT_FAILS)
    }

    /// Headers from defaults, then Main, then this webhook; later tiers win per key.
    pub fn custom_headers(&self) -> IndexMap<String, String> {
        let mut headers = IndexMap::new();
        for tier in [self.defaults(), self.main(), Some(self)].into_iter().flatten() {
            for (key, value) in &tier.custom_headers {
                headers.insert(key.clone(), value.clone());
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(own: WebHook, main: WebHook, defaults: WebHook) -> WebHook {
        let mut hook = own;
        hook.init("release", Some(Arc::new(main)), Some(Arc::new(defaults)));
        hook
    }

    #[test]
    fn values_resolve_self_then_main_then_defaults() {
        let hook = linked(
            WebHook {
                url: "https://own.example.com".to_string(),
                ..Default::default()
            },
            WebHook {
                url: "https://main.example.com".to_string(),
                secret: "main-secret".to_string(),
                max_tries: Some(5),
                ..Default::default()
            },
            WebHook {
                kind: "gitlab".to_string(),
                secret: "default-secret".to_string(),
                delay: "1m".to_string(),
                silent_fails: Some(true),
                ..Default::default()
            },
        );

        assert_eq!(hook.id, "release");
        assert_eq!(hook.url(), "https://own.example.com");
        assert_eq!(hook.secret(), "main-secret");
        assert_eq!(hook.kind(), "gitlab");
        assert_eq!(hook.delay(), "1m");
        assert_eq!(hook.delay_duration(), Duration::from_secs(60));
        assert_eq!(hook.max_tries(), 5);
        assert!(hook.silent_fails());
    }

    #[test]
    fn unset_values_fall_back_to_hard_defaults() {
        let hook = WebHook::default();

        assert_eq!(hook.delay(), DEFAULT_WEBHOOK_DELAY);
        assert_eq!(hook.delay_duration(), Duration::ZERO);
        assert_eq!(hook.max_tries(), DEFAULT_WEBHOOK_MAX_TRIES);
        assert_eq!(hook.desired_status_code(), DEFAULT_WEBHOOK_DESIRED_STATUS_CODE);
        assert_eq!(hook.silent_fails(), DEFAULT_WEBHOOK_SILENT_FAILS);
        assert_eq!(hook.allow_invalid_certs(), DEFAULT_ALLOW_INVALID_CERTS);
    }

    #[test]
    fn custom_headers_merge_with_own_values_winning() {
        let hook = linked(
            WebHook {
                custom_headers: IndexMap::from([("X-Env".to_string(), "prod".to_string())]),
                ..Default::default()
            },
            WebHook {
                custom_headers: IndexMap::from([
                    ("X-Env".to_string(), "staging".to_string()),
                    ("X-Team".to_string(), "ops".to_string()),
                ]),
                ..Default::default()
            },
            WebHook::default(),
        );

        let headers = hook.custom_headers();

        assert_eq!(headers["X-Env"], "prod");
        assert_eq!(headers["X-Team"], "ops");
    }
}
