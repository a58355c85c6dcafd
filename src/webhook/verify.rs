use crate::duration;
use crate::error::ErrorTree;
use crate::template;
use crate::webhook::{SUPPORTED_TYPES, WebHook, WebHooks};

impl WebHook {
    /// Check this webhook is ready for delivery; normalizes a bare-integer delay in place.
    ///
    /// Signing requirements only apply to webhooks linked into the delivery
    /// chain (not the declared defaults themselves) that resolve a type.
    pub fn check_values(&mut self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();

        if let Some(err) = duration::check("delay", &mut self.delay) {
            errs.push(err);
        }

        if !template::check(&self.url) {
            errs.push(format!(
                "url: {:?} <invalid> (didn't pass templating)",
                self.url
            ));
        }

        if self.defaults.is_some() && !self.kind().is_empty() {
            if !SUPPORTED_TYPES.contains(&self.kind()) {
                errs.push(format!(
                    "type: {:?} <invalid> (supported types = {:?})",
                    self.kind(),
                    SUPPORTED_TYPES
                ));
            }
            if self.url().is_empty() {
                errs.push(format!(
                    "url: <required> (here, or in webhook.{})",
                    self.id
                ));
            }
            if self.secret().is_empty() {
                errs.push(format!(
                    "secret: <required> (here, or in webhook.{})",
                    self.id
                ));
            }
        }

        let mut headers = ErrorTree::new();
        for (key, value) in &self.custom_headers {
            if !template::check(value) {
                headers.push(format!("{key}: {value:?} <invalid> (didn't pass templating)"));
            }
        }
        errs.section("custom_headers", headers);

        errs.into_result()
    }
}

/// Check every webhook in `hooks`, reporting failures under each id in sorted order.
pub fn check_webhooks(hooks: &mut WebHooks) -> Result<(), ErrorTree> {
    let mut ids: Vec<String> = hooks.keys().cloned().collect();
    ids.sort();

    let mut errs = ErrorTree::new();
    for id in ids {
        if let Some(hook) = hooks.get_mut(&id) {
            errs.section_result(id, hook.check_values());
        }
    }
    errs.into_result()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexMap;
    use rstest::rstest;

    use super::*;

    fn linked(own: WebHook, main: Option<WebHook>) -> WebHook {
        let mut hook = own;
        hook.init(
            "release",
            main.map(Arc::new),
            Some(Arc::new(WebHook::default())),
        );
        hook
    }

    fn github(secret: &str) -> WebHook {
        WebHook {
            kind: "github".to_string(),
            url: "https://ci.example.com/hook".to_string(),
            secret: secret.to_string(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("5", "5s", true)]
    #[case("1m30s", "1m30s", true)]
    #[case("", "", true)]
    #[case("5x", "5x", false)]
    fn check_values_normalizes_and_validates_delay(
        #[case] delay: &str,
        #[case] normalized: &str,
        #[case] valid: bool,
    ) {
        let mut hook = WebHook {
            delay: delay.to_string(),
            ..Default::default()
        };

        let result = hook.check_values();

        assert_eq!(hook.delay, normalized);
        assert_eq!(result.is_ok(), valid);
        if let Err(errs) = result {
            assert_eq!(
                errs.lines(),
                vec!["delay: \"5x\" <invalid> (Use 'AhBmCs' duration format)"]
            );
        }
    }

    #[test]
    fn check_values_requires_secret_for_signed_webhook() {
        let mut hook = linked(github(""), None);

        let errs = hook.check_values().unwrap_err();

        assert_eq!(
            errs.lines(),
            vec!["secret: <required> (here, or in webhook.release)"]
        );
    }

    #[test]
    fn check_values_accepts_secret_from_main() {
        let mut hook = linked(github(""), Some(github("main-secret")));

        assert!(hook.check_values().is_ok());
    }

    #[test]
    fn check_values_reports_each_signing_problem_independently() {
        let mut hook = linked(
            WebHook {
                kind: "bitbucket".to_string(),
                ..Default::default()
            },
            None,
        );

        let errs = hook.check_values().unwrap_err();

        assert_eq!(
            errs.lines(),
            vec![
                "type: \"bitbucket\" <invalid> (supported types = [\"github\", \"gitlab\"])",
                "url: <required> (here, or in webhook.release)",
                "secret: <required> (here, or in webhook.release)",
            ]
        );
    }

    #[test]
    fn check_values_skips_signing_checks_for_declared_defaults() {
        let mut defaults = WebHook {
            kind: "github".to_string(),
            ..Default::default()
        };

        assert!(defaults.check_values().is_ok());
    }

    #[test]
    fn check_values_validates_url_template_without_type() {
        let mut hook = WebHook {
            url: "https://ci.example.com/{{ version".to_string(),
            ..Default::default()
        };

        let errs = hook.check_values().unwrap_err();

        assert_eq!(
            errs.lines(),
            vec!["url: \"https://ci.example.com/{{ version\" <invalid> (didn't pass templating)"]
        );
    }

    #[test]
    fn check_values_nests_header_errors() {
        let mut hook = WebHook {
            delay: "5x".to_string(),
            custom_headers: IndexMap::from([
                ("X-Ok".to_string(), "{{ version }}".to_string()),
                ("X-Bad".to_string(), "{{ version".to_string()),
            ]),
            ..Default::default()
        };

        let errs = hook.check_values().unwrap_err();

        assert_eq!(
            errs.lines(),
            vec![
                "delay: \"5x\" <invalid> (Use 'AhBmCs' duration format)",
                "custom_headers:",
                "  X-Bad: \"{{ version\" <invalid> (didn't pass templating)",
            ]
        );
    }

    #[test]
    fn check_webhooks_reports_every_member_sorted() {
        let mut hooks = WebHooks::new();
        hooks.insert(
            "zulu".to_string(),
            WebHook {
                delay: "later".to_string(),
                ..Default::default()
            },
        );
        hooks.insert("mike".to_string(), WebHook::default());
        hooks.insert(
            "alpha".to_string(),
            WebHook {
                delay: "5x".to_string(),
                ..Default::default()
            },
        );

        let errs = check_webhooks(&mut hooks).unwrap_err();

        assert_eq!(
            errs.lines(),
            vec![
                "alpha:",
                "  delay: \"5x\" <invalid> (Use 'AhBmCs' duration format)",
                "zulu:",
                "  delay: \"later\" <invalid> (Use 'AhBmCs' duration format)",
            ]
        );
    }
}
