use std::sync::Arc;

use serde::Deserialize;

use crate::config::DEFAULT_AUTO_APPROVE;
use crate::error::ErrorTree;
use crate::resolve::resolve;
use crate::template;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardDefaults {
    pub auto_approve: Option<bool>,
}

/// Presentation options for a service.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardOptions {
    pub auto_approve: Option<bool>,
    pub icon: String,
    pub icon_link_to: String,
    /// Templated link shown alongside notifications
    pub web_url: String,
    #[serde(skip)]
    pub defaults: Arc<DashboardDefaults>,
}

impl DashboardOptions {
    pub fn auto_approve(&self) -> bool {
        resolve(
            self.auto_approve,
            self.defaults.auto_approve,
            DEFAULT_AUTO_APPROVE,
        )
    }

    pub fn check_values(&self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        if !template::check(&self.web_url) {
            errs.push(format!(
                "web_url: {:?} <invalid> (didn't pass templating)",
                self.web_url
            ));
        }
        errs.into_result()
    }
}
