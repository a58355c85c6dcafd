//! Release tracking: watches services for new releases and deployed-version
//! drift, and fans each detected change out to notifiers and webhooks once.

pub mod config;
pub mod duration;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod resolve;
pub mod semver;
pub mod service;
pub mod template;
pub mod webhook;
