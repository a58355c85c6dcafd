//! Subscriber setup for the binary. Library code only emits `tracing` events.

use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Map a configured log level onto a tracing filter directive.
pub fn filter_directive(level: &str) -> Option<&'static str> {
    match level.to_uppercase().as_str() {
        "ERROR" => Some("error"),
        "WARN" => Some("warn"),
        "INFO" => Some("info"),
        "VERBOSE" => Some("debug"),
        "DEBUG" => Some("trace"),
        _ => None,
    }
}

/// Install the global subscriber from the resolved settings.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init(settings: &Settings) -> anyhow::Result<()> {
    let directive = filter_directive(&settings.log_level()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if settings.log_timestamps() {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}
