//! Delivery collaborators for detected changes.
//!
//! The tracking loop fires these and forgets them; retries belong to the
//! implementation.

#[cfg(test)]
use mockall::automock;

use thiserror::Error;
use tracing::info;

use crate::service::ServiceInfo;
use crate::template;
use crate::webhook::WebHook;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed sending {kind} for {service}: {message}")]
    Delivery {
        kind: &'static str,
        service: String,
        message: String,
    },
}

/// Sends a message about a service.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message
    ///
    /// # Arguments
    /// * `title` - Message title, may be empty
    /// * `message` - Message body, may be empty
    /// * `info` - The service the message is about
    async fn send(&self, title: &str, message: &str, info: &ServiceInfo)
    -> Result<(), NotifyError>;
}

/// Delivers a webhook.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait WebHookSender: Send + Sync {
    async fn send(&self, hook: &WebHook, info: &ServiceInfo) -> Result<(), NotifyError>;
}

/// Notifier that writes each message to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        title: &str,
        message: &str,
        info: &ServiceInfo,
    ) -> Result<(), NotifyError> {
        let title = if title.is_empty() {
            format!("{} - New Release", info.id)
        } else {
            title.to_string()
        };
        let message = if message.is_empty() {
            format!("{} - {} released", info.id, info.latest_version)
        } else {
            message.to_string()
        };
        info!(service = %info.id, web_url = %info.web_url, "{}: {}", title, message);
        Ok(())
    }
}

/// Webhook sender that logs the rendered request instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LogWebHookSender;

#[async_trait::async_trait]
impl WebHookSender for LogWebHookSender {
    async fn send(&self, hook: &WebHook, info: &ServiceInfo) -> Result<(), NotifyError> {
        let url = template::render(hook.url(), info);
        if url.is_empty() {
            return Err(NotifyError::Delivery {
                kind: "webhook",
                service: info.id.clone(),
                message: format!("webhook {:?} has no url", hook.id),
            });
        }

        info!(
            service = %info.id,
            webhook = %hook.id,
            kind = hook.kind(),
            "{}",
            describe(hook, &url, info)
        );
        Ok(())
    }
}

/// One-line account of the request a webhook delivery would make.
fn describe(hook: &WebHook, url: &str, info: &ServiceInfo) -> String {
    let headers: Vec<String> = hook
        .custom_headers()
        .iter()
        .map(|(key, value)| format!("{key}={}", template::render(value, info)))
        .collect();
    let expecting = match hook.desired_status_code() {
        0 => "2XX".to_string(),
        code => code.to_string(),
    };
    format!(
        "WebHook to {} (headers: {:?}, expecting {}, up to {} tries, allow_invalid_certs={})",
        url,
        headers,
        expecting,
        hook.max_tries(),
        hook.allow_invalid_certs()
    )
}
