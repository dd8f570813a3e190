//! Outbound customer notifications.
//!
//! Delivery is fire-and-forget from the workflow's point of view: callers log
//! a failed send and carry on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{config::MailConfig, dto::orders::OrderWithItems};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay returned {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_confirmation(
        &self,
        email: &str,
        order: &OrderWithItems,
    ) -> Result<(), NotifyError>;

    async fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    template: &'a str,
    data: serde_json::Value,
}

/// Hands messages to an HTTP mail relay that owns templates and delivery.
pub struct MailRelayNotifier {
    http: reqwest::Client,
    relay_url: String,
    from: String,
}

impl MailRelayNotifier {
    pub fn new(relay_url: String, config: &MailConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            relay_url,
            from: config.from.clone(),
        })
    }

    async fn post(&self, message: RelayMessage<'_>) -> Result<(), NotifyError> {
        let resp = self.http.post(&self.relay_url).json(&message).send().await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn send_order_confirmation(
        &self,
        email: &str,
        order: &OrderWithItems,
    ) -> Result<(), NotifyError> {
        self.post(RelayMessage {
            from: &self.from,
            to: email,
            subject: "Your order is confirmed",
            template: "order_confirmation",
            data: json!({ "order": order }),
        })
        .await
    }

    async fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<(), NotifyError> {
        self.post(RelayMessage {
            from: &self.from,
            to: email,
            subject: "Reset your password",
            template: "password_reset",
            data: json!({ "reset_url": reset_url }),
        })
        .await
    }
}

/// Used when no relay is configured: messages only reach the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_order_confirmation(
        &self,
        email: &str,
        order: &OrderWithItems,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            to = email,
            order_id = %order.order.id,
            total = %order.order.total_amount,
            "order confirmation (not delivered: no mail relay)"
        );
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, _reset_url: &str) -> Result<(), NotifyError> {
        tracing::info!(to = email, "password reset (not delivered: no mail relay)");
        Ok(())
    }
}
