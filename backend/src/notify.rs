//! Account token delivery
//!
//! Password reset and email verification tokens are handed to an
//! [`AccountNotifier`] and never waited on; [`dispatch`] runs the send on
//! its own task so the HTTP response does not depend on whether (or how
//! fast) delivery happens.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the recipient is asked to do with the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    PasswordReset,
    EmailVerification,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Purpose::PasswordReset => "password_reset",
            Purpose::EmailVerification => "email_verification",
        })
    }
}

/// A token on its way to the account owner
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub purpose: Purpose,
    pub to: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait AccountNotifier: Send + Sync {
    async fn send(&self, delivery: Delivery) -> Result<()>;
}

/// Writes deliveries to the log. For development only: the token is logged
/// at debug level.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl AccountNotifier for LogNotifier {
    async fn send(&self, delivery: Delivery) -> Result<()> {
        debug!(
            purpose = %delivery.purpose,
            to = %delivery.to,
            token = %delivery.token,
            expires_at = %delivery.expires_at,
            "Account token issued"
        );
        info!(purpose = %delivery.purpose, expires_at = %delivery.expires_at, "Delivery logged");
        Ok(())
    }
}

/// POSTs each delivery as JSON to a mail relay
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build webhook client")?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AccountNotifier for WebhookNotifier {
    async fn send(&self, delivery: Delivery) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&delivery)
            .send()
            .await
            .context("Delivery webhook request failed")?
            .error_for_status()
            .context("Delivery webhook rejected delivery")?;
        Ok(())
    }
}

/// Send on a detached task; failures are logged, never returned
pub fn dispatch(notifier: Arc<dyn AccountNotifier>, delivery: Delivery) {
    tokio::spawn(async move {
        let purpose = delivery.purpose;
        if let Err(e) = notifier.send(delivery).await {
            warn!(%purpose, error = %e, "Account token delivery failed");
        }
    });
}
