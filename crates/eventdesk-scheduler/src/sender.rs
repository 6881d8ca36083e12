use std::time::Duration;

use async_trait::async_trait;
use eventdesk_core::config::DeliveryConfig;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{DeliveryError, Result};
use crate::types::{DeliveryReceipt, DeliveryRequest};

/// Performs the actual report delivery for one item and window.
///
/// Rendering and audience resolution live behind this trait; the scheduler
/// only cares about success and the recipient summary.
#[async_trait]
pub trait ReportSender: Send + Sync {
    async fn send(&self, req: &DeliveryRequest) -> std::result::Result<DeliveryReceipt, DeliveryError>;
}

/// Posts each [`DeliveryRequest`] as JSON to the mailer webhook.
pub struct WebhookSender {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

/// Response body the mailer returns.
#[derive(Debug, Deserialize)]
struct WebhookReply {
    ok: bool,
    #[serde(default)]
    count: u32,
    #[serde(default)]
    to: Vec<String>,
    #[serde(default)]
    bcc: Vec<String>,
    error: Option<String>,
}

impl WebhookSender {
    pub fn new(url: impl Into<String>, timeout: Duration, bearer_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            bearer_token,
        })
    }

    /// `Ok(None)` when no webhook URL is configured.
    pub fn from_config(config: &DeliveryConfig) -> Result<Option<Self>> {
        let Some(url) = config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        Self::new(
            url,
            Duration::from_secs(config.timeout_secs),
            config.bearer_token.clone(),
        )
        .map(Some)
    }
}

#[async_trait]
impl ReportSender for WebhookSender {
    async fn send(&self, req: &DeliveryRequest) -> std::result::Result<DeliveryReceipt, DeliveryError> {
        debug!(item_id = %req.id, period_id = %req.window.period_id, "posting report request");

        let mut builder = self.client.post(&self.url).json(req);
        if let Some(token) = &self.bearer_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        // Anything that fails before a status arrives (connect, timeout) is worth retrying.
        let resp = builder
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let reply: WebhookReply = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Transient(format!("unreadable webhook reply: {e}")))?;
        reply_to_receipt(reply)
    }
}

fn classify_status(status: StatusCode, body: &str) -> DeliveryError {
    let message = format!("webhook returned {status}: {}", body.trim());
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        DeliveryError::Transient(message)
    } else {
        DeliveryError::Permanent(message)
    }
}

fn reply_to_receipt(reply: WebhookReply) -> std::result::Result<DeliveryReceipt, DeliveryError> {
    if !reply.ok {
        return Err(DeliveryError::Transient(
            reply.error.unwrap_or_else(|| "mailer reported failure".to_string()),
        ));
    }
    Ok(DeliveryReceipt {
        count: reply.count,
        to: reply.to,
        bcc: reply.bcc,
    })
}
