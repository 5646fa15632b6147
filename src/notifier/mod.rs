//! Diff report delivery.
//!
//! The webhook target and username come from an explicit `NotifierConfig`
//! handed over at construction; nothing here reads ambient state. A part
//! that still fails after retries is logged and the remaining parts are
//! sent anyway.

use crate::config::NotifierConfig;
use crate::report;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Where an assembled diff report goes.
#[async_trait]
pub trait DiffSink: Send + Sync {
    async fn send_report(&self, content: &str) -> Result<()>;
}

// ── Console sink (dry runs) ───────────────────────────────────────────────────

pub struct ConsoleSink;

#[async_trait]
impl DiffSink for ConsoleSink {
    async fn send_report(&self, content: &str) -> Result<()> {
        for part in report::chunk_message(content, report::MESSAGE_CHUNK_LIMIT) {
            println!("{}", part);
        }
        Ok(())
    }
}

// ── Webhook sink ──────────────────────────────────────────────────────────────

pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: Url,
    username: String,
    max_retries: u32,
}

impl WebhookNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let raw_url = config
            .webhook_url
            .as_deref()
            .context("notifier.webhook_url is not configured")?;
        let webhook_url = Url::parse(raw_url).context("Invalid webhook URL")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            webhook_url,
            username: config.username.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn post_part(&self, part: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(self.webhook_url.clone())
            .json(&serde_json::json!({ "content": part, "username": self.username }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(status))
        }
    }
}

#[async_trait]
impl DiffSink for WebhookNotifier {
    async fn send_report(&self, content: &str) -> Result<()> {
        let parts = report::chunk_message(content, report::MESSAGE_CHUNK_LIMIT);
        let total = parts.len();

        for (i, part) in parts.iter().enumerate() {
            let strategy = ExponentialBackoff::from_millis(200)
                .map(jitter)
                .take(self.max_retries as usize);

            match Retry::spawn(strategy, || self.post_part(part)).await {
                Ok(()) => debug!("Sent report part {}/{}", i + 1, total),
                Err(e) => warn!("Failed to send part {}/{}: {}", i + 1, total, e),
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
