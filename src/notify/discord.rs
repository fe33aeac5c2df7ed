// =============================================================================
// Discord webhook client
// =============================================================================
//
// SECURITY: the webhook URL embeds its token; it is never logged.
//
// Plain messages are POSTed as `{"content": ...}`.  Attachments use a
// multipart body with the JSON payload in `payload_json` and the file in
// `files[0]`.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, instrument};

use super::{truncate_message, Notifier};

/// Discord rejects message content above this many characters.
const CONTENT_LIMIT: usize = 2000;

#[derive(Clone)]
pub struct DiscordWebhook {
    url: String,
    client: reqwest::Client,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    fn payload(message: &str) -> serde_json::Value {
        serde_json::json!({ "content": truncate_message(message, CONTENT_LIMIT) })
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<()> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord {what} returned {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    #[instrument(skip_all, name = "discord::send")]
    async fn send(&self, message: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&Self::payload(message))
            .send()
            .await
            .context("Discord webhook request failed")?;

        Self::check(resp, "webhook").await?;
        debug!(chars = message.chars().count(), "discord message delivered");
        Ok(())
    }

    #[instrument(skip_all, name = "discord::send_file", fields(file = %path.display()))]
    async fn send_file(&self, message: &str, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read attachment {}", path.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let form = Form::new()
            .text("payload_json", Self::payload(message).to_string())
            .part("files[0]", Part::bytes(bytes).file_name(file_name));

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("Discord webhook upload failed")?;

        Self::check(resp, "upload").await?;
        debug!("discord attachment delivered");
        Ok(())
    }
}

impl std::fmt::Debug for DiscordWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordWebhook")
            .field("url", &"<redacted>")
            .finish()
    }
}
