// =============================================================================
// Notifications — alert delivery seam
// =============================================================================
//
// Delivery failures are reported to the caller, which logs them and moves on;
// a notification never decides the outcome of a scan.

pub mod discord;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub use discord::DiscordWebhook;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;

    /// Send `message` with the file at `path` attached.
    async fn send_file(&self, message: &str, path: &Path) -> Result<()>;
}

/// Fallback used when no webhook is configured: messages go to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        info!(target: "notify", "{message}");
        Ok(())
    }

    async fn send_file(&self, message: &str, path: &Path) -> Result<()> {
        info!(target: "notify", attachment = %path.display(), "{message}");
        Ok(())
    }
}

/// Clip `message` to at most `limit` characters, marking the cut.
pub fn truncate_message(message: &str, limit: usize) -> String {
    if message.chars().count() <= limit {
        return message.to_string();
    }
    let mut out: String = message.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}
