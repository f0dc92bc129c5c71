//! Channel log recorder.
//!
//! Every inbound request outcome and every outbound HTTP attempt produces a
//! [`ChannelLog`]. The recorder emits each one as a JSON line on the
//! `channel_log` tracing target and optionally appends it to a file.

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::ChannelLog;

pub struct ChannelLogger {
    log_path: Option<PathBuf>,
    count: RwLock<u64>,
}

impl ChannelLogger {
    /// Create a logger that appends to the given file path.
    /// If `None`, logs to tracing output only.
    pub fn new(log_path: Option<PathBuf>) -> Self {
        Self {
            log_path,
            count: RwLock::new(0),
        }
    }

    pub async fn log(&self, entry: &ChannelLog) {
        let json = serde_json::to_string(entry).unwrap_or_else(|e| {
            format!(
                r#"{{"error":"serialization failed: {}","ts":"{}"}}"#,
                e,
                Utc::now().to_rfc3339()
            )
        });

        if entry.is_error() {
            tracing::warn!(target: "channel_log", channel_uuid = %entry.channel_uuid, "{}", json);
        } else {
            tracing::info!(target: "channel_log", channel_uuid = %entry.channel_uuid, "{}", json);
        }

        if let Some(ref path) = self.log_path {
            if let Err(e) = append_log_line(path, &json).await {
                tracing::warn!("Failed to write channel log: {}", e);
            }
        }

        *self.count.write().await += 1;
    }

    /// Total number of channel logs recorded.
    pub async fn log_count(&self) -> u64 {
        *self.count.read().await
    }
}

async fn append_log_line(path: &std::path::Path, line: &str) -> Result<(), std::io::Error> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}
