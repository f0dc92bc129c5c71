use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelHandlerError;
use crate::types::ChannelType;
use crate::urn::UrnScheme;

/// Top-level configuration for a relay process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Channels served by this process.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// A configured channel instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub uuid: Uuid,
    pub channel_type: ChannelType,
    /// Human-readable name for this channel.
    #[serde(default)]
    pub name: String,
    /// Sender address; for the WebSocket bridge also the provider send URL.
    pub address: String,
    /// URN schemes the channel accepts. The first one is used for new contacts.
    #[serde(default)]
    pub schemes: Vec<UrnScheme>,
}

impl ChannelConfig {
    pub fn primary_scheme(&self) -> Result<UrnScheme, ChannelHandlerError> {
        self.schemes.first().copied().ok_or_else(|| {
            ChannelHandlerError::Config(format!("channel {} has no URN schemes", self.uuid))
        })
    }
}

/// Inbound webhook server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum size of an incoming request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Shared outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// JSONL file receiving every channel log. Tracing output only when unset.
    pub channel_log_path: Option<PathBuf>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_max_body_bytes() -> usize {
    65536
}

fn default_send_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Build the HTTP client shared by every handler.
    pub fn build_client(&self) -> Result<reqwest::Client, ChannelHandlerError> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.send_timeout_secs))
            .build()
            .map_err(|e| ChannelHandlerError::Internal(format!("HTTP client init: {}", e)))
    }
}

impl RelayConfig {
    /// Reject duplicate channel uuids and channels without an address.
    pub fn validate(&self) -> Result<(), ChannelHandlerError> {
        let mut seen = std::collections::HashSet::new();
        for channel in &self.channels {
            if !seen.insert(channel.uuid) {
                return Err(ChannelHandlerError::Config(format!(
                    "duplicate channel uuid {}",
                    channel.uuid
                )));
            }
            if channel.address.trim().is_empty() {
                return Err(ChannelHandlerError::Config(format!(
                    "channel {} has no address",
                    channel.uuid
                )));
            }
        }
        Ok(())
    }
}
