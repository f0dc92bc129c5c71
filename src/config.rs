use std::path::Path;

use anyhow::Context;
use relay_channel_handler::RelayConfig;

/// Read and validate the TOML configuration at `path`.
pub fn load(path: &Path) -> anyhow::Result<RelayConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse(&raw).with_context(|| format!("loading config {}", path.display()))
}

pub fn parse(raw: &str) -> anyhow::Result<RelayConfig> {
    let config: RelayConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
