pub mod send;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use clap::ArgMatches;
use relay_channel_handler::{
    ChannelLogger, HandlerRegistry, MemoryBackend, RelayConfig, WebSocketHandler,
};

/// Everything a command needs once the configuration has been loaded.
pub struct Gateway {
    pub config: RelayConfig,
    pub backend: Arc<MemoryBackend>,
    pub logger: Arc<ChannelLogger>,
    pub registry: Arc<HandlerRegistry>,
}

pub fn config_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}

/// Build the backend, logger and handler registry for `config`.
pub fn build_gateway(config: RelayConfig) -> anyhow::Result<Gateway> {
    let backend = Arc::new(MemoryBackend::with_channels(config.channels.clone()));
    let logger = Arc::new(ChannelLogger::new(config.logging.channel_log_path.clone()));
    let client = config.client.build_client()?;

    let mut registry = HandlerRegistry::new(backend.clone());
    registry.register(Arc::new(WebSocketHandler::new(
        backend.clone(),
        logger.clone(),
        client,
    )))?;

    for (channel_type, name) in registry.list_handlers() {
        tracing::debug!(channel_type = %channel_type.as_str(), name = %name, "handler registered");
    }

    Ok(Gateway {
        config,
        backend,
        logger,
        registry: Arc::new(registry),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_registers_websocket_handler() {
        let config = crate::config::parse(
            r#"
[[channels]]
uuid = "8eb23e93-5ecb-45ba-b726-3b064e0c56ab"
channel_type = "WS"
address = "http://127.0.0.1:9/send"
"#,
        )
        .unwrap();
        let gateway = build_gateway(config).unwrap();
        let handlers = gateway.registry.list_handlers();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].0.as_str(), "WS");
    }
}
