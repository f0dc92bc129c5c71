//! Explicit composition of channel handlers.
//!
//! The host builds every handler itself and registers it here at startup.
//! The registry routes webhook calls and outgoing messages to the handler
//! for a channel type.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BackendError, ChannelHandlerError};
use crate::traits::{Backend, ChannelHandler};
use crate::types::{ChannelType, MsgStatus, OutgoingMsg};

pub struct HandlerRegistry {
    handlers: HashMap<ChannelType, Arc<dyn ChannelHandler>>,
    backend: Arc<dyn Backend>,
}

impl HandlerRegistry {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            handlers: HashMap::new(),
            backend,
        }
    }

    /// Register a handler. Each channel type may only be served once.
    pub fn register(
        &mut self,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), ChannelHandlerError> {
        let channel_type = handler.channel_type();
        if self.handlers.contains_key(&channel_type) {
            return Err(ChannelHandlerError::Config(format!(
                "a handler for channel type {} is already registered",
                channel_type
            )));
        }
        tracing::info!(
            channel_type = %channel_type,
            handler = handler.name(),
            "channel handler registered"
        );
        self.handlers.insert(channel_type, handler);
        Ok(())
    }

    pub fn handler(&self, channel_type: &ChannelType) -> Option<Arc<dyn ChannelHandler>> {
        self.handlers.get(channel_type).cloned()
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    /// Registered channel types with their handler names.
    pub fn list_handlers(&self) -> Vec<(ChannelType, String)> {
        let mut handlers: Vec<_> = self
            .handlers
            .iter()
            .map(|(ct, h)| (ct.clone(), h.name().to_string()))
            .collect();
        handlers.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        handlers
    }

    /// Send `msg` through the handler for its channel and record the
    /// resulting status with the backend.
    pub async fn send_msg(&self, msg: &OutgoingMsg) -> Result<MsgStatus, ChannelHandlerError> {
        let handler = self.handler(&msg.channel_type).ok_or_else(|| {
            ChannelHandlerError::Config(format!(
                "no handler registered for channel type {}",
                msg.channel_type
            ))
        })?;

        let channel = self
            .backend
            .get_channel(&msg.channel_type, msg.channel_uuid)
            .await?
            .ok_or_else(|| ChannelHandlerError::ChannelNotFound(msg.channel_uuid.to_string()))?;

        let status = handler.send_msg(&channel, msg).await?;

        match self.backend.write_msg_status(&status).await {
            Ok(()) => {}
            Err(BackendError::MsgNotFound) => {
                tracing::warn!(
                    msg_id = %msg.id,
                    "sent message is unknown to the backend, status not stored"
                );
            }
            Err(e) => return Err(e.into()),
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::handlers::websocket::WebSocketHandler;
    use crate::logging::ChannelLogger;

    fn ws_handler(backend: Arc<dyn Backend>) -> Arc<dyn ChannelHandler> {
        Arc::new(WebSocketHandler::new(
            backend,
            Arc::new(ChannelLogger::new(None)),
            reqwest::Client::new(),
        ))
    }

    #[test]
    fn duplicate_registration_rejected() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let mut registry = HandlerRegistry::new(backend.clone());
        assert!(registry.register(ws_handler(backend.clone())).is_ok());
        assert!(registry.register(ws_handler(backend)).is_err());
        assert_eq!(
            registry.list_handlers(),
            vec![(ChannelType::new("WS"), "WebSocket".to_string())]
        );
    }

    #[test]
    fn lookup_by_type() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let mut registry = HandlerRegistry::new(backend.clone());
        registry.register(ws_handler(backend)).unwrap();
        assert!(registry.handler(&ChannelType::new("ws")).is_some());
        assert!(registry.handler(&ChannelType::new("TG")).is_none());
    }
}
