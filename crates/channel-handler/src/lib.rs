//! Channel handlers for the Relay messaging gateway.
//!
//! A channel handler sits between an external chat provider's webhook
//! protocol and the gateway's canonical message model:
//!
//! - inbound webhook calls (messages, delivery acks, contact registration)
//!   are normalized into [`IncomingMsg`], [`MsgStatus`] and [`Contact`] events
//!   and persisted through a [`Backend`];
//! - outgoing messages are formatted into the provider's JSON payload and
//!   delivered over HTTP, yielding a [`MsgStatus`] with its channel logs.
//!
//! Ships the WebSocket bridge handler (`WS`), an in-memory backend and an
//! axum webhook server. Handlers are composed explicitly through a
//! [`HandlerRegistry`].

pub mod backend;
pub mod config;
pub mod error;
pub mod language;
pub mod logging;
pub mod registry;
pub mod response;
pub mod server;
pub mod traits;
pub mod types;
pub mod urn;

pub mod handlers;

// Re-export core types
pub use backend::MemoryBackend;
pub use config::{ChannelConfig, ClientConfig, LoggingConfig, RelayConfig, ServerConfig};
pub use error::{BackendError, ChannelHandlerError};
pub use handlers::websocket::WebSocketHandler;
pub use logging::ChannelLogger;
pub use registry::HandlerRegistry;
pub use response::{ResponseData, ResponseEnvelope, WebhookResponse};
pub use server::{router, serve, ServerState};
pub use traits::{Backend, ChannelEvent, ChannelHandler, HandlerOutcome, HandlerRoute};
pub use types::{
    ChannelLog, ChannelType, Contact, IncomingMsg, MsgId, MsgStatus, MsgStatusValue, OutgoingMsg,
};
pub use urn::{Urn, UrnScheme};
