use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::Method;
use uuid::Uuid;

use crate::config::ChannelConfig;
use crate::error::{BackendError, ChannelHandlerError};
use crate::response::WebhookResponse;
use crate::types::{ChannelType, Contact, IncomingMsg, MsgStatus, OutgoingMsg};
use crate::urn::Urn;

/// Core trait for channel handlers.
///
/// A handler translates one provider's webhook protocol into the host's
/// message model and formats outgoing messages for that provider. Handlers
/// are registered explicitly with a [`crate::registry::HandlerRegistry`].
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Which channel type this handler serves.
    fn channel_type(&self) -> ChannelType;

    /// Human-readable handler name.
    fn name(&self) -> &str;

    /// Webhook actions exposed under `/c/{type}/{uuid}/{action}`.
    fn routes(&self) -> Vec<HandlerRoute>;

    /// Handle one inbound webhook call for `action` on `channel`.
    async fn handle_request(
        &self,
        action: &str,
        channel: &ChannelConfig,
        body: Bytes,
    ) -> HandlerOutcome;

    /// Deliver an outgoing message. Transport failures are reported through
    /// the returned status, not as an `Err`.
    async fn send_msg(
        &self,
        channel: &ChannelConfig,
        msg: &OutgoingMsg,
    ) -> Result<MsgStatus, ChannelHandlerError>;
}

/// A webhook action a handler answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRoute {
    pub method: Method,
    pub action: &'static str,
}

impl HandlerRoute {
    pub fn post(action: &'static str) -> Self {
        Self {
            method: Method::POST,
            action,
        }
    }

    pub fn matches(&self, method: &Method, action: &str) -> bool {
        self.method == *method && self.action == action
    }
}

/// Events produced by a webhook call, in the order they were handled.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Msg(IncomingMsg),
    Status(MsgStatus),
    ContactRegistered(Contact),
}

/// What a handler produced for one request: durable events plus the
/// acknowledgement to write back.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub events: Vec<ChannelEvent>,
    pub response: WebhookResponse,
}

impl HandlerOutcome {
    pub fn new(events: Vec<ChannelEvent>, response: WebhookResponse) -> Self {
        Self { events, response }
    }

    /// No events, just a response (ignored requests and request errors).
    pub fn response_only(response: WebhookResponse) -> Self {
        Self {
            events: Vec::new(),
            response,
        }
    }
}

/// The host services a handler depends on: channel lookup, contact store,
/// message persistence and duplicate detection.
///
/// Implementations must be safe to call concurrently; handlers treat every
/// call as a single atomic operation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Look up a configured channel.
    async fn get_channel(
        &self,
        channel_type: &ChannelType,
        uuid: Uuid,
    ) -> Result<Option<ChannelConfig>, BackendError>;

    /// Get the contact for `urn`, creating it when missing.
    async fn get_contact(
        &self,
        channel: &ChannelConfig,
        urn: &Urn,
        name: Option<&str>,
    ) -> Result<Contact, BackendError>;

    /// Attach an ISO 639-3 language to a contact.
    async fn add_language_to_contact(
        &self,
        channel: &ChannelConfig,
        language: &str,
        contact: &Contact,
    ) -> Result<Contact, BackendError>;

    /// Persist an incoming message.
    async fn write_msg(&self, msg: &IncomingMsg) -> Result<(), BackendError>;

    /// Return the uuid of a previously written message with the same
    /// channel and external id, if any.
    async fn check_external_id_seen(&self, msg: &IncomingMsg)
        -> Result<Option<Uuid>, BackendError>;

    /// Remember the message's external id for later duplicate checks.
    async fn write_external_id_seen(&self, msg: &IncomingMsg) -> Result<(), BackendError>;

    /// Apply a status update, by message id when set, else by external id.
    /// Unknown messages yield [`BackendError::MsgNotFound`].
    async fn write_msg_status(&self, status: &MsgStatus) -> Result<(), BackendError>;
}
