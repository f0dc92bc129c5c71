//! WebSocket bridge channel handler.
//!
//! The bridge relays a chat account over HTTP: it posts contact registrations
//! to `register`, message batches and delivery acks to `receive`, and accepts
//! outgoing messages as JSON on the channel address.

pub mod api;
pub mod events;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::config::ChannelConfig;
use crate::error::{BackendError, ChannelHandlerError};
use crate::language::base_language_iso3;
use crate::logging::ChannelLogger;
use crate::response::{ResponseData, WebhookResponse};
use crate::traits::{Backend, ChannelEvent, ChannelHandler, HandlerOutcome, HandlerRoute};
use crate::types::{ChannelType, MsgStatus, MsgStatusValue, OutgoingMsg};
use crate::urn::Urn;

use api::{send_parts, BridgeApiClient};
use events::{ack_status, normalize_message, MoPayload, Normalized, UserPayload};

pub const CHANNEL_TYPE: &str = "WS";
pub const REGISTER: &str = "register";
pub const RECEIVE: &str = "receive";

/// Handler for the `WS` channel type.
pub struct WebSocketHandler {
    backend: Arc<dyn Backend>,
    logger: Arc<ChannelLogger>,
    api_client: BridgeApiClient,
}

/// Events and response items accumulated while working through a batch.
#[derive(Default)]
struct Batch {
    events: Vec<ChannelEvent>,
    data: Vec<ResponseData>,
}

impl WebSocketHandler {
    pub fn new(
        backend: Arc<dyn Backend>,
        logger: Arc<ChannelLogger>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            backend,
            logger,
            api_client: BridgeApiClient::new(client),
        }
    }

    async fn register_user(&self, channel: &ChannelConfig, body: &[u8]) -> HandlerOutcome {
        let payload: UserPayload = match decode_json(body) {
            Ok(p) => p,
            Err(e) => return request_error(channel, e),
        };

        if payload.urn.trim().is_empty() {
            return ignored("Ignoring request, no identifier");
        }

        let mut batch = Batch::default();
        match self.register_contact(channel, &payload, &mut batch).await {
            Ok(()) => {
                HandlerOutcome::new(batch.events, WebhookResponse::events_handled(batch.data))
            }
            Err(e) => {
                tracing::warn!(
                    channel_uuid = %channel.uuid,
                    error = %e,
                    "contact registration failed"
                );
                HandlerOutcome::new(batch.events, WebhookResponse::from_error(batch.data, &e))
            }
        }
    }

    async fn register_contact(
        &self,
        channel: &ChannelConfig,
        payload: &UserPayload,
        batch: &mut Batch,
    ) -> Result<(), ChannelHandlerError> {
        // reject a bad tag before touching the contact store
        let language = base_language_iso3(&payload.language)?;
        let urn = Urn::from_parts(channel.primary_scheme()?, &payload.urn)?;

        let contact = self.backend.get_contact(channel, &urn, None).await?;
        let contact = self
            .backend
            .add_language_to_contact(channel, language, &contact)
            .await?;

        tracing::info!(
            channel_uuid = %channel.uuid,
            contact_uuid = %contact.uuid,
            language,
            "contact registered"
        );

        batch.data.push(ResponseData::contact_registered(contact.uuid));
        batch.events.push(ChannelEvent::ContactRegistered(contact));
        Ok(())
    }

    async fn receive_message(&self, channel: &ChannelConfig, body: &[u8]) -> HandlerOutcome {
        let payload: MoPayload = match decode_json(body) {
            Ok(p) => p,
            Err(e) => return request_error(channel, e),
        };

        if payload.instance_id.is_empty() {
            return ignored("Ignoring request, no message");
        }

        let mut batch = Batch::default();
        match self.receive_batch(channel, &payload, &mut batch).await {
            Ok(()) => {
                HandlerOutcome::new(batch.events, WebhookResponse::events_handled(batch.data))
            }
            Err(e) => {
                tracing::error!(
                    channel_uuid = %channel.uuid,
                    completed = batch.data.len(),
                    error = %e,
                    "receive batch aborted"
                );
                HandlerOutcome::new(batch.events, WebhookResponse::from_error(batch.data, &e))
            }
        }
    }

    async fn receive_batch(
        &self,
        channel: &ChannelConfig,
        payload: &MoPayload,
        batch: &mut Batch,
    ) -> Result<(), ChannelHandlerError> {
        for message in &payload.messages {
            let mut msg = match normalize_message(channel.uuid, message)? {
                Normalized::FromMe => continue,
                Normalized::Ignored(reason) => {
                    batch.data.push(ResponseData::info(reason));
                    continue;
                }
                Normalized::Msg(msg) => msg,
            };

            if let Some(prior) = self.backend.check_external_id_seen(&msg).await? {
                tracing::debug!(
                    channel_uuid = %channel.uuid,
                    external_id = %msg.external_id,
                    "duplicate message"
                );
                msg.uuid = prior;
                msg.already_written = true;
            } else {
                self.backend.write_msg(&msg).await?;
                self.backend.write_external_id_seen(&msg).await?;
            }

            batch.data.push(ResponseData::msg_received(&msg));
            batch.events.push(ChannelEvent::Msg(msg));
        }

        for ack in &payload.ack {
            let status =
                MsgStatus::for_external_id(channel.uuid, ack.id.as_str(), ack_status(&ack.status));

            match self.backend.write_msg_status(&status).await {
                Ok(()) => {}
                Err(BackendError::MsgNotFound) => {
                    tracing::debug!(
                        channel_uuid = %channel.uuid,
                        external_id = %ack.id,
                        "ack for unknown message"
                    );
                    batch.data.push(ResponseData::info("message not found, ignored"));
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            batch.data.push(ResponseData::status(&status));
            batch.events.push(ChannelEvent::Status(status));
        }

        Ok(())
    }
}

#[async_trait]
impl ChannelHandler for WebSocketHandler {
    fn channel_type(&self) -> ChannelType {
        ChannelType::new(CHANNEL_TYPE)
    }

    fn name(&self) -> &str {
        "WebSocket"
    }

    fn routes(&self) -> Vec<HandlerRoute> {
        vec![HandlerRoute::post(REGISTER), HandlerRoute::post(RECEIVE)]
    }

    async fn handle_request(
        &self,
        action: &str,
        channel: &ChannelConfig,
        body: Bytes,
    ) -> HandlerOutcome {
        match action {
            REGISTER => self.register_user(channel, &body).await,
            RECEIVE => self.receive_message(channel, &body).await,
            other => HandlerOutcome::response_only(WebhookResponse::not_found(
                &ChannelHandlerError::UnknownRoute(other.to_string()),
            )),
        }
    }

    async fn send_msg(
        &self,
        channel: &ChannelConfig,
        msg: &OutgoingMsg,
    ) -> Result<MsgStatus, ChannelHandlerError> {
        if channel.channel_type != self.channel_type() {
            return Err(ChannelHandlerError::Config(format!(
                "channel {} is not a {} channel",
                channel.uuid, CHANNEL_TYPE
            )));
        }

        let mut status = MsgStatus::for_id(channel.uuid, msg.id, MsgStatusValue::Errored);
        let mut sent = 0usize;
        let mut has_error = false;

        for part in send_parts(channel, msg) {
            let result = self.api_client.send_part(channel, msg, &part).await;
            self.logger.log(&result.log).await;

            sent += 1;
            has_error = result.failed();
            status.set_external_id(result.external_id.clone());
            status.add_log(result.log);
            if has_error {
                break;
            }
        }

        if sent > 0 && !has_error {
            status.set_status(MsgStatusValue::Wired);
        }

        tracing::info!(
            channel_uuid = %channel.uuid,
            msg_id = %msg.id,
            parts = sent,
            status = %status.status,
            "message send finished"
        );

        Ok(status)
    }
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ChannelHandlerError> {
    serde_json::from_slice(body).map_err(|e| {
        ChannelHandlerError::ParseError(format!("unable to parse request JSON: {}", e))
    })
}

fn request_error(channel: &ChannelConfig, err: ChannelHandlerError) -> HandlerOutcome {
    tracing::warn!(channel_uuid = %channel.uuid, error = %err, "request error");
    HandlerOutcome::response_only(WebhookResponse::request_error(&err))
}

fn ignored(reason: &str) -> HandlerOutcome {
    tracing::info!(reason, "request ignored");
    HandlerOutcome::response_only(WebhookResponse::ignored(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::types::MsgId;
    use crate::urn::UrnScheme;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn channel() -> ChannelConfig {
        ChannelConfig {
            uuid: Uuid::new_v4(),
            channel_type: ChannelType::new(CHANNEL_TYPE),
            name: "bridge".to_string(),
            address: "http://127.0.0.1:9/send".to_string(),
            schemes: vec![UrnScheme::Ext],
        }
    }

    fn handler(backend: Arc<MemoryBackend>) -> WebSocketHandler {
        WebSocketHandler::new(
            backend,
            Arc::new(ChannelLogger::new(None)),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn exposes_register_and_receive() {
        let h = handler(Arc::new(MemoryBackend::new()));
        assert_eq!(h.channel_type().as_str(), "WS");
        assert_eq!(h.name(), "WebSocket");
        let actions: Vec<_> = h.routes().iter().map(|r| r.action).collect();
        assert_eq!(actions, vec!["register", "receive"]);
    }

    #[tokio::test]
    async fn register_ignores_empty_urn() {
        let backend = Arc::new(MemoryBackend::new());
        let h = handler(backend.clone());
        let body = Bytes::from_static(br#"{"urn": "", "language": "en"}"#);
        let outcome = h.handle_request(REGISTER, &channel(), body).await;
        assert!(outcome.response.is_ignored());
        assert!(outcome.events.is_empty());
        assert_eq!(backend.contact_lookups().await, 0);
    }

    #[tokio::test]
    async fn register_bad_language_touches_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let h = handler(backend.clone());
        let body = Bytes::from_static(br#"{"urn": "alice", "language": "not a tag"}"#);
        let outcome = h.handle_request(REGISTER, &channel(), body).await;
        assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
        assert_eq!(backend.contact_lookups().await, 0);
    }

    #[tokio::test]
    async fn receive_rejects_bad_json() {
        let h = handler(Arc::new(MemoryBackend::new()));
        let outcome = h
            .handle_request(RECEIVE, &channel(), Bytes::from_static(b"{not json"))
            .await;
        assert_eq!(outcome.response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_action_is_not_found() {
        let h = handler(Arc::new(MemoryBackend::new()));
        let outcome = h
            .handle_request("status", &channel(), Bytes::from_static(b"{}"))
            .await;
        assert_eq!(outcome.response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_message_stays_errored() {
        let ch = channel();
        let h = handler(Arc::new(MemoryBackend::new()));
        let msg = OutgoingMsg {
            id: MsgId(1),
            channel_uuid: ch.uuid,
            channel_type: ch.channel_type.clone(),
            urn: Urn::from_parts(UrnScheme::Ext, "alice").unwrap(),
            text: String::new(),
            quick_replies: Vec::new(),
            attachments: Vec::new(),
        };
        let status = h.send_msg(&ch, &msg).await.unwrap();
        assert_eq!(status.status, MsgStatusValue::Errored);
        assert!(status.logs.is_empty());
    }

    #[tokio::test]
    async fn send_rejects_foreign_channel() {
        let mut ch = channel();
        ch.channel_type = ChannelType::new("TG");
        let h = handler(Arc::new(MemoryBackend::new()));
        let msg = OutgoingMsg {
            id: MsgId(2),
            channel_uuid: ch.uuid,
            channel_type: ch.channel_type.clone(),
            urn: Urn::from_parts(UrnScheme::Ext, "alice").unwrap(),
            text: "hi".to_string(),
            quick_replies: Vec::new(),
            attachments: Vec::new(),
        };
        assert!(h.send_msg(&ch, &msg).await.is_err());
    }
}
