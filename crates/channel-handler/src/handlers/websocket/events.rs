//! WebSocket bridge webhook payloads and their normalization.
//!
//! The bridge posts batches of messages and delivery acks. Each message is
//! reduced to an [`IncomingMsg`]; each ack to a status value.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelHandlerError;
use crate::types::{IncomingMsg, MsgStatusValue};
use crate::urn::Urn;

/// Suffix the bridge appends to personal chat ids.
const AUTHOR_SUFFIX: &str = "@c.us";
const IMAGE_TYPE: &str = "image";

/// Body of `POST .../register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPayload {
    pub urn: String,
    pub language: String,
}

/// Body of `POST .../receive`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MoPayload {
    pub instance_id: String,
    pub messages: Vec<MessagePayload>,
    pub ack: Vec<AckPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessagePayload {
    pub from_me: bool,
    /// Epoch seconds.
    pub time: i64,
    pub author: String,
    pub sender_name: String,
    pub body: String,
    pub caption: String,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AckPayload {
    pub id: String,
    pub status: String,
}

/// Result of normalizing one message entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// An echo of the account's own traffic.
    FromMe,
    /// Not persistable; the reason is reported back to the caller.
    Ignored(&'static str),
    Msg(IncomingMsg),
}

/// Map a bridge ack status onto the host's status values.
pub fn ack_status(status: &str) -> MsgStatusValue {
    match status {
        "sent" => MsgStatusValue::Sent,
        "delivered" => MsgStatusValue::Delivered,
        _ => MsgStatusValue::Queued,
    }
}

/// Sender URN from the bridge's `author` field (`15551234567@c.us`).
pub fn author_urn(author: &str) -> Result<Urn, ChannelHandlerError> {
    Urn::whatsapp(&author.replacen(AUTHOR_SUFFIX, "", 1))
}

/// Build a display name from whatever name parts are available.
pub fn name_from_first_last_username(first: &str, last: &str, username: &str) -> Option<String> {
    let full = format!("{} {}", first.trim(), last.trim());
    let full = full.trim();
    if !full.is_empty() {
        return Some(full.to_string());
    }
    let username = username.trim();
    (!username.is_empty()).then(|| username.to_string())
}

pub fn received_on(epoch_secs: i64) -> Result<DateTime<Utc>, ChannelHandlerError> {
    Utc.timestamp_opt(epoch_secs, 0).single().ok_or_else(|| {
        ChannelHandlerError::ParseError(format!("invalid message time {}", epoch_secs))
    })
}

/// Normalize one message entry for `channel_uuid`.
pub fn normalize_message(
    channel_uuid: Uuid,
    message: &MessagePayload,
) -> Result<Normalized, ChannelHandlerError> {
    if message.from_me {
        return Ok(Normalized::FromMe);
    }
    if message.id.trim().is_empty() {
        return Ok(Normalized::Ignored("message has no id, ignored"));
    }

    let date = received_on(message.time)?;
    let urn = author_urn(&message.author)?;
    let name = name_from_first_last_username(&message.sender_name, "", "");

    // image messages carry their caption as text and the media in the body
    let is_image = message.msg_type == IMAGE_TYPE;
    let text = if is_image {
        &message.caption
    } else {
        &message.body
    };

    let mut msg = IncomingMsg::new(channel_uuid, urn, text.as_str())
        .with_external_id(message.id.as_str())
        .with_received_on(date)
        .with_contact_name(name);
    if is_image {
        msg = msg.with_attachment(message.body.as_str());
    }

    Ok(Normalized::Msg(msg))
}
