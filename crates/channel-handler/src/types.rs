use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::urn::Urn;

/// Short uppercase code identifying a kind of channel (e.g. `WS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(String);

impl ChannelType {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used in webhook paths.
    pub fn path_segment(&self) -> String {
        self.0.to_lowercase()
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host-assigned id of an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(pub i64);

impl std::fmt::Display for MsgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery lifecycle of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgStatusValue {
    Pending,
    Queued,
    Sent,
    Wired,
    Delivered,
    Errored,
    Failed,
}

impl std::fmt::Display for MsgStatusValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MsgStatusValue::Pending => "pending",
            MsgStatusValue::Queued => "queued",
            MsgStatusValue::Sent => "sent",
            MsgStatusValue::Wired => "wired",
            MsgStatusValue::Delivered => "delivered",
            MsgStatusValue::Errored => "errored",
            MsgStatusValue::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A contact as known to the host's contact store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub uuid: Uuid,
    pub urn: Urn,
    pub name: Option<String>,
    /// ISO 639-3 code.
    pub language: Option<String>,
}

/// A message received from the provider, normalized for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMsg {
    pub uuid: Uuid,
    pub channel_uuid: Uuid,
    pub urn: Urn,
    pub text: String,
    pub external_id: String,
    pub received_on: DateTime<Utc>,
    pub contact_name: Option<String>,
    pub attachments: Vec<String>,
    /// Set when the external id was seen before and the message must not be
    /// written again.
    #[serde(default)]
    pub already_written: bool,
}

impl IncomingMsg {
    pub fn new(channel_uuid: Uuid, urn: Urn, text: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            channel_uuid,
            urn,
            text: text.into(),
            external_id: String::new(),
            received_on: Utc::now(),
            contact_name: None,
            attachments: Vec::new(),
            already_written: false,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = external_id.into();
        self
    }

    pub fn with_received_on(mut self, received_on: DateTime<Utc>) -> Self {
        self.received_on = received_on;
        self
    }

    pub fn with_contact_name(mut self, name: Option<String>) -> Self {
        self.contact_name = name;
        self
    }

    pub fn with_attachment(mut self, url: impl Into<String>) -> Self {
        self.attachments.push(url.into());
        self
    }
}

/// A status update for an outgoing message, addressed either by the host's
/// message id or by the provider's external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgStatus {
    pub channel_uuid: Uuid,
    pub msg_id: Option<MsgId>,
    pub external_id: Option<String>,
    pub status: MsgStatusValue,
    #[serde(default)]
    pub logs: Vec<ChannelLog>,
}

impl MsgStatus {
    pub fn for_id(channel_uuid: Uuid, msg_id: MsgId, status: MsgStatusValue) -> Self {
        Self {
            channel_uuid,
            msg_id: Some(msg_id),
            external_id: None,
            status,
            logs: Vec::new(),
        }
    }

    pub fn for_external_id(
        channel_uuid: Uuid,
        external_id: impl Into<String>,
        status: MsgStatusValue,
    ) -> Self {
        Self {
            channel_uuid,
            msg_id: None,
            external_id: Some(external_id.into()),
            status,
            logs: Vec::new(),
        }
    }

    pub fn set_status(&mut self, status: MsgStatusValue) {
        self.status = status;
    }

    pub fn set_external_id(&mut self, external_id: Option<String>) {
        if let Some(id) = external_id.filter(|id| !id.is_empty()) {
            self.external_id = Some(id);
        }
    }

    pub fn add_log(&mut self, log: ChannelLog) {
        self.logs.push(log);
    }
}

/// A message the host wants delivered through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMsg {
    pub id: MsgId,
    pub channel_uuid: Uuid,
    pub channel_type: ChannelType,
    pub urn: Urn,
    pub text: String,
    #[serde(default)]
    pub quick_replies: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Structured record of one inbound request or one outbound HTTP attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelLog {
    pub uuid: Uuid,
    pub channel_uuid: Uuid,
    pub msg_id: Option<MsgId>,
    pub description: String,
    pub method: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub request: String,
    pub response: String,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    pub created_on: DateTime<Utc>,
}

impl ChannelLog {
    pub fn new(description: impl Into<String>, channel_uuid: Uuid, msg_id: Option<MsgId>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            channel_uuid,
            msg_id,
            description: description.into(),
            method: String::new(),
            url: String::new(),
            status_code: None,
            request: String::new(),
            response: String::new(),
            elapsed_ms: 0,
            error: None,
            created_on: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_is_normalized() {
        let ct = ChannelType::new("ws");
        assert_eq!(ct.as_str(), "WS");
        assert_eq!(ct.path_segment(), "ws");
        assert_eq!(ct, ChannelType::new(" WS "));
    }

    #[test]
    fn status_value_serialization() {
        let json = serde_json::to_string(&MsgStatusValue::Wired).unwrap();
        assert_eq!(json, "\"wired\"");
        assert_eq!(MsgStatusValue::Delivered.to_string(), "delivered");
    }

    #[test]
    fn incoming_msg_builder() {
        let urn = Urn::whatsapp("15551234567").unwrap();
        let msg = IncomingMsg::new(Uuid::new_v4(), urn, "caption")
            .with_external_id("ext-1")
            .with_contact_name(Some("Ana".to_string()))
            .with_attachment("https://cdn.example.com/a.jpg");
        assert_eq!(msg.external_id, "ext-1");
        assert_eq!(msg.contact_name.as_deref(), Some("Ana"));
        assert_eq!(msg.attachments, vec!["https://cdn.example.com/a.jpg"]);
        assert!(!msg.already_written);
    }

    #[test]
    fn empty_external_id_is_not_recorded() {
        let mut status = MsgStatus::for_id(Uuid::new_v4(), MsgId(7), MsgStatusValue::Errored);
        status.set_external_id(Some(String::new()));
        assert!(status.external_id.is_none());
        status.set_external_id(Some("abc".to_string()));
        assert_eq!(status.external_id.as_deref(), Some("abc"));
    }
}
