//! Outbound delivery to the WebSocket bridge.
//!
//! Each outgoing message becomes a sequence of send parts; each part is one
//! JSON `POST` to the channel address.

use std::collections::HashMap;
use std::time::Instant;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::ChannelConfig;
use crate::types::{ChannelLog, OutgoingMsg};

const QUICK_REPLIES_KEY: &str = "quick_replies";

/// JSON body the bridge expects for a send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataPayload {
    #[serde(rename = "ID")]
    pub id: String,
    pub text: String,
    pub to: String,
    pub to_no_plus: String,
    pub from: String,
    pub from_no_plus: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
}

impl DataPayload {
    pub fn new(channel: &ChannelConfig, msg: &OutgoingMsg) -> Self {
        let to = msg.urn.path();
        let from = channel.address.as_str();

        let metadata = (!msg.quick_replies.is_empty()).then(|| {
            HashMap::from([(QUICK_REPLIES_KEY.to_string(), msg.quick_replies.clone())])
        });
        let attachments = (!msg.attachments.is_empty()).then(|| msg.attachments.clone());

        Self {
            id: msg.id.to_string(),
            text: msg.text.clone(),
            to: to.to_string(),
            to_no_plus: strip_plus(to),
            from: from.to_string(),
            from_no_plus: strip_plus(from),
            channel: strip_plus(from),
            metadata,
            attachments,
        }
    }
}

/// Remove the first `+` of an address.
pub fn strip_plus(address: &str) -> String {
    address.replacen('+', "", 1)
}

/// One HTTP call worth of an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct SendPart {
    pub payload: DataPayload,
}

/// Lazily produce the parts for `msg`.
///
/// The bridge only accepts messages with text. Attachments ride along in the
/// text payload, so a message yields one part when its text is non-empty and
/// none otherwise.
pub fn send_parts<'a>(
    channel: &'a ChannelConfig,
    msg: &'a OutgoingMsg,
) -> impl Iterator<Item = SendPart> + 'a {
    let has_text = !msg.text.is_empty();
    std::iter::once(msg)
        .filter(move |_| has_text)
        .map(move |msg| SendPart {
            payload: DataPayload::new(channel, msg),
        })
}

/// Outcome of sending one part.
#[derive(Debug, Clone)]
pub struct PartResult {
    pub external_id: Option<String>,
    pub log: ChannelLog,
}

impl PartResult {
    pub fn failed(&self) -> bool {
        self.log.is_error()
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<serde_json::Value>,
}

/// HTTP client for the bridge's send endpoint.
#[derive(Clone)]
pub struct BridgeApiClient {
    client: reqwest::Client,
}

impl BridgeApiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send one part. Never fails: errors end up in the returned log.
    pub async fn send_part(
        &self,
        channel: &ChannelConfig,
        msg: &OutgoingMsg,
        part: &SendPart,
    ) -> PartResult {
        let body = match serde_json::to_vec(&part.payload) {
            Ok(body) => body,
            Err(e) => {
                let log = ChannelLog::new("unable to build JSON body", channel.uuid, Some(msg.id))
                    .with_error(Some(e.to_string()));
                return PartResult {
                    external_id: None,
                    log,
                };
            }
        };

        let mut log = ChannelLog::new("Message Sent", channel.uuid, Some(msg.id));
        log.method = "POST".to_string();
        log.url = channel.address.clone();
        log.request = String::from_utf8_lossy(&body).into_owned();

        let start = Instant::now();
        let result = self
            .client
            .post(&channel.address)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await;

        let mut external_id = None;
        match result {
            Ok(resp) => {
                let status = resp.status();
                log.status_code = Some(status.as_u16());
                let read_error = match resp.text().await {
                    Ok(text) => {
                        log.response = text;
                        None
                    }
                    Err(e) => {
                        tracing::warn!(
                            channel_uuid = %channel.uuid,
                            msg_id = %msg.id,
                            error = %e,
                            "unable to read send response"
                        );
                        Some(e.to_string())
                    }
                };
                if !status.is_success() {
                    log.error = Some(format!(
                        "Message Send Error: received non 2xx status: {}",
                        status
                    ));
                } else if let Some(e) = read_error {
                    log.error = Some(format!("Message Send Error: unable to read response: {}", e));
                } else {
                    external_id = parse_external_id(&log.response);
                }
            }
            Err(e) => {
                log.error = Some(format!("Message Send Error: {}", e));
            }
        }
        log.elapsed_ms = start.elapsed().as_millis() as u64;

        PartResult { external_id, log }
    }
}

/// The bridge may answer with `{"id": ...}`; anything else carries no id.
fn parse_external_id(body: &str) -> Option<String> {
    let resp: SendResponse = serde_json::from_str(body).ok()?;
    match resp.id? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelType, MsgId};
    use crate::urn::{Urn, UrnScheme};
    use uuid::Uuid;

    fn channel() -> ChannelConfig {
        ChannelConfig {
            uuid: Uuid::new_v4(),
            channel_type: ChannelType::new("WS"),
            name: "bridge".to_string(),
            address: "+15550001111".to_string(),
            schemes: vec![UrnScheme::Tel],
        }
    }

    fn msg(text: &str) -> OutgoingMsg {
        OutgoingMsg {
            id: MsgId(10),
            channel_uuid: Uuid::nil(),
            channel_type: ChannelType::new("WS"),
            urn: Urn::from_parts(UrnScheme::Tel, "+15551234567").unwrap(),
            text: text.to_string(),
            quick_replies: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn plus_stripped_once() {
        assert_eq!(strip_plus("+15551234567"), "15551234567");
        assert_eq!(strip_plus("15551234567"), "15551234567");
        assert_eq!(strip_plus("++1"), "+1");
    }

    #[test]
    fn payload_fields() {
        let ch = channel();
        let payload = DataPayload::new(&ch, &msg("hello"));
        assert_eq!(payload.id, "10");
        assert_eq!(payload.to, "+15551234567");
        assert_eq!(payload.to_no_plus, "15551234567");
        assert_eq!(payload.from, "+15550001111");
        assert_eq!(payload.from_no_plus, "15550001111");
        assert_eq!(payload.channel, "15550001111");
        assert!(payload.metadata.is_none());
        assert!(payload.attachments.is_none());
    }

    #[test]
    fn payload_wire_format() {
        let ch = channel();
        let mut m = msg("pick one");
        m.quick_replies = vec!["yes".to_string(), "no".to_string()];
        m.attachments = vec!["image/jpeg:https://cdn.example.com/a.jpg".to_string()];

        let json = serde_json::to_value(DataPayload::new(&ch, &m)).unwrap();
        assert_eq!(json["ID"], "10");
        assert_eq!(json["Text"], "pick one");
        assert_eq!(json["ToNoPlus"], "15551234567");
        assert_eq!(json["FromNoPlus"], "15550001111");
        assert_eq!(json["Metadata"]["quick_replies"][1], "no");
        assert_eq!(
            json["Attachments"][0],
            "image/jpeg:https://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn optional_fields_omitted() {
        let json = serde_json::to_value(DataPayload::new(&channel(), &msg("hi"))).unwrap();
        assert!(json.get("Metadata").is_none());
        assert!(json.get("Attachments").is_none());
    }

    #[test]
    fn parts_for_text_attachments_and_empty() {
        let ch = channel();
        assert_eq!(send_parts(&ch, &msg("hello")).count(), 1);
        assert_eq!(send_parts(&ch, &msg("")).count(), 0);

        let mut media_only = msg("");
        media_only.attachments = vec!["https://cdn.example.com/b.png".to_string()];
        assert_eq!(send_parts(&ch, &media_only).count(), 0);

        let mut captioned = msg("look");
        captioned.attachments = media_only.attachments.clone();
        let parts: Vec<_> = send_parts(&ch, &captioned).collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].payload.attachments, Some(captioned.attachments.clone()));
    }

    #[test]
    fn external_id_from_response() {
        assert_eq!(parse_external_id(r#"{"id":"abc"}"#), Some("abc".to_string()));
        assert_eq!(parse_external_id(r#"{"id":42}"#), Some("42".to_string()));
        assert_eq!(parse_external_id(r#"{"id":""}"#), None);
        assert_eq!(parse_external_id("ok"), None);
    }
}
