//! Structured acknowledgements returned to webhook callers.
//!
//! Every answer has the same envelope: `{"message": <label>, "data": [...]}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelHandlerError;
use crate::types::{IncomingMsg, MsgId, MsgStatus, MsgStatusValue};

pub const EVENTS_HANDLED: &str = "Events Handled";
pub const IGNORED: &str = "Ignored";
pub const ERROR: &str = "Error";

/// One per-item result in a webhook response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    Msg {
        channel_uuid: Uuid,
        msg_uuid: Uuid,
        text: String,
        urn: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<String>,
        external_id: String,
        received_on: DateTime<Utc>,
    },
    Status {
        channel_uuid: Uuid,
        status: MsgStatusValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        msg_id: Option<MsgId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_id: Option<String>,
    },
    Contact {
        contact_uuid: Uuid,
    },
    Info {
        info: String,
    },
    Error {
        error: String,
    },
}

impl ResponseData {
    pub fn msg_received(msg: &IncomingMsg) -> Self {
        ResponseData::Msg {
            channel_uuid: msg.channel_uuid,
            msg_uuid: msg.uuid,
            text: msg.text.clone(),
            urn: msg.urn.to_string(),
            attachments: msg.attachments.clone(),
            external_id: msg.external_id.clone(),
            received_on: msg.received_on,
        }
    }

    pub fn status(status: &MsgStatus) -> Self {
        ResponseData::Status {
            channel_uuid: status.channel_uuid,
            status: status.status,
            msg_id: status.msg_id,
            external_id: status.external_id.clone(),
        }
    }

    pub fn contact_registered(contact_uuid: Uuid) -> Self {
        ResponseData::Contact { contact_uuid }
    }

    pub fn info(info: impl Into<String>) -> Self {
        ResponseData::Info { info: info.into() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ResponseData::Error {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub message: String,
    pub data: Vec<ResponseData>,
}

/// HTTP status plus envelope, ready to be written back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: ResponseEnvelope,
}

impl WebhookResponse {
    pub fn events_handled(data: Vec<ResponseData>) -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseEnvelope {
                message: EVENTS_HANDLED.to_string(),
                data,
            },
        }
    }

    pub fn ignored(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseEnvelope {
                message: IGNORED.to_string(),
                data: vec![ResponseData::info(reason)],
            },
        }
    }

    pub fn request_error(err: &ChannelHandlerError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ResponseEnvelope {
                message: ERROR.to_string(),
                data: vec![ResponseData::error(err.to_string())],
            },
        }
    }

    pub fn not_found(err: &ChannelHandlerError) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            ..Self::request_error(err)
        }
    }

    /// A hard failure after some items were already committed. The committed
    /// items are reported ahead of the error.
    pub fn partial_failure(mut completed: Vec<ResponseData>, err: &ChannelHandlerError) -> Self {
        completed.push(ResponseData::error(err.to_string()));
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ResponseEnvelope {
                message: ERROR.to_string(),
                data: completed,
            },
        }
    }

    /// Map a handler error to the right response class.
    pub fn from_error(completed: Vec<ResponseData>, err: &ChannelHandlerError) -> Self {
        if err.is_request_error() {
            let mut resp = Self::request_error(err);
            if !completed.is_empty() {
                let mut data = completed;
                data.append(&mut resp.body.data);
                resp.body.data = data;
            }
            resp
        } else {
            Self::partial_failure(completed, err)
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.body.message == IGNORED
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
