//! In-memory [`Backend`] implementation.
//!
//! Holds channels, contacts, messages and the external-id dedupe set in
//! process memory. Used by the `relay` binary for single-node setups and by
//! the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ChannelConfig;
use crate::error::BackendError;
use crate::traits::Backend;
use crate::types::{ChannelType, Contact, IncomingMsg, MsgId, MsgStatus, MsgStatusValue};
use crate::urn::Urn;

/// Stored state of an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRecord {
    pub channel_uuid: Uuid,
    pub external_id: Option<String>,
    pub status: MsgStatusValue,
}

#[derive(Default)]
struct State {
    channels: HashMap<Uuid, ChannelConfig>,
    contacts: HashMap<Urn, Contact>,
    incoming: Vec<IncomingMsg>,
    seen: HashMap<(Uuid, String), Uuid>,
    outgoing: HashMap<MsgId, OutgoingRecord>,
    contact_lookups: u64,
    fail_msg_writes_after: Option<usize>,
    fail_status_writes_for: Option<String>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: impl IntoIterator<Item = ChannelConfig>) -> Self {
        let state = State {
            channels: channels.into_iter().map(|c| (c.uuid, c)).collect(),
            ..State::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn add_channel(&self, channel: ChannelConfig) {
        self.state.write().await.channels.insert(channel.uuid, channel);
    }

    /// Track an outgoing message so status updates can find it.
    pub async fn insert_outgoing(
        &self,
        channel_uuid: Uuid,
        msg_id: MsgId,
        external_id: Option<String>,
    ) {
        self.state.write().await.outgoing.insert(
            msg_id,
            OutgoingRecord {
                channel_uuid,
                external_id,
                status: MsgStatusValue::Pending,
            },
        );
    }

    /// Make every message write after the first `n` fail with a storage error.
    pub async fn fail_msg_writes_after(&self, n: usize) {
        self.state.write().await.fail_msg_writes_after = Some(n);
    }

    /// Make status writes addressed to `external_id` fail with a storage error.
    pub async fn fail_status_writes_for(&self, external_id: impl Into<String>) {
        self.state.write().await.fail_status_writes_for = Some(external_id.into());
    }

    pub async fn incoming_msgs(&self) -> Vec<IncomingMsg> {
        self.state.read().await.incoming.clone()
    }

    pub async fn contact(&self, urn: &Urn) -> Option<Contact> {
        self.state.read().await.contacts.get(urn).cloned()
    }

    pub async fn outgoing(&self, msg_id: MsgId) -> Option<OutgoingRecord> {
        self.state.read().await.outgoing.get(&msg_id).cloned()
    }

    /// Number of `get_contact` calls served.
    pub async fn contact_lookups(&self) -> u64 {
        self.state.read().await.contact_lookups
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_channel(
        &self,
        channel_type: &ChannelType,
        uuid: Uuid,
    ) -> Result<Option<ChannelConfig>, BackendError> {
        let state = self.state.read().await;
        Ok(state
            .channels
            .get(&uuid)
            .filter(|c| c.channel_type == *channel_type)
            .cloned())
    }

    async fn get_contact(
        &self,
        _channel: &ChannelConfig,
        urn: &Urn,
        name: Option<&str>,
    ) -> Result<Contact, BackendError> {
        let mut state = self.state.write().await;
        state.contact_lookups += 1;

        let contact = state.contacts.entry(urn.clone()).or_insert_with(|| {
            tracing::debug!(urn = %urn, "creating contact");
            Contact {
                uuid: Uuid::new_v4(),
                urn: urn.clone(),
                name: None,
                language: None,
            }
        });
        if contact.name.is_none() {
            contact.name = name.filter(|n| !n.is_empty()).map(str::to_string);
        }
        Ok(contact.clone())
    }

    async fn add_language_to_contact(
        &self,
        _channel: &ChannelConfig,
        language: &str,
        contact: &Contact,
    ) -> Result<Contact, BackendError> {
        let mut state = self.state.write().await;
        let stored = state
            .contacts
            .get_mut(&contact.urn)
            .filter(|c| c.uuid == contact.uuid)
            .ok_or_else(|| BackendError::ContactNotFound(contact.uuid.to_string()))?;
        stored.language = Some(language.to_string());
        Ok(stored.clone())
    }

    async fn write_msg(&self, msg: &IncomingMsg) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        if let Some(limit) = state.fail_msg_writes_after {
            if state.incoming.len() >= limit {
                return Err(BackendError::Storage("message store unavailable".to_string()));
            }
        }
        if msg.already_written {
            return Ok(());
        }
        state.incoming.push(msg.clone());
        Ok(())
    }

    async fn check_external_id_seen(
        &self,
        msg: &IncomingMsg,
    ) -> Result<Option<Uuid>, BackendError> {
        if msg.external_id.is_empty() {
            return Ok(None);
        }
        let state = self.state.read().await;
        Ok(state
            .seen
            .get(&(msg.channel_uuid, msg.external_id.clone()))
            .copied())
    }

    async fn write_external_id_seen(&self, msg: &IncomingMsg) -> Result<(), BackendError> {
        if msg.external_id.is_empty() {
            return Ok(());
        }
        self.state
            .write()
            .await
            .seen
            .insert((msg.channel_uuid, msg.external_id.clone()), msg.uuid);
        Ok(())
    }

    async fn write_msg_status(&self, status: &MsgStatus) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        if state.fail_status_writes_for.is_some()
            && state.fail_status_writes_for == status.external_id
        {
            return Err(BackendError::Storage("status store unavailable".to_string()));
        }

        let record = match (&status.msg_id, &status.external_id) {
            (Some(id), _) => state.outgoing.get_mut(id),
            (None, Some(external_id)) => state.outgoing.values_mut().find(|r| {
                r.channel_uuid == status.channel_uuid
                    && r.external_id.as_deref() == Some(external_id.as_str())
            }),
            (None, None) => None,
        }
        .ok_or(BackendError::MsgNotFound)?;

        record.status = status.status;
        if let Some(ref external_id) = status.external_id {
            record.external_id = Some(external_id.clone());
        }
        Ok(())
    }
}
