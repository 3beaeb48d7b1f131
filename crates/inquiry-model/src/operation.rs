//! Realtime operation envelope

use crate::codec;
use crate::error::CodecError;
use crate::ids::{ClientId, OperationId, RoomId};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

/// Feature module an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Whiteboard
    Collaboration,
    /// Rich-text documents
    Document,
    /// Chat
    Chat,
    /// Inquiry Space
    Inquiry,
}

impl ModuleKind {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Collaboration => "collaboration",
            ModuleKind::Document => "document",
            ModuleKind::Chat => "chat",
            ModuleKind::Inquiry => "inquiry",
        }
    }

    /// Event name subscribers listen on, e.g. `operation:inquiry`
    #[must_use]
    pub fn event_name(self) -> String {
        format!("operation:{}", self.as_str())
    }
}

/// Operation kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Element created
    Create,
    /// State updated
    Update,
    /// Element deleted
    Delete,
    /// Element moved
    Move,
    /// Presence information
    Awareness,
}

/// Operation body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPayload {
    /// Complete snapshot as JSON text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_state: Option<String>,
}

/// Envelope broadcast on a room
///
/// `client_id` identifies the emitting session for echo suppression only;
/// it carries no authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Unique per emission
    pub id: OperationId,
    /// Owning module
    pub module: ModuleKind,
    /// Target room
    pub room_id: RoomId,
    /// Emitting session
    pub client_id: ClientId,
    /// Emission time, Unix millis
    pub timestamp: i64,
    /// Always 0; receivers do not order by it
    #[serde(default)]
    pub version: u64,
    /// Kind tag
    #[serde(alias = "type")]
    pub kind: OperationKind,
    /// Body
    #[serde(default, alias = "data")]
    pub payload: OperationPayload,
}

impl SyncOperation {
    /// Full-state `update` operation for the inquiry module
    ///
    /// # Errors
    /// Returns error if the snapshot cannot be serialized
    pub fn full_state(
        room_id: RoomId,
        client_id: ClientId,
        snapshot: &Snapshot,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            id: OperationId::generate(),
            module: ModuleKind::Inquiry,
            room_id,
            client_id,
            timestamp: crate::now_millis(),
            version: 0,
            kind: OperationKind::Update,
            payload: OperationPayload {
                full_state: Some(codec::to_json(snapshot)?),
            },
        })
    }

    /// Snapshot carried by the operation, if any
    ///
    /// # Errors
    /// Returns error if the carried state is malformed
    pub fn decode_full_state(&self) -> Result<Option<Snapshot>, CodecError> {
        self.payload
            .full_state
            .as_deref()
            .map(codec::from_json)
            .transpose()
    }
}
