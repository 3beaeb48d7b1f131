//! Snapshot encoding
//!
//! Two layers: the structured JSON text (what realtime operations carry) and
//! the persisted blob, which is standard base64 over the JSON's UTF-8 bytes
//! so arbitrary Unicode survives a text-only storage field.

use crate::error::CodecError;
use crate::snapshot::Snapshot;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque persisted form of a snapshot (base64 text)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedSnapshot(String);

impl EncodedSnapshot {
    /// Wrap base64 text received from storage; not validated until decoded
    #[inline]
    #[must_use]
    pub fn from_base64(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    /// Encode arbitrary text
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self(STANDARD.encode(text.as_bytes()))
    }

    /// Decode back into text
    ///
    /// # Errors
    /// Returns error if the blob is not base64 or not UTF-8
    pub fn to_text(&self) -> Result<String, CodecError> {
        let bytes = STANDARD.decode(self.0.as_bytes())?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Base64 text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap the base64 text
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Length of the base64 text
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EncodedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transfer shape of a per-project snapshot resource: `{ "data": "<base64>" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResource {
    /// Owning project, present on responses
    #[serde(default, alias = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Encoded snapshot
    pub data: EncodedSnapshot,
}

impl SnapshotResource {
    /// Resource for a save request
    #[must_use]
    pub fn new(data: EncodedSnapshot) -> Self {
        Self {
            project_id: None,
            data,
        }
    }

    /// With owning project
    #[inline]
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// Structured text form; transient flags are never emitted
///
/// # Errors
/// Returns error if serialization fails
pub fn to_json(snapshot: &Snapshot) -> Result<String, CodecError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Parse the structured text form
///
/// # Errors
/// Returns error on malformed JSON or unknown enum values
pub fn from_json(text: &str) -> Result<Snapshot, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode for persistence
///
/// # Errors
/// Returns error if serialization fails
pub fn encode(snapshot: &Snapshot) -> Result<EncodedSnapshot, CodecError> {
    Ok(EncodedSnapshot::from_text(&to_json(snapshot)?))
}

/// Decode a persisted blob
///
/// # Errors
/// Returns error if any layer (base64, UTF-8, JSON) is malformed
pub fn decode(blob: &EncodedSnapshot) -> Result<Snapshot, CodecError> {
    from_json(&blob.to_text()?)
}
