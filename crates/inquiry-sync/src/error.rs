//! Error types for Inquiry Space sync
//!
//! Network-facing failures (gateway, transport) are logged by the
//! coordinator and never reach callers of local mutations. The enums below
//! are what the lifecycle, the mutation API and the writer adapter return.

use inquiry_model::{CardId, CodecError, EdgeId, NodeId, ProjectId};
use std::path::PathBuf;

/// Persistence gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request did not complete
    #[error("snapshot request failed: {0}")]
    Request(String),

    /// Project id cannot address a snapshot
    #[error("invalid project id {0:?}")]
    InvalidProject(String),

    /// Payload rejected by the store
    #[error("invalid snapshot payload: {0}")]
    InvalidPayload(String),

    /// Storage I/O failed
    #[error("snapshot storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored resource is not a snapshot resource
    #[error("malformed snapshot resource: {0}")]
    Resource(#[from] serde_json::Error),
}

/// Room channel errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Endpoint is not connected
    #[error("channel disconnected")]
    Disconnected,

    /// Channel refused the request
    #[error("channel rejected request: {0}")]
    Rejected(String),
}

/// State store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another coordinator holds the writer capability
    #[error("store writer already claimed")]
    WriterClaimed,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`crate::SyncConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config value out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Coordinator errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No project session is active
    #[error("sync session not started")]
    NotStarted,

    /// A session is already active
    #[error("sync session already started for project {0}")]
    AlreadyStarted(ProjectId),

    /// Session was torn down before hydration finished
    #[error("sync session torn down")]
    TornDown,

    /// Store capability error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Node not present in the aggregate
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Node id already present
    #[error("duplicate node {0}")]
    DuplicateNode(NodeId),

    /// Edge not present in the aggregate
    #[error("unknown edge {0}")]
    UnknownEdge(EdgeId),

    /// Card not present in the aggregate
    #[error("unknown card {0}")]
    UnknownCard(CardId),
}

impl SyncError {
    /// Whether the error names an id missing from the aggregate
    #[inline]
    #[must_use]
    pub fn is_unknown_id(&self) -> bool {
        matches!(
            self,
            Self::UnknownNode(_) | Self::UnknownEdge(_) | Self::UnknownCard(_)
        )
    }
}

/// External writer adapter errors
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// Aggregate could not be encoded
    #[error("encode failed: {0}")]
    Codec(#[from] CodecError),

    /// Save was rejected or failed
    #[error("save failed: {0}")]
    Save(#[from] GatewayError),
}
