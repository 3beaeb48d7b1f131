//! Inquiry Space Model
//!
//! The shared aggregate edited by every Inquiry Space session, and the
//! formats it travels in.
//!
//! # Core Concepts
//!
//! - [`Snapshot`]: the `{nodes, edges, scrapbookCards}` aggregate of one project
//! - [`GraphNode`] / [`GraphEdge`]: the argument map
//! - [`ScrapbookCard`]: collected material, convertible into graph nodes
//! - [`EncodedSnapshot`]: the opaque base64 blob persisted per project
//! - [`SyncOperation`]: the realtime envelope carrying a full state
//!
//! # Example
//!
//! ```rust,ignore
//! use inquiry_model::{codec, Snapshot};
//!
//! let blob = codec::encode(&snapshot)?;
//! let restored = codec::decode(&blob)?;
//! assert_eq!(restored, snapshot.durable());
//! ```

#![warn(unreachable_pub)]

mod card;
pub mod codec;
mod error;
mod graph;
mod ids;
mod operation;
mod snapshot;

pub use card::{Author, CardDraft, CardKind, ScrapbookCard};
pub use codec::{EncodedSnapshot, SnapshotResource};
pub use error::CodecError;
pub use graph::{
    EdgeData, GraphEdge, GraphNode, NodeData, NodeKind, Position, Relation, ARGUMENT_EDGE_KIND,
};
pub use ids::{CardId, ClientId, EdgeId, NodeId, OperationId, ProjectId, RoomId};
pub use operation::{ModuleKind, OperationKind, OperationPayload, SyncOperation};
pub use snapshot::{Snapshot, SnapshotCounts};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current wall-clock time in Unix milliseconds
#[inline]
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
