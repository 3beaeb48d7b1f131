//! Inquiry Space Sync - realtime full-state collaboration
//!
//! Keeps every open canvas of an Inquiry Space project on the same
//! aggregate:
//! - Hydrates a per-instance state store from persisted snapshots
//! - Broadcasts local changes to the project room, throttled
//! - Applies remote full states under a settle lock, dropping echoes
//! - Saves on drag-release/add/remove, periodically, and at teardown
//! - Lets external surfaces append scrapbook material
//!
//! # Example
//!
//! ```rust,ignore
//! use inquiry_sync::prelude::*;
//!
//! let hub = LocalHub::new();
//! let gateway: Arc<dyn PersistenceGateway> = Arc::new(MemoryGateway::new());
//! let store = StateStore::new();
//!
//! let coordinator = SyncCoordinator::new(
//!     store.clone(),
//!     gateway,
//!     Arc::new(hub.connect()),
//!     SessionIdentity::for_author(Author::new("u1", "Ada")),
//!     SyncConfig::default(),
//! );
//! coordinator.start(ProjectId::new("p1")).await?;
//! coordinator.add_card(CardDraft::new("Tides follow the moon"))?;
//! coordinator.teardown().await;
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod coordinator;
pub mod echo;
pub mod error;
pub mod gateway;
pub mod store;
pub mod transport;
pub mod writer;

pub use config::SyncConfig;
pub use coordinator::{
    NodeUpdate, RemoteOutcome, SaveOutcome, SessionIdentity, SyncCoordinator, SyncPhase,
    SyncStats,
};
pub use echo::{RecentOperations, RECENT_OPERATION_CAPACITY};
pub use error::{ConfigError, GatewayError, StoreError, SyncError, TransportError, WriterError};
pub use gateway::{
    FileGateway, MemoryGateway, PersistenceGateway, StoredSnapshot, DEFAULT_HISTORY_LIMIT,
};
pub use store::{StateStore, StoreView, StoreWriter};
pub use transport::{EndpointId, LocalChannel, LocalHub, RoomChannel, Subscription, SubscriptionId};
pub use writer::ScrapbookWriter;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosting a sync session
    pub use crate::{
        LocalHub, MemoryGateway, PersistenceGateway, RoomChannel, ScrapbookWriter,
        SessionIdentity, StateStore, SyncConfig, SyncCoordinator, SyncPhase,
    };
    pub use inquiry_model::{
        Author, CardDraft, NodeKind, Position, ProjectId, Relation, Snapshot,
    };
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
