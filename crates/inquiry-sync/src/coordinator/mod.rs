//! Sync coordinator
//!
//! Binds one canvas session to one project: hydrates the store from the
//! persistence gateway, broadcasts local changes to the project room,
//! applies remote full states, and saves on a schedule.
//!
//! # Core Concepts
//!
//! - **Phase**: `Uninitialized -> Hydrating -> Hydrated`, back to
//!   `Uninitialized` on teardown. Broadcasts and scheduled saves only happen
//!   while `Hydrated`.
//! - **Sync lock**: held while a hydrated or remote state settles. Local
//!   changes made under it are never broadcast, so absorbing a remote state
//!   cannot bounce it back to the room.
//! - **Echo suppression**: operations carrying this session's client id, or
//!   an id it recently emitted, are dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = SyncCoordinator::new(
//!     store.clone(),
//!     gateway,
//!     channel,
//!     SessionIdentity::for_author(Author::new("u1", "Ada")),
//!     SyncConfig::default(),
//! );
//! coordinator.start(ProjectId::new("p1")).await?;
//! let node = coordinator.create_node(NodeKind::Claim, Position::new(0.0, 0.0), "Tides")?;
//! coordinator.release_node(&node, Position::new(40.0, 10.0))?;
//! coordinator.teardown().await;
//! ```

mod mutations;
mod session;

pub use mutations::NodeUpdate;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::gateway::PersistenceGateway;
use crate::store::StateStore;
use crate::transport::RoomChannel;
use inquiry_model::{Author, ClientId, ProjectId, SyncOperation};
use session::{Inner, SaveReason};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Coordinator lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// No session
    Uninitialized,
    /// Session open, persisted state not yet applied and settled
    Hydrating,
    /// Broadcasting and saving
    Hydrated,
}

impl SyncPhase {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Hydrating => "hydrating",
            Self::Hydrated => "hydrated",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to an incoming operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOutcome {
    /// Store replaced with the carried state
    Applied,
    /// No session is active
    Inactive,
    /// Addressed to another room
    ForeignRoom,
    /// Sent by this session
    OwnClient,
    /// Id matches a recently emitted operation
    Echo,
    /// Carries no full state
    NoState,
    /// Full state does not decode
    Undecodable,
}

impl RemoteOutcome {
    /// Whether the store was replaced
    #[inline]
    #[must_use]
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Result of one save attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveOutcome {
    /// Gateway accepted the snapshot
    Saved,
    /// Aggregate was empty
    SkippedEmpty,
    /// Session not hydrated
    SkippedNotHydrated,
    /// Encode or gateway failure, already logged
    Failed,
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncStats {
    /// Operations accepted by the channel
    pub broadcasts_sent: u64,
    /// Throttle windows that closed without emitting
    pub broadcasts_skipped: u64,
    /// Operations the channel refused
    pub broadcast_failures: u64,
    /// Remote states applied
    pub remote_applied: u64,
    /// Own operations dropped on arrival
    pub echoes_suppressed: u64,
    /// Incoming operations without a usable state
    pub remote_rejected: u64,
    /// Snapshots accepted by the gateway
    pub saves_completed: u64,
    /// Saves skipped for an empty aggregate
    pub saves_skipped: u64,
    /// Saves that failed
    pub save_failures: u64,
}

/// Who a coordinator writes as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Stable for the coordinator's lifetime
    pub client_id: ClientId,
    /// Author stamped on created cards
    pub author: Author,
}

impl SessionIdentity {
    /// Explicit client id
    #[must_use]
    pub fn new(client_id: ClientId, author: Author) -> Self {
        Self { client_id, author }
    }

    /// Fresh `session-*` client id
    #[must_use]
    pub fn for_author(author: Author) -> Self {
        Self::new(ClientId::session(), author)
    }
}

/// Handle to one canvas sync session; clones share the session
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("client_id", &self.inner.identity.client_id)
            .field("phase", &self.inner.phase())
            .field("project", &self.inner.project())
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Create an idle coordinator
    #[must_use]
    pub fn new(
        store: StateStore,
        gateway: Arc<dyn PersistenceGateway>,
        channel: Arc<dyn RoomChannel>,
        identity: SessionIdentity,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner::new(store, gateway, channel, identity, config)),
        }
    }

    /// Open a session for `project`; resolves once hydrated
    ///
    /// Fetch failures and malformed snapshots hydrate an empty aggregate.
    ///
    /// # Errors
    /// Returns error if a session is already active, the store writer is
    /// held elsewhere, or the session is torn down before hydrating
    pub async fn start(&self, project: ProjectId) -> Result<(), SyncError> {
        let inner = &self.inner;
        let opened = inner.open(&project)?;
        tracing::info!(
            project = %project,
            client = %inner.identity.client_id,
            fast_path = opened.fast_path,
            "sync session starting"
        );

        inner.join(&opened.room).await;

        if opened.fast_path {
            inner.finish_fast_path(opened.epoch);
        } else {
            let fetched = inner.fetch(&project).await;
            inner.hydrate(opened.epoch, fetched);
        }

        inner.wait_hydrated(opened.epoch).await
    }

    /// Close the session: stop timers, leave the room, final save
    pub async fn teardown(&self) {
        self.inner.teardown().await;
    }

    /// Tear down and start on another project
    ///
    /// # Errors
    /// See [`Self::start`]
    pub async fn switch_project(&self, project: ProjectId) -> Result<(), SyncError> {
        self.teardown().await;
        self.start(project).await
    }

    /// Apply an incoming operation
    ///
    /// Normally driven by the room subscription; exposed for hosts that
    /// receive operations through another path.
    pub fn apply_remote(&self, operation: &SyncOperation) -> RemoteOutcome {
        self.inner.apply_remote(operation)
    }

    /// Rendering caught up with the last applied state; release the lock now
    pub fn rendering_settled(&self) {
        self.inner.release_lock(None, None);
    }

    /// Save the current aggregate immediately
    pub async fn save_now(&self) -> SaveOutcome {
        match self.inner.capture_for_save(None, None) {
            Some((project, snapshot)) => {
                self.inner
                    .persist(project, snapshot, SaveReason::Manual)
                    .await
            }
            None => SaveOutcome::SkippedNotHydrated,
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.inner.phase()
    }

    /// Observe phase changes
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<SyncPhase> {
        self.inner.phase.subscribe()
    }

    /// Project of the active session
    #[must_use]
    pub fn project(&self) -> Option<ProjectId> {
        self.inner.project()
    }

    /// Whether the sync lock is held
    #[must_use]
    pub fn is_lock_held(&self) -> bool {
        self.inner.is_lock_held()
    }

    /// Session client id
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.inner.identity.client_id
    }

    /// Session author
    #[inline]
    #[must_use]
    pub fn author(&self) -> &Author {
        &self.inner.identity.author
    }

    /// Store this coordinator writes
    #[inline]
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    /// Timing configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Counters since construction
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.inner.stats()
    }
}
