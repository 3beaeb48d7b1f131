//! Observable per-project state store
//!
//! Readers observe through a `watch` channel; only the holder of the
//! [`StoreWriter`] capability may replace or clear the aggregate. One writer
//! exists at a time, so two coordinators can never interleave writes into
//! the same store.

use crate::error::StoreError;
use inquiry_model::{ProjectId, Snapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// What observers see after each write
#[derive(Debug, Clone, Default)]
pub struct StoreView {
    /// Project the aggregate belongs to, if any
    pub project_id: Option<ProjectId>,
    /// Current aggregate
    pub snapshot: Arc<Snapshot>,
    /// Bumped on every write
    pub revision: u64,
}

#[derive(Debug)]
struct Shared {
    view: watch::Sender<StoreView>,
    writer_claimed: AtomicBool,
}

/// Shared observable aggregate
#[derive(Debug, Clone)]
pub struct StateStore {
    shared: Arc<Shared>,
}

impl StateStore {
    /// Create an empty, untagged store
    #[must_use]
    pub fn new() -> Self {
        let (view, _) = watch::channel(StoreView::default());
        Self {
            shared: Arc::new(Shared {
                view,
                writer_claimed: AtomicBool::new(false),
            }),
        }
    }

    /// Claim the writer capability
    ///
    /// # Errors
    /// Returns [`StoreError::WriterClaimed`] while another writer is alive
    pub fn claim_writer(&self) -> Result<StoreWriter, StoreError> {
        self.shared
            .writer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StoreError::WriterClaimed)?;

        Ok(StoreWriter {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Whether a writer is currently alive
    #[inline]
    #[must_use]
    pub fn has_writer(&self) -> bool {
        self.shared.writer_claimed.load(Ordering::Acquire)
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> StoreView {
        self.shared.view.borrow().clone()
    }

    /// Current aggregate
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.shared.view.borrow().snapshot)
    }

    /// Project the aggregate belongs to
    #[must_use]
    pub fn project_id(&self) -> Option<ProjectId> {
        self.shared.view.borrow().project_id.clone()
    }

    /// Whether the store holds the non-empty aggregate of `project`
    #[must_use]
    pub fn holds_project(&self, project: &ProjectId) -> bool {
        let view = self.shared.view.borrow();
        view.project_id.as_ref() == Some(project) && !view.snapshot.is_empty()
    }

    /// Observe every write
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreView> {
        self.shared.view.subscribe()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive write capability; released on drop
#[derive(Debug)]
pub struct StoreWriter {
    shared: Arc<Shared>,
}

impl StoreWriter {
    /// Replace the aggregate; `project` retags the store when given
    pub fn replace_all(&self, snapshot: Snapshot, project: Option<ProjectId>) {
        self.shared.view.send_modify(|view| {
            view.snapshot = Arc::new(snapshot);
            if let Some(project) = project {
                view.project_id = Some(project);
            }
            view.revision += 1;
        });
    }

    /// Empty the aggregate and drop the project tag
    pub fn clear(&self) {
        self.shared.view.send_modify(|view| {
            view.snapshot = Arc::new(Snapshot::new());
            view.project_id = None;
            view.revision += 1;
        });
    }

    /// Aggregate as last written
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.shared.view.borrow().snapshot)
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        self.shared.writer_claimed.store(false, Ordering::Release);
    }
}
