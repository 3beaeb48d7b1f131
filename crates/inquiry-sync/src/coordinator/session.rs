//! Session state and scheduling behind [`super::SyncCoordinator`]
//!
//! Every timer task captures the session epoch and re-checks it under the
//! session mutex, so a task that outlives its session does nothing. Long
//! lived tasks hold a `Weak` to the coordinator.

use super::{RemoteOutcome, SaveOutcome, SessionIdentity, SyncPhase, SyncStats};
use crate::config::SyncConfig;
use crate::echo::RecentOperations;
use crate::error::SyncError;
use crate::gateway::PersistenceGateway;
use crate::store::{StateStore, StoreWriter};
use crate::transport::{RoomChannel, SubscriptionId};
use inquiry_model::{codec, ModuleKind, ProjectId, RoomId, Snapshot, SyncOperation};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// How a local change propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Change {
    /// Drag in progress
    Drag,
    /// Drag released
    DragEnd,
    /// Something added
    Add,
    /// Something removed
    Remove,
    /// Content edited
    Update,
    /// Per-session flags only
    Transient,
}

impl Change {
    fn broadcasts(self) -> bool {
        self != Self::Transient
    }

    fn saves(self) -> bool {
        matches!(self, Self::DragEnd | Self::Add | Self::Remove)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SaveReason {
    Debounced,
    Periodic,
    Final,
    Manual,
}

impl SaveReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debounced => "debounced",
            Self::Periodic => "periodic",
            Self::Final => "final",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncLock {
    Free,
    Held(u64),
}

/// Result of opening a session
pub(super) struct Opened {
    pub(super) epoch: u64,
    pub(super) room: RoomId,
    pub(super) fast_path: bool,
}

struct Session {
    epoch: u64,
    project: ProjectId,
    room: RoomId,
    writer: StoreWriter,
    subscription: SubscriptionId,
    lock: SyncLock,
    lock_generation: u64,
    hydration_resolved: bool,
    remote_during_hydration: bool,
    broadcast_pending: bool,
    save_generation: u64,
    recent: RecentOperations,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }
}

pub(super) struct Inner {
    pub(super) identity: SessionIdentity,
    pub(super) config: SyncConfig,
    pub(super) store: StateStore,
    pub(super) phase: watch::Sender<SyncPhase>,
    gateway: Arc<dyn PersistenceGateway>,
    channel: Arc<dyn RoomChannel>,
    session: Mutex<Option<Session>>,
    stats: Mutex<SyncStats>,
    epochs: AtomicU64,
}

impl Inner {
    pub(super) fn new(
        store: StateStore,
        gateway: Arc<dyn PersistenceGateway>,
        channel: Arc<dyn RoomChannel>,
        identity: SessionIdentity,
        config: SyncConfig,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Uninitialized);
        Self {
            identity,
            config,
            store,
            phase,
            gateway,
            channel,
            session: Mutex::new(None),
            stats: Mutex::new(SyncStats::default()),
            epochs: AtomicU64::new(0),
        }
    }

    pub(super) fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub(super) fn stats(&self) -> SyncStats {
        *self.stats.lock()
    }

    pub(super) fn project(&self) -> Option<ProjectId> {
        self.session.lock().as_ref().map(|s| s.project.clone())
    }

    pub(super) fn is_lock_held(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.lock != SyncLock::Free)
    }

    fn count(&self, update: impl FnOnce(&mut SyncStats)) {
        update(&mut self.stats.lock());
    }

    // ---- lifecycle ----

    pub(super) fn open(self: &Arc<Self>, project: &ProjectId) -> Result<Opened, SyncError> {
        let mut guard = self.session.lock();
        if let Some(active) = guard.as_ref() {
            return Err(SyncError::AlreadyStarted(active.project.clone()));
        }

        let writer = self.store.claim_writer()?;
        let fast_path = self.store.holds_project(project);
        if !fast_path && self.store.project_id().as_ref() != Some(project) {
            writer.clear();
        }

        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;
        let room = RoomId::for_project(project);
        let subscription = self
            .channel
            .subscribe(&ModuleKind::Inquiry.event_name());

        let mut session = Session {
            epoch,
            project: project.clone(),
            room: room.clone(),
            writer,
            subscription: subscription.id,
            lock: SyncLock::Free,
            lock_generation: 0,
            hydration_resolved: false,
            remote_during_hydration: false,
            broadcast_pending: false,
            save_generation: 0,
            recent: RecentOperations::new(self.config.recent_operation_capacity),
            tasks: Vec::new(),
        };
        session.track(tokio::spawn(listen(
            Arc::downgrade(self),
            subscription.operations,
        )));

        *guard = Some(session);
        self.phase.send_replace(SyncPhase::Hydrating);

        Ok(Opened {
            epoch,
            room,
            fast_path,
        })
    }

    pub(super) async fn join(&self, room: &RoomId) {
        if let Err(e) = self.channel.join_room(room, ModuleKind::Inquiry).await {
            tracing::warn!(room = %room, error = %e, "room join failed; continuing offline");
        }
    }

    pub(super) async fn fetch(&self, project: &ProjectId) -> Option<Snapshot> {
        match self.gateway.fetch_snapshot(project).await {
            Ok(Some(blob)) => match codec::decode(&blob) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!(project = %project, error = %e, "stored snapshot is malformed; starting empty");
                    None
                }
            },
            Ok(None) => {
                tracing::info!(project = %project, "no stored snapshot; starting empty");
                None
            }
            Err(e) => {
                tracing::warn!(project = %project, error = %e, "snapshot fetch failed; starting empty");
                None
            }
        }
    }

    pub(super) fn finish_fast_path(self: &Arc<Self>, epoch: u64) {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut().filter(|s| s.epoch == epoch) else {
            return;
        };
        self.resolve_hydration(session);
    }

    pub(super) fn hydrate(self: &Arc<Self>, epoch: u64, fetched: Option<Snapshot>) {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut().filter(|s| s.epoch == epoch) else {
            tracing::debug!("snapshot fetch resolved after teardown; discarded");
            return;
        };

        let project = Some(session.project.clone());
        match fetched {
            Some(_) if session.remote_during_hydration => {
                tracing::info!(project = %session.project, "remote state arrived first; fetched snapshot discarded");
                session
                    .writer
                    .replace_all(Snapshot::clone(&session.writer.snapshot()), project);
            }
            Some(snapshot) => {
                tracing::info!(project = %session.project, contents = %snapshot.counts(), "snapshot hydrated");
                session.writer.replace_all(snapshot, project);
                self.hold_lock(session, self.config.hydration_settle());
            }
            None => {
                session
                    .writer
                    .replace_all(Snapshot::clone(&session.writer.snapshot()), project);
            }
        }

        self.resolve_hydration(session);
    }

    pub(super) async fn wait_hydrated(&self, epoch: u64) -> Result<(), SyncError> {
        let mut phase = self.phase.subscribe();
        if phase
            .wait_for(|p| *p != SyncPhase::Hydrating)
            .await
            .is_err()
        {
            return Err(SyncError::TornDown);
        }

        let current = self.session.lock().as_ref().map(|s| s.epoch);
        if current == Some(epoch) && self.phase() == SyncPhase::Hydrated {
            Ok(())
        } else {
            Err(SyncError::TornDown)
        }
    }

    fn resolve_hydration(self: &Arc<Self>, session: &mut Session) {
        session.hydration_resolved = true;
        if session.lock == SyncLock::Free {
            self.enter_hydrated(session);
        }
    }

    fn enter_hydrated(self: &Arc<Self>, session: &mut Session) {
        if self.phase() == SyncPhase::Hydrated {
            return;
        }
        self.phase.send_replace(SyncPhase::Hydrated);
        session.track(tokio::spawn(autosave(
            Arc::downgrade(self),
            session.epoch,
            self.config.autosave_interval(),
        )));
        tracing::info!(
            project = %session.project,
            contents = %session.writer.snapshot().counts(),
            "sync session hydrated"
        );
    }

    pub(super) async fn teardown(self: &Arc<Self>) {
        let was_hydrated = self.phase() == SyncPhase::Hydrated;
        let (mut session, pending) = {
            let mut guard = self.session.lock();
            let Some(session) = guard.as_mut() else {
                return;
            };
            // A change still inside its throttle window goes out now.
            let pending = if was_hydrated && session.broadcast_pending {
                self.take_broadcast(session)
            } else {
                None
            };
            match guard.take() {
                Some(session) => (session, pending),
                None => return,
            }
        };
        self.phase.send_replace(SyncPhase::Uninitialized);

        for task in session.tasks.drain(..) {
            task.abort();
        }
        self.channel.unsubscribe(session.subscription);
        if let Some(operation) = pending {
            self.send(&operation).await;
        }
        if let Err(e) = self
            .channel
            .leave_room(&session.room, ModuleKind::Inquiry)
            .await
        {
            tracing::warn!(room = %session.room, error = %e, "room leave failed");
        }

        if was_hydrated {
            let snapshot = session.writer.snapshot();
            self.persist(session.project.clone(), snapshot, SaveReason::Final)
                .await;
        }

        tracing::info!(project = %session.project, "sync session closed");
    }

    // ---- sync lock ----

    fn hold_lock(self: &Arc<Self>, session: &mut Session, settle: Duration) {
        session.lock_generation += 1;
        let generation = session.lock_generation;
        session.lock = SyncLock::Held(generation);

        let weak = Arc::downgrade(self);
        let epoch = session.epoch;
        session.track(tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Some(inner) = weak.upgrade() {
                inner.release_lock(Some(epoch), Some(generation));
            }
        }));
    }

    /// Release the lock; `None` matches any epoch or hold
    pub(super) fn release_lock(self: &Arc<Self>, epoch: Option<u64>, generation: Option<u64>) {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return;
        };
        if epoch.is_some_and(|e| e != session.epoch) {
            return;
        }
        match (session.lock, generation) {
            (SyncLock::Free, _) => return,
            (SyncLock::Held(held), Some(expected)) if held != expected => return,
            _ => {}
        }

        session.lock = SyncLock::Free;
        tracing::debug!(project = %session.project, "sync lock released");
        if session.hydration_resolved {
            self.enter_hydrated(session);
        }
    }

    // ---- local changes ----

    pub(super) fn mutate<R>(
        self: &Arc<Self>,
        change: Change,
        apply: impl FnOnce(&mut Snapshot) -> Result<R, SyncError>,
    ) -> Result<R, SyncError> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(SyncError::NotStarted)?;

        let mut next = Snapshot::clone(&session.writer.snapshot());
        let out = apply(&mut next)?;
        session.writer.replace_all(next, None);

        if change.broadcasts() && self.phase() == SyncPhase::Hydrated {
            if session.lock == SyncLock::Free {
                self.schedule_broadcast(session);
            }
            if change.saves() {
                self.schedule_save(session);
            }
        }
        tracing::trace!(?change, "local change applied");
        Ok(out)
    }

    fn schedule_broadcast(self: &Arc<Self>, session: &mut Session) {
        if session.broadcast_pending {
            return;
        }
        session.broadcast_pending = true;

        let weak = Arc::downgrade(self);
        let epoch = session.epoch;
        let window = self.config.broadcast_throttle();
        session.track(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = weak.upgrade() {
                inner.flush_broadcast(epoch);
            }
        }));
    }

    fn flush_broadcast(self: &Arc<Self>, epoch: u64) {
        let operation = {
            let mut guard = self.session.lock();
            let Some(session) = guard.as_mut().filter(|s| s.epoch == epoch) else {
                return;
            };
            match self.take_broadcast(session) {
                Some(operation) => operation,
                None => return,
            }
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.send(&operation).await;
        });
    }

    /// Clear the pending flag and build the window's operation, unless the
    /// lock is held or the aggregate is empty
    fn take_broadcast(&self, session: &mut Session) -> Option<SyncOperation> {
        session.broadcast_pending = false;

        if self.phase() != SyncPhase::Hydrated || session.lock != SyncLock::Free {
            tracing::debug!(project = %session.project, "broadcast skipped: sync lock held");
            self.count(|s| s.broadcasts_skipped += 1);
            return None;
        }

        let snapshot = session.writer.snapshot();
        if snapshot.is_empty() {
            tracing::debug!(project = %session.project, "broadcast skipped: empty aggregate");
            self.count(|s| s.broadcasts_skipped += 1);
            return None;
        }

        match SyncOperation::full_state(
            session.room.clone(),
            self.identity.client_id.clone(),
            &snapshot,
        ) {
            Ok(operation) => {
                session.recent.record(operation.id.clone());
                Some(operation)
            }
            Err(e) => {
                tracing::error!(project = %session.project, error = %e, "cannot encode broadcast");
                self.count(|s| s.broadcast_failures += 1);
                None
            }
        }
    }

    async fn send(&self, operation: &SyncOperation) {
        match self.channel.send_operation(operation).await {
            Ok(()) => {
                self.count(|s| s.broadcasts_sent += 1);
                tracing::debug!(operation = %operation.id, room = %operation.room_id, "state broadcast");
            }
            Err(e) => {
                self.count(|s| s.broadcast_failures += 1);
                tracing::error!(operation = %operation.id, error = %e, "broadcast failed");
            }
        }
    }

    // ---- persistence ----

    fn schedule_save(self: &Arc<Self>, session: &mut Session) {
        session.save_generation += 1;
        let generation = session.save_generation;

        let weak = Arc::downgrade(self);
        let epoch = session.epoch;
        let debounce = self.config.save_debounce();
        session.track(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Some((project, snapshot)) = inner.capture_for_save(Some(epoch), Some(generation))
            {
                tokio::spawn(async move {
                    inner.persist(project, snapshot, SaveReason::Debounced).await;
                });
            }
        }));
    }

    /// Project and aggregate to save, if the session is hydrated
    pub(super) fn capture_for_save(
        &self,
        epoch: Option<u64>,
        save_generation: Option<u64>,
    ) -> Option<(ProjectId, Arc<Snapshot>)> {
        let guard = self.session.lock();
        let session = guard.as_ref()?;
        if epoch.is_some_and(|e| e != session.epoch)
            || save_generation.is_some_and(|g| g != session.save_generation)
            || self.phase() != SyncPhase::Hydrated
        {
            return None;
        }
        Some((session.project.clone(), session.writer.snapshot()))
    }

    pub(super) async fn persist(
        &self,
        project: ProjectId,
        snapshot: Arc<Snapshot>,
        reason: SaveReason,
    ) -> SaveOutcome {
        if snapshot.is_empty() {
            tracing::debug!(project = %project, reason = reason.as_str(), "save skipped: empty aggregate");
            self.count(|s| s.saves_skipped += 1);
            return SaveOutcome::SkippedEmpty;
        }

        let blob = match codec::encode(&snapshot) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!(project = %project, error = %e, "cannot encode snapshot");
                self.count(|s| s.save_failures += 1);
                return SaveOutcome::Failed;
            }
        };

        match self.gateway.save_snapshot(&project, &blob).await {
            Ok(()) => {
                self.count(|s| s.saves_completed += 1);
                tracing::debug!(
                    project = %project,
                    reason = reason.as_str(),
                    contents = %snapshot.counts(),
                    "snapshot saved"
                );
                SaveOutcome::Saved
            }
            Err(e) => {
                self.count(|s| s.save_failures += 1);
                tracing::error!(project = %project, reason = reason.as_str(), error = %e, "snapshot save failed");
                SaveOutcome::Failed
            }
        }
    }

    // ---- remote ----

    pub(super) fn apply_remote(self: &Arc<Self>, operation: &SyncOperation) -> RemoteOutcome {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return RemoteOutcome::Inactive;
        };

        if operation.room_id != session.room {
            return RemoteOutcome::ForeignRoom;
        }
        if operation.client_id == self.identity.client_id {
            self.count(|s| s.echoes_suppressed += 1);
            return RemoteOutcome::OwnClient;
        }
        if session.recent.contains(&operation.id) {
            self.count(|s| s.echoes_suppressed += 1);
            return RemoteOutcome::Echo;
        }

        let snapshot = match operation.decode_full_state() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.count(|s| s.remote_rejected += 1);
                return RemoteOutcome::NoState;
            }
            Err(e) => {
                tracing::warn!(operation = %operation.id, error = %e, "remote state does not decode");
                self.count(|s| s.remote_rejected += 1);
                return RemoteOutcome::Undecodable;
            }
        };

        tracing::debug!(
            operation = %operation.id,
            from = %operation.client_id,
            contents = %snapshot.counts(),
            "remote state applied"
        );
        session.writer.replace_all(snapshot, None);
        if self.phase() == SyncPhase::Hydrating {
            session.remote_during_hydration = true;
        }
        self.hold_lock(session, self.config.remote_settle());
        self.count(|s| s.remote_applied += 1);
        RemoteOutcome::Applied
    }
}

async fn listen(weak: Weak<Inner>, mut operations: mpsc::UnboundedReceiver<SyncOperation>) {
    while let Some(operation) = operations.recv().await {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let outcome = inner.apply_remote(&operation);
        tracing::trace!(operation = %operation.id, ?outcome, "remote operation handled");
    }
}

async fn autosave(weak: Weak<Inner>, epoch: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let Some((project, snapshot)) = inner.capture_for_save(Some(epoch), None) else {
            break;
        };
        tokio::spawn(async move {
            inner.persist(project, snapshot, SaveReason::Periodic).await;
        });
    }
}
