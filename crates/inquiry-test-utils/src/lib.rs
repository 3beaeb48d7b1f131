//! Testing utilities for the Inquiry Space workspace
//!
//! Shared fixtures, an instrumented gateway, and a peer harness wiring a
//! coordinator to a [`LocalHub`].

#![allow(missing_docs)]

use async_trait::async_trait;
use inquiry_model::{
    codec, Author, CardDraft, CardId, ClientId, EdgeId, EncodedSnapshot, GraphEdge, GraphNode,
    NodeData, NodeId, NodeKind, Position, ProjectId, Relation, RoomId, Snapshot, SyncOperation,
};
use inquiry_sync::{
    GatewayError, LocalChannel, LocalHub, MemoryGateway, PersistenceGateway, RoomChannel,
    SessionIdentity, StateStore, SyncConfig, SyncCoordinator,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn project() -> ProjectId {
    ProjectId::new("p1")
}

pub fn other_project() -> ProjectId {
    ProjectId::new("p2")
}

pub fn author(id: &str) -> Author {
    Author::new(id, format!("Researcher {id}"))
}

pub fn claim(id: &str, x: f64, y: f64) -> GraphNode {
    GraphNode::new(NodeId::new(id), NodeKind::Claim, Position::new(x, y)).with_data(NodeData {
        label: format!("Claim {id}"),
        ..NodeData::default()
    })
}

pub fn card(id: &str, content: &str) -> inquiry_model::ScrapbookCard {
    let mut card = CardDraft::new(content).into_card(&author("seed"), 1_700_000_000_000);
    card.id = CardId::new(id);
    card
}

/// Two claims joined by a `supports` edge, plus one card
pub fn sample_snapshot() -> Snapshot {
    Snapshot {
        nodes: vec![claim("n1", 0.0, 0.0), claim("n2", 200.0, 0.0)],
        edges: vec![GraphEdge::new(
            EdgeId::new("e1"),
            NodeId::new("n1"),
            NodeId::new("n2"),
            Relation::Supports,
        )],
        scrapbook_cards: vec![card("c1", "Tides follow the moon")],
    }
}

/// Full-state operation as another client would send it
pub fn remote_state(project: &ProjectId, client: &str, snapshot: &Snapshot) -> SyncOperation {
    SyncOperation::full_state(RoomId::for_project(project), ClientId::new(client), snapshot)
        .expect("fixture snapshot encodes")
}

/// Memory gateway with call counters, scripted failures and captured saves
#[derive(Debug, Default)]
pub struct InstrumentedGateway {
    memory: MemoryGateway,
    fetch_calls: AtomicUsize,
    save_calls: AtomicUsize,
    fail_fetches: AtomicBool,
    fail_saves: AtomicBool,
    saved: Mutex<Vec<(ProjectId, EncodedSnapshot)>>,
}

impl InstrumentedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn memory(&self) -> &MemoryGateway {
        &self.memory
    }

    /// Store `snapshot` as the latest version without counting a save
    pub async fn seed(&self, project: &ProjectId, snapshot: &Snapshot) {
        let blob = codec::encode(snapshot).expect("fixture snapshot encodes");
        self.memory
            .save_snapshot(project, &blob)
            .await
            .expect("seed save succeeds");
    }

    /// Store a raw blob as the latest version
    pub async fn seed_raw(&self, project: &ProjectId, blob: EncodedSnapshot) {
        self.memory
            .save_snapshot(project, &blob)
            .await
            .expect("seed save succeeds");
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Successfully saved snapshots of `project`, decoded, oldest first
    pub fn saved(&self, project: &ProjectId) -> Vec<Snapshot> {
        self.saved
            .lock()
            .iter()
            .filter(|(p, _)| p == project)
            .map(|(_, blob)| codec::decode(blob).expect("saved blob decodes"))
            .collect()
    }

    pub fn last_saved(&self, project: &ProjectId) -> Option<Snapshot> {
        self.saved(project).pop()
    }
}

#[async_trait]
impl PersistenceGateway for InstrumentedGateway {
    async fn fetch_snapshot(
        &self,
        project: &ProjectId,
    ) -> Result<Option<EncodedSnapshot>, GatewayError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("scripted fetch failure".to_string()));
        }
        self.memory.fetch_snapshot(project).await
    }

    async fn save_snapshot(
        &self,
        project: &ProjectId,
        snapshot: &EncodedSnapshot,
    ) -> Result<(), GatewayError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("scripted save failure".to_string()));
        }
        self.memory.save_snapshot(project, snapshot).await?;
        self.saved.lock().push((project.clone(), snapshot.clone()));
        Ok(())
    }
}

/// One canvas session on a hub
pub struct Peer {
    pub coordinator: SyncCoordinator,
    pub store: StateStore,
    pub channel: Arc<LocalChannel>,
}

impl Peer {
    pub fn new(hub: &LocalHub, gateway: &Arc<InstrumentedGateway>, name: &str) -> Self {
        Self::with_config(hub, gateway, name, SyncConfig::default())
    }

    pub fn with_config(
        hub: &LocalHub,
        gateway: &Arc<InstrumentedGateway>,
        name: &str,
        config: SyncConfig,
    ) -> Self {
        let store = StateStore::new();
        let channel = Arc::new(hub.connect());
        let room_channel: Arc<dyn RoomChannel> = channel.clone();
        let persistence: Arc<dyn PersistenceGateway> = gateway.clone();
        let coordinator = SyncCoordinator::new(
            store.clone(),
            persistence,
            room_channel,
            SessionIdentity::new(ClientId::new(format!("session-{name}")), author(name)),
            config,
        );
        Self {
            coordinator,
            store,
            channel,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::clone(&self.store.snapshot())
    }
}
