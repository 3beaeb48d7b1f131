//! Session lifecycle: hydration paths, teardown and project switching

use inquiry_model::{EncodedSnapshot, RoomId, Snapshot};
use inquiry_sync::{
    LocalHub, PersistenceGateway, RoomChannel, SessionIdentity, StoreError, SyncConfig,
    SyncCoordinator, SyncError, SyncPhase,
};
use inquiry_test_utils::{
    author, claim, other_project, project, remote_state, sample_snapshot, InstrumentedGateway,
    Peer,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn hydrates_stored_snapshot_after_settle() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    gateway.seed(&project(), &sample_snapshot()).await;
    let peer = Peer::new(&hub, &gateway, "a");

    let mut phase = peer.coordinator.watch_phase();
    let started = tokio::time::Instant::now();
    peer.coordinator.start(project()).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(*phase.borrow_and_update(), SyncPhase::Hydrated);
    assert_eq!(peer.snapshot(), sample_snapshot());
    assert_eq!(peer.store.project_id(), Some(project()));
    assert_eq!(gateway.fetch_calls(), 1);
    assert_eq!(hub.members(&RoomId::for_project(&project())), vec![peer.channel.id()]);
}

#[tokio::test(start_paused = true)]
async fn render_acknowledgement_ends_hydration_early() {
    let gateway = InstrumentedGateway::new();
    gateway.seed(&project(), &sample_snapshot()).await;
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");

    let coordinator = peer.coordinator.clone();
    let starting = tokio::spawn(async move { coordinator.start(project()).await });
    sleep(Duration::from_millis(10)).await;
    assert_eq!(peer.coordinator.phase(), SyncPhase::Hydrating);
    assert!(peer.coordinator.is_lock_held());

    let acknowledged = tokio::time::Instant::now();
    peer.coordinator.rendering_settled();
    starting.await.unwrap().unwrap();
    assert!(acknowledged.elapsed() < Duration::from_millis(300));
    assert_eq!(peer.coordinator.phase(), SyncPhase::Hydrated);
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_hydrates_empty() {
    let gateway = InstrumentedGateway::new();
    gateway.seed(&project(), &sample_snapshot()).await;
    gateway.fail_fetches(true);
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");

    peer.coordinator.start(project()).await.unwrap();

    assert_eq!(peer.coordinator.phase(), SyncPhase::Hydrated);
    assert!(peer.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn malformed_snapshot_hydrates_empty() {
    let gateway = InstrumentedGateway::new();
    gateway
        .seed_raw(&project(), EncodedSnapshot::from_text("{not json"))
        .await;
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");

    peer.coordinator.start(project()).await.unwrap();

    assert_eq!(peer.coordinator.phase(), SyncPhase::Hydrated);
    assert!(peer.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reentering_same_project_skips_fetch() {
    let gateway = InstrumentedGateway::new();
    gateway.seed(&project(), &sample_snapshot()).await;
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");

    peer.coordinator.start(project()).await.unwrap();
    peer.coordinator.teardown().await;
    peer.coordinator.start(project()).await.unwrap();

    assert_eq!(gateway.fetch_calls(), 1);
    assert_eq!(peer.coordinator.phase(), SyncPhase::Hydrated);
    assert_eq!(peer.snapshot(), sample_snapshot());
}

#[tokio::test(start_paused = true)]
async fn switching_projects_clears_and_rehydrates() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let second = Snapshot {
        nodes: vec![claim("other", 5.0, 5.0)],
        ..Snapshot::new()
    };
    gateway.seed(&project(), &sample_snapshot()).await;
    gateway.seed(&other_project(), &second).await;
    let peer = Peer::new(&hub, &gateway, "a");

    peer.coordinator.start(project()).await.unwrap();
    peer.coordinator.switch_project(other_project()).await.unwrap();

    assert_eq!(peer.snapshot(), second);
    assert_eq!(peer.store.project_id(), Some(other_project()));
    assert_eq!(peer.coordinator.project(), Some(other_project()));
    assert!(hub.members(&RoomId::for_project(&project())).is_empty());
    assert_eq!(
        hub.members(&RoomId::for_project(&other_project())),
        vec![peer.channel.id()]
    );
}

#[tokio::test(start_paused = true)]
async fn teardown_leaves_room_and_saves_final_state() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&hub, &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();

    let node = peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    peer.coordinator.teardown().await;

    assert_eq!(peer.coordinator.phase(), SyncPhase::Uninitialized);
    assert!(hub.members(&RoomId::for_project(&project())).is_empty());
    assert!(gateway.last_saved(&project()).unwrap().node(&node).is_some());
    assert!(!peer.store.has_writer());
    assert!(matches!(
        peer.coordinator.add_node(claim("n2", 0.0, 0.0)),
        Err(SyncError::NotStarted)
    ));

    // The pending broadcast went out once; timers died with the session.
    let saves = gateway.save_calls();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(gateway.save_calls(), saves);
    assert_eq!(hub.sent_operations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_flushes_change_inside_throttle_window() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let a = Peer::new(&hub, &gateway, "a");
    let b = Peer::new(&hub, &gateway, "b");
    a.coordinator.start(project()).await.unwrap();
    b.coordinator.start(project()).await.unwrap();

    let node = a.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_millis(50)).await;
    a.coordinator.teardown().await;
    sleep(Duration::from_secs(2)).await;

    assert_eq!(hub.sent_operations().len(), 1);
    assert_eq!(a.coordinator.stats().broadcasts_sent, 1);
    assert!(b.snapshot().node(&node).is_some());
    assert!(gateway.last_saved(&project()).unwrap().node(&node).is_some());
}

#[tokio::test(start_paused = true)]
async fn teardown_under_the_lock_sends_nothing() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&hub, &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();
    peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();

    let remote = remote_state(&project(), "session-b", &sample_snapshot());
    assert!(peer.coordinator.apply_remote(&remote).is_applied());
    peer.coordinator.teardown().await;

    assert!(hub.sent_operations().is_empty());
    assert_eq!(peer.coordinator.stats().broadcasts_skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_before_hydration_discards_fetch_and_skips_save() {
    let gateway = InstrumentedGateway::new();
    gateway.seed(&project(), &sample_snapshot()).await;
    gateway.memory().set_latency(Duration::from_secs(1));
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");

    let coordinator = peer.coordinator.clone();
    let starting = tokio::spawn(async move { coordinator.start(project()).await });
    sleep(Duration::from_millis(100)).await;
    peer.coordinator.teardown().await;

    let outcome = starting.await.unwrap();
    assert!(matches!(outcome, Err(SyncError::TornDown)));
    assert!(peer.snapshot().is_empty());
    assert_eq!(gateway.save_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_state_during_hydration_wins_over_fetch() {
    let gateway = InstrumentedGateway::new();
    gateway.seed(&project(), &sample_snapshot()).await;
    gateway.memory().set_latency(Duration::from_secs(1));
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");

    let coordinator = peer.coordinator.clone();
    let starting = tokio::spawn(async move { coordinator.start(project()).await });
    sleep(Duration::from_millis(100)).await;

    let newer = Snapshot {
        nodes: vec![claim("fresh", 1.0, 1.0)],
        ..Snapshot::new()
    };
    let outcome = peer
        .coordinator
        .apply_remote(&remote_state(&project(), "session-b", &newer));
    assert!(outcome.is_applied());

    starting.await.unwrap().unwrap();
    assert_eq!(peer.snapshot(), newer);
    assert_eq!(peer.store.project_id(), Some(project()));
}

#[tokio::test]
async fn second_coordinator_on_a_store_is_refused() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let first = Peer::new(&hub, &gateway, "a");

    let persistence: Arc<dyn PersistenceGateway> = gateway.clone();
    let channel: Arc<dyn RoomChannel> = Arc::new(hub.connect());
    let second = SyncCoordinator::new(
        first.store.clone(),
        persistence,
        channel,
        SessionIdentity::for_author(author("b")),
        SyncConfig::default(),
    );

    first.coordinator.start(project()).await.unwrap();
    assert!(matches!(
        second.start(project()).await,
        Err(SyncError::Store(StoreError::WriterClaimed))
    ));

    first.coordinator.teardown().await;
    second.start(project()).await.unwrap();
    assert_eq!(second.phase(), SyncPhase::Hydrated);
}

#[tokio::test]
async fn double_start_is_refused() {
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();

    let err = peer.coordinator.start(other_project()).await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadyStarted(p) if p == project()));
}

#[tokio::test(start_paused = true)]
async fn offline_channel_does_not_block_hydration() {
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");
    peer.channel.set_online(false);

    peer.coordinator.start(project()).await.unwrap();
    peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_millis(300)).await;

    assert_eq!(peer.coordinator.phase(), SyncPhase::Hydrated);
    assert_eq!(peer.coordinator.stats().broadcast_failures, 1);
    assert_eq!(gateway.save_calls(), 1);
}
