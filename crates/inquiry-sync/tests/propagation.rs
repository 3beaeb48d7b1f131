//! Broadcast throttling, echo suppression, the sync lock and save scheduling

use inquiry_model::{ClientId, NodeId, OperationPayload, Position, ProjectId, SyncOperation};
use inquiry_sync::{LocalHub, RemoteOutcome, SaveOutcome, SyncPhase};
use inquiry_test_utils::{claim, project, remote_state, sample_snapshot, InstrumentedGateway, Peer};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::sleep;

fn x_of(operation: &SyncOperation, node: &NodeId) -> f64 {
    operation
        .decode_full_state()
        .unwrap()
        .unwrap()
        .node(node)
        .unwrap()
        .position
        .x
}

#[tokio::test(start_paused = true)]
async fn broadcasts_are_throttled_to_window_close_state() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&hub, &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();
    let node = peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_secs(1)).await;
    hub.clear_sent();

    for step in 0..10u32 {
        peer.coordinator
            .move_node(&node, Position::new(f64::from(step), 0.0))
            .unwrap();
        sleep(Duration::from_millis(30)).await;
    }
    sleep(Duration::from_secs(1)).await;

    let sent = hub.sent_operations();
    assert_eq!(sent.len(), 2);
    assert_eq!(x_of(&sent[0], &node), 6.0);
    assert_eq!(x_of(&sent[1], &node), 9.0);
}

#[tokio::test(start_paused = true)]
async fn outgoing_operations_follow_the_envelope_shape() {
    let hub = LocalHub::new();
    let peer = Peer::new(&hub, &InstrumentedGateway::new(), "a");
    peer.coordinator.start(project()).await.unwrap();
    peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_millis(250)).await;

    let sent = hub.sent_operations();
    assert_eq!(sent.len(), 1);
    let json = serde_json::to_value(&sent[0]).unwrap();
    assert_eq!(json["module"], "inquiry");
    assert_eq!(json["roomId"], "inquiry:p1");
    assert_eq!(json["clientId"], "session-a");
    assert_eq!(json["kind"], "update");
    assert_eq!(json["version"], 0);
    assert!(json["id"].as_str().unwrap().starts_with("state-"));
    assert!(json["payload"]["fullState"].as_str().unwrap().contains("\"n1\""));
}

#[tokio::test(start_paused = true)]
async fn empty_aggregate_is_never_broadcast_or_saved() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&hub, &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();

    let node = peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    peer.coordinator.delete_node(&node).unwrap();
    sleep(Duration::from_secs(1)).await;

    assert!(hub.sent_operations().is_empty());
    assert_eq!(gateway.save_calls(), 0);
    let stats = peer.coordinator.stats();
    assert_eq!(stats.broadcasts_skipped, 1);
    assert_eq!(stats.saves_skipped, 1);
    assert_eq!(peer.coordinator.save_now().await, SaveOutcome::SkippedEmpty);
}

#[tokio::test(start_paused = true)]
async fn selection_is_neither_broadcast_nor_persisted() {
    let hub = LocalHub::new();
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&hub, &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();
    let node = peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_secs(1)).await;
    hub.clear_sent();
    let saves = gateway.save_calls();

    peer.coordinator.set_node_selected(&node, true).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert!(hub.sent_operations().is_empty());
    assert_eq!(gateway.save_calls(), saves);

    peer.coordinator
        .release_node(&node, Position::new(5.0, 5.0))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    assert!(peer.snapshot().node(&node).unwrap().selected);
    assert!(!gateway.last_saved(&project()).unwrap().node(&node).unwrap().selected);
    let broadcast = hub.sent_operations()[0].payload.full_state.clone().unwrap();
    assert!(!broadcast.contains("selected"));
}

#[tokio::test(start_paused = true)]
async fn reflected_own_broadcast_is_dropped() {
    let hub = LocalHub::reflecting();
    let peer = Peer::new(&hub, &InstrumentedGateway::new(), "a");
    peer.coordinator.start(project()).await.unwrap();

    peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_millis(300)).await;

    let stats = peer.coordinator.stats();
    assert_eq!(stats.broadcasts_sent, 1);
    assert_eq!(stats.echoes_suppressed, 1);
    assert_eq!(stats.remote_applied, 0);
    assert!(!peer.coordinator.is_lock_held());
}

#[tokio::test(start_paused = true)]
async fn relayed_echo_is_caught_by_operation_id() {
    let hub = LocalHub::new();
    let peer = Peer::new(&hub, &InstrumentedGateway::new(), "a");
    peer.coordinator.start(project()).await.unwrap();
    peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_millis(300)).await;

    let mut relayed = hub.sent_operations()[0].clone();
    relayed.client_id = ClientId::new("relay");
    assert_eq!(peer.coordinator.apply_remote(&relayed), RemoteOutcome::Echo);

    let mut own = remote_state(&project(), "session-a", &sample_snapshot());
    assert_eq!(peer.coordinator.apply_remote(&own), RemoteOutcome::OwnClient);
    own.client_id = ClientId::new("session-b");
    assert_eq!(peer.coordinator.apply_remote(&own), RemoteOutcome::Applied);
}

#[tokio::test(start_paused = true)]
async fn unusable_operations_are_ignored() {
    let peer = Peer::new(&LocalHub::new(), &InstrumentedGateway::new(), "a");
    let foreign = remote_state(&ProjectId::new("elsewhere"), "session-b", &sample_snapshot());
    assert_eq!(peer.coordinator.apply_remote(&foreign), RemoteOutcome::Inactive);

    peer.coordinator.start(project()).await.unwrap();
    assert_eq!(peer.coordinator.apply_remote(&foreign), RemoteOutcome::ForeignRoom);

    let mut empty = remote_state(&project(), "session-b", &sample_snapshot());
    empty.payload = OperationPayload::default();
    assert_eq!(peer.coordinator.apply_remote(&empty), RemoteOutcome::NoState);

    let mut garbled = remote_state(&project(), "session-b", &sample_snapshot());
    garbled.payload.full_state = Some("{\"nodes\": [".to_string());
    assert_eq!(peer.coordinator.apply_remote(&garbled), RemoteOutcome::Undecodable);

    assert!(peer.snapshot().is_empty());
    assert_eq!(peer.coordinator.stats().remote_rejected, 2);
}

#[tokio::test(start_paused = true)]
async fn local_changes_under_the_lock_are_not_broadcast() {
    let hub = LocalHub::new();
    let peer = Peer::new(&hub, &InstrumentedGateway::new(), "a");
    peer.coordinator.start(project()).await.unwrap();

    let remote = remote_state(&project(), "session-b", &sample_snapshot());
    assert!(peer.coordinator.apply_remote(&remote).is_applied());
    assert!(peer.coordinator.is_lock_held());

    peer.coordinator
        .move_node(&NodeId::new("n1"), Position::new(9.0, 9.0))
        .unwrap();
    sleep(Duration::from_millis(400)).await;
    assert!(hub.sent_operations().is_empty());

    sleep(Duration::from_millis(200)).await;
    assert!(!peer.coordinator.is_lock_held());
    peer.coordinator
        .move_node(&NodeId::new("n1"), Position::new(10.0, 9.0))
        .unwrap();
    sleep(Duration::from_millis(250)).await;
    assert_eq!(hub.sent_operations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn render_acknowledgement_releases_the_lock() {
    let hub = LocalHub::new();
    let peer = Peer::new(&hub, &InstrumentedGateway::new(), "a");
    peer.coordinator.start(project()).await.unwrap();

    let remote = remote_state(&project(), "session-b", &sample_snapshot());
    peer.coordinator.apply_remote(&remote);
    peer.coordinator.rendering_settled();
    assert!(!peer.coordinator.is_lock_held());

    peer.coordinator
        .move_node(&NodeId::new("n2"), Position::new(1.0, 1.0))
        .unwrap();
    sleep(Duration::from_millis(250)).await;
    assert_eq!(hub.sent_operations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_settle_timer_does_not_release_a_newer_hold() {
    let peer = Peer::new(&LocalHub::new(), &InstrumentedGateway::new(), "a");
    peer.coordinator.start(project()).await.unwrap();

    let remote = remote_state(&project(), "session-b", &sample_snapshot());
    peer.coordinator.apply_remote(&remote);
    sleep(Duration::from_millis(400)).await;

    let again = remote_state(&project(), "session-b", &sample_snapshot());
    peer.coordinator.apply_remote(&again);
    sleep(Duration::from_millis(200)).await;
    assert!(peer.coordinator.is_lock_held(), "first timer must not release");

    sleep(Duration::from_millis(400)).await;
    assert!(!peer.coordinator.is_lock_held());
}

#[tokio::test(start_paused = true)]
async fn periodic_save_runs_while_hydrated() {
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();
    let node = peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    peer.coordinator
        .move_node(&node, Position::new(3.0, 3.0))
        .unwrap();

    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(gateway.save_calls(), 2);
    let saved = gateway.last_saved(&project()).unwrap();
    assert_eq!(saved.node(&node).unwrap().position, Position::new(3.0, 3.0));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.save_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn save_failures_are_counted_not_raised() {
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");
    peer.coordinator.start(project()).await.unwrap();
    gateway.fail_saves(true);

    let node = peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(peer.coordinator.stats().save_failures, 1);
    assert_eq!(peer.coordinator.save_now().await, SaveOutcome::Failed);

    gateway.fail_saves(false);
    peer.coordinator
        .release_node(&node, Position::new(1.0, 1.0))
        .unwrap();
    sleep(Duration::from_millis(150)).await;
    assert_eq!(peer.coordinator.stats().saves_completed, 1);
    assert_eq!(peer.coordinator.phase(), SyncPhase::Hydrated);
}

#[tokio::test]
async fn save_now_requires_a_hydrated_session() {
    let gateway = InstrumentedGateway::new();
    let peer = Peer::new(&LocalHub::new(), &gateway, "a");
    assert_eq!(peer.coordinator.save_now().await, SaveOutcome::SkippedNotHydrated);

    peer.coordinator.start(project()).await.unwrap();
    peer.coordinator.add_node(claim("n1", 0.0, 0.0)).unwrap();
    assert_eq!(peer.coordinator.save_now().await, SaveOutcome::Saved);
    assert_eq!(gateway.last_saved(&project()).unwrap().nodes.len(), 1);
}
