//! Property tests for the snapshot codec.
//!
//! Decoding an encoded snapshot must reproduce its durable fields exactly,
//! and encoding what was decoded must reproduce the same blob.

use inquiry_model::{
    codec, CardId, CardKind, EdgeId, GraphEdge, GraphNode, NodeData, NodeId, NodeKind, Position,
    Relation, ScrapbookCard, Snapshot,
};
use proptest::prelude::*;

fn node_kind() -> impl Strategy<Value = NodeKind> {
    prop_oneof![
        Just(NodeKind::Claim),
        Just(NodeKind::Evidence),
        Just(NodeKind::CounterArgument),
        Just(NodeKind::Rebuttal),
    ]
}

fn card_kind() -> impl Strategy<Value = CardKind> {
    prop_oneof![
        Just(CardKind::Text),
        Just(CardKind::Image),
        Just(CardKind::Link),
        Just(CardKind::AiResponse),
    ]
}

fn relation() -> impl Strategy<Value = Relation> {
    prop_oneof![
        Just(Relation::Supports),
        Just(Relation::Refutes),
        Just(Relation::Contains),
    ]
}

// Quarter steps keep every coordinate exactly representable in JSON text.
fn coordinate() -> impl Strategy<Value = f64> {
    (-40_000i32..40_000).prop_map(|v| f64::from(v) / 4.0)
}

fn graph_node() -> impl Strategy<Value = GraphNode> {
    (
        "[a-z0-9]{1,8}",
        node_kind(),
        coordinate(),
        coordinate(),
        "\\PC{0,24}",
        proptest::option::of("\\PC{0,24}"),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(id, kind, x, y, label, content, selected, dragging)| {
            let mut node = GraphNode::new(NodeId::new(id), kind, Position::new(x, y)).with_data(
                NodeData {
                    label,
                    content,
                    ..NodeData::default()
                },
            );
            node.selected = selected;
            node.dragging = dragging;
            node
        })
}

fn graph_edge() -> impl Strategy<Value = GraphEdge> {
    ("[a-z0-9]{1,8}", "[a-z0-9]{1,8}", "[a-z0-9]{1,8}", relation(), any::<bool>()).prop_map(
        |(id, source, target, relation, selected)| {
            let mut edge =
                GraphEdge::new(EdgeId::new(id), NodeId::new(source), NodeId::new(target), relation);
            edge.selected = selected;
            edge
        },
    )
}

fn card() -> impl Strategy<Value = ScrapbookCard> {
    (
        "[a-z0-9]{1,8}",
        card_kind(),
        "\\PC{0,40}",
        "\\PC{0,12}",
        any::<i64>(),
        proptest::option::of("https://[a-z]{1,10}\\.org"),
    )
        .prop_map(|(id, kind, content, author_name, created_at, source_url)| ScrapbookCard {
            id: CardId::new(id),
            kind,
            content,
            author_id: "u".into(),
            author_name,
            created_at,
            source_url,
            source_title: None,
            image_url: None,
            tags: None,
            position: None,
        })
}

fn snapshot() -> impl Strategy<Value = Snapshot> {
    (
        proptest::collection::vec(graph_node(), 0..8),
        proptest::collection::vec(graph_edge(), 0..8),
        proptest::collection::vec(card(), 0..8),
    )
        .prop_map(|(nodes, edges, scrapbook_cards)| Snapshot {
            nodes,
            edges,
            scrapbook_cards,
        })
}

proptest! {
    #[test]
    fn prop_decode_restores_durable_fields(snapshot in snapshot()) {
        let blob = codec::encode(&snapshot).unwrap();
        let decoded = codec::decode(&blob).unwrap();
        prop_assert_eq!(decoded, snapshot.durable());
    }

    #[test]
    fn prop_reencoding_reproduces_the_blob(snapshot in snapshot()) {
        let blob = codec::encode(&snapshot).unwrap();
        let again = codec::encode(&codec::decode(&blob).unwrap()).unwrap();
        prop_assert_eq!(again, blob);
    }

    #[test]
    fn prop_encoded_form_is_ascii(snapshot in snapshot()) {
        let blob = codec::encode(&snapshot).unwrap();
        prop_assert!(blob.as_str().is_ascii());
    }
}
