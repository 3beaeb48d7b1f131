//! The per-project aggregate

use crate::card::ScrapbookCard;
use crate::graph::{GraphEdge, GraphNode};
use crate::ids::{CardId, EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nodes, edges and scrapbook cards of exactly one project
///
/// Missing lists decode as empty; the card list is also accepted under its
/// legacy `scrapbook` key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Argument map nodes
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Argument map edges
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    /// Scrapbook cards
    #[serde(default, alias = "scrapbook")]
    pub scrapbook_cards: Vec<ScrapbookCard>,
}

impl Snapshot {
    /// Empty aggregate
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nodes, edges and cards are all empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.scrapbook_cards.is_empty()
    }

    /// Element counts
    #[must_use]
    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            cards: self.scrapbook_cards.len(),
        }
    }

    /// Copy with every transient flag cleared, i.e. what a peer decodes
    #[must_use]
    pub fn durable(&self) -> Self {
        Self {
            nodes: self.nodes.iter().map(GraphNode::durable).collect(),
            edges: self.edges.iter().map(GraphEdge::durable).collect(),
            scrapbook_cards: self.scrapbook_cards.clone(),
        }
    }

    /// Find a node
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Find a node for mutation
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    /// Find an edge
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Find an edge for mutation
    pub fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut GraphEdge> {
        self.edges.iter_mut().find(|e| &e.id == id)
    }

    /// Existing edge from `source` to `target`
    #[must_use]
    pub fn edge_between(&self, source: &NodeId, target: &NodeId) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| &e.source == source && &e.target == target)
    }

    /// Find a card
    #[must_use]
    pub fn card(&self, id: &CardId) -> Option<&ScrapbookCard> {
        self.scrapbook_cards.iter().find(|c| &c.id == id)
    }

    /// Remove a node and every edge touching it
    ///
    /// Returns whether the node existed.
    pub fn remove_node(&mut self, id: &NodeId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| &n.id != id);
        self.edges.retain(|e| !e.touches(id));
        self.nodes.len() != before
    }

    /// Remove an edge; returns whether it existed
    pub fn remove_edge(&mut self, id: &EdgeId) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| &e.id != id);
        self.edges.len() != before
    }

    /// Remove a card; returns whether it existed
    pub fn remove_card(&mut self, id: &CardId) -> bool {
        let before = self.scrapbook_cards.len();
        self.scrapbook_cards.retain(|c| &c.id != id);
        self.scrapbook_cards.len() != before
    }
}

/// Element counts of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SnapshotCounts {
    /// Node count
    pub nodes: usize,
    /// Edge count
    pub edges: usize,
    /// Card count
    pub cards: usize,
}

impl fmt::Display for SnapshotCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} edges, {} cards",
            self.nodes, self.edges, self.cards
        )
    }
}
