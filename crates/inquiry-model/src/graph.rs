//! Argument map nodes and edges
//!
//! Both carry per-session UI flags (`selected`, `dragging`) that are read
//! from legacy documents but never written back out: serialization only ever
//! emits durable fields. Fields this crate does not model are kept in
//! `extra` so a round trip through a session does not drop another client's
//! data.

use crate::ids::{CardId, EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Central assertion
    Claim,
    /// Material backing a claim
    Evidence,
    /// Opposing argument
    CounterArgument,
    /// Answer to a counter-argument
    Rebuttal,
}

impl NodeKind {
    /// Wire name of the kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Claim => "claim",
            NodeKind::Evidence => "evidence",
            NodeKind::CounterArgument => "counter-argument",
            NodeKind::Rebuttal => "rebuttal",
        }
    }
}

/// Canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

impl Position {
    /// Create a position
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Content carried by a node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Short heading shown on the node
    #[serde(default)]
    pub label: String,
    /// Free-text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Card this node was converted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<CardId>,
    /// Origin URL of the material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Origin title of the material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    /// Image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Author reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

/// Node of the argument map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node id
    pub id: NodeId,
    /// Argument role
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Canvas position
    pub position: Position,
    /// Content
    #[serde(default)]
    pub data: NodeData,
    /// Selected in this session (transient)
    #[serde(default, skip_serializing)]
    pub selected: bool,
    /// Being dragged in this session (transient)
    #[serde(default, skip_serializing)]
    pub dragging: bool,
    /// Durable fields owned by other clients
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphNode {
    /// Create a node with empty content
    #[must_use]
    pub fn new(id: NodeId, kind: NodeKind, position: Position) -> Self {
        Self {
            id,
            kind,
            position,
            data: NodeData::default(),
            selected: false,
            dragging: false,
            extra: Map::new(),
        }
    }

    /// With node content
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    /// Copy with the transient flags cleared
    #[must_use]
    pub fn durable(&self) -> Self {
        Self {
            selected: false,
            dragging: false,
            ..self.clone()
        }
    }
}

/// Relation an edge asserts between its endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Source supports target
    #[default]
    Supports,
    /// Source refutes target
    Refutes,
    /// Source groups target
    Contains,
}

impl Relation {
    /// Relation after a supports/refutes toggle
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Relation::Supports => Relation::Refutes,
            Relation::Refutes | Relation::Contains => Relation::Supports,
        }
    }
}

/// Content carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeData {
    /// Relation label
    #[serde(default)]
    pub label: Relation,
}

/// Kind tag given to every edge created by a connect action
pub const ARGUMENT_EDGE_KIND: &str = "argument";

fn default_edge_kind() -> String {
    ARGUMENT_EDGE_KIND.to_string()
}

/// Edge of the argument map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Edge id
    pub id: EdgeId,
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
    /// Rendering kind tag
    #[serde(rename = "type", default = "default_edge_kind")]
    pub kind: String,
    /// Relation
    #[serde(default)]
    pub data: EdgeData,
    /// Selected in this session (transient)
    #[serde(default, skip_serializing)]
    pub selected: bool,
    /// Durable fields owned by other clients
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphEdge {
    /// Create an argument edge
    #[must_use]
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, relation: Relation) -> Self {
        Self {
            id,
            source,
            target,
            kind: default_edge_kind(),
            data: EdgeData { label: relation },
            selected: false,
            extra: Map::new(),
        }
    }

    /// Whether `node` is either endpoint
    #[inline]
    #[must_use]
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }

    /// Copy with the transient flags cleared
    #[must_use]
    pub fn durable(&self) -> Self {
        Self {
            selected: false,
            ..self.clone()
        }
    }
}
