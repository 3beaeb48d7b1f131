//! Local canvas and scrapbook mutations
//!
//! Each call reads the current aggregate, applies one change and writes it
//! back synchronously. Propagation (broadcast, save) follows from the
//! change's [`Change`] class.

use super::session::Change;
use super::SyncCoordinator;
use crate::error::SyncError;
use inquiry_model::{
    now_millis, CardDraft, CardId, EdgeId, GraphEdge, GraphNode, NodeData, NodeId, NodeKind,
    Position, Relation, ScrapbookCard,
};

/// Partial node edit; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    /// New node kind
    pub kind: Option<NodeKind>,
    /// New position
    pub position: Option<Position>,
    /// Replacement data, applied before `label`/`content`
    pub data: Option<NodeData>,
    /// New label
    pub label: Option<String>,
    /// New content
    pub content: Option<String>,
}

impl NodeUpdate {
    /// Empty update
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With kind
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// With position
    #[inline]
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// With replacement data
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = Some(data);
        self
    }

    /// With label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// With content
    #[inline]
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    fn apply(self, node: &mut GraphNode) {
        if let Some(kind) = self.kind {
            node.kind = kind;
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(data) = self.data {
            node.data = data;
        }
        if let Some(label) = self.label {
            node.data.label = label;
        }
        if let Some(content) = self.content {
            node.data.content = Some(content);
        }
    }
}

impl SyncCoordinator {
    /// Insert a node
    ///
    /// # Errors
    /// Returns error if no session is active or the id is taken
    pub fn add_node(&self, node: GraphNode) -> Result<NodeId, SyncError> {
        self.inner.mutate(Change::Add, |snapshot| {
            if snapshot.node(&node.id).is_some() {
                return Err(SyncError::DuplicateNode(node.id));
            }
            let id = node.id.clone();
            snapshot.nodes.push(node);
            Ok(id)
        })
    }

    /// Insert a fresh node authored by this session
    ///
    /// # Errors
    /// Returns error if no session is active
    pub fn create_node(
        &self,
        kind: NodeKind,
        position: Position,
        label: impl Into<String>,
    ) -> Result<NodeId, SyncError> {
        let author = &self.inner.identity.author;
        let data = NodeData {
            label: label.into(),
            author_id: (!author.id.is_empty()).then(|| author.id.clone()),
            ..NodeData::default()
        };
        self.add_node(GraphNode::new(NodeId::generate(), kind, position).with_data(data))
    }

    /// Drag in progress
    ///
    /// # Errors
    /// Returns error if no session is active or the node is unknown
    pub fn move_node(&self, id: &NodeId, position: Position) -> Result<(), SyncError> {
        self.inner.mutate(Change::Drag, |snapshot| {
            let node = snapshot
                .node_mut(id)
                .ok_or_else(|| SyncError::UnknownNode(id.clone()))?;
            node.position = position;
            node.dragging = true;
            Ok(())
        })
    }

    /// Drag released at `position`
    ///
    /// # Errors
    /// Returns error if no session is active or the node is unknown
    pub fn release_node(&self, id: &NodeId, position: Position) -> Result<(), SyncError> {
        self.inner.mutate(Change::DragEnd, |snapshot| {
            let node = snapshot
                .node_mut(id)
                .ok_or_else(|| SyncError::UnknownNode(id.clone()))?;
            node.position = position;
            node.dragging = false;
            Ok(())
        })
    }

    /// Edit a node
    ///
    /// # Errors
    /// Returns error if no session is active or the node is unknown
    pub fn update_node(&self, id: &NodeId, update: NodeUpdate) -> Result<(), SyncError> {
        self.inner.mutate(Change::Update, |snapshot| {
            let node = snapshot
                .node_mut(id)
                .ok_or_else(|| SyncError::UnknownNode(id.clone()))?;
            update.apply(node);
            Ok(())
        })
    }

    /// Remove a node and every edge touching it
    ///
    /// # Errors
    /// Returns error if no session is active or the node is unknown
    pub fn delete_node(&self, id: &NodeId) -> Result<(), SyncError> {
        self.inner.mutate(Change::Remove, |snapshot| {
            if snapshot.remove_node(id) {
                Ok(())
            } else {
                Err(SyncError::UnknownNode(id.clone()))
            }
        })
    }

    /// Change node selection; never broadcast or saved
    ///
    /// # Errors
    /// Returns error if no session is active or the node is unknown
    pub fn set_node_selected(&self, id: &NodeId, selected: bool) -> Result<(), SyncError> {
        self.inner.mutate(Change::Transient, |snapshot| {
            let node = snapshot
                .node_mut(id)
                .ok_or_else(|| SyncError::UnknownNode(id.clone()))?;
            node.selected = selected;
            Ok(())
        })
    }

    /// Change edge selection; never broadcast or saved
    ///
    /// # Errors
    /// Returns error if no session is active or the edge is unknown
    pub fn set_edge_selected(&self, id: &EdgeId, selected: bool) -> Result<(), SyncError> {
        self.inner.mutate(Change::Transient, |snapshot| {
            let edge = snapshot
                .edge_mut(id)
                .ok_or_else(|| SyncError::UnknownEdge(id.clone()))?;
            edge.selected = selected;
            Ok(())
        })
    }

    /// Connect two nodes with a `supports` argument edge
    ///
    /// An existing edge between the pair is returned unchanged.
    ///
    /// # Errors
    /// Returns error if no session is active or either node is unknown
    pub fn connect(&self, source: &NodeId, target: &NodeId) -> Result<EdgeId, SyncError> {
        self.inner.mutate(Change::Add, |snapshot| {
            for endpoint in [source, target] {
                if snapshot.node(endpoint).is_none() {
                    return Err(SyncError::UnknownNode(endpoint.clone()));
                }
            }
            if let Some(existing) = snapshot.edge_between(source, target) {
                return Ok(existing.id.clone());
            }

            let edge = GraphEdge::new(
                EdgeId::generate(),
                source.clone(),
                target.clone(),
                Relation::default(),
            );
            let id = edge.id.clone();
            snapshot.edges.push(edge);
            Ok(id)
        })
    }

    /// Set an edge's relation
    ///
    /// # Errors
    /// Returns error if no session is active or the edge is unknown
    pub fn update_edge(&self, id: &EdgeId, relation: Relation) -> Result<(), SyncError> {
        self.inner.mutate(Change::Update, |snapshot| {
            let edge = snapshot
                .edge_mut(id)
                .ok_or_else(|| SyncError::UnknownEdge(id.clone()))?;
            edge.data.label = relation;
            Ok(())
        })
    }

    /// Flip `supports` and `refutes`; returns the new relation
    ///
    /// # Errors
    /// Returns error if no session is active or the edge is unknown
    pub fn toggle_relation(&self, id: &EdgeId) -> Result<Relation, SyncError> {
        self.inner.mutate(Change::Update, |snapshot| {
            let edge = snapshot
                .edge_mut(id)
                .ok_or_else(|| SyncError::UnknownEdge(id.clone()))?;
            edge.data.label = edge.data.label.toggled();
            Ok(edge.data.label)
        })
    }

    /// Remove an edge
    ///
    /// # Errors
    /// Returns error if no session is active or the edge is unknown
    pub fn delete_edge(&self, id: &EdgeId) -> Result<(), SyncError> {
        self.inner.mutate(Change::Remove, |snapshot| {
            if snapshot.remove_edge(id) {
                Ok(())
            } else {
                Err(SyncError::UnknownEdge(id.clone()))
            }
        })
    }

    /// Add a scrapbook card authored by this session
    ///
    /// # Errors
    /// Returns error if no session is active
    pub fn add_card(&self, draft: CardDraft) -> Result<ScrapbookCard, SyncError> {
        let card = draft.into_card(&self.inner.identity.author, now_millis());
        self.inner.mutate(Change::Add, move |snapshot| {
            snapshot.scrapbook_cards.push(card.clone());
            Ok(card)
        })
    }

    /// Remove a scrapbook card
    ///
    /// # Errors
    /// Returns error if no session is active or the card is unknown
    pub fn delete_card(&self, id: &CardId) -> Result<(), SyncError> {
        self.inner.mutate(Change::Remove, |snapshot| {
            if snapshot.remove_card(id) {
                Ok(())
            } else {
                Err(SyncError::UnknownCard(id.clone()))
            }
        })
    }

    /// Place a node built from a card; the card stays in the scrapbook
    ///
    /// # Errors
    /// Returns error if no session is active or the card is unknown
    pub fn convert_card_to_node(
        &self,
        card: &CardId,
        position: Position,
        kind: NodeKind,
    ) -> Result<NodeId, SyncError> {
        self.inner.mutate(Change::Add, |snapshot| {
            let source = snapshot
                .card(card)
                .ok_or_else(|| SyncError::UnknownCard(card.clone()))?;

            let data = NodeData {
                label: source.kind.as_str().to_string(),
                content: Some(source.content.clone()),
                source_ref: Some(source.id.clone()),
                source_url: source.source_url.clone(),
                source_title: source.source_title.clone(),
                image_url: source.image_url.clone(),
                author_id: Some(source.author_id.clone()),
            };
            let node = GraphNode::new(NodeId::generate(), kind, position).with_data(data);
            let id = node.id.clone();
            snapshot.nodes.push(node);
            Ok(id)
        })
    }
}
