//! Room-scoped realtime channel
//!
//! A channel joins rooms, emits [`SyncOperation`]s to everyone else in the
//! operation's room, and hands incoming operations to subscribers of the
//! module event (`operation:inquiry`). Whether a sender hears its own
//! broadcast is up to the channel, so receivers must filter echoes.

mod local;

pub use local::{EndpointId, LocalChannel, LocalHub};

use crate::error::TransportError;
use async_trait::async_trait;
use inquiry_model::{ModuleKind, RoomId, SyncOperation};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle of one event subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Incoming operations for one event
#[derive(Debug)]
pub struct Subscription {
    /// Pass to [`RoomChannel::unsubscribe`]
    pub id: SubscriptionId,
    /// Operations in arrival order
    pub operations: mpsc::UnboundedReceiver<SyncOperation>,
}

/// Realtime room channel
#[async_trait]
pub trait RoomChannel: Send + Sync {
    /// Join `room` for `module`
    async fn join_room(&self, room: &RoomId, module: ModuleKind) -> Result<(), TransportError>;

    /// Leave `room`
    async fn leave_room(&self, room: &RoomId, module: ModuleKind) -> Result<(), TransportError>;

    /// Emit to the operation's room
    async fn send_operation(&self, operation: &SyncOperation) -> Result<(), TransportError>;

    /// Receive operations published under `event`
    fn subscribe(&self, event: &str) -> Subscription;

    /// Stop delivering to a subscription
    fn unsubscribe(&self, id: SubscriptionId);
}

#[async_trait]
impl<T: RoomChannel + ?Sized> RoomChannel for Arc<T> {
    async fn join_room(&self, room: &RoomId, module: ModuleKind) -> Result<(), TransportError> {
        (**self).join_room(room, module).await
    }

    async fn leave_room(&self, room: &RoomId, module: ModuleKind) -> Result<(), TransportError> {
        (**self).leave_room(room, module).await
    }

    async fn send_operation(&self, operation: &SyncOperation) -> Result<(), TransportError> {
        (**self).send_operation(operation).await
    }

    fn subscribe(&self, event: &str) -> Subscription {
        (**self).subscribe(event)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id);
    }
}
