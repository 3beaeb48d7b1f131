//! In-process room hub
//!
//! Every [`LocalChannel`] is one endpoint of a shared [`LocalHub`]. The hub
//! delivers an operation to every other online endpoint in the operation's
//! room, and optionally back to the sender.

use super::{RoomChannel, Subscription, SubscriptionId};
use crate::error::TransportError;
use async_trait::async_trait;
use dashmap::DashMap;
use inquiry_model::{ModuleKind, RoomId, SyncOperation};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Endpoint identity within a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(pub u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint-{}", self.0)
    }
}

#[derive(Debug)]
struct Endpoint {
    online: bool,
    rooms: HashSet<RoomId>,
    subscriptions: HashMap<SubscriptionId, (String, mpsc::UnboundedSender<SyncOperation>)>,
}

impl Endpoint {
    fn new() -> Self {
        Self {
            online: true,
            rooms: HashSet::new(),
            subscriptions: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct HubShared {
    endpoints: DashMap<EndpointId, Endpoint>,
    next_endpoint: AtomicU64,
    next_subscription: AtomicU64,
    reflect_to_sender: bool,
    sent: Mutex<Vec<SyncOperation>>,
}

/// Shared in-process broadcast medium
#[derive(Debug, Clone, Default)]
pub struct LocalHub {
    shared: Arc<HubShared>,
}

impl LocalHub {
    /// Hub that never reflects to the sender
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that also delivers each operation back to its sender
    #[must_use]
    pub fn reflecting() -> Self {
        Self {
            shared: Arc::new(HubShared {
                reflect_to_sender: true,
                ..HubShared::default()
            }),
        }
    }

    /// Open a new endpoint
    #[must_use]
    pub fn connect(&self) -> LocalChannel {
        let id = EndpointId(self.shared.next_endpoint.fetch_add(1, Ordering::Relaxed));
        self.shared.endpoints.insert(id, Endpoint::new());
        LocalChannel {
            hub: Arc::clone(&self.shared),
            id,
        }
    }

    /// Every operation accepted for delivery, in send order
    #[must_use]
    pub fn sent_operations(&self) -> Vec<SyncOperation> {
        self.shared.sent.lock().clone()
    }

    /// Forget the send log
    pub fn clear_sent(&self) {
        self.shared.sent.lock().clear();
    }

    /// Endpoints currently joined to `room`
    #[must_use]
    pub fn members(&self, room: &RoomId) -> Vec<EndpointId> {
        let mut members: Vec<_> = self
            .shared
            .endpoints
            .iter()
            .filter(|entry| entry.rooms.contains(room))
            .map(|entry| *entry.key())
            .collect();
        members.sort();
        members
    }
}

/// One endpoint of a [`LocalHub`]; disconnects on drop
#[derive(Debug)]
pub struct LocalChannel {
    hub: Arc<HubShared>,
    id: EndpointId,
}

impl LocalChannel {
    /// Endpoint id
    #[inline]
    #[must_use]
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Simulate connectivity; offline endpoints neither send nor receive
    pub fn set_online(&self, online: bool) {
        if let Some(mut endpoint) = self.hub.endpoints.get_mut(&self.id) {
            endpoint.online = online;
        }
    }

    /// Whether the endpoint is online
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.hub
            .endpoints
            .get(&self.id)
            .is_some_and(|endpoint| endpoint.online)
    }

    fn require_online(&self) -> Result<(), TransportError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

#[async_trait]
impl RoomChannel for LocalChannel {
    async fn join_room(&self, room: &RoomId, module: ModuleKind) -> Result<(), TransportError> {
        self.require_online()?;
        if let Some(mut endpoint) = self.hub.endpoints.get_mut(&self.id) {
            endpoint.rooms.insert(room.clone());
        }
        tracing::debug!(endpoint = %self.id, room = %room, module = module.as_str(), "joined room");
        Ok(())
    }

    async fn leave_room(&self, room: &RoomId, module: ModuleKind) -> Result<(), TransportError> {
        self.require_online()?;
        if let Some(mut endpoint) = self.hub.endpoints.get_mut(&self.id) {
            endpoint.rooms.remove(room);
        }
        tracing::debug!(endpoint = %self.id, room = %room, module = module.as_str(), "left room");
        Ok(())
    }

    async fn send_operation(&self, operation: &SyncOperation) -> Result<(), TransportError> {
        self.require_online()?;
        self.hub.sent.lock().push(operation.clone());

        let event = operation.module.event_name();
        let mut delivered = 0usize;
        for entry in self.hub.endpoints.iter() {
            let endpoint = entry.value();
            let is_sender = *entry.key() == self.id;
            if (is_sender && !self.hub.reflect_to_sender)
                || !endpoint.online
                || !endpoint.rooms.contains(&operation.room_id)
            {
                continue;
            }

            for (subscribed, sender) in endpoint.subscriptions.values() {
                if *subscribed == event && sender.send(operation.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        tracing::trace!(
            endpoint = %self.id,
            room = %operation.room_id,
            operation = %operation.id,
            delivered,
            "operation fanned out"
        );
        Ok(())
    }

    fn subscribe(&self, event: &str) -> Subscription {
        let id = SubscriptionId(self.hub.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(mut endpoint) = self.hub.endpoints.get_mut(&self.id) {
            endpoint.subscriptions.insert(id, (event.to_string(), tx));
        }
        Subscription { id, operations: rx }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(mut endpoint) = self.hub.endpoints.get_mut(&self.id) {
            endpoint.subscriptions.remove(&id);
        }
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.hub.endpoints.remove(&self.id);
    }
}
