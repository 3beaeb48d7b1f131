//! Recently-sent operation ids
//!
//! A channel may reflect a sender's own broadcast back to it. Every emitted
//! id is remembered here so the reflection can be dropped even if its client
//! id was rewritten on the way.

use inquiry_model::OperationId;
use std::collections::{HashSet, VecDeque};

/// Default number of ids remembered per session
pub const RECENT_OPERATION_CAPACITY: usize = 100;

/// Fixed-capacity set evicting the oldest id first
#[derive(Debug, Clone)]
pub struct RecentOperations {
    capacity: usize,
    order: VecDeque<OperationId>,
    members: HashSet<OperationId>,
}

impl RecentOperations {
    /// Create with `capacity` slots (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Remember `id`; returns the evicted id when full
    pub fn record(&mut self, id: OperationId) -> Option<OperationId> {
        if self.members.contains(&id) {
            return None;
        }

        let evicted = if self.order.len() == self.capacity {
            let oldest = self.order.pop_front();
            if let Some(oldest) = &oldest {
                self.members.remove(oldest);
            }
            oldest
        } else {
            None
        };

        self.members.insert(id.clone());
        self.order.push_back(id);
        evicted
    }

    /// Whether `id` was sent recently
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &OperationId) -> bool {
        self.members.contains(id)
    }

    /// Number of remembered ids
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is remembered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum remembered ids
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecentOperations {
    fn default() -> Self {
        Self::new(RECENT_OPERATION_CAPACITY)
    }
}
