//! Identifier newtypes
//!
//! Ids are strings on the wire: browser sessions mint them as
//! `<prefix>-<unique>` and nothing parses them back apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow as `&str`
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Project owning one aggregate
    ProjectId
}

string_id! {
    /// Broadcast scope on the room channel
    RoomId
}

string_id! {
    /// Identity of one emitting session, used only to drop echoes
    ClientId
}

string_id! {
    /// Unique id of one emitted operation
    OperationId
}

string_id! {
    /// Graph node identifier
    NodeId
}

string_id! {
    /// Graph edge identifier
    EdgeId
}

string_id! {
    /// Scrapbook card identifier
    CardId
}

fn prefixed(prefix: &str) -> String {
    format!("{prefix}-{}", Ulid::new())
}

impl RoomId {
    /// Room shared by every session of `project`: `inquiry:{project}`
    #[must_use]
    pub fn for_project(project: &ProjectId) -> Self {
        Self(format!("inquiry:{project}"))
    }
}

impl ClientId {
    /// Fresh identity for one canvas session
    #[must_use]
    pub fn session() -> Self {
        Self(format!("session-{}", Uuid::new_v4().simple()))
    }

    /// Identity used by writers outside a canvas session
    #[must_use]
    pub fn external(user_id: &str) -> Self {
        Self(format!("external-{user_id}"))
    }
}

impl OperationId {
    /// Generate a new operation id
    #[must_use]
    pub fn generate() -> Self {
        Self(prefixed("state"))
    }
}

impl NodeId {
    /// Generate a new node id
    #[must_use]
    pub fn generate() -> Self {
        Self(prefixed("node"))
    }
}

impl EdgeId {
    /// Generate a new edge id
    #[must_use]
    pub fn generate() -> Self {
        Self(prefixed("edge"))
    }
}

impl CardId {
    /// Generate a new card id
    #[must_use]
    pub fn generate() -> Self {
        Self(prefixed("card"))
    }
}
