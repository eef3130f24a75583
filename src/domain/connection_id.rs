//! Identity of a live socket connection.
//!
//! [`ConnectionId`] is the key of the hub's membership set. It is a newtype
//! over [`uuid::Uuid`] so it cannot be mixed up with user or report ids.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one accepted WebSocket connection.
///
/// Generated when the socket is upgraded and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for ConnectionId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn display_matches_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let id = ConnectionId::from(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
        assert_eq!(*id.as_uuid(), uuid);
    }
}
