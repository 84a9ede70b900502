//! Identity types and wire constants.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separates the fields of a command or message line.
pub const DELIMITER: char = ':';

/// Suffix that marks a command as a room-wide broadcast.
pub const BROADCAST_MARKER: char = '!';

/// Largest inbound frame, in bytes, a session accepts.
pub const MAX_FRAME_SIZE: usize = 512;

/// A unique identifier for a session.
///
/// Assigned by the hub at registration, never chosen by the client.
/// A random (version 4) UUID, rendered hyphenated in `accept:` replies
/// and logs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Draws a fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds an id from a fixed value. Mostly useful in tests.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// The key of a room: an opaque, non-empty string chosen by clients.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a room key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
