//! Outbound messages: direct replies and room broadcasts.
//!
//! Each message formats to exactly one text frame via `Display`.

use std::fmt;

use crate::{RoomId, SessionId};

/// Why a well-formed command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The sender is not in a room (or its room is gone).
    NoRoom,
    /// At least one member of the room has not signaled readiness.
    NotAllReady,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoRoom => f.write_str("no room"),
            RejectReason::NotAllReady => f.write_str("non-ready client exists"),
        }
    }
}

/// A message from the server to one or more clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `OK`
    Ok,
    /// `accept:<sessionId>:<roomId>`: reply to `join`.
    Accept { session_id: SessionId, room_id: RoomId },
    /// `reject:<reason>`: a precondition failed.
    Reject(RejectReason),
    /// `error:<reason>`: the command was malformed.
    Error(String),
    /// `sync:<offset>`: server time minus client time, in seconds.
    Sync { offset: f64 },
    /// `ready`: every member of the room is ready.
    Ready,
    /// `play:<videoTime>:<startTime>`: start at a shared future instant.
    Play { video_time: f64, start_time: f64 },
    /// `pause`
    Pause,
    /// `seek:<videoTime>`
    Seek { video_time: f64 },
    /// `resume`
    Resume,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Ok => f.write_str("OK"),
            ServerMessage::Accept {
                session_id,
                room_id,
            } => write!(f, "accept:{session_id}:{room_id}"),
            ServerMessage::Reject(reason) => write!(f, "reject:{reason}"),
            ServerMessage::Error(reason) => write!(f, "error:{reason}"),
            ServerMessage::Sync { offset } => write!(f, "sync:{offset}"),
            ServerMessage::Ready => f.write_str("ready"),
            ServerMessage::Play {
                video_time,
                start_time,
            } => write!(f, "play:{video_time}:{start_time}"),
            ServerMessage::Pause => f.write_str("pause"),
            ServerMessage::Seek { video_time } => write!(f, "seek:{video_time}"),
            ServerMessage::Resume => f.write_str("resume"),
        }
    }
}
