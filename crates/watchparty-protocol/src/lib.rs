//! Wire protocol for watchparty.
//!
//! This crate defines the "language" that viewers and the server speak.
//! Everything on the wire is a short colon-delimited text line:
//!
//! - **Commands** ([`Command`]) — what a client may ask for, parsed from
//!   one inbound frame.
//! - **Messages** ([`ServerMessage`]) — direct replies and room-wide
//!   broadcasts, formatted into one outbound frame.
//! - **Errors** ([`ProtocolError`]) — malformed input, reported back to
//!   the sender without closing the session.
//!
//! The protocol layer doesn't know about connections or rooms; it only
//! knows how to turn text into commands and messages into text.
//!
//! ```text
//! Transport (frames) → Protocol (Command) → Hub (registry + rooms)
//! ```

mod command;
mod error;
mod message;
mod types;

pub use command::{Command, normalize_frame};
pub use error::ProtocolError;
pub use message::{RejectReason, ServerMessage};
pub use types::{
    BROADCAST_MARKER, DELIMITER, MAX_FRAME_SIZE, RoomId, SessionId,
};
