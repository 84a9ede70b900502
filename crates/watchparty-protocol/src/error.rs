//! Error types for the protocol layer.

/// A frame that could not be turned into a [`Command`](crate::Command).
///
/// Every variant is a "bad request": the sender gets an `error:` reply
/// carrying this message and the session stays open.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// The first field is not a known command name.
    #[error("bad request: unknown command {0:?}")]
    UnknownCommand(String),

    /// The command got the wrong number of arguments.
    #[error("bad request: {command} expects {expected} argument(s), got {got}")]
    WrongArity {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    /// A numeric argument did not parse as a finite float.
    #[error("bad request: {command} argument {value:?} is not a finite number")]
    InvalidNumber { command: &'static str, value: String },

    /// `join` was given an empty room id.
    #[error("bad request: room id must not be empty")]
    EmptyRoomId,
}
