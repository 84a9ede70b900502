//! Unified error type for watchparty.

use watchparty_hub::HubError;
use watchparty_transport::TransportError;

/// Why a connection session ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer sent a frame larger than the configured limit.
    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Nothing arrived from the peer within the liveness window.
    #[error("no inbound activity for {0:?}")]
    Timeout(std::time::Duration),

    /// A write did not complete within the write deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WatchPartyError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The hub refused a request or is gone.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A connection session was terminated.
    #[error(transparent)]
    Session(#[from] SessionError),
}
