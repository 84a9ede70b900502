use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer announced a message bigger than the configured limit.
    /// Nothing past the header was buffered.
    #[error("inbound message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Binding or accepting TCP connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer connected but the upgrade handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The peer did not finish the upgrade handshake in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The transport was shut down and hands out no more connections.
    #[error("transport shut down")]
    Shutdown,
}
