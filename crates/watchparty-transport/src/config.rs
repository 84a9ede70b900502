//! Listener configuration.

use std::time::Duration;

/// Limits applied to every connection a transport accepts.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a peer gets to complete the upgrade handshake. Peers that
    /// connect and stay silent are dropped after this.
    pub handshake_timeout: Duration,

    /// Largest inbound message (and frame), in bytes. Anything bigger is
    /// refused as soon as its header is read. `None` keeps the
    /// WebSocket library's own limits.
    pub max_message_size: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            max_message_size: None,
        }
    }
}
