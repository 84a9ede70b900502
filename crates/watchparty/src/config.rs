//! Per-connection session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use watchparty_protocol::MAX_FRAME_SIZE;

/// Liveness and framing limits for each connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Largest inbound text frame, in bytes. Bigger frames end the
    /// session.
    pub max_frame_size: usize,

    /// Deadline for a single outbound write.
    pub write_wait: Duration,

    /// Liveness window: the session ends if nothing (frame, ping or
    /// pong) arrives within it.
    pub pong_wait: Duration,

    /// How long a new peer gets to complete the WebSocket upgrade.
    pub handshake_timeout: Duration,

    /// Interval between keepalive pings. Must be shorter than
    /// `pong_wait` so a healthy peer always answers in time.
    pub ping_period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            write_wait: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ping_fits_inside_liveness_window() {
        let config = SessionConfig::default();
        assert!(config.ping_period < config.pong_wait);
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert_eq!(config.max_frame_size, 512);
    }
}
