//! Hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the hub actor and its registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of each session's outbound queue. A broadcast that finds
    /// the queue full evicts the session.
    pub outbound_capacity: usize,

    /// Capacity of the hub's own request channel.
    pub channel_size: usize,

    /// How far in the future a `play` broadcast schedules the shared
    /// start instant.
    pub play_lead: Duration,

    /// How many random ids to try before refusing a registration.
    pub max_id_attempts: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            channel_size: 64,
            play_lead: Duration::from_secs(2),
            max_id_attempts: 8,
        }
    }
}
