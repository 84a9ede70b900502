//! Session registry and playback synchronization for watchparty.
//!
//! The hub is the single source of truth for which sessions are alive
//! and which room each one is in. It runs as one Tokio task (actor
//! model) that owns the [`Registry`] and processes requests strictly in
//! order, so registration, command execution and fan-out never observe
//! each other half-done.
//!
//! # Key types
//!
//! - [`HubHandle`] — cheap-to-clone client of the running hub actor
//! - [`Registry`] — the session table and room table
//! - [`CommandHandler`] — the playback state machine (join/leave/ready/
//!   play/pause/seek/resume/sync)
//! - [`Clock`] — time source for play scheduling and clock sync
//! - [`HubConfig`] — queue sizes and the play lead time

mod clock;
mod config;
mod error;
mod handler;
mod hub;
mod registry;

pub use clock::{Clock, SystemClock};
pub use config::HubConfig;
pub use error::HubError;
pub use handler::{CommandHandler, Effect};
pub use hub::{HubHandle, Registration, spawn_hub, spawn_hub_with_clock};
pub use registry::{Outbound, OutboundReceiver, Registry};
