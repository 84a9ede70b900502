//! # watchparty
//!
//! Synchronized media playback for watch parties.
//!
//! Viewers connect over WebSocket, join a named room, and drive playback
//! with short text commands (`play!`, `pause!`, `seek!`, ...). The server
//! fans each room-wide command out to every member, gates `play!` on
//! everyone being ready, and answers `sync` so clients can correct for
//! clock skew.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use watchparty::prelude::*;
//!
//! # async fn start() -> Result<(), WatchPartyError> {
//! let server = WatchPartyServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod server;
mod session;

pub use config::SessionConfig;
pub use error::{SessionError, WatchPartyError};
pub use server::{DEFAULT_BIND_ADDR, WatchPartyServer, WatchPartyServerBuilder};
pub use session::serve_connection;

/// Everything needed to embed the server.
pub mod prelude {
    pub use crate::{
        DEFAULT_BIND_ADDR, SessionConfig, SessionError, WatchPartyError,
        WatchPartyServer, WatchPartyServerBuilder, serve_connection,
    };
    pub use watchparty_hub::{HubConfig, HubHandle, spawn_hub};
    pub use watchparty_protocol::{
        Command, RejectReason, RoomId, ServerMessage, SessionId,
    };
    pub use watchparty_transport::{Connection, Frame, TransportError};
}
