//! `WatchPartyServer` builder and accept loop.
//!
//! This ties the layers together: transport → session → hub.

use std::future::Future;

use watchparty_hub::{HubConfig, HubHandle, spawn_hub};
use watchparty_transport::{Transport, TransportConfig, WebSocketTransport};

use crate::session::serve_connection;
use crate::{SessionConfig, WatchPartyError};

/// Address used when none is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Builder for configuring and starting a watchparty server.
///
/// # Example
///
/// ```rust,no_run
/// use watchparty::prelude::*;
///
/// # async fn start() -> Result<(), WatchPartyError> {
/// let server = WatchPartyServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct WatchPartyServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    hub_config: HubConfig,
}

impl WatchPartyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session_config: SessionConfig::default(),
            hub_config: HubConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the per-connection session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the hub configuration.
    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// Binds the WebSocket listener and starts the hub.
    ///
    /// The listener refuses inbound messages over
    /// `session_config.max_frame_size` before buffering them.
    pub async fn build(self) -> Result<WatchPartyServer, WatchPartyError> {
        let transport_config = TransportConfig {
            handshake_timeout: self.session_config.handshake_timeout,
            max_message_size: Some(self.session_config.max_frame_size),
        };
        let transport =
            WebSocketTransport::bind_with_config(&self.bind_addr, transport_config)
                .await?;
        let hub = spawn_hub(self.hub_config);

        Ok(WatchPartyServer {
            transport,
            hub,
            session_config: self.session_config,
        })
    }
}

impl Default for WatchPartyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound watchparty server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WatchPartyServer {
    transport: WebSocketTransport,
    hub: HubHandle,
    session_config: SessionConfig,
}

impl WatchPartyServer {
    /// Creates a new builder.
    pub fn builder() -> WatchPartyServerBuilder {
        WatchPartyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle to the server's hub.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), WatchPartyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops the
    /// hub. Stopping the hub closes every outbound queue, which in turn
    /// closes every connection.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), WatchPartyError> {
        tracing::info!("watchparty server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let hub = self.hub.clone();
                        let config = self.session_config.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                serve_connection(conn, hub, config).await
                            {
                                tracing::debug!(
                                    error = %e,
                                    "session ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        if let Err(e) = self.hub.shutdown().await {
            tracing::debug!(error = %e, "hub already stopped");
        }
        Ok(())
    }
}
