//! Runs a watchparty server.
//!
//! `WATCHPARTY_ADDR` sets the listen address; `RUST_LOG` sets the log
//! filter (default `info`).

use tracing_subscriber::EnvFilter;
use watchparty::prelude::*;

#[tokio::main]
async fn main() -> Result<(), WatchPartyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("WATCHPARTY_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    let server = WatchPartyServer::builder().bind(&addr).build().await?;
    let local = server
        .local_addr()
        .map_err(TransportError::AcceptFailed)?;
    tracing::info!(addr = %local, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
