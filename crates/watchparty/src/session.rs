//! Connection session: one read task and one write task per client.
//!
//! ```text
//!            ┌── read task ──→ hub.execute / hub.deliver(error)
//! transport ─┤
//!            └── write task ←── outbound queue (filled by the hub)
//!                     └── keepalive ping every `ping_period`
//! ```
//!
//! Either task (or the hub, by closing the queue) can end the session.
//! Teardown runs exactly once no matter who triggers it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use watchparty_hub::{HubHandle, OutboundReceiver, Registration};
use watchparty_protocol::{Command, ServerMessage, SessionId, normalize_frame};
use watchparty_transport::{Connection, ConnectionId, Frame, TransportError};

use crate::{SessionConfig, SessionError, WatchPartyError};

/// State shared by the read and write tasks of one session.
struct ConnectionSession<C> {
    session_id: SessionId,
    conn_id: ConnectionId,
    conn: C,
    hub: HubHandle,
    open: AtomicBool,
    write_wait: Duration,
}

impl<C> ConnectionSession<C>
where
    C: Connection<Error = TransportError>,
{
    /// Marks the session closed, unregisters it (which closes the
    /// outbound queue) and closes the transport. Only the first call
    /// does anything.
    async fn teardown(&self, reason: &str) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::info!(
            session_id = %self.session_id,
            conn_id = %self.conn_id,
            reason,
            "session closing"
        );

        if let Err(e) = self.hub.unregister(self.session_id).await {
            tracing::debug!(session_id = %self.session_id, error = %e, "unregister failed");
        }
        match tokio::time::timeout(self.write_wait, self.conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn_id = %self.conn_id, error = %e, "close failed");
            }
            Err(_) => {
                tracing::debug!(conn_id = %self.conn_id, "close timed out");
            }
        }
    }
}

/// Runs a session for an established connection against the hub.
///
/// This is the single entry point of the core: register, spawn the write
/// task, run the read loop, tear down. Returns when the read side is
/// finished and the write task has exited.
///
/// Protocol errors never end the session: they are answered with an
/// `error:` reply. Transport errors, liveness expiry, oversized frames
/// and hub eviction do end it.
pub async fn serve_connection<C>(
    conn: C,
    hub: HubHandle,
    config: SessionConfig,
) -> Result<(), WatchPartyError>
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();

    let Registration {
        session_id,
        outbound,
    } = match hub.register().await {
        Ok(registration) => registration,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "registration failed, closing connection");
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    tracing::debug!(%conn_id, %session_id, "session started");

    let session = Arc::new(ConnectionSession {
        session_id,
        conn_id,
        conn,
        hub,
        open: AtomicBool::new(true),
        write_wait: config.write_wait,
    });

    let writer = tokio::spawn(write_loop(
        Arc::clone(&session),
        outbound,
        config.clone(),
    ));

    let result = read_loop(&session, &config).await;
    let reason = match &result {
        Ok(()) => "peer closed".to_string(),
        Err(e) => e.to_string(),
    };
    session.teardown(&reason).await;

    // The writer exits once the queue is closed by the unregister above.
    if let Err(e) = writer.await {
        tracing::error!(%session_id, error = %e, "write task panicked");
    }
    result
}

/// Reads frames until the peer goes away, misbehaves, or goes quiet.
async fn read_loop<C>(
    session: &ConnectionSession<C>,
    config: &SessionConfig,
) -> Result<(), WatchPartyError>
where
    C: Connection<Error = TransportError>,
{
    let session_id = session.session_id;

    loop {
        // Every received frame (pings and pongs included) re-arms the
        // liveness window, because each iteration starts a new timeout.
        let frame = match tokio::time::timeout(
            config.pong_wait,
            session.conn.recv(),
        )
        .await
        {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => {
                tracing::info!(%session_id, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(TransportError::MessageTooLarge { size, max })) => {
                tracing::warn!(%session_id, size, max, "oversized frame");
                return Err(SessionError::FrameTooLarge { size, max }.into());
            }
            Ok(Err(e)) => {
                tracing::debug!(%session_id, error = %e, "recv error");
                return Err(e.into());
            }
            Err(_) => {
                tracing::info!(%session_id, "connection timed out");
                return Err(SessionError::Timeout(config.pong_wait).into());
            }
        };

        if frame.len() > config.max_frame_size {
            tracing::warn!(
                %session_id,
                size = frame.len(),
                max = config.max_frame_size,
                "oversized frame"
            );
            return Err(SessionError::FrameTooLarge {
                size: frame.len(),
                max: config.max_frame_size,
            }
            .into());
        }

        match frame {
            Frame::Text(text) => {
                let line = normalize_frame(&text);
                match Command::parse(&line) {
                    Ok(command) => {
                        session.hub.execute(session_id, command).await?;
                    }
                    Err(e) => {
                        tracing::debug!(%session_id, error = %e, "bad request");
                        session
                            .hub
                            .deliver(session_id, ServerMessage::Error(e.to_string()))
                            .await?;
                    }
                }
            }
            Frame::Binary(_) => {
                tracing::debug!(%session_id, "ignoring binary frame");
            }
            Frame::Ping | Frame::Pong => {
                tracing::trace!(%session_id, "keepalive");
            }
        }
    }
}

/// Drains the outbound queue onto the transport and sends keepalive
/// pings. Exits when the queue closes or a write fails.
async fn write_loop<C>(
    session: Arc<ConnectionSession<C>>,
    mut outbound: OutboundReceiver,
    config: SessionConfig,
) where
    C: Connection<Error = TransportError>,
{
    let session_id = session.session_id;
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + config.ping_period,
        config.ping_period,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            payload = outbound.recv() => {
                let Some(payload) = payload else {
                    break Ok(());
                };
                let write = session.conn.send_text(&payload);
                if let Err(e) = with_deadline(config.write_wait, write).await {
                    break Err(e);
                }
            }
            _ = keepalive.tick() => {
                let ping = session.conn.ping();
                if let Err(e) = with_deadline(config.write_wait, ping).await {
                    break Err(e);
                }
            }
        }
    };

    match result {
        Ok(()) => {
            tracing::debug!(%session_id, "outbound queue closed");
            session.teardown("outbound queue closed").await;
        }
        Err(e) => {
            tracing::debug!(%session_id, error = %e, "write failed");
            session.teardown(&e.to_string()).await;
        }
    }
}

async fn with_deadline(
    deadline: Duration,
    write: impl Future<Output = Result<(), TransportError>>,
) -> Result<(), WatchPartyError> {
    match tokio::time::timeout(deadline, write).await {
        Ok(result) => result.map_err(WatchPartyError::from),
        Err(_) => Err(SessionError::WriteTimeout(deadline).into()),
    }
}
