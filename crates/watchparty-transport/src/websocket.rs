//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! A background task owns the listener. Every TCP connection gets its own
//! handshake task with a deadline, so a peer that never sends the upgrade
//! request cannot hold up anyone else. Upgraded connections are queued
//! for [`Transport::accept`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::error::{CapacityError, Error as WsError};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    Connection, ConnectionId, Frame, Transport, TransportConfig,
    TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upgraded connections waiting for `accept`.
const READY_BACKLOG: usize = 64;

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    ready: mpsc::Receiver<WebSocketConnection>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport with default limits.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_config(addr, TransportConfig::default()).await
    }

    /// Binds a new WebSocket transport to the given address.
    pub async fn bind_with_config(
        addr: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (tx, rx) = mpsc::channel(READY_BACKLOG);
        let acceptor = tokio::spawn(accept_loop(listener, config, tx));

        Ok(Self {
            local_addr,
            ready: rx,
            acceptor,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.ready.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.acceptor.abort();
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

/// Accepts TCP connections and hands each one to its own handshake task.
async fn accept_loop(
    listener: TcpListener,
    config: TransportConfig,
    ready: mpsc::Sender<WebSocketConnection>,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = ready.closed() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "tcp accept failed");
                    continue;
                }
            },
        };

        let config = config.clone();
        let ready = ready.clone();
        tokio::spawn(async move {
            match handshake(stream, peer, &config).await {
                Ok(conn) => {
                    if ready.send(conn).await.is_err() {
                        tracing::debug!(%peer, "transport gone, dropping connection");
                    }
                }
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "handshake failed");
                }
            }
        });
    }
    tracing::debug!("accept loop stopped");
}

/// Upgrades one TCP stream, bounded by `config.handshake_timeout`.
async fn handshake(
    stream: TcpStream,
    peer: SocketAddr,
    config: &TransportConfig,
) -> Result<WebSocketConnection, TransportError> {
    let ws_config = config.max_message_size.map(|max| {
        WebSocketConfig::default()
            .max_message_size(Some(max))
            .max_frame_size(Some(max))
    });

    let ws = tokio::time::timeout(
        config.handshake_timeout,
        tokio_tungstenite::accept_async_with_config(stream, ws_config),
    )
    .await
    .map_err(|_| TransportError::HandshakeTimeout(config.handshake_timeout))?
    .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %peer, "accepted WebSocket connection");

    // Split so a reader parked in `recv` never holds up the writer.
    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        peer,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    })
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.write(Message::text(text.to_owned())).await
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Ping(_))) => return Ok(Some(Frame::Ping)),
                Some(Ok(Message::Pong(_))) => return Ok(Some(Frame::Pong)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Frame(_))) => continue, // raw frame
                Some(Err(WsError::Capacity(CapacityError::MessageTooLong {
                    size,
                    max_size,
                }))) => {
                    return Err(TransportError::MessageTooLarge {
                        size,
                        max: max_size,
                    });
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::ConnectionClosed(e.to_string())
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
