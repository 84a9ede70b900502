//! Hub actor: a single Tokio task that owns the registry.
//!
//! Every read or write of the session table and the room table happens
//! inside this task, one request at a time, in channel order. Session
//! tasks talk to it through a [`HubHandle`]; replies to clients travel
//! back on the sessions' outbound queues, never on the request path.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use watchparty_protocol::{Command, RoomId, ServerMessage, SessionId};

use crate::{
    Clock, CommandHandler, Effect, HubConfig, HubError, OutboundReceiver,
    Registry, SystemClock,
};

/// What a session gets back from registration.
#[derive(Debug)]
pub struct Registration {
    /// The id the hub assigned.
    pub session_id: SessionId,
    /// The session's outbound queue. It closes when the hub unregisters
    /// the session, for whatever reason.
    pub outbound: OutboundReceiver,
}

/// Requests sent to the hub actor through its channel.
///
/// The `oneshot::Sender` in some variants is a reply channel: the
/// caller sends a request and waits for the answer on it.
pub(crate) enum HubCommand {
    Register {
        reply: oneshot::Sender<Result<Registration, HubError>>,
    },
    Unregister {
        session_id: SessionId,
    },
    Execute {
        session_id: SessionId,
        command: Command,
    },
    Deliver {
        session_id: SessionId,
        message: ServerMessage,
    },
    Broadcast {
        room_id: RoomId,
        message: ServerMessage,
    },
    RoomMembers {
        room_id: RoomId,
        reply: oneshot::Sender<Option<Vec<SessionId>>>,
    },
    RoomExists {
        room_id: RoomId,
        reply: oneshot::Sender<bool>,
    },
    IsRegistered {
        session_id: SessionId,
        reply: oneshot::Sender<bool>,
    },
    SessionCount {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Handle to the running hub actor.
///
/// Cheap to clone; every session task holds one.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Registers a new session and returns its id and outbound queue.
    ///
    /// # Errors
    /// [`HubError::IdExhausted`] if no unique id could be generated,
    /// [`HubError::Unavailable`] if the hub has stopped.
    pub async fn register(&self) -> Result<Registration, HubError> {
        self.request(|reply| HubCommand::Register { reply }).await?
    }

    /// Removes a session. Unregistering twice is harmless.
    pub async fn unregister(
        &self,
        session_id: SessionId,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Unregister { session_id }).await
    }

    /// Executes a client command on behalf of a session.
    ///
    /// Fire-and-forget: the outcome arrives on the session's outbound
    /// queue.
    pub async fn execute(
        &self,
        session_id: SessionId,
        command: Command,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Execute {
            session_id,
            command,
        })
        .await
    }

    /// Queues a message for one session.
    pub async fn deliver(
        &self,
        session_id: SessionId,
        message: ServerMessage,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Deliver {
            session_id,
            message,
        })
        .await
    }

    /// Queues a message for every current member of a room.
    pub async fn broadcast(
        &self,
        room_id: RoomId,
        message: ServerMessage,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Broadcast { room_id, message }).await
    }

    /// Current members of a room; `None` if it was never created.
    pub async fn room_members(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Vec<SessionId>>, HubError> {
        self.request(|reply| HubCommand::RoomMembers { room_id, reply })
            .await
    }

    /// Whether a room with this key has ever been joined.
    pub async fn room_exists(&self, room_id: RoomId) -> Result<bool, HubError> {
        self.request(|reply| HubCommand::RoomExists { room_id, reply })
            .await
    }

    /// Whether the session is still registered.
    pub async fn is_registered(
        &self,
        session_id: SessionId,
    ) -> Result<bool, HubError> {
        self.request(|reply| HubCommand::IsRegistered { session_id, reply })
            .await
    }

    /// Number of registered sessions.
    pub async fn session_count(&self) -> Result<usize, HubError> {
        self.request(|reply| HubCommand::SessionCount { reply }).await
    }

    /// Tells the hub to stop. Every outbound queue closes with it.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.send(HubCommand::Shutdown).await
    }

    /// Returns `true` once the hub actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| HubError::Unavailable)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HubCommand,
    ) -> Result<T, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }
}

/// The internal hub state. Runs inside a Tokio task.
struct HubActor<C: Clock> {
    registry: Registry,
    handler: CommandHandler<C>,
    receiver: mpsc::Receiver<HubCommand>,
}

impl<C: Clock> HubActor<C> {
    /// Runs the actor loop, processing requests until shutdown.
    async fn run(mut self) {
        tracing::info!("hub started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Register { reply } => {
                    let result = self.registry.register().map(
                        |(session_id, outbound)| Registration {
                            session_id,
                            outbound,
                        },
                    );
                    if let Err(e) = &result {
                        tracing::error!(error = %e, "registration refused");
                    }
                    let _ = reply.send(result);
                }
                HubCommand::Unregister { session_id } => {
                    self.registry.unregister(session_id);
                }
                HubCommand::Execute {
                    session_id,
                    command,
                } => {
                    self.execute(session_id, command);
                }
                HubCommand::Deliver {
                    session_id,
                    message,
                } => {
                    self.registry
                        .deliver(session_id, Arc::from(message.to_string()));
                }
                HubCommand::Broadcast { room_id, message } => {
                    self.broadcast(&room_id, &message);
                }
                HubCommand::RoomMembers { room_id, reply } => {
                    let _ = reply.send(self.registry.members(&room_id));
                }
                HubCommand::RoomExists { room_id, reply } => {
                    let _ = reply.send(self.registry.room_exists(&room_id));
                }
                HubCommand::IsRegistered { session_id, reply } => {
                    let _ = reply.send(self.registry.is_registered(session_id));
                }
                HubCommand::SessionCount { reply } => {
                    let _ = reply.send(self.registry.session_count());
                }
                HubCommand::Shutdown => {
                    tracing::info!(
                        sessions = self.registry.session_count(),
                        "hub shutting down"
                    );
                    break;
                }
            }
        }

        tracing::info!("hub stopped");
    }

    fn execute(&mut self, session_id: SessionId, command: Command) {
        if !self.registry.is_registered(session_id) {
            tracing::debug!(
                %session_id,
                command = command.name(),
                "command from unregistered session, dropping"
            );
            return;
        }

        match self.handler.execute(&mut self.registry, session_id, command) {
            Effect::Reply(message) => {
                self.registry
                    .deliver(session_id, Arc::from(message.to_string()));
            }
            Effect::Broadcast { room_id, message } => {
                self.broadcast(&room_id, &message);
            }
        }
    }

    fn broadcast(&mut self, room_id: &RoomId, message: &ServerMessage) {
        let payload = Arc::from(message.to_string());
        let evicted = self.registry.broadcast(room_id, &payload);
        tracing::debug!(
            %room_id,
            %message,
            evicted = evicted.len(),
            "broadcast"
        );
    }
}

/// Spawns the hub actor on the system clock.
pub fn spawn_hub(config: HubConfig) -> HubHandle {
    spawn_hub_with_clock(config, SystemClock)
}

/// Spawns the hub actor with a custom time source.
///
/// `config.channel_size` bounds the request channel: when it is full,
/// callers wait.
pub fn spawn_hub_with_clock<C: Clock>(config: HubConfig, clock: C) -> HubHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let actor = HubActor {
        registry: Registry::new(&config),
        handler: CommandHandler::new(clock, &config),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    HubHandle { sender: tx }
}
