//! The command protocol handler: the playback-synchronization state
//! machine.
//!
//! ```text
//! Unjoined ──join──→ Joined/NotReady ──ready:true──→ Joined/Ready
//!    ↑                    ↑                               │
//!    └──────leave─────────┴──────────pause! (anyone)──────┘
//! ```
//!
//! "All ready" is a room-wide condition, not a per-session state: it
//! holds when every current member is ready, and it is what `play!`
//! checks.
//!
//! Handlers run inside the hub actor, against the registry, and never
//! touch the network. Their only output is an [`Effect`].

use watchparty_protocol::{
    Command, RejectReason, RoomId, ServerMessage, SessionId,
};

use crate::{Clock, HubConfig, Registry};

/// What the hub should do after executing a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Queue a message for the sender only.
    Reply(ServerMessage),
    /// Queue a message for every member of the room, sender included.
    Broadcast { room_id: RoomId, message: ServerMessage },
}

/// Executes commands against a [`Registry`].
#[derive(Debug, Clone)]
pub struct CommandHandler<C: Clock> {
    clock: C,
    play_lead: f64,
}

impl<C: Clock> CommandHandler<C> {
    /// Creates a handler reading time from `clock`.
    pub fn new(clock: C, config: &HubConfig) -> Self {
        Self {
            clock,
            play_lead: config.play_lead.as_secs_f64(),
        }
    }

    /// Executes one command on behalf of `session_id`.
    pub fn execute(
        &self,
        registry: &mut Registry,
        session_id: SessionId,
        command: Command,
    ) -> Effect {
        tracing::debug!(%session_id, command = command.name(), "executing command");

        match command {
            Command::Join { room_id } => {
                registry.join(session_id, room_id.clone());
                Effect::Reply(ServerMessage::Accept {
                    session_id,
                    room_id,
                })
            }

            Command::Leave => {
                if let Some(room_id) = registry.leave(session_id) {
                    tracing::debug!(%session_id, %room_id, "left room");
                }
                Effect::Reply(ServerMessage::Ok)
            }

            Command::Ready { ready } => {
                let Some(room_id) = registry.current_room(session_id).cloned()
                else {
                    return reject(RejectReason::NoRoom);
                };
                registry.set_ready(session_id, ready);
                if registry.all_ready(&room_id) {
                    Effect::Reply(ServerMessage::Ready)
                } else {
                    Effect::Reply(ServerMessage::Ok)
                }
            }

            Command::Play { video_time } => {
                let Some(room_id) = registry.current_room(session_id).cloned()
                else {
                    return reject(RejectReason::NoRoom);
                };
                if !registry.all_ready(&room_id) {
                    return reject(RejectReason::NotAllReady);
                }
                Effect::Broadcast {
                    room_id,
                    message: ServerMessage::Play {
                        video_time,
                        start_time: self.clock.now() + self.play_lead,
                    },
                }
            }

            Command::Pause => {
                let Some(room_id) = registry.current_room(session_id).cloned()
                else {
                    return reject(RejectReason::NoRoom);
                };
                registry.reset_readiness(&room_id);
                Effect::Broadcast {
                    room_id,
                    message: ServerMessage::Pause,
                }
            }

            Command::Seek { video_time } => {
                let Some(room_id) = registry.current_room(session_id).cloned()
                else {
                    return reject(RejectReason::NoRoom);
                };
                Effect::Broadcast {
                    room_id,
                    message: ServerMessage::Seek { video_time },
                }
            }

            Command::Resume => {
                let Some(room_id) = registry.current_room(session_id).cloned()
                else {
                    return reject(RejectReason::NoRoom);
                };
                Effect::Broadcast {
                    room_id,
                    message: ServerMessage::Resume,
                }
            }

            // One-way estimate: network latency is folded into the offset.
            Command::Sync { client_time } => Effect::Reply(ServerMessage::Sync {
                offset: self.clock.now() - client_time,
            }),
        }
    }
}

fn reject(reason: RejectReason) -> Effect {
    Effect::Reply(ServerMessage::Reject(reason))
}
