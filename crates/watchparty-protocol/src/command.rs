//! Inbound command grammar.
//!
//! One command per frame: `<name>[:<arg>...]`. Names are matched exactly
//! (case-sensitive). Names ending in [`BROADCAST_MARKER`] fan out to the
//! whole room; plain names are request/reply.

use crate::{BROADCAST_MARKER, DELIMITER, ProtocolError, RoomId};

/// A parsed client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `join:<roomId>`: enter a room, creating it if needed.
    Join { room_id: RoomId },
    /// `leave`: exit the current room.
    Leave,
    /// `ready:<bool>`: signal (or withdraw) readiness to play.
    Ready { ready: bool },
    /// `play!:<videoTime>`: start playback for everyone.
    Play { video_time: f64 },
    /// `pause!`: pause playback for everyone.
    Pause,
    /// `seek!:<videoTime>`: jump to a position for everyone.
    Seek { video_time: f64 },
    /// `resume!`: resume playback for everyone.
    Resume,
    /// `sync:<clientTime>`: ask for the server/client clock offset.
    Sync { client_time: f64 },
}

impl Command {
    /// Parses an already-normalized command line.
    ///
    /// ```rust
    /// use watchparty_protocol::{Command, RoomId};
    ///
    /// let cmd = Command::parse("join:room1").unwrap();
    /// assert_eq!(cmd, Command::Join { room_id: RoomId::new("room1") });
    /// assert!(Command::parse("JOIN:room1").is_err());
    /// ```
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut fields = line.split(DELIMITER);
        // `split` always yields at least one item.
        let name = fields.next().unwrap_or_default();
        let args: Vec<&str> = fields.collect();

        match name {
            "join" => {
                let [room] = arity::<1>("join", &args)?;
                if room.is_empty() {
                    return Err(ProtocolError::EmptyRoomId);
                }
                Ok(Command::Join {
                    room_id: RoomId::new(room),
                })
            }
            "leave" => {
                arity::<0>("leave", &args)?;
                Ok(Command::Leave)
            }
            "ready" => {
                let [flag] = arity::<1>("ready", &args)?;
                Ok(Command::Ready {
                    ready: flag == "true",
                })
            }
            "play!" => {
                let [time] = arity::<1>("play!", &args)?;
                Ok(Command::Play {
                    video_time: number("play!", time)?,
                })
            }
            "pause!" => {
                arity::<0>("pause!", &args)?;
                Ok(Command::Pause)
            }
            "seek!" => {
                let [time] = arity::<1>("seek!", &args)?;
                Ok(Command::Seek {
                    video_time: number("seek!", time)?,
                })
            }
            "resume!" => {
                arity::<0>("resume!", &args)?;
                Ok(Command::Resume)
            }
            "sync" => {
                let [time] = arity::<1>("sync", &args)?;
                Ok(Command::Sync {
                    client_time: number("sync", time)?,
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_owned())),
        }
    }

    /// The command's wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join { .. } => "join",
            Command::Leave => "leave",
            Command::Ready { .. } => "ready",
            Command::Play { .. } => "play!",
            Command::Pause => "pause!",
            Command::Seek { .. } => "seek!",
            Command::Resume => "resume!",
            Command::Sync { .. } => "sync",
        }
    }

    /// Returns `true` for room-wide commands (names ending in `!`).
    pub fn is_broadcast(&self) -> bool {
        self.name().ends_with(BROADCAST_MARKER)
    }
}

/// Normalizes a raw inbound frame: embedded newlines become spaces and
/// surrounding whitespace is trimmed.
pub fn normalize_frame(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_owned()
}

fn arity<'a, const N: usize>(
    command: &'static str,
    args: &[&'a str],
) -> Result<[&'a str; N], ProtocolError> {
    <[&'a str; N]>::try_from(args).map_err(|_| ProtocolError::WrongArity {
        command,
        expected: N,
        got: args.len(),
    })
}

fn number(command: &'static str, value: &str) -> Result<f64, ProtocolError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ProtocolError::InvalidNumber {
            command,
            value: value.to_owned(),
        }),
    }
}
