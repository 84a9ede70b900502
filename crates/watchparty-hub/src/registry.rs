//! The registry: every live session and every room.
//!
//! # Concurrency note
//!
//! `Registry` is NOT thread-safe by itself. It is owned by the hub actor
//! and only touched from inside its loop, which is what keeps the
//! session table and the room table consistent with each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use watchparty_protocol::{RoomId, SessionId};

use crate::{HubConfig, HubError};

/// One queued outbound frame. Shared, so a fan-out clones a pointer and
/// not the text.
pub type Outbound = Arc<str>;

/// The receiving end of a session's outbound queue, drained by the
/// session's write task.
pub type OutboundReceiver = mpsc::Receiver<Outbound>;

/// Registry-side state of one session.
#[derive(Debug)]
struct SessionEntry {
    room: Option<RoomId>,
    ready: bool,
    /// The only sender for this session's queue. Dropping it closes the
    /// queue, so removing the entry is the close.
    outbound: mpsc::Sender<Outbound>,
}

/// Session table plus room table.
#[derive(Debug)]
pub struct Registry {
    sessions: HashMap<SessionId, SessionEntry>,

    /// Room key → members. Rooms are created on first join and are
    /// never removed, even once empty.
    rooms: HashMap<RoomId, HashSet<SessionId>>,

    outbound_capacity: usize,
    max_id_attempts: usize,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: &HubConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            rooms: HashMap::new(),
            outbound_capacity: config.outbound_capacity.max(1),
            max_id_attempts: config.max_id_attempts.max(1),
        }
    }

    /// Registers a new session: assigns it a fresh id and creates its
    /// outbound queue.
    ///
    /// # Errors
    /// Returns [`HubError::IdExhausted`] if no unused id could be found.
    pub fn register(
        &mut self,
    ) -> Result<(SessionId, OutboundReceiver), HubError> {
        let session_id = self.fresh_id()?;
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        self.sessions.insert(
            session_id,
            SessionEntry {
                room: None,
                ready: false,
                outbound: tx,
            },
        );
        tracing::info!(%session_id, sessions = self.sessions.len(), "session registered");
        Ok((session_id, rx))
    }

    /// Removes a session and closes its outbound queue.
    ///
    /// Returns `false` if the session was not registered (already gone).
    pub fn unregister(&mut self, session_id: SessionId) -> bool {
        let Some(entry) = self.sessions.remove(&session_id) else {
            return false;
        };
        if let Some(room_id) = &entry.room {
            if let Some(members) = self.rooms.get_mut(room_id) {
                members.remove(&session_id);
            }
        }
        // `entry.outbound` drops here → queue closed.
        tracing::info!(%session_id, sessions = self.sessions.len(), "session unregistered");
        true
    }

    /// Returns `true` if the session is registered.
    pub fn is_registered(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of rooms ever created (empty ones included).
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if a room with this key has ever been joined.
    pub fn room_exists(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// The session's current room, provided that room exists.
    ///
    /// This is the one place "does the sender have a room?" is answered.
    pub fn current_room(&self, session_id: SessionId) -> Option<&RoomId> {
        self.sessions
            .get(&session_id)?
            .room
            .as_ref()
            .filter(|room_id| self.rooms.contains_key(*room_id))
    }

    /// Members of a room, sorted for stable output. `None` if the room
    /// was never created.
    pub fn members(&self, room_id: &RoomId) -> Option<Vec<SessionId>> {
        let mut members: Vec<SessionId> =
            self.rooms.get(room_id)?.iter().copied().collect();
        members.sort();
        Some(members)
    }

    /// Puts a session into a room, creating the room if needed.
    ///
    /// A session in a different room leaves it first (and loses its
    /// readiness). Re-joining the current room changes nothing.
    /// Returns `false` if the session is not registered.
    pub fn join(&mut self, session_id: SessionId, room_id: RoomId) -> bool {
        let Some(entry) = self.sessions.get(&session_id) else {
            return false;
        };
        if entry.room.as_ref() == Some(&room_id) {
            return true;
        }
        if entry.room.is_some() {
            self.leave(session_id);
        }

        let members = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!(%room_id, "room created");
            HashSet::new()
        });
        members.insert(session_id);

        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry.room = Some(room_id);
            entry.ready = false;
        }
        true
    }

    /// Takes a session out of its room and clears its readiness.
    ///
    /// Returns the room it left, if any. The room itself stays.
    pub fn leave(&mut self, session_id: SessionId) -> Option<RoomId> {
        let entry = self.sessions.get_mut(&session_id)?;
        entry.ready = false;
        let room_id = entry.room.take()?;
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&session_id);
        }
        Some(room_id)
    }

    /// Sets a session's readiness flag.
    pub fn set_ready(&mut self, session_id: SessionId, ready: bool) {
        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry.ready = ready;
        }
    }

    /// Returns the session's readiness flag (`false` if unknown).
    pub fn is_ready(&self, session_id: SessionId) -> bool {
        self.sessions
            .get(&session_id)
            .is_some_and(|entry| entry.ready)
    }

    /// Returns `true` if every current member of the room is ready.
    /// An empty or unknown room is vacuously ready.
    pub fn all_ready(&self, room_id: &RoomId) -> bool {
        self.rooms.get(room_id).is_none_or(|members| {
            members.iter().all(|id| self.is_ready(*id))
        })
    }

    /// Clears the readiness of every member of the room.
    pub fn reset_readiness(&mut self, room_id: &RoomId) {
        let Some(members) = self.rooms.get(room_id) else {
            return;
        };
        for id in members {
            if let Some(entry) = self.sessions.get_mut(id) {
                entry.ready = false;
            }
        }
    }

    /// Enqueues a payload for a single session without waiting.
    ///
    /// A full or closed queue evicts the session. Returns `true` if the
    /// payload was queued.
    pub fn deliver(&mut self, session_id: SessionId, payload: Outbound) -> bool {
        let Some(entry) = self.sessions.get(&session_id) else {
            return false;
        };
        match entry.outbound.try_send(payload) {
            Ok(()) => true,
            Err(e) => {
                log_eviction(session_id, &e);
                self.unregister(session_id);
                false
            }
        }
    }

    /// Enqueues a payload for every member of the room without waiting.
    ///
    /// Members whose queue is full (or already closed) are evicted.
    /// Returns the evicted sessions.
    pub fn broadcast(
        &mut self,
        room_id: &RoomId,
        payload: &Outbound,
    ) -> Vec<SessionId> {
        let Some(members) = self.rooms.get(room_id) else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        for id in members {
            let Some(entry) = self.sessions.get(id) else {
                continue;
            };
            if let Err(e) = entry.outbound.try_send(Arc::clone(payload)) {
                log_eviction(*id, &e);
                evicted.push(*id);
            }
        }

        for id in &evicted {
            self.unregister(*id);
        }
        evicted
    }

    fn fresh_id(&self) -> Result<SessionId, HubError> {
        for _ in 0..self.max_id_attempts {
            let id = SessionId::new_v4();
            if !self.sessions.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(HubError::IdExhausted(self.max_id_attempts))
    }
}

fn log_eviction(session_id: SessionId, err: &TrySendError<Outbound>) {
    match err {
        TrySendError::Full(_) => tracing::warn!(
            %session_id,
            "outbound queue full, evicting unresponsive session"
        ),
        TrySendError::Closed(_) => tracing::debug!(
            %session_id,
            "outbound queue closed, dropping session"
        ),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for `Registry`, named `test_{function}_{scenario}`.

    use super::*;

    fn registry() -> Registry {
        Registry::new(&HubConfig::default())
    }

    fn registry_with_capacity(outbound_capacity: usize) -> Registry {
        Registry::new(&HubConfig {
            outbound_capacity,
            ..HubConfig::default()
        })
    }

    fn room(key: &str) -> RoomId {
        RoomId::new(key)
    }

    fn payload(text: &str) -> Outbound {
        Arc::from(text)
    }

    // =====================================================================
    // register() / unregister()
    // =====================================================================

    #[test]
    fn test_register_assigns_unique_ids() {
        let mut reg = registry();
        let (a, _rx_a) = reg.register().unwrap();
        let (b, _rx_b) = reg.register().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.0.get_version_num(), 4);
        assert_eq!(reg.session_count(), 2);
    }

    #[test]
    fn test_unregister_closes_queue() {
        let mut reg = registry();
        let (id, mut rx) = reg.register().unwrap();

        assert!(reg.unregister(id));
        assert!(!reg.is_registered(id));
        // Sender dropped → receiver observes the close.
        assert!(rx.try_recv().is_err());
        assert!(rx.is_closed());
    }

    #[test]
    fn test_unregister_twice_is_noop() {
        let mut reg = registry();
        let (id, _rx) = reg.register().unwrap();
        assert!(reg.unregister(id));
        assert!(!reg.unregister(id));
        assert_eq!(reg.session_count(), 0);
    }

    #[test]
    fn test_unregister_removes_room_membership() {
        let mut reg = registry();
        let (id, _rx) = reg.register().unwrap();
        reg.join(id, room("r1"));

        reg.unregister(id);

        assert_eq!(reg.members(&room("r1")), Some(vec![]));
    }

    // =====================================================================
    // join() / leave()
    // =====================================================================

    #[test]
    fn test_join_creates_room_and_sets_membership() {
        let mut reg = registry();
        let (id, _rx) = reg.register().unwrap();

        assert!(reg.join(id, room("r1")));

        assert!(reg.room_exists(&room("r1")));
        assert_eq!(reg.current_room(id), Some(&room("r1")));
        assert_eq!(reg.members(&room("r1")), Some(vec![id]));
    }

    #[test]
    fn test_join_unregistered_session_is_refused() {
        let mut reg = registry();
        assert!(!reg.join(SessionId::from_u128(7), room("r1")));
        assert!(!reg.room_exists(&room("r1")));
    }

    #[test]
    fn test_join_then_leave_restores_members_and_keeps_room() {
        let mut reg = registry();
        let (a, _rx_a) = reg.register().unwrap();
        let (b, _rx_b) = reg.register().unwrap();
        reg.join(a, room("r1"));
        let before = reg.members(&room("r1"));

        reg.join(b, room("r1"));
        assert_eq!(reg.leave(b), Some(room("r1")));

        assert_eq!(reg.members(&room("r1")), before);
        assert_eq!(reg.current_room(b), None);
    }

    #[test]
    fn test_leave_last_member_keeps_empty_room() {
        let mut reg = registry();
        let (id, _rx) = reg.register().unwrap();
        reg.join(id, room("r1"));

        reg.leave(id);

        assert!(reg.room_exists(&room("r1")));
        assert_eq!(reg.members(&room("r1")), Some(vec![]));
        assert_eq!(reg.room_count(), 1);
    }

    #[test]
    fn test_leave_resets_readiness() {
        let mut reg = registry();
        let (id, _rx) = reg.register().unwrap();
        reg.join(id, room("r1"));
        reg.set_ready(id, true);

        reg.leave(id);

        assert!(!reg.is_ready(id));
    }

    #[test]
    fn test_join_other_room_moves_session() {
        let mut reg = registry();
        let (id, _rx) = reg.register().unwrap();
        reg.join(id, room("r1"));
        reg.set_ready(id, true);

        reg.join(id, room("r2"));

        assert_eq!(reg.members(&room("r1")), Some(vec![]));
        assert_eq!(reg.members(&room("r2")), Some(vec![id]));
        assert!(!reg.is_ready(id), "readiness is scoped to the room");
    }

    #[test]
    fn test_join_same_room_keeps_readiness() {
        let mut reg = registry();
        let (id, _rx) = reg.register().unwrap();
        reg.join(id, room("r1"));
        reg.set_ready(id, true);

        reg.join(id, room("r1"));

        assert!(reg.is_ready(id));
        assert_eq!(reg.members(&room("r1")), Some(vec![id]));
    }

    // =====================================================================
    // readiness
    // =====================================================================

    #[test]
    fn test_all_ready_requires_every_member() {
        let mut reg = registry();
        let (a, _rx_a) = reg.register().unwrap();
        let (b, _rx_b) = reg.register().unwrap();
        reg.join(a, room("r1"));
        reg.join(b, room("r1"));

        reg.set_ready(a, true);
        assert!(!reg.all_ready(&room("r1")));

        reg.set_ready(b, true);
        assert!(reg.all_ready(&room("r1")));
    }

    #[test]
    fn test_all_ready_ignores_other_rooms() {
        let mut reg = registry();
        let (a, _rx_a) = reg.register().unwrap();
        let (b, _rx_b) = reg.register().unwrap();
        reg.join(a, room("r1"));
        reg.join(b, room("r2"));

        reg.set_ready(a, true);

        assert!(reg.all_ready(&room("r1")));
        assert!(!reg.all_ready(&room("r2")));
    }

    #[test]
    fn test_reset_readiness_clears_whole_room() {
        let mut reg = registry();
        let (a, _rx_a) = reg.register().unwrap();
        let (b, _rx_b) = reg.register().unwrap();
        reg.join(a, room("r1"));
        reg.join(b, room("r1"));
        reg.set_ready(a, true);
        reg.set_ready(b, true);

        reg.reset_readiness(&room("r1"));

        assert!(!reg.is_ready(a));
        assert!(!reg.is_ready(b));
    }

    // =====================================================================
    // deliver() / broadcast()
    // =====================================================================

    #[test]
    fn test_broadcast_reaches_only_room_members() {
        let mut reg = registry();
        let (a, mut rx_a) = reg.register().unwrap();
        let (b, mut rx_b) = reg.register().unwrap();
        let (c, mut rx_c) = reg.register().unwrap();
        let (_d, mut rx_d) = reg.register().unwrap();
        reg.join(a, room("r1"));
        reg.join(b, room("r1"));
        reg.join(c, room("r2"));

        let evicted = reg.broadcast(&room("r1"), &payload("pause"));

        assert!(evicted.is_empty());
        assert_eq!(rx_a.try_recv().unwrap().as_ref(), "pause");
        assert_eq!(rx_b.try_recv().unwrap().as_ref(), "pause");
        assert!(rx_c.try_recv().is_err());
        assert!(rx_d.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_preserves_order_per_session() {
        let mut reg = registry();
        let (a, mut rx) = reg.register().unwrap();
        reg.join(a, room("r1"));

        reg.broadcast(&room("r1"), &payload("seek:1"));
        reg.broadcast(&room("r1"), &payload("seek:2"));

        assert_eq!(rx.try_recv().unwrap().as_ref(), "seek:1");
        assert_eq!(rx.try_recv().unwrap().as_ref(), "seek:2");
    }

    #[test]
    fn test_broadcast_full_queue_evicts_session() {
        let mut reg = registry_with_capacity(1);
        let (slow, mut rx_slow) = reg.register().unwrap();
        let (fast, mut rx_fast) = reg.register().unwrap();
        reg.join(slow, room("r1"));
        reg.join(fast, room("r1"));

        reg.broadcast(&room("r1"), &payload("seek:1"));
        // Drain the fast consumer only.
        assert_eq!(rx_fast.try_recv().unwrap().as_ref(), "seek:1");

        let evicted = reg.broadcast(&room("r1"), &payload("seek:2"));

        assert_eq!(evicted, vec![slow]);
        assert!(!reg.is_registered(slow));
        assert_eq!(reg.members(&room("r1")), Some(vec![fast]));
        // The slow queue keeps what it had, then reports closed.
        assert_eq!(rx_slow.try_recv().unwrap().as_ref(), "seek:1");
        assert!(rx_slow.try_recv().is_err());
        assert!(rx_slow.is_closed());
        assert_eq!(rx_fast.try_recv().unwrap().as_ref(), "seek:2");
    }

    #[test]
    fn test_broadcast_closed_queue_drops_session() {
        let mut reg = registry();
        let (id, rx) = reg.register().unwrap();
        reg.join(id, room("r1"));
        drop(rx);

        let evicted = reg.broadcast(&room("r1"), &payload("pause"));

        assert_eq!(evicted, vec![id]);
        assert_eq!(reg.session_count(), 0);
    }

    #[test]
    fn test_broadcast_unknown_room_is_noop() {
        let mut reg = registry();
        assert!(reg.broadcast(&room("nowhere"), &payload("pause")).is_empty());
    }

    #[test]
    fn test_deliver_full_queue_evicts_session() {
        let mut reg = registry_with_capacity(1);
        let (id, _rx) = reg.register().unwrap();

        assert!(reg.deliver(id, payload("OK")));
        assert!(!reg.deliver(id, payload("OK")));
        assert!(!reg.is_registered(id));
    }

    #[test]
    fn test_deliver_to_unknown_session_is_dropped() {
        let mut reg = registry();
        assert!(!reg.deliver(SessionId::from_u128(1), payload("OK")));
    }
}
