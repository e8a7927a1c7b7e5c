//! The session registry: every live connection and its outbound queue.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. The server owns the
//! only instance behind a mutex and holds the lock just long enough to
//! queue messages; actual socket writes happen in per-connection writer
//! tasks, so fan-out never blocks on a slow peer.

use std::collections::{HashMap, HashSet};

use cardpit_market::Username;
use cardpit_protocol::{LobbyUpdate, RoomId, RoomUpdate, ServerMsg};

use crate::{Session, SessionError, SessionId, SessionState, UpdateSink};

/// Tracks every live connection.
///
/// Secondary sets (`lobby_watchers`, `observers`) are kept in sync with
/// the primary map; [`remove`](SessionRegistry::remove) is the single
/// place a session leaves all of them.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    /// Sessions that asked for lobby updates.
    lobby_watchers: HashSet<SessionId>,
    /// Sessions spectating every room.
    observers: HashSet<SessionId>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a connection, returning its server-assigned id.
    pub fn register(&mut self, sink: UpdateSink) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.sessions.insert(
            id,
            Session { id, state: SessionState::Anonymous, sink },
        );
        tracing::debug!(session = %id, "session registered");
        id
    }

    /// Binds a username to an anonymous session.
    ///
    /// # Errors
    /// [`SessionError::AlreadyIdentified`] if the session already logged
    /// in or became an observer.
    pub fn login(
        &mut self,
        id: SessionId,
        username: Username,
    ) -> Result<(), SessionError> {
        let session = self.session_mut(id)?;
        if !matches!(session.state, SessionState::Anonymous) {
            return Err(SessionError::AlreadyIdentified(id));
        }
        tracing::info!(session = %id, username = %username, "logged in");
        session.state = SessionState::Player { username };
        Ok(())
    }

    /// Turns an anonymous session into a spectator of every room.
    ///
    /// # Errors
    /// [`SessionError::AlreadyIdentified`] if the session already logged
    /// in or became an observer.
    pub fn observe(&mut self, id: SessionId) -> Result<(), SessionError> {
        let session = self.session_mut(id)?;
        if !matches!(session.state, SessionState::Anonymous) {
            return Err(SessionError::AlreadyIdentified(id));
        }
        session.state = SessionState::Observer;
        self.observers.insert(id);
        tracing::info!(session = %id, "observer attached");
        Ok(())
    }

    /// Subscribes a session to lobby updates. Any state may watch.
    pub fn watch_lobby(&mut self, id: SessionId) -> Result<(), SessionError> {
        if !self.sessions.contains_key(&id) {
            return Err(SessionError::NotFound(id));
        }
        self.lobby_watchers.insert(id);
        Ok(())
    }

    /// Drops a session from every index, handing its record back.
    ///
    /// The first caller wins; a second call returns `None`. That is what
    /// makes connection teardown safe to start from either the reader
    /// or the writer side.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.lobby_watchers.remove(&id);
        self.observers.remove(&id);
        tracing::debug!(session = %id, "session removed");
        Some(session)
    }

    /// Looks up a session by id.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // -- Fan-out ----------------------------------------------------------

    /// Queues a message for one session. Returns `false` when the
    /// session is gone or its queue would not take the message.
    pub fn send_to_session(&self, id: SessionId, msg: ServerMsg) -> bool {
        let Some(session) = self.sessions.get(&id) else {
            return false;
        };
        let delivered = session.sink.try_deliver(msg);
        if !delivered {
            tracing::warn!(session = %id, "update dropped, connection closing");
        }
        delivered
    }

    /// Fans a lobby update out to every watcher.
    pub fn broadcast_lobby(&self, update: LobbyUpdate) {
        for id in &self.lobby_watchers {
            self.send_to_session(*id, ServerMsg::Lobby { update: update.clone() });
        }
    }

    /// Fans a room update out to every observer.
    pub fn broadcast_observers(&self, room: RoomId, update: RoomUpdate) {
        for id in &self.observers {
            self.send_to_session(*id, ServerMsg::Room { room, update: update.clone() });
        }
    }

    fn session_mut(&mut self, id: SessionId) -> Result<&mut Session, SessionError> {
        self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))
    }
}

// =========================================================================
// Tests
// =========================================================================
