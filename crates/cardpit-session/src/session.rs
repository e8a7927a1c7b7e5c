//! Session identity.

use std::fmt;

use cardpit_market::Username;

use crate::UpdateSink;

/// Server-assigned connection identifier.
///
/// Unlike a [`Username`], a `SessionId` names one connection; a player
/// logged in from two devices holds two of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What a connection has identified itself as.
///
/// The state moves forward exactly once: an anonymous session becomes a
/// player or an observer and stays that way until the connection dies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Fresh connection. May log in, observe, or watch the lobby.
    Anonymous,
    /// Logged in and able to trade.
    Player { username: Username },
    /// Read-only spectator of every room.
    Observer,
}

/// One live connection: its identity and its outbound queue.
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub sink: UpdateSink,
}

impl Session {
    /// The username this session trades under, if it logged in.
    pub fn username(&self) -> Option<&Username> {
        match &self.state {
            SessionState::Player { username } => Some(username),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId(7).to_string(), "session-7");
    }

    #[test]
    fn test_username_only_for_players() {
        let (sink, _feed) = UpdateSink::channel(1);
        let mut session = Session {
            id: SessionId(1),
            state: SessionState::Anonymous,
            sink,
        };
        assert_eq!(session.username(), None);

        session.state = SessionState::Player { username: Username::new("alice") };
        assert_eq!(session.username(), Some(&Username::new("alice")));

        session.state = SessionState::Observer;
        assert_eq!(session.username(), None);
    }
}
