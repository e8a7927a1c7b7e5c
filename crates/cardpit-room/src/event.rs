//! Events that leave a room.
//!
//! Room actors broadcast to their own subscribers directly, but lobby
//! watchers and observers are server-wide. Those updates are emitted
//! here and drained by a single pump task in the server, which keeps
//! every room's emission order intact for every recipient.

use cardpit_protocol::{LobbyUpdate, RoomId, RoomUpdate};
use cardpit_session::SessionId;

/// An update addressed outside the room's own subscriber list.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Lobby change, for every lobby watcher.
    Lobby(LobbyUpdate),
    /// Room update, for every observer.
    Observers { room: RoomId, update: RoomUpdate },
    /// Room update for a single session; used to catch a fresh observer
    /// up with a round already in flight.
    ObserverOne {
        session: SessionId,
        room: RoomId,
        update: RoomUpdate,
    },
}
