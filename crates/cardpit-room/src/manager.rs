//! Room registry: creates rooms on demand and routes join requests.

use std::collections::BTreeMap;

use tokio::sync::mpsc;

use cardpit_game::GameConfig;
use cardpit_market::Username;
use cardpit_protocol::{
    ApiError, LobbyUpdate, RoomChoice, RoomId, RoomSnapshot, Seat, SeatAssignment,
};

use crate::room::spawn_room;
use crate::{RoomHandle, ServerEvent};

/// The open set of rooms.
///
/// Owned by the server behind a mutex. Room ids come from the manager's
/// own counter. Rooms are only dropped when their actor is found dead;
/// there is no player-facing close operation.
pub struct RoomManager {
    rooms: BTreeMap<RoomId, RoomHandle>,
    next_id: u64,
    config: GameConfig,
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl RoomManager {
    pub fn new(config: GameConfig, events: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { rooms: BTreeMap::new(), next_id: 0, config, events }
    }

    /// Spawns a fresh room and announces it to the lobby.
    pub fn create_room(&mut self) -> RoomHandle {
        self.next_id += 1;
        let id = RoomId(self.next_id);
        let handle = spawn_room(id, self.config, self.events.clone());
        self.rooms.insert(id, handle.clone());
        let _ = self.events.send(ServerEvent::Lobby(LobbyUpdate::RoomCreated {
            room: empty_snapshot(id),
        }));
        tracing::info!(room = %id, "room created");
        handle
    }

    /// Looks up a room by id.
    pub fn get(&self, id: RoomId) -> Option<RoomHandle> {
        self.rooms.get(&id).cloned()
    }

    /// Picks the room a join request lands in.
    ///
    /// An explicit id either exists or is [`ApiError::NoSuchRoom`].
    /// `Any` scans rooms in id order for one that admits the caller (a
    /// free seat, or their own seat from before a disconnect) and
    /// creates a new room when none does.
    pub async fn resolve(
        &mut self,
        username: &Username,
        choice: RoomChoice,
    ) -> Result<RoomHandle, ApiError> {
        match choice {
            RoomChoice::Room { id } => {
                self.rooms.get(&id).cloned().ok_or(ApiError::NoSuchRoom)
            }
            RoomChoice::Any => {
                let mut chosen = None;
                let mut dead = Vec::new();
                for (id, handle) in &self.rooms {
                    match handle.snapshot().await {
                        Ok(snap) if snap.admits(username) => {
                            chosen = Some(handle.clone());
                            break;
                        }
                        Ok(_) => {}
                        Err(_) => dead.push(*id),
                    }
                }
                self.prune(dead);
                Ok(match chosen {
                    Some(handle) => handle,
                    None => self.create_room(),
                })
            }
        }
    }

    /// Snapshots every live room, in id order.
    pub async fn lobby_snapshot(&mut self) -> Vec<RoomSnapshot> {
        let mut rooms = Vec::with_capacity(self.rooms.len());
        let mut dead = Vec::new();
        for (id, handle) in &self.rooms {
            match handle.snapshot().await {
                Ok(snap) => rooms.push(snap),
                Err(_) => dead.push(*id),
            }
        }
        self.prune(dead);
        rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Handles to every open room, in id order.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Forgets rooms whose actor died and tells the lobby. An actor
    /// only dies from a fatal engine bug aborting its round.
    fn prune(&mut self, dead: Vec<RoomId>) {
        for id in dead {
            self.rooms.remove(&id);
            let _ = self
                .events
                .send(ServerEvent::Lobby(LobbyUpdate::RoomClosed { id }));
            tracing::warn!(room = %id, "room actor gone, pruning");
        }
    }
}

fn empty_snapshot(id: RoomId) -> RoomSnapshot {
    RoomSnapshot {
        id,
        seats: Seat::ALL
            .iter()
            .map(|&seat| SeatAssignment { seat, username: None })
            .collect(),
        playing: false,
        ready: Vec::new(),
    }
}
