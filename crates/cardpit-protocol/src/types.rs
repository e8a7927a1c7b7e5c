//! Shared identity and snapshot types that travel on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

use cardpit_market::Username;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A unique identifier for a room. Allocated by the room registry; never
/// reused within a server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// Usernames are short, printable, and shell-safe: 1 to 24 characters
/// drawn from ASCII alphanumerics, `_`, and `-`.
pub fn valid_username(name: &str) -> bool {
    (1..=24).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// The four fixed seats of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    North,
    East,
    South,
    West,
}

impl Seat {
    pub const ALL: [Seat; 4] = [Seat::North, Seat::East, Seat::South, Seat::West];

    pub fn index(self) -> usize {
        match self {
            Seat::North => 0,
            Seat::East => 1,
            Seat::South => 2,
            Seat::West => 3,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Seat::North => "north",
            Seat::East => "east",
            Seat::South => "south",
            Seat::West => "west",
        };
        write!(f, "{name}")
    }
}

/// Where a player wants to sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SeatChoice {
    /// First free seat, scanning [`Seat::ALL`] in order.
    Any,
    Seat { seat: Seat },
}

/// Which room to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomChoice {
    /// First room with a seat the caller may take; a new room if none.
    Any,
    Room { id: RoomId },
}

// ---------------------------------------------------------------------------
// Room snapshot
// ---------------------------------------------------------------------------

/// One seat of a room as the lobby sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub seat: Seat,
    pub username: Option<Username>,
}

/// The lobby's view of one room: who sits where, whether a round is
/// running, and who has readied up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub seats: Vec<SeatAssignment>,
    pub playing: bool,
    pub ready: Vec<Username>,
}

impl RoomSnapshot {
    pub fn free_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.username.is_none()).count()
    }

    pub fn is_seated(&self, username: &Username) -> bool {
        self.seats
            .iter()
            .any(|s| s.username.as_ref() == Some(username))
    }

    /// Whether `username` may enter: a free seat exists, or they already
    /// hold one (seats survive disconnects, so a returning player may
    /// rejoin a nominally full room).
    pub fn admits(&self, username: &Username) -> bool {
        self.free_seats() > 0 || self.is_seated(username)
    }
}
