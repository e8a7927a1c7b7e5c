//! Request and server-message shapes.
//!
//! Clients send [`Request`]s; every request gets exactly one
//! [`ServerMsg::Reply`] correlated by `seq`. Streamed [`RoomUpdate`]s
//! and [`LobbyUpdate`]s arrive interleaved with replies on the same
//! connection, in the order the server produced them for the room in
//! question.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cardpit_game::{Hand, RoundSummary};
use cardpit_market::{
    Direction, Exec, MarketSnapshot, Order, OrderId, Price, Size, Suit, Username,
};

use crate::error::ApiError;
use crate::types::{RoomChoice, RoomId, RoomSnapshot, Seat, SeatChoice};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// An order as the client states it. The server stamps the owner from the
/// session's login; clients cannot submit on someone else's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub id: OrderId,
    pub suit: Suit,
    pub dir: Direction,
    pub price: Price,
    pub size: Size,
}

impl OrderSpec {
    pub fn into_order(self, owner: Username) -> Order {
        Order {
            owner,
            id: self.id,
            suit: self.suit,
            dir: self.dir,
            price: self.price,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestKind {
    /// Bind this connection to a trading identity. A username may be
    /// logged in from several connections at once.
    Login { username: Username },
    /// Subscribe to lobby updates; opens with a full snapshot.
    GetLobbyUpdates,
    JoinRoom { choice: RoomChoice },
    StartPlaying { choice: SeatChoice },
    IsReady { ready: bool },
    GetBook,
    GetHand,
    SubmitOrder { order: OrderSpec },
    CancelOrder { id: OrderId },
    Chat { message: String },
    /// Spectate every room; an alternative to `Login`.
    GetObserverUpdates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    pub kind: RequestKind,
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// The success payload of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    Ok,
    Joined { room: RoomSnapshot },
    Seated { seat: Seat },
    Book { market: MarketSnapshot },
    Hand { hand: Hand },
    Executed { exec: Exec },
    Cancelled { order: Order },
}

/// A room-scoped streamed update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomUpdate {
    PlayerJoined { username: Username },
    /// Addressed: sent only to the player it belongs to.
    Dealt { hand: Hand },
    Exec { exec: Exec },
    Out { order: Order },
    Market { market: MarketSnapshot },
    /// Observers only: every hand in the round.
    Hands { hands: HashMap<Username, Hand> },
    /// How many ready signals are still missing before the next deal.
    WaitingFor { count: usize },
    RoundOver { summary: RoundSummary },
    Chat { username: Username, message: String },
}

/// A lobby-scoped streamed update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LobbyUpdate {
    Snapshot { rooms: Vec<RoomSnapshot> },
    RoomCreated { room: RoomSnapshot },
    RoomUpdated { room: RoomSnapshot },
    RoomClosed { id: RoomId },
}

/// Everything the server ever writes to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    Reply {
        seq: u64,
        result: Result<Reply, ApiError>,
    },
    Room {
        room: RoomId,
        update: RoomUpdate,
    },
    Lobby {
        update: LobbyUpdate,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let req = Request {
            seq: 5,
            kind: RequestKind::Login { username: Username::new("alice") },
        };
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["seq"], 5);
        assert_eq!(json["kind"]["type"], "Login");
        assert_eq!(json["kind"]["username"], "alice");
    }

    #[test]
    fn test_submit_order_json_shape() {
        let req = Request {
            seq: 9,
            kind: RequestKind::SubmitOrder {
                order: OrderSpec {
                    id: OrderId(3),
                    suit: Suit::Hearts,
                    dir: Direction::Sell,
                    price: Price(6),
                    size: Size(2),
                },
            },
        };
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["kind"]["type"], "SubmitOrder");
        assert_eq!(json["kind"]["order"]["suit"], "Hearts");
        assert_eq!(json["kind"]["order"]["price"], 6);
    }

    #[test]
    fn test_reply_error_json_shape() {
        let msg = ServerMsg::Reply {
            seq: 2,
            result: Err(ApiError::InsufficientHoldings),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Reply");
        assert_eq!(json["result"]["Err"]["type"], "InsufficientHoldings");
    }

    #[test]
    fn test_room_update_is_tagged_with_room_id() {
        let msg = ServerMsg::Room {
            room: RoomId(4),
            update: RoomUpdate::WaitingFor { count: 2 },
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Room");
        assert_eq!(json["room"], 4);
        assert_eq!(json["update"]["type"], "WaitingFor");
        assert_eq!(json["update"]["count"], 2);
    }

    // One representative round trip through a nested payload; the field-level
    // shapes above pin the wire format itself.
    #[test]
    fn test_exec_update_round_trip() {
        let order = Order {
            owner: Username::new("bob"),
            id: OrderId(1),
            suit: Suit::Spades,
            dir: Direction::Buy,
            price: Price(7),
            size: Size(3),
        };
        let msg = ServerMsg::Room {
            room: RoomId(1),
            update: RoomUpdate::Exec {
                exec: Exec { order, fills: vec![] },
            },
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMsg = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }
}
