//! Protocol-layer errors.
//!
//! [`ApiError`] is part of the wire format: it travels inside
//! `ServerMsg::Reply` and tells the client why a request was refused.
//! [`ProtocolError`] never leaves the server; it reports codec failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cardpit_game::GameError;
use cardpit_market::MarketError;

/// Why a request was refused.
///
/// Details (which suit, which order id) stay in the server logs; the
/// client gets the category and already knows what it asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type")]
pub enum ApiError {
    #[error("this connection is already logged in")]
    AlreadyLoggedIn,
    #[error("invalid username")]
    InvalidUsername,
    #[error("log in first")]
    NotLoggedIn,
    #[error("no such room")]
    NoSuchRoom,
    #[error("already in a room")]
    AlreadyInRoom,
    #[error("join a room first")]
    NotInRoom,
    #[error("the round has already started")]
    GameAlreadyStarted,
    #[error("that seat is occupied")]
    SeatOccupied,
    #[error("already playing in this room")]
    AlreadyPlaying,
    #[error("take a seat first")]
    NotSeated,
    #[error("no round is in progress")]
    GameNotInProgress,
    #[error("not enough cards to cover that sale")]
    InsufficientHoldings,
    #[error("no such order")]
    NoSuchOrder,
    #[error("that order belongs to someone else")]
    NotOwner,
    #[error("the room is gone")]
    RoomUnavailable,
    #[error("malformed request")]
    Malformed,
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::NoSuchOrder { .. } => ApiError::NoSuchOrder,
            MarketError::NotOwner { .. } => ApiError::NotOwner,
        }
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::InsufficientHoldings { .. } => ApiError::InsufficientHoldings,
            GameError::NotParticipant { .. } => ApiError::NotSeated,
            GameError::Market(err) => err.into(),
        }
    }
}

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardpit_market::{OrderId, Size, Suit, Username};

    #[test]
    fn test_api_error_json_shape() {
        let json: serde_json::Value = serde_json::to_value(ApiError::SeatOccupied).unwrap();
        assert_eq!(json["type"], "SeatOccupied");
    }

    #[test]
    fn test_market_error_conversion() {
        let err = MarketError::NotOwner { id: OrderId(3) };
        assert_eq!(ApiError::from(err), ApiError::NotOwner);
        let err = MarketError::NoSuchOrder { id: OrderId(3) };
        assert_eq!(ApiError::from(err), ApiError::NoSuchOrder);
    }

    #[test]
    fn test_game_error_conversion() {
        let err = GameError::InsufficientHoldings {
            suit: Suit::Hearts,
            size: Size(5),
            sellable: Size(2),
        };
        assert_eq!(ApiError::from(err), ApiError::InsufficientHoldings);

        let err = GameError::NotParticipant { username: Username::new("mallory") };
        assert_eq!(ApiError::from(err), ApiError::NotSeated);

        let err = GameError::Market(MarketError::NoSuchOrder { id: OrderId(9) });
        assert_eq!(ApiError::from(err), ApiError::NoSuchOrder);
    }
}
