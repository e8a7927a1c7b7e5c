//! Error types for round-level order admission.

use cardpit_market::{MarketError, Size, Suit, Username};

/// Why the round refused an order. Phase checks (trading closed) happen
/// one layer up, in the room.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A sell must be covered by the hand net of sells already resting.
    #[error("insufficient holdings: sell {size} {suit} with only {sellable} sellable")]
    InsufficientHoldings { suit: Suit, size: Size, sellable: Size },

    /// Only players dealt into the current round may trade.
    #[error("{username} is not a participant in this round")]
    NotParticipant { username: Username },

    #[error(transparent)]
    Market(#[from] MarketError),
}
