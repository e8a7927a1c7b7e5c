//! Round lifecycle for Cardpit.
//!
//! Everything between "all four seats are ready" and "the timer fired":
//! dealing hands from the configured deck, admitting orders against
//! holdings, applying fills, and settling the payout.
//!
//! # Key types
//!
//! - [`GameConfig`] / [`DeckPlan`]: injectable deck and payout parameters
//! - [`Hand`]: per-suit card counts
//! - [`Round`]: one live round, consumed by [`Round::finish`]
//! - [`RoundSummary`]: the published settlement

mod config;
mod error;
mod hand;
mod round;

pub use config::{DeckPlan, GameConfig};
pub use error::GameError;
pub use hand::Hand;
pub use round::{Round, RoundRoles, RoundSummary};
