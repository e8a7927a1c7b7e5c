//! Game configuration: deck composition and payout parameters.
//!
//! Nothing in here is derived state. The deal and the payout read these
//! numbers; they are injected through the server builder and never
//! hard-coded at the point of use.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use cardpit_market::Price;

/// Deck composition by role, not by suit. Each round the four counts are
/// assigned to suits at random; the suit given `counts[0]` is the long
/// suit, and the goal suit is its color partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckPlan {
    pub counts: [u8; 4],
}

impl DeckPlan {
    /// Cards in the whole deck.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }
}

impl Default for DeckPlan {
    fn default() -> Self {
        Self { counts: [12, 10, 10, 8] }
    }
}

/// Parameters of one table. `Default` is the standard game: a 40-card
/// deck, a 200-chip pot, 10 chips per goal-suit card, 4-minute rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub deck: DeckPlan,

    /// Paid to the majority holder(s) of the goal suit, split evenly.
    pub pot: Price,

    /// Paid per goal-suit card held at round end, to every holder.
    pub per_card_bonus: Price,

    /// Trading window length; the round timer is the only time-driven
    /// transition in the game.
    pub round_duration: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            deck: DeckPlan::default(),
            pot: Price(200),
            per_card_bonus: Price(10),
            round_duration: Duration::from_secs(240),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deck_is_forty_cards() {
        let plan = DeckPlan::default();
        assert_eq!(plan.total(), 40);
        assert_eq!(plan.counts[0], 12, "long count leads the plan");
    }

    #[test]
    fn test_default_config_values() {
        let config = GameConfig::default();
        assert_eq!(config.pot, Price(200));
        assert_eq!(config.per_card_bonus, Price(10));
        assert_eq!(config.round_duration, Duration::from_secs(240));
    }
}
