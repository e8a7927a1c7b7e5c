//! Per-player card counts.

use serde::{Deserialize, Serialize};

use cardpit_market::{Size, Suit};

/// How many cards of each suit a player holds. Mutated only by the deal
/// and by accepted fills.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    counts: [Size; 4],
}

impl Hand {
    pub fn empty() -> Hand {
        Hand::default()
    }

    pub fn from_counts(counts: [Size; 4]) -> Hand {
        Hand { counts }
    }

    pub fn count(&self, suit: Suit) -> Size {
        self.counts[suit.index()]
    }

    pub fn total(&self) -> Size {
        self.counts.iter().copied().sum()
    }

    pub fn add(&mut self, suit: Suit, size: Size) {
        self.counts[suit.index()] += size;
    }

    /// Panics on underflow. Admission checks holdings before any fill is
    /// applied, so a subtraction past zero is an engine bug.
    pub fn subtract(&mut self, suit: Suit, size: Size) {
        let have = self.counts[suit.index()];
        match have.checked_sub(size) {
            Some(left) => self.counts[suit.index()] = left,
            None => panic!("hand underflow: {size} {suit} from a hand of {have}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_count() {
        let mut hand = Hand::empty();
        hand.add(Suit::Hearts, Size(3));
        hand.add(Suit::Hearts, Size(2));
        assert_eq!(hand.count(Suit::Hearts), Size(5));
        assert_eq!(hand.count(Suit::Clubs), Size::ZERO);
        assert_eq!(hand.total(), Size(5));
    }

    #[test]
    fn test_subtract_within_holdings() {
        let mut hand = Hand::from_counts([Size(2), Size(0), Size(0), Size(4)]);
        hand.subtract(Suit::Spades, Size(4));
        assert_eq!(hand.count(Suit::Spades), Size::ZERO);
        assert_eq!(hand.count(Suit::Clubs), Size(2));
    }

    #[test]
    #[should_panic(expected = "hand underflow")]
    fn test_subtract_past_zero_panics() {
        let mut hand = Hand::empty();
        hand.subtract(Suit::Clubs, Size(1));
    }
}
