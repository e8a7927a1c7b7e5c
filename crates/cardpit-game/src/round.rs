//! One round of play: the deal, holdings-checked trading, and the payout.
//!
//! A [`Round`] is created when every seat is ready, lives for the trading
//! window, and is consumed into a [`RoundSummary`] when the timer fires.
//! It knows nothing about time or phases; the room actor owns the clock
//! and only calls in while trading is open.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use cardpit_market::{
    Direction, Exec, Market, MarketSnapshot, Order, OrderId, Price, Size, Suit, Username,
};

use crate::config::GameConfig;
use crate::error::GameError;
use crate::hand::Hand;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The hidden per-round assignment: which suit is the goal, and how many
/// cards of each suit the deck actually contains. Revealed only by the
/// round summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRoles {
    pub goal: Suit,
    /// Deck count per suit, indexed by [`Suit::index`].
    pub counts: [Size; 4],
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// Live state of one round: the participants fixed at deal time, their
/// hands, and the four-suit market.
#[derive(Debug)]
pub struct Round {
    players: Vec<Username>,
    hands: HashMap<Username, Hand>,
    market: Market,
    roles: RoundRoles,
    /// Cards left over when the deck does not divide evenly; they belong
    /// to nobody but still count toward conservation.
    remainder: Hand,
}

impl Round {
    /// Deal a fresh round: assign the configured counts to suits at
    /// random (the suit given `counts[0]` is the long suit, the goal is
    /// its color partner), shuffle, and deal equal shares.
    pub fn deal(config: &GameConfig, players: &[Username], rng: &mut impl Rng) -> Round {
        assert!(!players.is_empty(), "cannot deal a round with no players");

        let mut suits = Suit::ALL;
        suits.shuffle(rng);
        let mut counts = [Size::ZERO; 4];
        for (&count, suit) in config.deck.counts.iter().zip(suits) {
            counts[suit.index()] = Size(count as u64);
        }
        let roles = RoundRoles { goal: suits[0].partner(), counts };

        let mut deck: Vec<Suit> = Vec::with_capacity(config.deck.total());
        for suit in Suit::ALL {
            for _ in 0..counts[suit.index()].0 {
                deck.push(suit);
            }
        }
        deck.shuffle(rng);

        let share = deck.len() / players.len();
        let mut dealt = vec![Hand::empty(); players.len()];
        let mut remainder = Hand::empty();
        for (i, suit) in deck.into_iter().enumerate() {
            if i < share * players.len() {
                dealt[i % players.len()].add(suit, Size(1));
            } else {
                remainder.add(suit, Size(1));
            }
        }

        tracing::debug!(
            goal = %roles.goal,
            players = players.len(),
            share,
            "dealt round"
        );

        Round {
            players: players.to_vec(),
            hands: players.iter().cloned().zip(dealt).collect(),
            market: Market::new(),
            roles,
            remainder,
        }
    }

    pub fn participants(&self) -> &[Username] {
        &self.players
    }

    pub fn is_participant(&self, username: &Username) -> bool {
        self.hands.contains_key(username)
    }

    pub fn hand(&self, username: &Username) -> Option<&Hand> {
        self.hands.get(username)
    }

    pub fn hands(&self) -> &HashMap<Username, Hand> {
        &self.hands
    }

    pub fn roles(&self) -> &RoundRoles {
        &self.roles
    }

    pub fn market_snapshot(&self) -> MarketSnapshot {
        self.market.snapshot()
    }

    /// Admit one order: check holdings, match, and apply the resulting
    /// fills to hands in one uninterrupted step, with no partial
    /// application.
    ///
    /// A sell is covered only if the hand holds its size on top of every
    /// sell already resting, so no sequence of accepted orders can ever
    /// drive a hand negative.
    pub fn submit(&mut self, order: Order) -> Result<Exec, GameError> {
        if !self.hands.contains_key(&order.owner) {
            return Err(GameError::NotParticipant { username: order.owner.clone() });
        }
        if order.dir == Direction::Sell {
            let held = self.hands[&order.owner].count(order.suit);
            let resting = self.market.resting_sell_size(&order.owner, order.suit);
            let sellable = held - resting;
            if order.size > sellable {
                return Err(GameError::InsufficientHoldings {
                    suit: order.suit,
                    size: order.size,
                    sellable,
                });
            }
        }

        let exec = self.market.submit(order);
        self.apply_fills(&exec);
        Ok(exec)
    }

    /// Remove the resting order `(owner, id)` and return it.
    pub fn cancel(&mut self, owner: &Username, id: OrderId) -> Result<Order, GameError> {
        Ok(self.market.cancel(owner, id)?)
    }

    fn apply_fills(&mut self, exec: &Exec) {
        let order = &exec.order;
        for fill in &exec.fills {
            let (buyer, seller) = match order.dir {
                Direction::Buy => (&order.owner, &fill.owner),
                Direction::Sell => (&fill.owner, &order.owner),
            };
            hand_mut(&mut self.hands, seller).subtract(order.suit, fill.size);
            hand_mut(&mut self.hands, buyer).add(order.suit, fill.size);
        }
    }

    /// Freeze the round and settle: a per-card bonus for every goal-suit
    /// card, and the pot floor-split among the majority holders. The
    /// integer remainder of an uneven split is not paid out.
    pub fn finish(self, config: &GameConfig) -> RoundSummary {
        let goal = self.roles.goal;
        let goal_counts: HashMap<Username, Size> = self
            .players
            .iter()
            .map(|p| (p.clone(), self.hands[p].count(goal)))
            .collect();
        let top = goal_counts.values().copied().max().unwrap_or(Size::ZERO);
        let winners = goal_counts.values().filter(|&&c| c == top).count() as u64;
        let share = Price(config.pot.0 / winners);

        let mut awards = HashMap::new();
        for player in &self.players {
            let held = goal_counts[player];
            let mut award = config.per_card_bonus * held;
            if held == top {
                award += share;
            }
            awards.insert(player.clone(), award);
        }

        tracing::info!(goal = %goal, winners, "round settled");

        RoundSummary { goal, goal_counts, awards, hands: self.hands }
    }

    #[cfg(test)]
    fn fixed(players: Vec<Username>, hands: Vec<Hand>, goal: Suit) -> Round {
        let mut counts = [Size::ZERO; 4];
        for hand in &hands {
            for suit in Suit::ALL {
                counts[suit.index()] += hand.count(suit);
            }
        }
        Round {
            players: players.clone(),
            hands: players.into_iter().zip(hands).collect(),
            market: Market::new(),
            roles: RoundRoles { goal, counts },
            remainder: Hand::empty(),
        }
    }
}

/// Fills only ever reference hands dealt into the round; a miss here is
/// an engine bug.
fn hand_mut<'a>(hands: &'a mut HashMap<Username, Hand>, who: &Username) -> &'a mut Hand {
    match hands.get_mut(who) {
        Some(hand) => hand,
        None => panic!("fill references {who}, who holds no hand this round"),
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// What a finished round publishes: the revealed goal suit, everyone's
/// goal-suit count, the chips awarded, and the final hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub goal: Suit,
    pub goal_counts: HashMap<Username, Size>,
    pub awards: HashMap<Username, Price>,
    pub hands: HashMap<Username, Hand>,
}
