//! The matching book: one [`Book`] per suit, price-time priority, and the
//! four-suit [`Market`] wrapper the round trades through.
//!
//! Matching walks the opposite side from the best price outward. A trade
//! always prints at the resting order's price. Fully consumed resting
//! orders are removed; partially consumed ones shrink in place; whatever
//! remains of the incoming order rests at its own price behind earlier
//! arrivals. There is no self-trade prevention: an order may fill against
//! its owner's own resting orders.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::values::{Direction, Exec, Fill, Order, OrderId, Price, Size, Suit, Username};

/// One side of a book: price level to FIFO queue of resting orders.
/// The queue front is the oldest order at that price.
type Levels = BTreeMap<Price, VecDeque<Order>>;

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Resting orders of one suit, best price first, FIFO within a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub suit: Suit,
    pub buys: Vec<Order>,
    pub sells: Vec<Order>,
}

/// All four books, in [`Suit::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub books: Vec<BookSnapshot>,
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

/// Price-time priority book for a single suit.
#[derive(Debug)]
pub struct Book {
    suit: Suit,
    buys: Levels,
    sells: Levels,
}

impl Book {
    pub fn new(suit: Suit) -> Book {
        Book { suit, buys: Levels::new(), sells: Levels::new() }
    }

    /// Submit one order: match what crosses, rest the remainder.
    pub fn submit(&mut self, order: Order) -> Exec {
        debug_assert_eq!(order.suit, self.suit, "order routed to wrong book");

        let submitted = order.clone();
        let mut working = order;
        let mut fills = Vec::new();

        while !working.size.is_zero() {
            let opposite = match working.dir {
                Direction::Buy => &mut self.sells,
                Direction::Sell => &mut self.buys,
            };
            // Best opposing level: lowest sell for a buy, highest buy for a sell.
            let entry = match working.dir {
                Direction::Buy => opposite.first_entry(),
                Direction::Sell => opposite.last_entry(),
            };
            let Some(mut entry) = entry else { break };
            let price = *entry.key();
            let crosses = match working.dir {
                Direction::Buy => price <= working.price,
                Direction::Sell => price >= working.price,
            };
            if !crosses {
                break;
            }

            let level = entry.get_mut();
            let Some(resting) = level.front_mut() else {
                entry.remove();
                continue;
            };
            let traded = working.size.min(resting.size);
            fills.push(Fill {
                owner: resting.owner.clone(),
                id: resting.id,
                price,
                size: traded,
            });
            working.size = working.size - traded;
            resting.size = resting.size - traded;
            let consumed = resting.size.is_zero();
            if consumed {
                level.pop_front();
            }
            if level.is_empty() {
                entry.remove();
            }
        }

        if !working.size.is_zero() {
            let side = match working.dir {
                Direction::Buy => &mut self.buys,
                Direction::Sell => &mut self.sells,
            };
            side.entry(working.price).or_default().push_back(working);
        }

        Exec { order: submitted, fills }
    }

    /// Remove and return the resting order `(owner, id)`.
    ///
    /// A miss distinguishes "that id is resting here under someone else"
    /// (`NotOwner`) from "no such order at all" (`NoSuchOrder`).
    pub fn cancel(&mut self, owner: &Username, id: OrderId) -> Result<Order, MarketError> {
        let mut id_seen = false;
        for dir in [Direction::Buy, Direction::Sell] {
            let side = match dir {
                Direction::Buy => &mut self.buys,
                Direction::Sell => &mut self.sells,
            };
            if let Some(order) = take_resting(side, owner, id) {
                return Ok(order);
            }
            id_seen |= side.values().flatten().any(|o| o.id == id);
        }
        if id_seen {
            Err(MarketError::NotOwner { id })
        } else {
            Err(MarketError::NoSuchOrder { id })
        }
    }

    /// Total resting Sell exposure for one owner. Feeds the holdings check:
    /// a new sell is admitted only if hand covers it plus this.
    pub fn resting_sell_size(&self, owner: &Username) -> Size {
        self.sells
            .values()
            .flatten()
            .filter(|o| &o.owner == owner)
            .map(|o| o.size)
            .sum()
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            suit: self.suit,
            buys: self.buys.values().rev().flatten().cloned().collect(),
            sells: self.sells.values().flatten().cloned().collect(),
        }
    }
}

/// Find, remove, and return `(owner, id)` from one side, dropping the price
/// level if it empties.
fn take_resting(side: &mut Levels, owner: &Username, id: OrderId) -> Option<Order> {
    let price = side.iter().find_map(|(price, level)| {
        level
            .iter()
            .any(|o| o.id == id && &o.owner == owner)
            .then_some(*price)
    })?;
    let level = side.get_mut(&price)?;
    let pos = level.iter().position(|o| o.id == id && &o.owner == owner)?;
    let order = level.remove(pos)?;
    if level.is_empty() {
        side.remove(&price);
    }
    Some(order)
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// The four per-suit books of one round.
#[derive(Debug)]
pub struct Market {
    books: [Book; 4],
}

impl Market {
    pub fn new() -> Market {
        Market {
            books: Suit::ALL.map(Book::new),
        }
    }

    pub fn book(&self, suit: Suit) -> &Book {
        &self.books[suit.index()]
    }

    fn book_mut(&mut self, suit: Suit) -> &mut Book {
        &mut self.books[suit.index()]
    }

    /// Route the order to its suit's book and match it.
    pub fn submit(&mut self, order: Order) -> Exec {
        self.book_mut(order.suit).submit(order)
    }

    /// Cancel `(owner, id)` wherever it rests. `NotOwner` wins over
    /// `NoSuchOrder` if the id exists under a different owner in any book.
    pub fn cancel(&mut self, owner: &Username, id: OrderId) -> Result<Order, MarketError> {
        let mut not_owner = false;
        for suit in Suit::ALL {
            match self.book_mut(suit).cancel(owner, id) {
                Ok(order) => return Ok(order),
                Err(MarketError::NotOwner { .. }) => not_owner = true,
                Err(MarketError::NoSuchOrder { .. }) => {}
            }
        }
        if not_owner {
            Err(MarketError::NotOwner { id })
        } else {
            Err(MarketError::NoSuchOrder { id })
        }
    }

    pub fn resting_sell_size(&self, owner: &Username, suit: Suit) -> Size {
        self.book(suit).resting_sell_size(owner)
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            books: self.books.iter().map(Book::snapshot).collect(),
        }
    }
}

impl Default for Market {
    fn default() -> Market {
        Market::new()
    }
}
