//! Value types shared by the matching book and everything above it.
//!
//! All of these are plain data: cheap to copy or clone, serializable, and
//! free of side effects. Arithmetic that could go negative is either checked
//! (`Size::checked_sub`) or a stated caller contract (`Size: Sub` panics on
//! underflow; check availability first).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// A non-negative amount of money, in whole chips.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(pub u64);

impl Price {
    pub const ZERO: Price = Price(0);
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Price) {
        self.0 += rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Price {
        iter.fold(Price::ZERO, Add::add)
    }
}

/// Scalar multiplication: `price * size` is the notional of a fill.
impl Mul<Size> for Price {
    type Output = Price;

    fn mul(self, rhs: Size) -> Price {
        Price(self.0 * rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// A non-negative count of cards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Size(pub u64);

impl Size {
    pub const ZERO: Size = Size(0);

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction that reports underflow instead of panicking.
    pub fn checked_sub(self, rhs: Size) -> Option<Size> {
        self.0.checked_sub(rhs.0).map(Size)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Size {
    type Output = Size;

    fn add(self, rhs: Size) -> Size {
        Size(self.0 + rhs.0)
    }
}

impl AddAssign for Size {
    fn add_assign(&mut self, rhs: Size) {
        self.0 += rhs.0;
    }
}

/// Panics on underflow. Callers own the precondition: check availability
/// (`checked_sub`, holdings checks) before subtracting. An underflow that
/// reaches this operator is an engine bug, not a recoverable error.
impl Sub for Size {
    type Output = Size;

    fn sub(self, rhs: Size) -> Size {
        match self.0.checked_sub(rhs.0) {
            Some(n) => Size(n),
            None => panic!("size underflow: {} - {}", self.0, rhs.0),
        }
    }
}

impl Sum for Size {
    fn sum<I: Iterator<Item = Size>>(iter: I) -> Size {
        iter.fold(Size::ZERO, Add::add)
    }
}

// ---------------------------------------------------------------------------
// Suits and directions
// ---------------------------------------------------------------------------

/// Card color; two suits per color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Black,
    Red,
}

/// The four tradable symbols. Fixed for the lifetime of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
    pub const COUNT: usize = 4;

    /// Stable index into per-suit arrays.
    pub fn index(self) -> usize {
        match self {
            Suit::Clubs => 0,
            Suit::Diamonds => 1,
            Suit::Hearts => 2,
            Suit::Spades => 3,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Suit::Clubs | Suit::Spades => Color::Black,
            Suit::Diamonds | Suit::Hearts => Color::Red,
        }
    }

    /// The other suit of the same color. The goal suit each round is the
    /// partner of the long suit.
    pub fn partner(self) -> Suit {
        match self {
            Suit::Clubs => Suit::Spades,
            Suit::Spades => Suit::Clubs,
            Suit::Diamonds => Suit::Hearts,
            Suit::Hearts => Suit::Diamonds,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Suit::Clubs => "clubs",
            Suit::Diamonds => "diamonds",
            Suit::Hearts => "hearts",
            Suit::Spades => "spades",
        };
        write!(f, "{name}")
    }
}

/// Which side of the book an order joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The trading identity an order belongs to. One username may be connected
/// from several devices at once; they all act as the same owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    pub fn new(name: impl Into<String>) -> Username {
        Username(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-assigned order id, monotonically increasing per connection.
/// Uniqueness across one username's simultaneous devices is the client's
/// concern; the book addresses orders by `(owner, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Orders, fills, executions
// ---------------------------------------------------------------------------

/// A price/size order. Immutable once submitted; the copy resting in the
/// book shrinks its `size` in place as fills consume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub owner: Username,
    pub id: OrderId,
    pub suit: Suit,
    pub dir: Direction,
    pub price: Price,
    pub size: Size,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {} {} {}@{}",
            self.owner, self.id, self.dir, self.size, self.suit, self.price
        )
    }
}

/// One match against a single resting order: the resting order's owner and
/// id, its price (trades always print at the resting price), and the size
/// taken from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub owner: Username,
    pub id: OrderId,
    pub price: Price,
    pub size: Size,
}

/// The result of submitting one order: the order as submitted plus the
/// fills it produced, in match order. Empty `fills` means the order rested
/// without trading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exec {
    pub order: Order,
    pub fills: Vec<Fill>,
}

impl Exec {
    /// Total size traded. Never exceeds `order.size`.
    pub fn total_filled(&self) -> Size {
        self.fills.iter().map(|f| f.size).sum()
    }

    /// True if nothing was left to rest in the book.
    pub fn fully_filled(&self) -> bool {
        self.total_filled() == self.order.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_addition_and_scalar_multiplication() {
        assert_eq!(Price(3) + Price(4), Price(7));
        assert_eq!(Price(5) * Size(3), Price(15));
        assert_eq!(Price(0) * Size(10), Price::ZERO);
    }

    #[test]
    fn test_price_sum_over_iterator() {
        let total: Price = [Price(1), Price(2), Price(3)].into_iter().sum();
        assert_eq!(total, Price(6));
    }

    #[test]
    fn test_size_checked_sub_underflow_returns_none() {
        assert_eq!(Size(5).checked_sub(Size(3)), Some(Size(2)));
        assert_eq!(Size(3).checked_sub(Size(5)), None);
    }

    #[test]
    #[should_panic(expected = "size underflow")]
    fn test_size_sub_panics_on_underflow() {
        let _ = Size(1) - Size(2);
    }

    #[test]
    fn test_size_ordering_gives_min_max() {
        assert_eq!(Size(2).min(Size(7)), Size(2));
        assert_eq!(Size(2).max(Size(7)), Size(7));
    }

    #[test]
    fn test_suit_partner_is_same_color_involution() {
        for suit in Suit::ALL {
            let partner = suit.partner();
            assert_ne!(suit, partner);
            assert_eq!(suit.color(), partner.color());
            assert_eq!(partner.partner(), suit);
        }
    }

    #[test]
    fn test_suit_index_matches_all_order() {
        for (i, suit) in Suit::ALL.into_iter().enumerate() {
            assert_eq!(suit.index(), i);
        }
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Buy.opposite(), Direction::Sell);
        assert_eq!(Direction::Sell.opposite(), Direction::Buy);
    }

    // Wire shapes are part of the contract: ids and counts are bare numbers,
    // usernames bare strings.
    #[test]
    fn test_json_shapes_are_transparent() {
        let json = serde_json::to_string(&Order {
            owner: Username::new("alice"),
            id: OrderId(7),
            suit: Suit::Hearts,
            dir: Direction::Buy,
            price: Price(5),
            size: Size(2),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"owner":"alice","id":7,"suit":"Hearts","dir":"Buy","price":5,"size":2}"#
        );
    }

    #[test]
    fn test_exec_total_filled_sums_fills() {
        let order = Order {
            owner: Username::new("bob"),
            id: OrderId(1),
            suit: Suit::Spades,
            dir: Direction::Sell,
            price: Price(4),
            size: Size(5),
        };
        let exec = Exec {
            order,
            fills: vec![
                Fill { owner: Username::new("a"), id: OrderId(1), price: Price(5), size: Size(2) },
                Fill { owner: Username::new("b"), id: OrderId(2), price: Price(4), size: Size(1) },
            ],
        };
        assert_eq!(exec.total_filled(), Size(3));
        assert!(!exec.fully_filled());
    }
}
