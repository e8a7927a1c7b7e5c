//! Market value types and the per-suit matching book for Cardpit.
//!
//! This crate is pure data and pure logic: no tasks, no channels, no IO.
//! The layer above it (the room actor) provides mutual exclusion and
//! decides when trading is open at all.
//!
//! # Key types
//!
//! - [`Price`], [`Size`], [`Suit`], [`Direction`]: value primitives
//! - [`Order`], [`Fill`], [`Exec`]: what flows through the book
//! - [`Book`]: one suit's price-time priority queues
//! - [`Market`]: the four books of a round, plus snapshots

mod book;
mod error;
mod values;

pub use book::{Book, BookSnapshot, Market, MarketSnapshot};
pub use error::MarketError;
pub use values::{Color, Direction, Exec, Fill, Order, OrderId, Price, Size, Suit, Username};
