//! Error types for the matching book.

use crate::values::OrderId;

/// Errors a cancel request can produce. Submission itself cannot fail at
/// this layer; holdings and phase checks happen above the book.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// No resting order carries this id.
    #[error("no resting order {id}")]
    NoSuchOrder { id: OrderId },

    /// An order with this id is resting, but it belongs to someone else.
    #[error("order {id} is not owned by the requester")]
    NotOwner { id: OrderId },
}
