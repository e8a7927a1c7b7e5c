//! Connection sessions for Cardpit.
//!
//! A session is one live connection: an id, an identity (anonymous,
//! player, or observer), and a bounded outbound queue. This crate owns:
//!
//! - **Identity** ([`Session`], [`SessionState`], [`SessionId`]): who
//!   a connection is, decided once by `Login` or `GetObserverUpdates`.
//! - **Queues** ([`UpdateSink`], [`UpdateFeed`]): non-blocking
//!   delivery to a per-connection writer task, with slow consumers cut
//!   loose instead of stalling broadcasts.
//! - **The registry** ([`SessionRegistry`]): the server-wide map of
//!   live sessions plus lobby and observer fan-out.
//!
//! It knows nothing about rooms or game state; room membership lives in
//! the room actors, which hold [`UpdateSink`] clones for their
//! subscribers.

mod error;
mod registry;
mod session;
mod sink;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Session, SessionId, SessionState};
pub use sink::{UpdateFeed, UpdateSink};
