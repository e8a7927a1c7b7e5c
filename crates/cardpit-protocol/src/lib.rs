//! Wire protocol for Cardpit.
//!
//! Everything a client and the server exchange is declared here:
//! sequenced [`Request`]s, the [`ServerMsg`] stream that answers them
//! (correlated replies plus [`RoomUpdate`] and [`LobbyUpdate`]
//! broadcasts), the wire-facing [`ApiError`] for refused requests, and
//! the [`Codec`] trait with its default [`JsonCodec`].
//!
//! The crate has no notion of connections, sessions, or rooms. It sits
//! between the byte transport below and the session layer above, and
//! only knows message shapes.

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{ApiError, ProtocolError};
pub use message::{
    LobbyUpdate, OrderSpec, Reply, Request, RequestKind, RoomUpdate, ServerMsg,
};
pub use types::{
    valid_username, RoomChoice, RoomId, RoomSnapshot, Seat, SeatAssignment, SeatChoice,
};
