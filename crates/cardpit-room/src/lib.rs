//! Room actors for Cardpit.
//!
//! A room is one table: four seats, a ready set, and at most one live
//! round. Each room runs as its own Tokio task ([`RoomHandle`] is the
//! way in), which serializes all trading and phase changes per room
//! while leaving rooms fully independent of each other. The
//! [`RoomManager`] creates rooms on demand and routes join requests;
//! updates addressed beyond a room's own subscribers leave through
//! [`ServerEvent`]s.

mod event;
mod manager;
mod room;

pub use event::ServerEvent;
pub use manager::RoomManager;
pub use room::RoomHandle;
