//! # Cardpit
//!
//! Authoritative WebSocket server for a four-suit card trading game.
//!
//! Clients connect, log in under a username, and either join a room to
//! trade or subscribe as spectators. The server is assembled from five
//! layers:
//!
//! ```text
//! cardpit ─────────── accept loop, handler, event pump
//!   ├── cardpit-session    identity and outbound queues
//!   ├── cardpit-room       one actor task per table
//!   │     └── cardpit-game     deals, rounds, settlement
//!   │           └── cardpit-market   the order book
//!   └── cardpit-protocol   wire types and codecs
//! ```
//!
//! [`CardpitServer::builder`] is the way in; the `cardpitd` binary wraps
//! it for the command line.

mod error;
mod handler;
mod server;

pub use error::CardpitError;
pub use server::{CardpitServer, CardpitServerBuilder, DEFAULT_QUEUE_CAPACITY};
