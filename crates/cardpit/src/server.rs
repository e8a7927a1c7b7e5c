//! `CardpitServer` builder and server loop.
//!
//! This is the entry point for running a Cardpit server. It ties the
//! layers together: sockets feed the per-connection handler, rooms and
//! the lobby feed the event pump, and everything outbound drains through
//! the session queues.

use std::net::SocketAddr;
use std::sync::Arc;

use cardpit_game::GameConfig;
use cardpit_protocol::ServerMsg;
use cardpit_room::{RoomManager, ServerEvent};
use cardpit_session::SessionRegistry;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};

use crate::CardpitError;
use crate::handler::handle_connection;

/// Default size of a connection's outbound queue. A client that lets
/// this many updates pile up unread is cut off rather than allowed to
/// slow the tables it watches.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Lock
/// order is sessions before rooms; nothing takes them the other way.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionRegistry>,
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) queue_capacity: usize,
}

/// Builder for configuring and starting a Cardpit server.
///
/// # Example
///
/// ```rust,no_run
/// use cardpit::CardpitServer;
///
/// # async fn run() -> Result<(), cardpit::CardpitError> {
/// let server = CardpitServer::builder().bind("0.0.0.0:8080").build().await?;
/// server.run().await
/// # }
/// ```
pub struct CardpitServerBuilder {
    bind_addr: String,
    config: GameConfig,
    queue_capacity: usize,
}

impl CardpitServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: GameConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the table parameters used by every room this server creates.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-connection outbound queue size.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Binds the listener and assembles the server state.
    pub async fn build(self) -> Result<CardpitServer, CardpitError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "listening");

        let (events, event_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionRegistry::new()),
            rooms: Mutex::new(RoomManager::new(self.config, events)),
            queue_capacity: self.queue_capacity,
        });

        Ok(CardpitServer { listener, event_rx, state })
    }
}

impl Default for CardpitServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Cardpit server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CardpitServer {
    listener: TcpListener,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState>,
}

impl CardpitServer {
    /// Creates a new builder.
    pub fn builder() -> CardpitServerBuilder {
        CardpitServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the event pump and the accept loop until the process is
    /// terminated.
    pub async fn run(self) -> Result<(), CardpitError> {
        let CardpitServer { listener, event_rx, state } = self;
        tracing::info!("cardpit server running");

        tokio::spawn(pump_events(event_rx, Arc::clone(&state)));

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, state).await {
                            tracing::debug!(%addr, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Forwards room and lobby events to the sessions they concern.
///
/// All fan-out beyond a room's own subscribers funnels through this one
/// task, so every watcher sees a given room's events in the order the
/// room emitted them.
async fn pump_events(
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState>,
) {
    while let Some(event) = events.recv().await {
        let sessions = state.sessions.lock().await;
        match event {
            ServerEvent::Lobby(update) => sessions.broadcast_lobby(update),
            ServerEvent::Observers { room, update } => {
                sessions.broadcast_observers(room, update);
            }
            ServerEvent::ObserverOne { session, room, update } => {
                sessions.send_to_session(session, ServerMsg::Room { room, update });
            }
        }
    }
}
