//! Per-connection handler: the reader loop, the writer task, and
//! request dispatch.
//!
//! Each accepted socket runs one handler task. Everything written back
//! to the client, replies included, funnels through the session's
//! update queue so the socket has exactly one writer. The reader half
//! decodes requests, applies them, and queues the reply; the writer
//! half drains the queue until the connection dies or the queue
//! overflows.

use std::net::SocketAddr;
use std::sync::Arc;

use cardpit_market::Username;
use cardpit_protocol::{
    ApiError, Codec, JsonCodec, LobbyUpdate, Reply, Request, RequestKind, RoomChoice,
    ServerMsg, valid_username,
};
use cardpit_room::RoomHandle;
use cardpit_session::{SessionId, UpdateFeed, UpdateSink};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::CardpitError;
use crate::server::ServerState;

/// One connection's view of the server: who it is and where it sits.
///
/// Both fields start out empty. `username` is set by a successful login
/// and never changes afterwards; `room` is set by a successful join.
struct Connection {
    session: SessionId,
    state: Arc<ServerState>,
    sink: UpdateSink,
    username: Option<Username>,
    room: Option<RoomHandle>,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), CardpitError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (ws_tx, mut ws_rx) = ws.split();

    let (sink, feed) = UpdateSink::channel(state.queue_capacity);
    let session = state.sessions.lock().await.register(sink.clone());
    tracing::debug!(%session, %addr, "connection open");

    let writer = tokio::spawn(write_updates(ws_tx, feed));

    let mut conn = Connection {
        session,
        state: Arc::clone(&state),
        sink,
        username: None,
        room: None,
    };

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Binary(data)) => conn.dispatch(&data).await,
            Ok(Message::Text(text)) => conn.dispatch(text.as_bytes()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session = %conn.session, error = %e, "socket error");
                break;
            }
        }
    }

    // The reader is the only exit path, so teardown runs exactly once.
    if let Some(room) = conn.room.take() {
        room.unsubscribe(conn.session).await;
    }
    state.sessions.lock().await.remove(conn.session);
    conn.sink.kill();
    let written = writer.await;

    tracing::debug!(session = %conn.session, "connection closed");
    // A panicked writer has nothing to report beyond the panic itself.
    written.unwrap_or(Ok(()))
}

/// Drains a session's update queue into the socket. Ends when the queue
/// is killed or the peer stops accepting writes; either way the socket
/// gets a close frame on the way out. An update that fails to encode
/// ends it too, and is the one exit that hands the handler an error,
/// as [`CardpitError::Protocol`].
async fn write_updates(
    mut ws: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut feed: UpdateFeed,
) -> Result<(), CardpitError> {
    let mut result = Ok(());
    while let Some(msg) = feed.next().await {
        let bytes = match JsonCodec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode update");
                result = Err(e.into());
                break;
            }
        };
        if ws.send(Message::Binary(bytes.into())).await.is_err() {
            break;
        }
    }
    let _ = ws.close().await;
    result
}

impl Connection {
    /// Decodes one frame and queues the reply. A frame that is not a
    /// `Request` still gets an answer, under sequence number zero, so
    /// the client can tell its call failed rather than vanished.
    async fn dispatch(&mut self, data: &[u8]) {
        let request: Request = match JsonCodec.decode(data) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(session = %self.session, error = %e, "undecodable frame");
                self.reply(0, Err(ApiError::Malformed));
                return;
            }
        };

        let seq = request.seq;
        let result = self.handle(request.kind).await;
        if let Err(e) = &result {
            tracing::debug!(session = %self.session, seq, error = %e, "request failed");
        }
        self.reply(seq, result);
    }

    fn reply(&self, seq: u64, result: Result<Reply, ApiError>) {
        self.sink.try_deliver(ServerMsg::Reply { seq, result });
    }

    async fn handle(&mut self, kind: RequestKind) -> Result<Reply, ApiError> {
        match kind {
            RequestKind::Login { username } => self.login(username).await,
            RequestKind::GetLobbyUpdates => self.watch_lobby().await,
            RequestKind::JoinRoom { choice } => self.join_room(choice).await,
            RequestKind::GetObserverUpdates => self.observe().await,
            RequestKind::StartPlaying { choice } => {
                let (room, username) = self.member()?;
                let seat = room.sit(username, choice).await?;
                Ok(Reply::Seated { seat })
            }
            RequestKind::IsReady { ready } => {
                let (room, username) = self.member()?;
                room.set_ready(username, ready).await?;
                Ok(Reply::Ok)
            }
            RequestKind::GetBook => {
                let room = self.room()?;
                let market = room.book().await?;
                Ok(Reply::Book { market })
            }
            RequestKind::GetHand => {
                let (room, username) = self.member()?;
                let hand = room.hand_of(username).await?;
                Ok(Reply::Hand { hand })
            }
            RequestKind::SubmitOrder { order } => {
                let (room, username) = self.member()?;
                let exec = room.submit(order.into_order(username)).await?;
                Ok(Reply::Executed { exec })
            }
            RequestKind::CancelOrder { id } => {
                let (room, username) = self.member()?;
                let order = room.cancel(username, id).await?;
                Ok(Reply::Cancelled { order })
            }
            RequestKind::Chat { message } => {
                let (room, username) = self.member()?;
                room.chat(username, message).await?;
                Ok(Reply::Ok)
            }
        }
    }

    async fn login(&mut self, username: Username) -> Result<Reply, ApiError> {
        if !valid_username(username.as_str()) {
            return Err(ApiError::InvalidUsername);
        }
        self.state
            .sessions
            .lock()
            .await
            .login(self.session, username.clone())?;
        self.username = Some(username);
        Ok(Reply::Ok)
    }

    /// Registration and the first snapshot happen under the session
    /// lock. The pump needs that lock to deliver, so no delta can reach
    /// this connection ahead of the snapshot.
    async fn watch_lobby(&mut self) -> Result<Reply, ApiError> {
        let mut sessions = self.state.sessions.lock().await;
        sessions.watch_lobby(self.session)?;
        let rooms = self.state.rooms.lock().await.lobby_snapshot().await;
        self.sink.try_deliver(ServerMsg::Lobby {
            update: LobbyUpdate::Snapshot { rooms },
        });
        Ok(Reply::Ok)
    }

    async fn join_room(&mut self, choice: RoomChoice) -> Result<Reply, ApiError> {
        let username = self.username.clone().ok_or(ApiError::NotLoggedIn)?;
        if self.room.is_some() {
            return Err(ApiError::AlreadyInRoom);
        }

        let handle = {
            let mut rooms = self.state.rooms.lock().await;
            rooms.resolve(&username, choice).await?
        };
        let snapshot = handle
            .subscribe(self.session, username, self.sink.clone())
            .await?;
        self.room = Some(handle);
        Ok(Reply::Joined { room: snapshot })
    }

    /// Spectator stream: every room's public feed, plus catch-up state
    /// for any round already in flight.
    async fn observe(&mut self) -> Result<Reply, ApiError> {
        self.state.sessions.lock().await.observe(self.session)?;

        let handles = self.state.rooms.lock().await.handles();
        for handle in handles {
            handle.resync(self.session).await;
        }
        Ok(Reply::Ok)
    }

    /// The room this connection joined and the identity it plays under.
    fn member(&self) -> Result<(RoomHandle, Username), ApiError> {
        let username = self.username.clone().ok_or(ApiError::NotLoggedIn)?;
        let room = self.room.clone().ok_or(ApiError::NotInRoom)?;
        Ok((room, username))
    }

    fn room(&self) -> Result<RoomHandle, ApiError> {
        self.room.clone().ok_or(ApiError::NotInRoom)
    }
}
