//! Room actor: an isolated Tokio task that owns one table.
//!
//! Each room runs in its own task and communicates with the outside
//! world through an mpsc channel, so every mutation of the table's
//! seats, round, and books is serialized by construction. Commands are
//! handled without awaiting; the only other wakeup is the round
//! deadline. Broadcasts to the room's subscribers happen inline, which
//! is what gives every subscriber the same update order the engine
//! actually applied.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use cardpit_game::{GameConfig, Hand, Round};
use cardpit_market::{Exec, MarketSnapshot, Order, OrderId, Username};
use cardpit_protocol::{
    ApiError, LobbyUpdate, RoomId, RoomSnapshot, RoomUpdate, Seat, SeatAssignment,
    SeatChoice, ServerMsg,
};
use cardpit_session::{SessionId, UpdateSink};

use crate::ServerEvent;

/// Command channel depth per room.
const ROOM_QUEUE: usize = 64;

/// Commands sent to a room actor through its channel.
///
/// Variants with a `reply` sender are request/response; the rest are
/// fire-and-forget.
pub(crate) enum RoomCommand {
    /// Attach a session's outbound queue to the room's broadcasts.
    Subscribe {
        session: SessionId,
        username: Username,
        sink: UpdateSink,
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Unsubscribe {
        session: SessionId,
    },
    Sit {
        username: Username,
        choice: SeatChoice,
        reply: oneshot::Sender<Result<Seat, ApiError>>,
    },
    SetReady {
        username: Username,
        ready: bool,
        reply: oneshot::Sender<()>,
    },
    Book {
        reply: oneshot::Sender<Result<MarketSnapshot, ApiError>>,
    },
    HandOf {
        username: Username,
        reply: oneshot::Sender<Result<Hand, ApiError>>,
    },
    Submit {
        order: Order,
        reply: oneshot::Sender<Result<Exec, ApiError>>,
    },
    Cancel {
        owner: Username,
        id: OrderId,
        reply: oneshot::Sender<Result<Order, ApiError>>,
    },
    Chat {
        username: Username,
        message: String,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    /// Queue observer catch-up events for one session.
    Resync {
        session: SessionId,
    },
}

/// Handle to a running room actor. Cheap to clone; the manager holds
/// one per room and connection handlers clone it on join.
///
/// Every method maps a closed command channel to
/// [`ApiError::RoomUnavailable`]: a room whose actor has died (a fatal
/// engine bug aborts it loudly) is gone for clients, not wedged.
#[derive(Clone)]
pub struct RoomHandle {
    id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn id(&self) -> RoomId {
        self.id
    }

    pub async fn subscribe(
        &self,
        session: SessionId,
        username: Username,
        sink: UpdateSink,
    ) -> Result<RoomSnapshot, ApiError> {
        self.request(|reply| RoomCommand::Subscribe { session, username, sink, reply })
            .await
    }

    /// Detach a session. Fire-and-forget; a dead room needs no goodbye.
    pub async fn unsubscribe(&self, session: SessionId) {
        let _ = self.tx.send(RoomCommand::Unsubscribe { session }).await;
    }

    pub async fn sit(
        &self,
        username: Username,
        choice: SeatChoice,
    ) -> Result<Seat, ApiError> {
        self.request(|reply| RoomCommand::Sit { username, choice, reply })
            .await?
    }

    pub async fn set_ready(
        &self,
        username: Username,
        ready: bool,
    ) -> Result<(), ApiError> {
        self.request(|reply| RoomCommand::SetReady { username, ready, reply })
            .await
    }

    pub async fn book(&self) -> Result<MarketSnapshot, ApiError> {
        self.request(|reply| RoomCommand::Book { reply }).await?
    }

    pub async fn hand_of(&self, username: Username) -> Result<Hand, ApiError> {
        self.request(|reply| RoomCommand::HandOf { username, reply })
            .await?
    }

    pub async fn submit(&self, order: Order) -> Result<Exec, ApiError> {
        self.request(|reply| RoomCommand::Submit { order, reply })
            .await?
    }

    pub async fn cancel(
        &self,
        owner: Username,
        id: OrderId,
    ) -> Result<Order, ApiError> {
        self.request(|reply| RoomCommand::Cancel { owner, id, reply })
            .await?
    }

    pub async fn chat(
        &self,
        username: Username,
        message: String,
    ) -> Result<(), ApiError> {
        self.request(|reply| RoomCommand::Chat { username, message, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, ApiError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Ask the room to queue observer catch-up events for `session`.
    pub async fn resync(&self, session: SessionId) {
        let _ = self.tx.send(RoomCommand::Resync { session }).await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| ApiError::RoomUnavailable)?;
        rx.await.map_err(|_| ApiError::RoomUnavailable)
    }
}

/// One attached session: its outbound queue and the username it trades
/// under. Joining requires a login, so every subscriber has a name.
struct Subscriber {
    username: Username,
    sink: UpdateSink,
}

/// The table's clock-facing state.
enum Phase {
    /// Between rounds, collecting ready signals.
    Waiting,
    /// Trading until `deadline`.
    Playing { round: Round, deadline: Instant },
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    id: RoomId,
    config: GameConfig,
    /// Seat assignments, indexed by [`Seat::index`]. A seat, once
    /// taken, survives its holder's disconnects.
    seats: [Option<Username>; 4],
    /// Usernames that asked for the next deal. Spent when a round
    /// starts; signals sent mid-round accumulate for the round after.
    ready: HashSet<Username>,
    phase: Phase,
    subscribers: HashMap<SessionId, Subscriber>,
    events: mpsc::UnboundedSender<ServerEvent>,
    rx: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until every handle is dropped.
    async fn run(mut self) {
        tracing::info!(room = %self.id, "room actor started");

        loop {
            let deadline = self.deadline();
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = maybe_deadline(deadline) => self.end_round(),
            }
        }

        tracing::info!(room = %self.id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        // A command racing the timer must see the round already over;
        // nothing is applied to a book past its deadline.
        self.expire_if_due();

        match cmd {
            RoomCommand::Subscribe { session, username, sink, reply } => {
                let snapshot = self.handle_subscribe(session, username, sink);
                let _ = reply.send(snapshot);
            }
            RoomCommand::Unsubscribe { session } => self.handle_unsubscribe(session),
            RoomCommand::Sit { username, choice, reply } => {
                let _ = reply.send(self.handle_sit(username, choice));
            }
            RoomCommand::SetReady { username, ready, reply } => {
                self.handle_ready(username, ready);
                let _ = reply.send(());
            }
            RoomCommand::Book { reply } => {
                let _ = reply.send(self.handle_book());
            }
            RoomCommand::HandOf { username, reply } => {
                let _ = reply.send(self.handle_hand(&username));
            }
            RoomCommand::Submit { order, reply } => {
                let _ = reply.send(self.handle_submit(order));
            }
            RoomCommand::Cancel { owner, id, reply } => {
                let _ = reply.send(self.handle_cancel(owner, id));
            }
            RoomCommand::Chat { username, message, reply } => {
                self.handle_chat(username, message);
                let _ = reply.send(());
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::Resync { session } => self.handle_resync(session),
        }
    }

    // -- Membership -------------------------------------------------------

    fn handle_subscribe(
        &mut self,
        session: SessionId,
        username: Username,
        sink: UpdateSink,
    ) -> RoomSnapshot {
        let first_of_name = !self.has_subscriber_named(&username);

        // A participant's fresh connection missed the deal; hand it the
        // round in flight before it sees any deltas.
        if let Phase::Playing { round, .. } = &self.phase {
            if let Some(hand) = round.hand(&username) {
                sink.try_deliver(ServerMsg::Room {
                    room: self.id,
                    update: RoomUpdate::Dealt { hand: hand.clone() },
                });
                sink.try_deliver(ServerMsg::Room {
                    room: self.id,
                    update: RoomUpdate::Market { market: round.market_snapshot() },
                });
            }
        }

        self.subscribers
            .insert(session, Subscriber { username: username.clone(), sink });
        tracing::debug!(room = %self.id, session = %session, "subscribed");

        if first_of_name {
            self.broadcast(RoomUpdate::PlayerJoined { username });
        }
        self.snapshot()
    }

    fn handle_unsubscribe(&mut self, session: SessionId) {
        if self.subscribers.remove(&session).is_some() {
            tracing::debug!(room = %self.id, session = %session, "unsubscribed");
        }
    }

    fn handle_sit(
        &mut self,
        username: Username,
        choice: SeatChoice,
    ) -> Result<Seat, ApiError> {
        if matches!(self.phase, Phase::Playing { .. }) {
            return Err(ApiError::GameAlreadyStarted);
        }
        if self.seat_of(&username).is_some() {
            return Err(ApiError::AlreadyPlaying);
        }
        let seat = match choice {
            SeatChoice::Seat { seat } => {
                if self.seats[seat.index()].is_some() {
                    return Err(ApiError::SeatOccupied);
                }
                seat
            }
            SeatChoice::Any => *Seat::ALL
                .iter()
                .find(|s| self.seats[s.index()].is_none())
                .ok_or(ApiError::SeatOccupied)?,
        };
        self.seats[seat.index()] = Some(username.clone());
        tracing::info!(room = %self.id, %username, %seat, "seat taken");

        self.broadcast(RoomUpdate::WaitingFor { count: self.missing_ready() });
        self.publish_lobby();
        // A ready signal banked before the seat was taken counts now.
        self.try_start();
        Ok(seat)
    }

    fn handle_ready(&mut self, username: Username, ready: bool) {
        if ready {
            self.ready.insert(username);
        } else {
            self.ready.remove(&username);
        }
        // Mid-round signals stick and settle at the next round boundary.
        if matches!(self.phase, Phase::Waiting) {
            self.broadcast(RoomUpdate::WaitingFor { count: self.missing_ready() });
            self.try_start();
        }
    }

    // -- Trading ----------------------------------------------------------

    fn handle_book(&self) -> Result<MarketSnapshot, ApiError> {
        match &self.phase {
            Phase::Playing { round, .. } => Ok(round.market_snapshot()),
            Phase::Waiting => Err(ApiError::GameNotInProgress),
        }
    }

    fn handle_hand(&self, username: &Username) -> Result<Hand, ApiError> {
        match &self.phase {
            Phase::Playing { round, .. } => {
                round.hand(username).cloned().ok_or(ApiError::NotSeated)
            }
            Phase::Waiting => Err(ApiError::GameNotInProgress),
        }
    }

    fn handle_submit(&mut self, order: Order) -> Result<Exec, ApiError> {
        let Phase::Playing { round, .. } = &mut self.phase else {
            return Err(ApiError::GameNotInProgress);
        };
        let exec = round.submit(order).map_err(ApiError::from)?;
        let market = round.market_snapshot();
        let traded = !exec.total_filled().is_zero();

        self.broadcast(RoomUpdate::Exec { exec: exec.clone() });
        self.emit_observers(RoomUpdate::Exec { exec: exec.clone() });
        if traded {
            self.emit_hands();
        }
        self.broadcast(RoomUpdate::Market { market: market.clone() });
        self.emit_observers(RoomUpdate::Market { market });
        Ok(exec)
    }

    fn handle_cancel(&mut self, owner: Username, id: OrderId) -> Result<Order, ApiError> {
        let Phase::Playing { round, .. } = &mut self.phase else {
            return Err(ApiError::GameNotInProgress);
        };
        let order = round.cancel(&owner, id).map_err(ApiError::from)?;
        let market = round.market_snapshot();

        self.broadcast(RoomUpdate::Out { order: order.clone() });
        self.broadcast(RoomUpdate::Market { market: market.clone() });
        self.emit_observers(RoomUpdate::Market { market });
        Ok(order)
    }

    fn handle_chat(&self, username: Username, message: String) {
        self.broadcast(RoomUpdate::Chat {
            username: username.clone(),
            message: message.clone(),
        });
        self.emit_observers(RoomUpdate::Chat { username, message });
    }

    fn handle_resync(&self, session: SessionId) {
        if let Phase::Playing { round, .. } = &self.phase {
            let _ = self.events.send(ServerEvent::ObserverOne {
                session,
                room: self.id,
                update: RoomUpdate::Hands { hands: round.hands().clone() },
            });
            let _ = self.events.send(ServerEvent::ObserverOne {
                session,
                room: self.id,
                update: RoomUpdate::Market { market: round.market_snapshot() },
            });
        }
    }

    // -- Round lifecycle --------------------------------------------------

    /// Deals if the table is full and everyone seated has readied up.
    fn try_start(&mut self) {
        if !matches!(self.phase, Phase::Waiting) || self.missing_ready() > 0 {
            return;
        }
        let players: Vec<Username> = self.seats.iter().flatten().cloned().collect();
        let mut rng = rand::rng();
        let round = Round::deal(&self.config, &players, &mut rng);
        let deadline = Instant::now() + self.config.round_duration;
        self.ready.clear();

        for sub in self.subscribers.values() {
            if let Some(hand) = round.hand(&sub.username) {
                sub.sink.try_deliver(ServerMsg::Room {
                    room: self.id,
                    update: RoomUpdate::Dealt { hand: hand.clone() },
                });
            }
        }

        let market = round.market_snapshot();
        self.phase = Phase::Playing { round, deadline };
        self.broadcast(RoomUpdate::Market { market: market.clone() });
        self.emit_hands();
        self.emit_observers(RoomUpdate::Market { market });
        self.publish_lobby();

        tracing::info!(
            room = %self.id,
            players = players.len(),
            secs = self.config.round_duration.as_secs(),
            "round started"
        );
    }

    /// Settles the round and returns the table to the waiting phase.
    /// No-op outside `Playing`, so the timer and an expired-deadline
    /// command can both land here safely.
    fn end_round(&mut self) {
        let round = match std::mem::replace(&mut self.phase, Phase::Waiting) {
            Phase::Playing { round, .. } => round,
            Phase::Waiting => return,
        };
        let summary = round.finish(&self.config);

        self.broadcast(RoomUpdate::RoundOver { summary: summary.clone() });
        self.emit_observers(RoomUpdate::RoundOver { summary });
        self.broadcast(RoomUpdate::WaitingFor { count: self.missing_ready() });
        self.publish_lobby();

        // Ready signals sent mid-round take effect now.
        self.try_start();
    }

    fn expire_if_due(&mut self) {
        if let Phase::Playing { deadline, .. } = &self.phase {
            if Instant::now() >= *deadline {
                self.end_round();
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Playing { deadline, .. } => Some(*deadline),
            Phase::Waiting => None,
        }
    }

    // -- Bookkeeping ------------------------------------------------------

    fn seat_of(&self, username: &Username) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|seat| self.seats[seat.index()].as_ref() == Some(username))
    }

    /// Ready signals still missing before the next deal: empty seats
    /// count as missing, so the number only reaches zero with a full,
    /// fully-ready table.
    fn missing_ready(&self) -> usize {
        let ready_seated = self
            .seats
            .iter()
            .flatten()
            .filter(|name| self.ready.contains(*name))
            .count();
        Seat::ALL.len() - ready_seated
    }

    fn has_subscriber_named(&self, name: &Username) -> bool {
        self.subscribers.values().any(|sub| &sub.username == name)
    }

    fn snapshot(&self) -> RoomSnapshot {
        let seats = Seat::ALL
            .iter()
            .map(|&seat| SeatAssignment {
                seat,
                username: self.seats[seat.index()].clone(),
            })
            .collect();
        let mut ready: Vec<Username> = self.ready.iter().cloned().collect();
        ready.sort();
        RoomSnapshot {
            id: self.id,
            seats,
            playing: matches!(self.phase, Phase::Playing { .. }),
            ready,
        }
    }

    // -- Delivery ---------------------------------------------------------

    /// Queues an update for every subscribed session, in call order.
    /// Delivery failures are the sink's problem; a stalled session gets
    /// cut, not waited for.
    fn broadcast(&self, update: RoomUpdate) {
        let msg = ServerMsg::Room { room: self.id, update };
        for sub in self.subscribers.values() {
            sub.sink.try_deliver(msg.clone());
        }
    }

    /// Current hands to every observer.
    fn emit_hands(&self) {
        if let Phase::Playing { round, .. } = &self.phase {
            self.emit_observers(RoomUpdate::Hands { hands: round.hands().clone() });
        }
    }

    fn emit_observers(&self, update: RoomUpdate) {
        let _ = self
            .events
            .send(ServerEvent::Observers { room: self.id, update });
    }

    fn publish_lobby(&self) {
        let _ = self.events.send(ServerEvent::Lobby(LobbyUpdate::RoomUpdated {
            room: self.snapshot(),
        }));
    }
}

/// Sleeps until the round deadline, or forever when no round is live.
async fn maybe_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Spawns a room actor task and returns the handle to command it.
pub(crate) fn spawn_room(
    id: RoomId,
    config: GameConfig,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(ROOM_QUEUE);

    let actor = RoomActor {
        id,
        config,
        seats: [None, None, None, None],
        ready: HashSet::new(),
        phase: Phase::Waiting,
        subscribers: HashMap::new(),
        events,
        rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { id, tx }
}
