//! Integration tests for the room system: seats, readiness, trading,
//! the round timer, and broadcast ordering.
//!
//! Time-dependent behavior is tested with two configurations instead of
//! sleeps: a round that runs for an hour (never expires mid-test) and a
//! round of zero duration (expired by the time the next command lands).

use std::time::Duration;

use tokio::sync::mpsc;

use cardpit_game::GameConfig;
use cardpit_market::{Direction, Order, OrderId, Price, Size, Suit, Username};
use cardpit_protocol::{
    ApiError, RoomChoice, RoomId, RoomUpdate, Seat, SeatChoice, ServerMsg,
};
use cardpit_room::{RoomHandle, RoomManager, ServerEvent};
use cardpit_session::{SessionId, UpdateFeed, UpdateSink};

// =========================================================================
// Helpers
// =========================================================================

const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

fn long_config() -> GameConfig {
    GameConfig {
        round_duration: Duration::from_secs(3600),
        ..GameConfig::default()
    }
}

fn instant_config() -> GameConfig {
    GameConfig {
        round_duration: Duration::ZERO,
        ..GameConfig::default()
    }
}

fn manager(config: GameConfig) -> (RoomManager, mpsc::UnboundedReceiver<ServerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RoomManager::new(config, tx), rx)
}

fn user(name: &str) -> Username {
    Username::new(name)
}

/// Subscribes a session to the room and returns the feed its writer
/// task would drain.
async fn join(room: &RoomHandle, session: u64, name: &str) -> UpdateFeed {
    let (sink, feed) = UpdateSink::channel(64);
    room.subscribe(SessionId(session), user(name), sink)
        .await
        .expect("subscribe");
    feed
}

/// Seats the four standard players as sessions 1 through 4.
async fn seat_four(room: &RoomHandle) -> Vec<UpdateFeed> {
    let mut feeds = Vec::new();
    for (i, name) in NAMES.iter().enumerate() {
        let feed = join(room, i as u64 + 1, name).await;
        room.sit(user(name), SeatChoice::Any).await.expect("sit");
        feeds.push(feed);
    }
    feeds
}

async fn ready_four(room: &RoomHandle) {
    for name in NAMES {
        room.set_ready(user(name), true).await.expect("ready");
    }
}

/// Everything currently queued for this feed, stripped to the updates.
/// Deterministic without waiting: the actor queues its broadcasts
/// before replying to the command that caused them.
fn drain(feed: &mut UpdateFeed) -> Vec<RoomUpdate> {
    let mut updates = Vec::new();
    while let Some(msg) = feed.try_next() {
        if let ServerMsg::Room { update, .. } = msg {
            updates.push(update);
        }
    }
    updates
}

fn drain_events(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

/// A suit the player holds at least one card of.
async fn held_suit(room: &RoomHandle, name: &str) -> Suit {
    let hand = room.hand_of(user(name)).await.expect("hand");
    Suit::ALL
        .into_iter()
        .max_by_key(|s| hand.count(*s).0)
        .expect("four suits")
}

fn sell(name: &str, id: u64, suit: Suit, price: u64, size: u64) -> Order {
    Order {
        owner: user(name),
        id: OrderId(id),
        suit,
        dir: Direction::Sell,
        price: Price(price),
        size: Size(size),
    }
}

fn buy(name: &str, id: u64, suit: Suit, price: u64, size: u64) -> Order {
    Order {
        owner: user(name),
        id: OrderId(id),
        suit,
        dir: Direction::Buy,
        price: Price(price),
        size: Size(size),
    }
}

// =========================================================================
// Routing
// =========================================================================

#[tokio::test]
async fn test_join_any_creates_a_room_when_none_admits() {
    let (mut mgr, _events) = manager(long_config());
    assert_eq!(mgr.room_count(), 0);

    let r1 = mgr.resolve(&user("alice"), RoomChoice::Any).await.unwrap();
    assert_eq!(mgr.room_count(), 1);

    // A second player lands in the same room while seats remain.
    let r2 = mgr.resolve(&user("bob"), RoomChoice::Any).await.unwrap();
    assert_eq!(r1.id(), r2.id());
    assert_eq!(mgr.room_count(), 1);
}

#[tokio::test]
async fn test_join_by_id_requires_the_room_to_exist() {
    let (mut mgr, _events) = manager(long_config());
    let result = mgr.resolve(&user("alice"), RoomChoice::Room { id: RoomId(99) }).await;
    assert_eq!(result.err(), Some(ApiError::NoSuchRoom));
}

#[tokio::test]
async fn test_join_any_skips_full_tables_but_readmits_seated_players() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;

    // A fifth player gets a new room.
    let other = mgr.resolve(&user("eve"), RoomChoice::Any).await.unwrap();
    assert_ne!(other.id(), room.id());
    assert_eq!(mgr.room_count(), 2);

    // A seated player routes back to their own full table.
    let back = mgr.resolve(&user("alice"), RoomChoice::Any).await.unwrap();
    assert_eq!(back.id(), room.id());
}

#[tokio::test]
async fn test_lobby_snapshot_lists_rooms_in_id_order() {
    let (mut mgr, _events) = manager(long_config());
    let r1 = mgr.create_room();
    let r2 = mgr.create_room();
    let _feed = join(&r2, 1, "alice").await;
    r2.sit(user("alice"), SeatChoice::Seat { seat: Seat::West })
        .await
        .unwrap();

    let rooms = mgr.lobby_snapshot().await;

    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].id, r1.id());
    assert_eq!(rooms[1].id, r2.id());
    assert_eq!(rooms[0].free_seats(), 4);
    assert_eq!(rooms[1].free_seats(), 3);
    assert!(rooms[1].is_seated(&user("alice")));
}

// =========================================================================
// Seats
// =========================================================================

#[tokio::test]
async fn test_sit_explicit_seat_and_conflicts() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let _a = join(&room, 1, "alice").await;
    let _b = join(&room, 2, "bob").await;

    let seat = room
        .sit(user("alice"), SeatChoice::Seat { seat: Seat::North })
        .await
        .unwrap();
    assert_eq!(seat, Seat::North);

    let result = room.sit(user("bob"), SeatChoice::Seat { seat: Seat::North }).await;
    assert_eq!(result.err(), Some(ApiError::SeatOccupied));

    // One seat per username, even on a different chair.
    let result = room.sit(user("alice"), SeatChoice::Seat { seat: Seat::East }).await;
    assert_eq!(result.err(), Some(ApiError::AlreadyPlaying));
}

#[tokio::test]
async fn test_sit_any_fails_only_when_the_table_is_full() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;
    let _e = join(&room, 9, "eve").await;

    let result = room.sit(user("eve"), SeatChoice::Any).await;
    assert_eq!(result.err(), Some(ApiError::SeatOccupied));
}

#[tokio::test]
async fn test_seat_survives_disconnect() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;

    room.unsubscribe(SessionId(1)).await;

    let snap = room.snapshot().await.unwrap();
    assert!(snap.is_seated(&user("alice")));
    assert_eq!(snap.free_seats(), 0);
}

// =========================================================================
// Readiness and the deal
// =========================================================================

#[tokio::test]
async fn test_round_starts_exactly_on_the_fourth_ready() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;

    for name in &NAMES[..3] {
        room.set_ready(user(name), true).await.unwrap();
    }
    for feed in &mut feeds {
        let updates = drain(feed);
        assert!(
            !updates.iter().any(|u| matches!(u, RoomUpdate::Dealt { .. })),
            "no deal before the fourth ready"
        );
    }
    assert_eq!(room.book().await.err(), Some(ApiError::GameNotInProgress));

    room.set_ready(user("dave"), true).await.unwrap();

    for feed in &mut feeds {
        let updates = drain(feed);
        let tail = &updates[updates.len() - 3..];
        assert!(matches!(tail[0], RoomUpdate::WaitingFor { count: 0 }));
        match &tail[1] {
            RoomUpdate::Dealt { hand } => assert_eq!(hand.total(), Size(10)),
            other => panic!("expected a deal, got {other:?}"),
        }
        assert!(matches!(tail[2], RoomUpdate::Market { .. }));
    }
    assert!(room.book().await.is_ok());
}

#[tokio::test]
async fn test_round_starts_when_the_last_ready_player_sits() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feeds = Vec::new();
    for (i, name) in NAMES[..3].iter().enumerate() {
        feeds.push(join(&room, i as u64 + 1, name).await);
        room.sit(user(name), SeatChoice::Any).await.unwrap();
        room.set_ready(user(name), true).await.unwrap();
    }

    // Dave signals ready before taking a seat. The signal is banked but
    // does not count toward a table he is not at.
    let mut dave = join(&room, 4, "dave").await;
    room.set_ready(user("dave"), true).await.unwrap();
    assert_eq!(room.book().await.err(), Some(ApiError::GameNotInProgress));

    room.sit(user("dave"), SeatChoice::Any).await.unwrap();

    let snap = room.snapshot().await.unwrap();
    assert!(snap.playing, "the last seat completes a fully-ready table");

    // Alice's view of the whole build-up: dave's early ready holds the
    // count at one until his seat lands and the deal follows.
    let counts: Vec<usize> = drain(&mut feeds[0])
        .into_iter()
        .filter_map(|u| match u {
            RoomUpdate::WaitingFor { count } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![4, 3, 3, 2, 2, 1, 1, 0]);

    let updates = drain(&mut dave);
    let tail = &updates[updates.len() - 3..];
    assert!(matches!(tail[0], RoomUpdate::WaitingFor { count: 0 }));
    match &tail[1] {
        RoomUpdate::Dealt { hand } => assert_eq!(hand.total(), Size(10)),
        other => panic!("expected a deal, got {other:?}"),
    }
    assert!(matches!(tail[2], RoomUpdate::Market { .. }));
}

#[tokio::test]
async fn test_waiting_count_tracks_seats_and_readies() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feed = join(&room, 1, "alice").await;
    room.sit(user("alice"), SeatChoice::Any).await.unwrap();
    room.set_ready(user("alice"), true).await.unwrap();
    room.set_ready(user("alice"), false).await.unwrap();

    let counts: Vec<usize> = drain(&mut feed)
        .into_iter()
        .filter_map(|u| match u {
            RoomUpdate::WaitingFor { count } => Some(count),
            _ => None,
        })
        .collect();

    // Empty seats count as missing: sit -> 4, ready -> 3, unready -> 4.
    assert_eq!(counts, vec![4, 3, 4]);
}

#[tokio::test]
async fn test_multi_device_login_deals_to_every_session() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;
    let mut second_device = join(&room, 9, "alice").await;
    ready_four(&room).await;

    let hand_of = |updates: Vec<RoomUpdate>| {
        updates.into_iter().find_map(|u| match u {
            RoomUpdate::Dealt { hand } => Some(hand),
            _ => None,
        })
    };
    let first = hand_of(drain(&mut feeds[0])).expect("deal on first device");
    let second = hand_of(drain(&mut second_device)).expect("deal on second device");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ready_mid_round_is_deferred() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;
    ready_four(&room).await;
    for feed in &mut feeds {
        drain(feed);
    }

    room.set_ready(user("alice"), true).await.unwrap();

    // No readiness chatter during a live round; the signal is banked.
    assert!(drain(&mut feeds[0]).is_empty());
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.ready, vec![user("alice")]);
}

// =========================================================================
// Trading
// =========================================================================

#[tokio::test]
async fn test_every_subscriber_sees_the_same_trade_sequence() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;
    ready_four(&room).await;
    for feed in &mut feeds {
        drain(feed);
    }

    let suit = held_suit(&room, "bob").await;
    let resting = room.submit(sell("bob", 1, suit, 5, 1)).await.unwrap();
    assert!(resting.fills.is_empty());

    let crossing = room.submit(buy("alice", 1, suit, 7, 1)).await.unwrap();
    assert_eq!(crossing.fills.len(), 1);
    assert_eq!(crossing.fills[0].owner, user("bob"));
    assert_eq!(crossing.fills[0].price, Price(5), "trade at the resting price");

    let mut sequences = Vec::new();
    for feed in &mut feeds {
        sequences.push(drain(feed));
    }
    for other in &sequences[1..] {
        assert_eq!(&sequences[0], other, "update order must match everywhere");
    }
    assert!(matches!(sequences[0][0], RoomUpdate::Exec { .. }));
    assert!(matches!(sequences[0][1], RoomUpdate::Market { .. }));
}

#[tokio::test]
async fn test_fills_move_cards_between_hands() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;
    ready_four(&room).await;

    let suit = held_suit(&room, "bob").await;
    let before_bob = room.hand_of(user("bob")).await.unwrap().count(suit);
    let before_alice = room.hand_of(user("alice")).await.unwrap().count(suit);

    room.submit(sell("bob", 1, suit, 5, 1)).await.unwrap();
    room.submit(buy("alice", 1, suit, 5, 1)).await.unwrap();

    let after_bob = room.hand_of(user("bob")).await.unwrap().count(suit);
    let after_alice = room.hand_of(user("alice")).await.unwrap().count(suit);
    assert_eq!(after_bob + Size(1), before_bob);
    assert_eq!(after_alice, before_alice + Size(1));
}

#[tokio::test]
async fn test_sell_capped_by_hand_plus_resting_sells() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;
    ready_four(&room).await;

    let suit = held_suit(&room, "bob").await;
    let held = room.hand_of(user("bob")).await.unwrap().count(suit);

    // The whole holding may rest at once, but not a single card more.
    room.submit(sell("bob", 1, suit, 9, held.0)).await.unwrap();
    let result = room.submit(sell("bob", 2, suit, 9, 1)).await;
    assert_eq!(result.err(), Some(ApiError::InsufficientHoldings));
}

#[tokio::test]
async fn test_cancel_ownership_and_remainder() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;
    ready_four(&room).await;

    let suit = held_suit(&room, "bob").await;
    room.submit(sell("bob", 7, suit, 6, 2)).await.unwrap();
    room.submit(buy("alice", 1, suit, 6, 1)).await.unwrap();
    for feed in &mut feeds {
        drain(feed);
    }

    let result = room.cancel(user("alice"), OrderId(7)).await;
    assert_eq!(result.err(), Some(ApiError::NotOwner));
    let result = room.cancel(user("bob"), OrderId(8)).await;
    assert_eq!(result.err(), Some(ApiError::NoSuchOrder));

    let out = room.cancel(user("bob"), OrderId(7)).await.unwrap();
    assert_eq!(out.size, Size(1), "only the unfilled remainder comes out");

    let updates = drain(&mut feeds[2]);
    assert!(matches!(updates[0], RoomUpdate::Out { .. }));
    assert!(matches!(updates[1], RoomUpdate::Market { .. }));
}

#[tokio::test]
async fn test_dead_subscriber_does_not_stall_the_rest() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;
    ready_four(&room).await;

    // Bob's connection dies without an unsubscribe.
    drop(feeds.remove(1));

    let suit = held_suit(&room, "carol").await;
    room.submit(sell("carol", 1, suit, 4, 1)).await.unwrap();
    let exec = room.submit(buy("dave", 1, suit, 4, 1)).await.unwrap();
    assert_eq!(exec.fills.len(), 1);

    for feed in &mut feeds {
        let updates = drain(feed);
        assert!(updates.iter().any(|u| matches!(u, RoomUpdate::Exec { .. })));
    }
}

// =========================================================================
// The round timer
// =========================================================================

#[tokio::test]
async fn test_expired_round_rejects_orders_and_settles() {
    let (mut mgr, _events) = manager(instant_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;
    ready_four(&room).await;

    // The deadline has already passed by the time this order arrives.
    let result = room.submit(sell("bob", 1, Suit::Clubs, 5, 1)).await;
    assert_eq!(result.err(), Some(ApiError::GameNotInProgress));
    assert_eq!(room.book().await.err(), Some(ApiError::GameNotInProgress));

    let updates = drain(&mut feeds[0]);
    let over = updates
        .iter()
        .find_map(|u| match u {
            RoomUpdate::RoundOver { summary } => Some(summary),
            _ => None,
        })
        .expect("round settles on expiry");

    assert_eq!(over.hands.len(), 4);
    assert_eq!(over.goal_counts.len(), 4);
    let goal_cards: Size = over.goal_counts.values().copied().sum();
    assert!(goal_cards == Size(8) || goal_cards == Size(10));
    let top = over.awards.values().copied().max().expect("someone wins");
    assert!(top >= Price(50), "majority holder gets at least a pot share");

    // Settling announced the next waiting phase.
    assert!(updates
        .iter()
        .any(|u| matches!(u, RoomUpdate::WaitingFor { count: 4 })));
}

#[tokio::test]
async fn test_readies_banked_mid_round_start_the_next_one() {
    let (mut mgr, _events) = manager(instant_config());
    let room = mgr.create_room();
    let mut feeds = seat_four(&room).await;
    ready_four(&room).await;

    // The round is already past its deadline. Re-readying everyone
    // settles it and deals again at the fourth signal.
    ready_four(&room).await;

    // One more round trip settles the second expired round too.
    room.snapshot().await.unwrap();

    let updates = drain(&mut feeds[3]);
    let deals = updates
        .iter()
        .filter(|u| matches!(u, RoomUpdate::Dealt { .. }))
        .count();
    let settles = updates
        .iter()
        .filter(|u| matches!(u, RoomUpdate::RoundOver { .. }))
        .count();
    assert_eq!(deals, 2, "first deal plus the re-readied one");
    assert_eq!(settles, 2, "both zero-length rounds settled");
}

// =========================================================================
// Resync and observers
// =========================================================================

#[tokio::test]
async fn test_rejoining_player_is_caught_up_mid_round() {
    let (mut mgr, _events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;
    ready_four(&room).await;
    let expected = room.hand_of(user("alice")).await.unwrap();

    room.unsubscribe(SessionId(1)).await;
    let mut fresh = join(&room, 9, "alice").await;

    let updates = drain(&mut fresh);
    match &updates[0] {
        RoomUpdate::Dealt { hand } => assert_eq!(hand, &expected),
        other => panic!("expected the current hand first, got {other:?}"),
    }
    assert!(matches!(updates[1], RoomUpdate::Market { .. }));
}

#[tokio::test]
async fn test_observer_events_shadow_the_round() {
    let (mut mgr, mut events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;
    ready_four(&room).await;

    let suit = held_suit(&room, "bob").await;
    room.submit(sell("bob", 1, suit, 5, 1)).await.unwrap();
    room.submit(buy("alice", 1, suit, 5, 1)).await.unwrap();

    let observed = drain_events(&mut events);
    let updates: Vec<&RoomUpdate> = observed
        .iter()
        .filter_map(|ev| match ev {
            ServerEvent::Observers { room: id, update } if *id == room.id() => Some(update),
            _ => None,
        })
        .collect();

    assert!(updates.iter().any(|u| matches!(u, RoomUpdate::Exec { .. })));
    assert!(updates.iter().any(|u| matches!(u, RoomUpdate::Market { .. })));
    let hands = updates
        .iter()
        .filter_map(|u| match u {
            RoomUpdate::Hands { hands } => Some(hands),
            _ => None,
        })
        .last()
        .expect("observers see hands");
    assert_eq!(hands.len(), 4);
    let total: Size = hands.values().map(|h| h.total()).sum();
    assert_eq!(total, Size(40), "full deck across the table");
}

#[tokio::test]
async fn test_observer_resync_is_addressed_to_one_session() {
    let (mut mgr, mut events) = manager(long_config());
    let room = mgr.create_room();
    let _feeds = seat_four(&room).await;
    ready_four(&room).await;
    drain_events(&mut events);

    room.resync(SessionId(42)).await;
    // The fire-and-forget command needs one round trip to settle.
    room.snapshot().await.unwrap();

    let addressed: Vec<ServerEvent> = drain_events(&mut events)
        .into_iter()
        .filter(|ev| matches!(ev, ServerEvent::ObserverOne { .. }))
        .collect();

    assert_eq!(addressed.len(), 2);
    for ev in &addressed {
        if let ServerEvent::ObserverOne { session, room: id, update } = ev {
            assert_eq!(*session, SessionId(42));
            assert_eq!(*id, room.id());
            assert!(matches!(
                update,
                RoomUpdate::Hands { .. } | RoomUpdate::Market { .. }
            ));
        }
    }
}

#[tokio::test]
async fn test_lobby_events_track_room_lifecycle() {
    let (mut mgr, mut events) = manager(long_config());
    let room = mgr.create_room();
    let _feed = join(&room, 1, "alice").await;
    room.sit(user("alice"), SeatChoice::Seat { seat: Seat::South })
        .await
        .unwrap();

    let lobby: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|ev| match ev {
            ServerEvent::Lobby(update) => Some(update),
            _ => None,
        })
        .collect();

    use cardpit_protocol::LobbyUpdate;
    assert!(matches!(&lobby[0], LobbyUpdate::RoomCreated { room } if room.id == RoomId(1)));
    match &lobby[1] {
        LobbyUpdate::RoomUpdated { room } => {
            assert!(room.is_seated(&user("alice")));
            assert!(!room.playing);
        }
        other => panic!("expected a seat update, got {other:?}"),
    }
}
