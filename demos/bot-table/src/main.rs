//! Four scripted traders filling one table.
//!
//! Start `cardpitd`, then run this binary against it (`CARDPIT_ADDR`,
//! default `127.0.0.1:8080`). The bots seat themselves at one table and
//! quote random one-card orders at each other, re-readying after every
//! settlement. `CARDPIT_ROUNDS` caps how many rounds they play; without
//! it they trade until killed.

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;

use cardpit_game::Hand;
use cardpit_market::{Direction, OrderId, Price, Size, Suit, Username};
use cardpit_protocol::{
    OrderSpec, Reply, Request, RequestKind, RoomChoice, RoomUpdate, SeatChoice, ServerMsg,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const NAMES: [&str; 4] = ["alfa", "bravo", "charlie", "delta"];

/// How long a bot lets the tape stay quiet before quoting into it.
const QUOTE_EVERY: Duration = Duration::from_millis(400);

// ---------------------------------------------------------------------------
// Quoting policy
// ---------------------------------------------------------------------------

/// Sells are priced in the upper band, buys in the lower. The bands
/// overlap, so some quotes cross and trade while most rest in the book.
const SELL_BAND: std::ops::RangeInclusive<u64> = 4..=9;
const BUY_BAND: std::ops::RangeInclusive<u64> = 1..=6;

/// Picks one order at a time from whatever the current hand allows.
struct Quoter {
    rng: StdRng,
    next_id: u64,
}

impl Quoter {
    fn new(seed: u64) -> Quoter {
        Quoter { rng: StdRng::seed_from_u64(seed), next_id: 1 }
    }

    /// A one-card order: a coin flip between selling a held suit and
    /// bidding for a random one. With nothing to sell it always bids.
    fn quote(&mut self, hand: &Hand) -> OrderSpec {
        let id = OrderId(self.next_id);
        self.next_id += 1;

        let held: Vec<Suit> = Suit::ALL
            .into_iter()
            .filter(|&suit| !hand.count(suit).is_zero())
            .collect();

        if !held.is_empty() && self.rng.random_bool(0.5) {
            OrderSpec {
                id,
                suit: held[self.rng.random_range(0..held.len())],
                dir: Direction::Sell,
                price: Price(self.rng.random_range(SELL_BAND)),
                size: Size(1),
            }
        } else {
            OrderSpec {
                id,
                suit: Suit::ALL[self.rng.random_range(0..Suit::ALL.len())],
                dir: Direction::Buy,
                price: Price(self.rng.random_range(BUY_BAND)),
                size: Size(1),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire plumbing
// ---------------------------------------------------------------------------

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// One bot's connection. Replies and streamed updates share the socket,
/// so waiting for a reply buffers updates instead of dropping them.
struct Connection {
    ws: Ws,
    inbox: Vec<ServerMsg>,
    seq: u64,
}

impl Connection {
    async fn open(addr: &str) -> Result<Connection, BoxError> {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await?;
        Ok(Connection { ws, inbox: Vec::new(), seq: 0 })
    }

    /// Sends one request and waits for its reply. A refusal comes back
    /// as an error like any other.
    async fn request(&mut self, kind: RequestKind) -> Result<Reply, BoxError> {
        self.seq += 1;
        let seq = self.seq;
        let bytes = serde_json::to_vec(&Request { seq, kind })?;
        self.ws.send(Message::Binary(bytes.into())).await?;
        loop {
            let msg = self.read_frame().await?;
            match msg {
                ServerMsg::Reply { seq: got, result } if got == seq => return Ok(result?),
                other => self.inbox.push(other),
            }
        }
    }

    /// The oldest unconsumed room update, or `None` once `deadline`
    /// passes with the tape quiet.
    async fn next_update(&mut self, deadline: Instant) -> Result<Option<RoomUpdate>, BoxError> {
        loop {
            if let Some(pos) = self
                .inbox
                .iter()
                .position(|msg| matches!(msg, ServerMsg::Room { .. }))
            {
                if let ServerMsg::Room { update, .. } = self.inbox.remove(pos) {
                    return Ok(Some(update));
                }
            }
            let wait = deadline.saturating_duration_since(Instant::now());
            if wait.is_zero() {
                return Ok(None);
            }
            match tokio::time::timeout(wait, self.read_frame()).await {
                Ok(msg) => self.inbox.push(msg?),
                Err(_) => return Ok(None),
            }
        }
    }

    async fn read_frame(&mut self) -> Result<ServerMsg, BoxError> {
        loop {
            let frame = match self.ws.next().await {
                Some(frame) => frame?,
                None => return Err("connection closed".into()),
            };
            match frame {
                Message::Binary(data) => return Ok(serde_json::from_slice(&data)?),
                Message::Text(text) => return Ok(serde_json::from_slice(text.as_bytes())?),
                _ => continue,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

struct Bot {
    name: &'static str,
    conn: Connection,
    quoter: Quoter,
}

impl Bot {
    /// Connects and logs in, then takes a seat at whatever table has room.
    async fn seat(addr: &str, name: &'static str, seed: u64) -> Result<Bot, BoxError> {
        let mut conn = Connection::open(addr).await?;
        conn.request(RequestKind::Login { username: Username::new(name) })
            .await?;
        conn.request(RequestKind::JoinRoom { choice: RoomChoice::Any })
            .await?;
        let reply = conn
            .request(RequestKind::StartPlaying { choice: SeatChoice::Any })
            .await?;
        if let Reply::Seated { seat } = reply {
            println!("{name}: seated at {seat}");
        }
        Ok(Bot { name, conn, quoter: Quoter::new(seed) })
    }

    /// Plays `rounds` rounds, quoting into every quiet beat of the tape.
    async fn play(&mut self, rounds: u64) -> Result<(), BoxError> {
        self.conn.request(RequestKind::IsReady { ready: true }).await?;
        let mut played: u64 = 0;
        let mut next_quote = Instant::now() + QUOTE_EVERY;

        while played < rounds {
            let Some(update) = self.conn.next_update(next_quote).await? else {
                self.try_quote().await?;
                next_quote = Instant::now() + QUOTE_EVERY;
                continue;
            };
            match update {
                RoomUpdate::Dealt { hand } => {
                    println!("{}: dealt {} cards", self.name, hand.total());
                }
                RoomUpdate::Exec { exec } => {
                    let me = Username::new(self.name);
                    for fill in &exec.fills {
                        if exec.order.owner == me {
                            println!(
                                "{}: {} {} {} @ {} against {}",
                                self.name, exec.order.dir, fill.size, exec.order.suit,
                                fill.price, fill.owner,
                            );
                        } else if fill.owner == me {
                            println!(
                                "{}: resting {} sold through, {} @ {}",
                                self.name, exec.order.suit, fill.size, fill.price,
                            );
                        }
                    }
                }
                RoomUpdate::RoundOver { summary } => {
                    played += 1;
                    let award = summary
                        .awards
                        .get(&Username::new(self.name))
                        .copied()
                        .unwrap_or(Price::ZERO);
                    println!(
                        "{}: round over, goal was {}, my award {}",
                        self.name, summary.goal, award,
                    );
                    if played < rounds {
                        self.conn.request(RequestKind::IsReady { ready: true }).await?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// One quote, sized to the live hand. Refusals are part of the game
    /// (the round may have settled under us) and only get printed.
    async fn try_quote(&mut self) -> Result<(), BoxError> {
        let hand = match self.conn.request(RequestKind::GetHand).await {
            Ok(Reply::Hand { hand }) => hand,
            _ => return Ok(()),
        };
        let spec = self.quoter.quote(&hand);
        println!(
            "{}: quote {} {} @ {}",
            self.name, spec.dir, spec.suit, spec.price
        );
        if let Err(err) = self
            .conn
            .request(RequestKind::SubmitOrder { order: spec })
            .await
        {
            println!("{}: order refused ({err})", self.name);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let addr = std::env::var("CARDPIT_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let rounds = std::env::var("CARDPIT_ROUNDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(u64::MAX);

    eprintln!("seating {} bots at {addr}", NAMES.len());

    let mut table = JoinSet::new();
    for name in NAMES {
        let addr = addr.clone();
        let seed: u64 = rand::rng().random();
        table.spawn(async move {
            let mut bot = Bot::seat(&addr, name, seed).await?;
            bot.play(rounds).await
        });
    }
    while let Some(finished) = table.join_next().await {
        finished??;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardpit::CardpitServer;
    use cardpit_game::GameConfig;

    // -- Quoter -----------------------------------------------------------

    #[test]
    fn test_quoter_sells_only_held_suits() {
        let mut quoter = Quoter::new(3);
        let hand = Hand::from_counts([Size::ZERO, Size(4), Size::ZERO, Size::ZERO]);
        for _ in 0..200 {
            let spec = quoter.quote(&hand);
            assert_eq!(spec.size, Size(1));
            match spec.dir {
                Direction::Sell => {
                    assert_eq!(spec.suit, Suit::Diamonds, "the only held suit");
                    assert!(SELL_BAND.contains(&spec.price.0));
                }
                Direction::Buy => assert!(BUY_BAND.contains(&spec.price.0)),
            }
        }
    }

    #[test]
    fn test_quoter_with_an_empty_hand_only_buys() {
        let mut quoter = Quoter::new(11);
        for _ in 0..50 {
            assert_eq!(quoter.quote(&Hand::empty()).dir, Direction::Buy);
        }
    }

    #[test]
    fn test_quoter_ids_increase() {
        let mut quoter = Quoter::new(0);
        let hand = Hand::from_counts([Size(1); 4]);
        let ids: Vec<u64> = (0..10).map(|_| quoter.quote(&hand).id.0).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "ids must never repeat");
        }
    }

    // -- Full table -------------------------------------------------------

    /// Boots a real server with a short round and lets the four bots
    /// carry one round from seating to settlement.
    #[tokio::test]
    async fn test_four_bots_complete_a_round() {
        let config = GameConfig {
            round_duration: Duration::from_millis(600),
            ..GameConfig::default()
        };
        let server = CardpitServer::builder()
            .bind("127.0.0.1:0")
            .game_config(config)
            .build()
            .await
            .expect("server should build");
        let addr = server.local_addr().expect("should have local addr").to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut table = JoinSet::new();
        for (i, name) in NAMES.into_iter().enumerate() {
            let addr = addr.clone();
            table.spawn(async move {
                let mut bot = Bot::seat(&addr, name, i as u64).await?;
                bot.play(1).await
            });
        }

        let all_done = async {
            while let Some(finished) = table.join_next().await {
                finished
                    .expect("bot task should not panic")
                    .expect("bot should reach settlement");
            }
        };
        tokio::time::timeout(Duration::from_secs(10), all_done)
            .await
            .expect("all four bots should finish a round");
    }
}
