//! Per-connection outbound queues.
//!
//! Every connection gets one bounded queue. Producers (the registry,
//! room actors) push with [`UpdateSink::try_deliver`], which never
//! blocks; the connection's writer task drains the other end with
//! [`UpdateFeed::next`]. A queue only fills when the client has stopped
//! reading its socket, and the response to that is to cut the
//! connection loose rather than stall everyone else in the room.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;

use cardpit_protocol::ServerMsg;

/// Sending half of a connection's outbound queue. Cloned freely; room
/// actors hold one per subscribed session.
#[derive(Clone)]
pub struct UpdateSink {
    tx: mpsc::Sender<ServerMsg>,
    kill: Arc<Notify>,
}

/// Receiving half, consumed by the connection's writer task.
pub struct UpdateFeed {
    rx: mpsc::Receiver<ServerMsg>,
    kill: Arc<Notify>,
}

impl UpdateSink {
    /// Creates a queue of the given capacity and returns the two halves.
    pub fn channel(capacity: usize) -> (UpdateSink, UpdateFeed) {
        let (tx, rx) = mpsc::channel(capacity);
        let kill = Arc::new(Notify::new());
        (UpdateSink { tx, kill: kill.clone() }, UpdateFeed { rx, kill })
    }

    /// Queues a message for the connection.
    ///
    /// Returns `false` if the message was dropped: either the writer is
    /// already gone, or the queue is full. A full queue additionally
    /// [`kill`](UpdateSink::kill)s the connection, since a client that
    /// stopped draining its socket will never catch up.
    pub fn try_deliver(&self, msg: ServerMsg) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.kill();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Tells the writer task to stop. Idempotent.
    pub fn kill(&self) {
        self.kill.notify_one();
    }
}

impl UpdateFeed {
    /// The next message to write, or `None` once the sink was killed or
    /// every sender is gone. Kill wins over queued messages.
    pub async fn next(&mut self) -> Option<ServerMsg> {
        tokio::select! {
            biased;
            _ = self.kill.notified() => None,
            msg = self.rx.recv() => msg,
        }
    }

    /// Non-blocking variant of [`next`](UpdateFeed::next); `None` when
    /// nothing is queued right now.
    pub fn try_next(&mut self) -> Option<ServerMsg> {
        self.rx.try_recv().ok()
    }
}
