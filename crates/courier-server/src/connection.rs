//! Connection handles.
//!
//! A [`Connection`] is the core's only view of a client socket: an id, the
//! sending half of the socket's outbound queue, and the set of users this
//! socket is currently in call signaling with. The transport creates
//! handles; the registry stores clones of them.

use std::collections::HashSet;
use std::sync::Arc;

use courier_shared::{ConnectionId, ServerEvent, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

/// Outbound queue feeding a connection's writer task.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: EventSender,
    call_peers: Arc<Mutex<HashSet<UserId>>>,
}

impl Connection {
    pub fn new(tx: EventSender) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
            call_peers: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// A fresh handle together with the receiver its writer should drain.
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for the client. Returns `false` once the writer is
    /// gone; callers treat that the same as an unreachable user.
    pub fn push(&self, event: ServerEvent) -> bool {
        trace!(conn = %self.id, event = event.name(), "push");
        self.tx.send(event).is_ok()
    }

    pub fn note_call_peer(&self, peer: &UserId) {
        self.call_peers.lock().insert(peer.clone());
    }

    pub fn forget_call_peer(&self, peer: &UserId) {
        self.call_peers.lock().remove(peer);
    }

    pub fn in_call_with(&self, peer: &UserId) -> bool {
        self.call_peers.lock().contains(peer)
    }

    /// Drain the call peer set, leaving it empty.
    pub fn take_call_peers(&self) -> Vec<UserId> {
        let mut peers: Vec<UserId> = self.call_peers.lock().drain().collect();
        peers.sort();
        peers
    }
}
