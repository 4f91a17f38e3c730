//! Session registry: which connection currently speaks for which user.
//!
//! Backed by a sharded [`DashMap`], so writers only contend with writers for
//! keys in the same shard. Every operation completes before it returns,
//! which gives read-after-write for a given user without a global lock.

use std::sync::Arc;

use courier_shared::{ConnectionId, UserId};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::connection::Connection;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<UserId, Connection>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user` to `conn`, replacing any previous binding (last join
    /// wins). Returns the connection that was replaced, if any.
    pub fn register(&self, user: UserId, conn: Connection) -> Option<Connection> {
        let conn_id = conn.id();
        let previous = self.sessions.insert(user.clone(), conn);

        match &previous {
            Some(old) if old.id() != conn_id => {
                info!(user = %user, old = %old.id(), new = %conn_id, "session replaced");
            }
            Some(_) => {}
            None => info!(user = %user, conn = %conn_id, "session registered"),
        }

        previous
    }

    pub fn lookup(&self, user: &UserId) -> Option<Connection> {
        self.sessions.get(user).map(|entry| entry.value().clone())
    }

    pub fn is_reachable(&self, user: &UserId) -> bool {
        self.sessions.contains_key(user)
    }

    /// Unconditionally drop the binding for `user`. Removing an absent user
    /// is a no-op.
    pub fn remove(&self, user: &UserId) -> bool {
        let removed = self.sessions.remove(user).is_some();
        if removed {
            debug!(user = %user, "session removed");
        }
        removed
    }

    /// Drop the binding for `user` only while it still points at `conn_id`.
    /// A connection that was superseded by a newer join leaves the newer
    /// binding alone.
    pub fn remove_if_current(&self, user: &UserId, conn_id: ConnectionId) -> bool {
        let removed = self
            .sessions
            .remove_if(user, |_, conn| conn.id() == conn_id)
            .is_some();
        if removed {
            debug!(user = %user, conn = %conn_id, "session removed");
        } else {
            debug!(user = %user, conn = %conn_id, "session already superseded, keeping entry");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
