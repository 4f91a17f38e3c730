//! Message relay: persist first, then deliver.
//!
//! A message reaches a client only after the store has assigned it an id,
//! so the sender's echo and the receiver's copy are the same record and can
//! be deduplicated by id. Sends from one user are serialized, which keeps
//! delivery in store-append order for every sender/receiver pair.

use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_shared::{MessageId, MessageRecord, ServerEvent, UserId};
use courier_store::NewMessage;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::registry::SessionRegistry;
use crate::store::MessageStore;

/// Result of a successful relay.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub record: MessageRecord,
    pub echoed_to_sender: bool,
    pub delivered_to_receiver: bool,
}

pub struct MessageRelay {
    registry: SessionRegistry,
    store: Arc<dyn MessageStore>,
    store_timeout: Duration,
    sender_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl MessageRelay {
    pub fn new(
        registry: SessionRegistry,
        store: Arc<dyn MessageStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            store_timeout,
            sender_locks: DashMap::new(),
        }
    }

    /// Persist `text` from `sender` to `receiver` and push the stored record
    /// to whichever of the two is online.
    ///
    /// Nothing is pushed if persistence fails or times out. An offline
    /// party is not an error.
    pub async fn relay(
        &self,
        sender: &UserId,
        receiver: &UserId,
        text: String,
        reply_to: Option<MessageId>,
    ) -> Result<RelayOutcome, RelayError> {
        if sender.is_empty() {
            return Err(RelayError::InvalidIdentifier("senderId"));
        }
        if receiver.is_empty() {
            return Err(RelayError::InvalidIdentifier("receiverId"));
        }

        let lock = self.sender_locks.entry(sender.clone()).or_default().clone();
        let _serial = lock.lock().await;

        let message = NewMessage {
            sender_id: sender.clone(),
            receiver_id: receiver.clone(),
            text,
            reply_to,
        };

        let deadline = Instant::now() + self.store_timeout;
        let append = self.store.append(message, deadline);
        let record = match tokio::time::timeout_at(deadline.into(), append).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!(
                    sender = %sender.short(),
                    receiver = %receiver.short(),
                    error = %e,
                    "Message not persisted, dropping"
                );
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    sender = %sender.short(),
                    receiver = %receiver.short(),
                    timeout = ?self.store_timeout,
                    "Store append timed out, dropping"
                );
                return Err(RelayError::Timeout(self.store_timeout));
            }
        };

        let echoed_to_sender = self.deliver(sender, &record);
        let delivered_to_receiver = if receiver == sender {
            echoed_to_sender
        } else {
            self.deliver(receiver, &record)
        };

        info!(
            id = %record.id,
            sender = %sender.short(),
            receiver = %receiver.short(),
            delivered = delivered_to_receiver,
            "Message relayed"
        );

        Ok(RelayOutcome {
            record,
            echoed_to_sender,
            delivered_to_receiver,
        })
    }

    /// Drop the per-sender ordering lock once a user has gone away. A lock
    /// still held by an in-flight relay is kept so a quick reconnect queues
    /// behind it.
    pub fn forget_sender(&self, sender: &UserId) {
        self.sender_locks
            .remove_if(sender, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn deliver(&self, user: &UserId, record: &MessageRecord) -> bool {
        match self.registry.lookup(user) {
            Some(conn) => conn.push(ServerEvent::ReceiveMessage(record.clone())),
            None => {
                debug!(user = %user.short(), id = %record.id, "User offline, history only");
                false
            }
        }
    }
}
