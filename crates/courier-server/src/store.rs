//! The persistence seam the relay calls through.
//!
//! [`MessageStore`] is what the core depends on; [`SqliteStore`] adapts the
//! synchronous `courier-store` database to it by running every query on the
//! blocking pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use courier_shared::{MessageRecord, UserId};
use courier_store::{Database, NewMessage, StoreError};
use parking_lot::Mutex;
use tracing::warn;

#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persist a message. The returned record carries the store-assigned id
    /// and timestamp.
    ///
    /// A write that has not started by `deadline` must be skipped and
    /// reported as an error, so a caller that gave up on it cannot find the
    /// message in history afterwards.
    async fn append(
        &self,
        message: NewMessage,
        deadline: Instant,
    ) -> Result<MessageRecord, StoreError>;

    /// Conversation between two users, oldest first.
    async fn read_history(
        &self,
        user_a: &UserId,
        user_b: &UserId,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Mark everything `sender` sent to `receiver` as read.
    async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> Result<usize, StoreError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Block every query until the guard is dropped.
    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> parking_lot::MutexGuard<'_, Database> {
        self.db.lock()
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(
        &self,
        message: NewMessage,
        deadline: Instant,
    ) -> Result<MessageRecord, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let Some(guard) = db.try_lock_until(deadline) else {
                warn!("Store busy past write deadline, skipping append");
                return Err(StoreError::Unavailable("store busy".into()));
            };
            guard.append_message(&message)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }

    async fn read_history(
        &self,
        user_a: &UserId,
        user_b: &UserId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let (a, b) = (user_a.clone(), user_b.clone());
        self.with_db(move |db| db.read_history(&a, &b)).await
    }

    async fn mark_read(&self, receiver: &UserId, sender: &UserId) -> Result<usize, StoreError> {
        let (receiver, sender) = (receiver.clone(), sender.clone());
        self.with_db(move |db| db.mark_read(&receiver, &sender)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("courier.db")).unwrap();
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));

        let record = store
            .append(NewMessage::new(alice.clone(), bob.clone(), "hi"), soon())
            .await
            .unwrap();

        let history = store.read_history(&bob, &alice).await.unwrap();
        assert_eq!(history, vec![record]);

        assert_eq!(store.mark_read(&bob, &alice).await.unwrap(), 1);
        assert!(store.read_history(&alice, &bob).await.unwrap()[0].read);
    }

    #[tokio::test]
    async fn test_append_past_deadline_is_never_written() {
        let store = SqliteStore::in_memory().unwrap();
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));

        let busy = store.hold_lock();
        let deadline = Instant::now() + Duration::from_millis(50);
        let err = store
            .append(NewMessage::new(alice.clone(), bob.clone(), "late"), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        drop(busy);

        assert!(store.read_history(&alice, &bob).await.unwrap().is_empty());
    }
}
