//! Notification Store
//!
//! Holds routed notifications and the unread counter. Every mutation goes
//! through `StoreInner` behind a single lock, so the counter always equals
//! the number of unread records — there is no second code path that could
//! let the two drift.

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};

use crate::protocol::Notification;

/// One notification as held by the client
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub id: i64,
    /// Notification category (e.g. "rating", "comment")
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Flipped only by explicit user acknowledgment
    pub read: bool,
}

impl From<Notification> for NotificationRecord {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.title,
            message: n.message,
            link: n.link,
            metadata: n.metadata,
            created_at: n.created_at,
            read: false,
        }
    }
}

/// Aggregates unread notifications for any number of UI subscribers
pub struct NotificationStore {
    inner: RwLock<StoreInner>,
    unread_tx: watch::Sender<usize>,
}

/// The single mutation point for list and counter
#[derive(Default)]
struct StoreInner {
    /// Newest first; insertion order is the only ordering guarantee
    records: Vec<NotificationRecord>,
    unread: usize,
}

impl StoreInner {
    fn append(&mut self, record: NotificationRecord) {
        self.records.insert(0, record);
        self.unread += 1;
    }

    /// Returns true if a record was newly marked read
    fn mark_read(&mut self, id: i64) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.read => {
                record.read = true;
                self.unread -= 1;
                true
            }
            _ => false,
        }
    }

    /// Returns how many records were newly marked read
    fn mark_all_read(&mut self) -> usize {
        let mut marked = 0;
        for record in self.records.iter_mut().filter(|r| !r.read) {
            record.read = true;
            marked += 1;
        }
        self.unread -= marked;
        marked
    }

    fn reset(&mut self) {
        self.records.clear();
        self.unread = 0;
    }
}

impl NotificationStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (unread_tx, _) = watch::channel(0);
        Self {
            inner: RwLock::new(StoreInner::default()),
            unread_tx,
        }
    }

    /// Insert a freshly routed notification at the head of the list
    pub async fn append(&self, notification: Notification) {
        let mut inner = self.inner.write().await;
        inner.append(NotificationRecord::from(notification));
        let _ = self.unread_tx.send_replace(inner.unread);
    }

    /// Acknowledge one notification
    ///
    /// Idempotent: marking an already-read id (or an unknown one) changes
    /// nothing and returns false.
    pub async fn mark_read(&self, id: i64) -> bool {
        let mut inner = self.inner.write().await;
        let marked = inner.mark_read(id);
        let _ = self.unread_tx.send_replace(inner.unread);
        marked
    }

    /// Acknowledge everything; returns how many records changed
    pub async fn mark_all_read(&self) -> usize {
        let mut inner = self.inner.write().await;
        let marked = inner.mark_all_read();
        let _ = self.unread_tx.send_replace(inner.unread);
        marked
    }

    /// Clear list and counter (logout)
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.reset();
        let _ = self.unread_tx.send_replace(0);
    }

    /// Current unread count
    pub async fn unread_count(&self) -> usize {
        self.inner.read().await.unread
    }

    /// Snapshot of the list, newest first
    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        self.inner.read().await.records.clone()
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    /// Observe the unread count without polling
    pub fn watch_unread(&self) -> watch::Receiver<usize> {
        self.unread_tx.subscribe()
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: i64) -> Notification {
        Notification {
            id,
            kind: "rating".to_string(),
            title: format!("Notification {}", id),
            message: "Portfolio baholandi".to_string(),
            link: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// The invariant every test falls back on: counter == unread records
    async fn assert_consistent(store: &NotificationStore) {
        let records = store.notifications().await;
        let derived = records.iter().filter(|r| !r.read).count();
        assert_eq!(store.unread_count().await, derived);
    }

    #[tokio::test]
    async fn test_append_increments_unread() {
        let store = NotificationStore::new();
        store.append(notification(1)).await;
        store.append(notification(2)).await;

        assert_eq!(store.unread_count().await, 2);
        assert_eq!(store.len().await, 2);
        assert_consistent(&store).await;
    }

    #[tokio::test]
    async fn test_newest_first_ordering() {
        let store = NotificationStore::new();
        for id in 1..=3 {
            store.append(notification(id)).await;
        }

        let records = store.notifications().await;
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_mark_read_idempotent() {
        let store = NotificationStore::new();
        store.append(notification(7)).await;
        assert_eq!(store.unread_count().await, 1);

        assert!(store.mark_read(7).await);
        assert_eq!(store.unread_count().await, 0);

        // Second acknowledgment changes nothing, never goes negative
        assert!(!store.mark_read(7).await);
        assert_eq!(store.unread_count().await, 0);
        assert_consistent(&store).await;
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id() {
        let store = NotificationStore::new();
        store.append(notification(1)).await;

        assert!(!store.mark_read(999).await);
        assert_eq!(store.unread_count().await, 1);
        assert_consistent(&store).await;
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let store = NotificationStore::new();
        for id in 1..=4 {
            store.append(notification(id)).await;
        }
        store.mark_read(2).await;

        assert_eq!(store.mark_all_read().await, 3);
        assert_eq!(store.unread_count().await, 0);
        assert_eq!(store.mark_all_read().await, 0);
        assert_consistent(&store).await;
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let store = NotificationStore::new();
        for id in 1..=3 {
            store.append(notification(id)).await;
        }

        store.reset().await;
        assert!(store.is_empty().await);
        assert_eq!(store.unread_count().await, 0);
        assert_consistent(&store).await;
    }

    #[tokio::test]
    async fn test_mixed_operation_sequence_stays_consistent() {
        let store = NotificationStore::new();

        store.append(notification(1)).await;
        store.append(notification(2)).await;
        store.mark_read(1).await;
        store.append(notification(3)).await;
        store.mark_read(1).await; // repeat, no-op
        store.mark_read(3).await;
        assert_consistent(&store).await;
        assert_eq!(store.unread_count().await, 1);

        store.reset().await;
        store.append(notification(4)).await;
        assert_consistent(&store).await;
        assert_eq!(store.unread_count().await, 1);
    }

    #[tokio::test]
    async fn test_watch_unread_tracks_changes() {
        let store = NotificationStore::new();
        let mut watcher = store.watch_unread();
        assert_eq!(*watcher.borrow(), 0);

        store.append(notification(1)).await;
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow(), 1);

        store.mark_read(1).await;
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow(), 0);
    }
}
