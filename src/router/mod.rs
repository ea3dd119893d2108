//! Message Router
//!
//! Classifies inbound frames and fans them out to decoupled consumers:
//! the notification store, registered subscribers, the heartbeat pong sink
//! and the optional toast side-channel. Subscribers are held until
//! explicitly unregistered — registration hands back a `Subscription`
//! capability, and a leaked one keeps receiving events.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::notifications::NotificationStore;
use crate::protocol::{Announcement, FrameKind, InboundFrame, Notification};

/// Callback invoked with each routed frame
pub type MessageCallback = Arc<dyn Fn(&InboundFrame) + Send + Sync>;

/// What a subscriber wants to receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberFilter {
    /// Every routed frame, including unrecognized types
    All,
    /// Only frames with this exact `type` tag
    Kind(String),
}

impl SubscriberFilter {
    fn matches(&self, kind: &str) -> bool {
        match self {
            SubscriberFilter::All => true,
            SubscriberFilter::Kind(k) => k == kind,
        }
    }
}

/// Capability returned by `subscribe`; required for unregistration
///
/// Dropping it does not unsubscribe — teardown must call
/// [`MessageRouter::unsubscribe`] explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: Uuid,
}

/// Toast side-effect emitted on notification/announcement receipt
///
/// Rendering belongs to the UI layer; the router only describes the toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastEvent {
    pub icon: &'static str,
    pub message: String,
    pub duration: Duration,
}

struct SubscriberEntry {
    filter: SubscriberFilter,
    callback: MessageCallback,
}

struct RouterInner {
    subscribers: HashMap<Uuid, SubscriberEntry>,
    /// Pong sink installed by the manager while a heartbeat is running
    heartbeat: Option<mpsc::UnboundedSender<()>>,
}

/// Routes inbound frames to typed handlers
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RwLock<RouterInner>>,
    store: Arc<NotificationStore>,
    toast_tx: Option<mpsc::UnboundedSender<ToastEvent>>,
}

impl MessageRouter {
    /// Create a router feeding the given store
    ///
    /// `toast_tx` enables the toast side-channel (the `show_toasts` option).
    pub fn new(
        store: Arc<NotificationStore>,
        toast_tx: Option<mpsc::UnboundedSender<ToastEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RouterInner {
                subscribers: HashMap::new(),
                heartbeat: None,
            })),
            store,
            toast_tx,
        }
    }

    /// Register a subscriber; keep the returned capability to unregister
    pub async fn subscribe(
        &self,
        filter: SubscriberFilter,
        callback: MessageCallback,
    ) -> Subscription {
        let id = Uuid::new_v4();
        self.inner
            .write()
            .await
            .subscribers
            .insert(id, SubscriberEntry { filter, callback });

        tracing::debug!(subscription_id = %id, "Subscriber registered");
        Subscription { id }
    }

    /// Register a typed notification handler
    pub async fn subscribe_notifications<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.subscribe(
            SubscriberFilter::Kind("notification".to_string()),
            Arc::new(move |frame| {
                if let Ok(notif) = serde_json::from_value::<Notification>(frame.data.clone()) {
                    handler(notif);
                }
            }),
        )
        .await
    }

    /// Register a typed announcement handler
    pub async fn subscribe_announcements<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Announcement) + Send + Sync + 'static,
    {
        self.subscribe(
            SubscriberFilter::Kind("announcement".to_string()),
            Arc::new(move |frame| {
                if let Ok(ann) = serde_json::from_value::<Announcement>(frame.data.clone()) {
                    handler(ann);
                }
            }),
        )
        .await
    }

    /// Remove a subscriber; returns false if it was already gone
    pub async fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let removed = self
            .inner
            .write()
            .await
            .subscribers
            .remove(&subscription.id)
            .is_some();
        if removed {
            tracing::debug!(subscription_id = %subscription.id, "Subscriber removed");
        }
        removed
    }

    /// Number of registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.subscribers.len()
    }

    /// Install the pong sink for a freshly started heartbeat
    pub(crate) async fn set_heartbeat(&self, pong_tx: mpsc::UnboundedSender<()>) {
        self.inner.write().await.heartbeat = Some(pong_tx);
    }

    /// Remove the pong sink when the connection leaves `Connected`
    pub(crate) async fn clear_heartbeat(&self) {
        self.inner.write().await.heartbeat = None;
    }

    /// Route one inbound frame
    ///
    /// Frames are consumed exactly once and not retained. Unknown types are
    /// logged and passed only to catch-all subscribers — never an error, a
    /// newer server must not crash an older client.
    pub async fn route(&self, frame: &InboundFrame) {
        match frame.classify() {
            FrameKind::Pong => {
                let inner = self.inner.read().await;
                if let Some(hb) = &inner.heartbeat {
                    let _ = hb.send(());
                }
            }
            FrameKind::Notification => {
                match serde_json::from_value::<Notification>(frame.data.clone()) {
                    Ok(notif) => {
                        self.emit_toast(notification_toast(&notif));
                        self.store.append(notif).await;
                        self.dispatch(frame).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Malformed notification payload, dropping");
                    }
                }
            }
            FrameKind::Announcement => {
                match serde_json::from_value::<Announcement>(frame.data.clone()) {
                    Ok(ann) => {
                        self.emit_toast(announcement_toast(&ann));
                        self.dispatch(frame).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Malformed announcement payload, dropping");
                    }
                }
            }
            FrameKind::AuthAck | FrameKind::AuthError => {
                // Handshake frames are consumed by the connection manager
                tracing::debug!(kind = %frame.kind, "Handshake frame reached router, ignoring");
            }
            FrameKind::Unrecognized => {
                tracing::debug!(kind = %frame.kind, "Unrecognized frame type");
                self.dispatch(frame).await;
            }
        }
    }

    /// Deliver a frame to every matching subscriber
    ///
    /// Callbacks run outside the registry lock, and a panic inside one
    /// subscriber must not stop delivery to the rest.
    async fn dispatch(&self, frame: &InboundFrame) {
        let callbacks: Vec<MessageCallback> = {
            let inner = self.inner.read().await;
            inner
                .subscribers
                .values()
                .filter(|entry| entry.filter.matches(&frame.kind))
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(frame))).is_err() {
                tracing::error!(kind = %frame.kind, "Subscriber callback panicked");
            }
        }
    }

    fn emit_toast(&self, toast: ToastEvent) {
        if let Some(tx) = &self.toast_tx {
            let _ = tx.send(toast);
        }
    }
}

fn notification_toast(notif: &Notification) -> ToastEvent {
    ToastEvent {
        icon: if notif.kind == "rating" { "⭐" } else { "💬" },
        message: notif.message.clone(),
        duration: Duration::from_secs(5),
    }
}

fn announcement_toast(ann: &Announcement) -> ToastEvent {
    ToastEvent {
        icon: "📢",
        message: ann.message.clone(),
        duration: Duration::from_secs(8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn notification_frame(id: i64) -> InboundFrame {
        InboundFrame::parse(&format!(
            r#"{{"type": "notification",
                "data": {{"id": {}, "type": "rating", "title": "Baholandi",
                          "message": "Portfolio baholandi",
                          "created_at": "2024-01-01T00:00:00Z"}}}}"#,
            id
        ))
        .unwrap()
    }

    fn announcement_frame() -> InboundFrame {
        InboundFrame::parse(
            r#"{"type": "announcement", "data": {"title": "Diqqat", "message": "Yangilanish"}}"#,
        )
        .unwrap()
    }

    fn router() -> (MessageRouter, Arc<NotificationStore>) {
        let store = Arc::new(NotificationStore::new());
        (MessageRouter::new(Arc::clone(&store), None), store)
    }

    #[tokio::test]
    async fn test_notification_appends_to_store() {
        let (router, store) = router();

        router.route(&notification_frame(7)).await;

        assert_eq!(store.unread_count().await, 1);
        let records = store.notifications().await;
        assert_eq!(records[0].id, 7);
        assert!(!records[0].read);
    }

    #[tokio::test]
    async fn test_announcement_not_stored() {
        let (router, store) = router();

        router.route(&announcement_frame()).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_subscriber_filtering() {
        let (router, _store) = router();
        let notif_hits = Arc::new(AtomicUsize::new(0));
        let all_hits = Arc::new(AtomicUsize::new(0));

        let n = Arc::clone(&notif_hits);
        router
            .subscribe(
                SubscriberFilter::Kind("notification".to_string()),
                Arc::new(move |_| {
                    n.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        let a = Arc::clone(&all_hits);
        router
            .subscribe(
                SubscriberFilter::All,
                Arc::new(move |_| {
                    a.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        router.route(&notification_frame(1)).await;
        router.route(&announcement_frame()).await;

        assert_eq!(notif_hits.load(Ordering::SeqCst), 1);
        assert_eq!(all_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (router, _store) = router();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let sub = router
            .subscribe(
                SubscriberFilter::All,
                Arc::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        router.route(&notification_frame(1)).await;
        assert!(router.unsubscribe(&sub).await);
        router.route(&notification_frame(2)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // Second unsubscribe is a no-op
        assert!(!router.unsubscribe(&sub).await);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let (router, _store) = router();
        let hits = Arc::new(AtomicUsize::new(0));

        router
            .subscribe(
                SubscriberFilter::All,
                Arc::new(|_| panic!("subscriber bug")),
            )
            .await;

        let h = Arc::clone(&hits);
        router
            .subscribe(
                SubscriberFilter::All,
                Arc::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        router.route(&notification_frame(1)).await;
        // The healthy subscriber still got the frame
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pong_forwarded_to_heartbeat_only() {
        let (router, store) = router();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        router
            .subscribe(
                SubscriberFilter::All,
                Arc::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        let (pong_tx, mut pong_rx) = mpsc::unbounded_channel();
        router.set_heartbeat(pong_tx).await;

        let pong = InboundFrame::parse(r#"{"type": "pong"}"#).unwrap();
        router.route(&pong).await;

        assert!(pong_rx.try_recv().is_ok());
        // Not dispatched to subscribers, not stored
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(store.is_empty().await);

        router.clear_heartbeat().await;
        router.route(&pong).await;
        assert!(pong_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unrecognized_goes_to_catch_all_only() {
        let (router, store) = router();
        let all_hits = Arc::new(AtomicUsize::new(0));
        let typed_hits = Arc::new(AtomicUsize::new(0));

        let a = Arc::clone(&all_hits);
        router
            .subscribe(
                SubscriberFilter::All,
                Arc::new(move |_| {
                    a.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        let t = Arc::clone(&typed_hits);
        router
            .subscribe(
                SubscriberFilter::Kind("notification".to_string()),
                Arc::new(move |_| {
                    t.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        let frame = InboundFrame::parse(r#"{"type": "presence", "data": {}}"#).unwrap();
        router.route(&frame).await;

        assert_eq!(all_hits.load(Ordering::SeqCst), 1);
        assert_eq!(typed_hits.load(Ordering::SeqCst), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_notification_payload_dropped() {
        let (router, store) = router();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        router
            .subscribe(
                SubscriberFilter::All,
                Arc::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        // `data` is missing every required field
        let frame = InboundFrame::parse(r#"{"type": "notification", "data": {"bogus": 1}}"#).unwrap();
        router.route(&frame).await;

        assert!(store.is_empty().await);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_typed_notification_handler() {
        let (router, _store) = router();
        let (tx, mut rx) = mpsc::unbounded_channel();

        router
            .subscribe_notifications(move |notif| {
                let _ = tx.send(notif);
            })
            .await;

        router.route(&notification_frame(42)).await;

        let notif = rx.try_recv().unwrap();
        assert_eq!(notif.id, 42);
        assert_eq!(notif.kind, "rating");
    }

    #[tokio::test]
    async fn test_typed_announcement_handler() {
        let (router, _store) = router();
        let (tx, mut rx) = mpsc::unbounded_channel();

        router
            .subscribe_announcements(move |ann| {
                let _ = tx.send(ann);
            })
            .await;

        router.route(&announcement_frame()).await;

        let ann = rx.try_recv().unwrap();
        assert_eq!(ann.title, "Diqqat");
    }

    #[tokio::test]
    async fn test_toast_events() {
        let store = Arc::new(NotificationStore::new());
        let (toast_tx, mut toast_rx) = mpsc::unbounded_channel();
        let router = MessageRouter::new(store, Some(toast_tx));

        router.route(&notification_frame(1)).await;
        let toast = toast_rx.try_recv().unwrap();
        assert_eq!(toast.icon, "⭐");
        assert_eq!(toast.duration, Duration::from_secs(5));

        router.route(&announcement_frame()).await;
        let toast = toast_rx.try_recv().unwrap();
        assert_eq!(toast.icon, "📢");
        assert_eq!(toast.duration, Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let (router, _store) = router();
        assert_eq!(router.subscriber_count().await, 0);

        let sub = router
            .subscribe(SubscriberFilter::All, Arc::new(|_| {}))
            .await;
        assert_eq!(router.subscriber_count().await, 1);

        router.unsubscribe(&sub).await;
        assert_eq!(router.subscriber_count().await, 0);
    }
}
