//! Notification Aggregation
//!
//! In-memory store of received notifications for UI consumers: newest-first
//! list plus an unread counter that can never drift from the list. Cleared
//! on logout; nothing is persisted.

mod store;

pub use store::{NotificationRecord, NotificationStore};
