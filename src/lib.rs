//! # Folio Live
//!
//! Real-time client for the student portfolio platform — WebSocket
//! connection lifecycle, authentication handshake, keep-alive, reconnection
//! with bounded exponential backoff, message routing and notification
//! aggregation.
//!
//! ## Modules
//!
//! - [`connection`]: Lifecycle state machine, heartbeat and reconnect policy
//! - [`protocol`]: Wire frame types and classification
//! - [`router`]: Inbound frame fan-out to typed subscribers
//! - [`notifications`]: Unread notification aggregation
//! - [`transport`]: Channel abstraction over `tokio-tungstenite`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folio_live::{LiveClient, LiveConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = LiveClient::new(LiveConfig::load_default());
//!
//!     // React to incoming notifications
//!     client
//!         .router()
//!         .subscribe_notifications(|notif| {
//!             println!("{}: {}", notif.title, notif.message);
//!         })
//!         .await;
//!
//!     // Open the connection; state changes arrive through the watch
//!     client.connect("session-token");
//!
//!     let mut state = client.watch_state();
//!     while state.changed().await.is_ok() {
//!         println!("connection: {}", *state.borrow());
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod notifications;
pub mod protocol;
pub mod router;
pub mod transport;

// Re-export top-level types for convenience
pub use config::{ConfigError, LiveConfig};

pub use connection::{ConnectionError, ConnectionState, LiveClient, ReconnectPolicy};

pub use notifications::{NotificationRecord, NotificationStore};

pub use protocol::{
    Announcement, FrameError, FrameKind, InboundFrame, Notification, OutboundFrame,
    MAX_FRAME_BYTES,
};

pub use router::{MessageRouter, SubscriberFilter, Subscription, ToastEvent};

pub use transport::{Connector, Transport, TransportError, TransportEvent};
