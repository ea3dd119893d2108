//! Connection Lifecycle
//!
//! Owns the persistent channel to the Folio server: state machine,
//! authentication handshake, keep-alive heartbeat and bounded reconnection.
//!
//! ## Architecture
//!
//! - **ConnectionManager**: actor task that exclusively owns the transport
//!   handle and the state value
//! - **LiveClient**: consumer-facing handle (connect, disconnect, send,
//!   reconnect, connectivity observation)
//! - **ReconnectPolicy**: pure backoff computation, no side effects
//! - **Heartbeat**: periodic ping loop with stale-connection detection

mod error;
mod heartbeat;
mod manager;
mod reconnect;
mod state;

pub use error::ConnectionError;
pub use manager::LiveClient;
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;
