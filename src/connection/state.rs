//! Connection state machine
//!
//! `Idle → Connecting → Authenticating → Connected → (Reconnecting | Closed)`.
//! The state value is owned exclusively by the connection manager task;
//! consumers observe it through a watch channel.

use std::fmt;

/// Lifecycle state of the real-time connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, none scheduled
    Idle,
    /// Transport handshake in progress
    Connecting,
    /// Transport open, waiting for the server's auth acknowledgment
    Authenticating,
    /// Authenticated and live
    Connected,
    /// Waiting out a backoff delay before the next attempt
    Reconnecting,
    /// Terminal: explicit disconnect, fatal auth rejection, or attempts exhausted
    Closed,
}

impl ConnectionState {
    /// Whether a `connect` request is legal from this state
    ///
    /// A connect while `Connecting`/`Authenticating`/`Connected` is a logged
    /// no-op; this guards the single-live-transport invariant. `Closed` is
    /// allowed so a caller can retry with fresh credentials.
    pub fn accepts_connect(&self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Reconnecting | ConnectionState::Closed
        )
    }

    /// Whether the connection is live and authenticated
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}
