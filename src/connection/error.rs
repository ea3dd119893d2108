//! Connection error taxonomy
//!
//! Splits failures into transient ones (reconnect with backoff) and fatal
//! ones (terminal `Closed`, caller must act).

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that take the connection down
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Transport-level failure (network drop, server restart); recoverable
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No pong within the staleness window; treated like a transport error
    #[error("Connection stale: no pong within the liveness window")]
    Stale,

    /// The auth handshake never got acknowledged; recoverable
    #[error("Authentication timed out")]
    AuthTimeout,

    /// The server explicitly rejected the credentials; fatal, no retry
    #[error("Authentication rejected by server")]
    AuthRejected,
}

impl ConnectionError {
    /// Whether this failure should go through the reconnect path
    ///
    /// Retrying a token the server already rejected is not a transient
    /// condition; everything else is.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ConnectionError::AuthRejected)
    }
}
