//! Channel Transport
//!
//! Minimal abstraction over the bidirectional channel so the connection
//! manager never touches a concrete socket API. The production
//! implementation speaks WebSocket via `tokio-tungstenite`; tests plug in
//! a channel-backed fake.

mod websocket;

pub use websocket::WsConnector;

use async_trait::async_trait;

/// Events surfaced by an open transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// One complete text frame from the server
    Message(String),
    /// The peer closed the channel
    Closed,
    /// The channel failed
    Error(String),
}

/// An open bidirectional channel
///
/// The connection manager is the only component allowed to hold one, and
/// it holds at most one at a time.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next transport event; `None` once the stream is done
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close the channel; safe to call more than once
    async fn close(&mut self);
}

/// Opens transports; the seam that lets tests run without a network
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a channel to the given endpoint URL
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// Errors raised by the transport layer
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Channel failure: {0}")]
    Failed(String),

    #[error("Transport closed")]
    Closed,
}

/// Derive the channel endpoint from the base API origin
///
/// Translates the scheme (`http` → `ws`, `https` → `wss`) and appends the
/// fixed `/ws` path, mirroring how the web client builds its URL.
pub fn ws_endpoint(api_url: &str) -> String {
    let origin = api_url.trim_end_matches('/');
    let origin = if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        origin.to_string()
    };
    format!("{}/ws", origin)
}
