//! Frame Types
//!
//! Defines the message formats for the real-time channel. Outbound frames
//! form a closed set (auth handshake, keep-alive ping, application sends).
//! Inbound frames keep their `type` as a raw string so that unknown frame
//! types from a newer server never fail to parse on an older client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum accepted size for a single inbound frame.
///
/// Matches the server's read limit; anything larger is dropped before
/// JSON parsing is attempted.
pub const MAX_FRAME_BYTES: usize = 10 * 1024;

/// Frames sent from client to server
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Authentication handshake, sent exactly once per connection
    Auth {
        /// Bearer token for the current session
        token: String,
    },
    /// Keep-alive probe
    Ping,
}

impl OutboundFrame {
    /// Serialize to the wire text representation
    pub fn to_text(&self) -> String {
        // A tagged unit/struct enum over strings cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Build an application frame of an arbitrary type
    ///
    /// Used by `send_message(type, data)`; the handshake and keep-alive
    /// frames go through the typed variants above.
    pub fn custom(kind: &str, data: Value) -> String {
        serde_json::json!({ "type": kind, "data": data }).to_string()
    }
}

/// A single frame received from the server
///
/// The `type` field stays a plain string: classification happens in the
/// router, and unrecognized values are logged and dropped rather than
/// treated as a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// Frame type tag (e.g. "notification", "announcement", "pong")
    #[serde(rename = "type")]
    pub kind: String,

    /// Target user, when the server addressed a single client
    #[serde(default)]
    pub user_id: Option<String>,

    /// Type-specific payload, decoded lazily by the router
    #[serde(default)]
    pub data: Value,

    /// Server-side send time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Client-side receive time
    #[serde(skip, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl InboundFrame {
    /// Parse a raw text frame
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        if text.len() > MAX_FRAME_BYTES {
            return Err(FrameError::TooLarge(text.len()));
        }
        let frame: InboundFrame = serde_json::from_str(text)?;
        Ok(frame)
    }

    /// Classify the frame type against the known set
    pub fn classify(&self) -> FrameKind {
        match self.kind.as_str() {
            "notification" => FrameKind::Notification,
            "announcement" => FrameKind::Announcement,
            "pong" => FrameKind::Pong,
            "auth-ack" => FrameKind::AuthAck,
            "auth-error" => FrameKind::AuthError,
            _ => FrameKind::Unrecognized,
        }
    }
}

/// Classification of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Per-user notification (portfolio rated, new comment, ...)
    Notification,
    /// Platform-wide announcement banner
    Announcement,
    /// Keep-alive acknowledgment
    Pong,
    /// Authentication accepted
    AuthAck,
    /// Authentication explicitly rejected
    AuthError,
    /// Unknown type from a newer server; logged and dropped
    Unrecognized,
}

/// Payload of a `notification` frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,

    /// Notification category (e.g. "rating", "comment")
    #[serde(rename = "type")]
    pub kind: String,

    pub title: String,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Payload of an `announcement` frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub title: String,
    pub message: String,
}

/// Errors raised while decoding an inbound frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame too large: {0} bytes (max {MAX_FRAME_BYTES})")]
    TooLarge(usize),

    #[error("Invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),
}
