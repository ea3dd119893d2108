//! Wire Protocol
//!
//! Frame types exchanged over the persistent channel between the Folio
//! client and server. Every frame is a single JSON text message tagged
//! with a `type` field.

mod messages;

pub use messages::{
    Announcement, FrameError, FrameKind, InboundFrame, Notification, OutboundFrame,
    MAX_FRAME_BYTES,
};
