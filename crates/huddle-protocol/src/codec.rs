//! JSON codec for message frames.
//!
//! Frames are sent as WebSocket text messages containing a single JSON
//! object. Inbound frames from participants are raw text and are limited
//! separately by the connection's read limit.

use thiserror::Error;

use crate::message::Message;

/// Maximum encoded size of an outbound frame (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Default limit for a single inbound frame, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds the allowed size.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Allowed size in bytes.
        max: usize,
    },

    /// Frame is not valid UTF-8.
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message to its JSON text form.
///
/// # Errors
///
/// Returns an error if serialization fails or the frame exceeds
/// [`MAX_FRAME_SIZE`].
pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(message)?;

    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    Ok(text)
}

/// Decode a message from its JSON text form.
///
/// # Errors
///
/// Returns an error if the frame is too large or is not a valid message.
pub fn decode(text: &str) -> Result<Message, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    Ok(serde_json::from_str(text)?)
}

/// Turn raw inbound bytes into message content, enforcing a size limit.
///
/// # Errors
///
/// Returns an error if the payload exceeds `max` bytes or is not UTF-8.
pub fn inbound_content(payload: Vec<u8>, max: usize) -> Result<String, ProtocolError> {
    if payload.len() > max {
        return Err(ProtocolError::FrameTooLarge {
            size: payload.len(),
            max,
        });
    }

    String::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)
}
