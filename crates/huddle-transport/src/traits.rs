//! Transport abstraction traits.
//!
//! Connections are consumed as a split pair so the reader and writer
//! halves can run in separate tasks without sharing a lock.

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// A frame received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Keepalive probe from the peer.
    Ping,
    /// Keepalive acknowledgment from the peer.
    Pong,
}

/// The inbound half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the next frame.
    ///
    /// Returns `None` once the peer has closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;
}

/// The outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a keepalive probe.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Send a close frame and shut the outbound half down.
    ///
    /// Calling this more than once is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;
}
