//! In-memory transport.
//!
//! Pairs a [`MemorySink`] and [`MemorySource`] with a [`RemotePeer`] that
//! plays the other end of the connection. Useful for exercising client
//! actors without a network.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::traits::{FrameSink, FrameSource, Inbound, TransportError};

/// A frame written by the local side, as observed by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Text payload.
    Text(String),
    /// Keepalive probe.
    Ping,
    /// Close frame.
    Close,
}

/// Create a connected in-memory pair.
///
/// `capacity` bounds the outbound buffer (at least one frame); once the
/// peer stops reading, sends block, which is how a stalled network looks
/// to the writer.
#[must_use]
pub fn pair(capacity: usize) -> (MemorySink, MemorySource, RemotePeer) {
    let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
    let (in_tx, in_rx) = mpsc::channel(capacity.max(16));

    (
        MemorySink {
            tx: out_tx,
            is_open: true,
        },
        MemorySource { rx: in_rx },
        RemotePeer {
            inbound: Some(in_tx),
            outbound: out_rx,
        },
    )
}

/// Outbound half of an in-memory connection.
pub struct MemorySink {
    tx: mpsc::Sender<Outbound>,
    is_open: bool,
}

/// Inbound half of an in-memory connection.
pub struct MemorySource {
    rx: mpsc::Receiver<Result<Inbound, TransportError>>,
}

/// The far end of an in-memory connection.
pub struct RemotePeer {
    inbound: Option<mpsc::Sender<Result<Inbound, TransportError>>>,
    outbound: mpsc::Receiver<Outbound>,
}

impl MemorySink {
    async fn push(&mut self, frame: Outbound) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.push(Outbound::Text(text)).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.push(Outbound::Ping).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;
        // Waits for buffer space like any other frame; a departed peer
        // never sees it.
        let _ = self.tx.send(Outbound::Close).await;
        Ok(())
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        self.rx.recv().await.transpose()
    }
}

impl RemotePeer {
    async fn push(&self, item: Result<Inbound, TransportError>) -> Result<(), TransportError> {
        match &self.inbound {
            Some(tx) => tx
                .send(item)
                .await
                .map_err(|_| TransportError::ConnectionClosed),
            None => Err(TransportError::ConnectionClosed),
        }
    }

    /// Send a text frame to the local side.
    ///
    /// # Errors
    ///
    /// Returns an error if the local side is gone or the peer hung up.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.push(Ok(Inbound::Text(text.into()))).await
    }

    /// Send a binary frame to the local side.
    ///
    /// # Errors
    ///
    /// Returns an error if the local side is gone or the peer hung up.
    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.push(Ok(Inbound::Binary(data))).await
    }

    /// Acknowledge a keepalive probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the local side is gone or the peer hung up.
    pub async fn send_pong(&self) -> Result<(), TransportError> {
        self.push(Ok(Inbound::Pong)).await
    }

    /// Make the local side's next read fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the local side is gone or the peer hung up.
    pub async fn fail(&self, reason: impl Into<String>) -> Result<(), TransportError> {
        self.push(Err(TransportError::ReceiveFailed(reason.into())))
            .await
    }

    /// Close the peer's sending direction; the local reader sees a clean close.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Wait for the next frame written by the local side.
    ///
    /// Returns `None` once the local sink has been dropped.
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Take the next frame written by the local side, if one is buffered.
    pub fn try_next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.try_recv().ok()
    }

    /// Wait for the next text frame, skipping keepalive probes.
    ///
    /// Returns `None` if a close frame arrives or the sink is dropped first.
    pub async fn next_text(&mut self) -> Option<String> {
        loop {
            match self.outbound.recv().await? {
                Outbound::Text(text) => return Some(text),
                Outbound::Ping => continue,
                Outbound::Close => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_directions() {
        let (mut sink, mut source, mut peer) = pair(8);

        peer.send_text("hello").await.unwrap();
        assert_eq!(
            source.recv().await.unwrap(),
            Some(Inbound::Text("hello".into()))
        );

        sink.send_text("world".into()).await.unwrap();
        sink.ping().await.unwrap();
        assert_eq!(peer.next_outbound().await, Some(Outbound::Text("world".into())));
        assert_eq!(peer.next_outbound().await, Some(Outbound::Ping));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut sink, _source, mut peer) = pair(8);

        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(peer.next_outbound().await, Some(Outbound::Close));
        assert!(peer.try_next_outbound().is_none());
        assert!(matches!(
            sink.send_text("late".into()).await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one_frame() {
        let (mut sink, _source, mut peer) = pair(0);

        sink.send_text("only".into()).await.unwrap();
        assert_eq!(peer.try_next_outbound(), Some(Outbound::Text("only".into())));
    }

    #[tokio::test]
    async fn test_hang_up_and_failure() {
        let (_sink, mut source, mut peer) = pair(8);

        peer.fail("reset by peer").await.unwrap();
        assert!(matches!(
            source.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));

        peer.hang_up();
        assert_eq!(source.recv().await.unwrap(), None);
        assert!(peer.send_text("after hang up").await.is_err());
    }

    #[tokio::test]
    async fn test_next_text_skips_pings() {
        let (mut sink, _source, mut peer) = pair(8);

        sink.ping().await.unwrap();
        sink.send_text("payload".into()).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(peer.next_text().await.as_deref(), Some("payload"));
        assert_eq!(peer.next_text().await, None);
    }
}
