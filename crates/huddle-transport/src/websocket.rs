//! WebSocket transport backed by axum.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, trace, warn};

use crate::traits::{FrameSink, FrameSource, Inbound, TransportError};

/// Split an upgraded WebSocket into its outbound and inbound halves.
#[must_use]
pub fn split(socket: WebSocket) -> (WebSocketSink, WebSocketSource) {
    let (sink, stream) = socket.split();
    (
        WebSocketSink {
            inner: sink,
            is_open: true,
        },
        WebSocketSource { inner: stream },
    )
}

/// Outbound half of a WebSocket connection.
pub struct WebSocketSink {
    inner: SplitSink<WebSocket, Message>,
    is_open: bool,
}

/// Inbound half of a WebSocket connection.
pub struct WebSocketSource {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }

        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }

        trace!("Sending ping");
        self.inner
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Ok(()); // Already closed
        }
        self.is_open = false;

        if let Err(e) = self.inner.send(Message::Close(None)).await {
            debug!(error = %e, "Failed to send close frame");
        }
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
    }
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        match self.inner.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(Inbound::Text(text))),
            Some(Ok(Message::Binary(data))) => Ok(Some(Inbound::Binary(data))),
            // axum queues the pong reply for us
            Some(Ok(Message::Ping(_))) => Ok(Some(Inbound::Ping)),
            Some(Ok(Message::Pong(_))) => Ok(Some(Inbound::Pong)),
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Received close frame");
                Ok(None)
            }
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket error");
                Err(TransportError::ReceiveFailed(e.to_string()))
            }
            None => {
                debug!("WebSocket stream ended");
                Ok(None)
            }
        }
    }
}
