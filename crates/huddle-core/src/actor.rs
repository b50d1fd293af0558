//! Client actor: one reader loop and one writer loop per connection.
//!
//! The writer drains the client's mailbox onto the wire and sends periodic
//! keepalive probes. The reader turns inbound frames into room broadcasts.
//! Whichever way the connection ends, the actor unregisters from the hub
//! exactly once before returning.

use huddle_protocol::{codec, Message, ProtocolError};
use huddle_transport::{FrameSink, FrameSource, Inbound, TransportError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::client::{ClientHandle, ClientInfo, ClientState, Mailbox};
use crate::hub::{Admission, HubError, HubHandle};

/// Per-connection limits and timers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Mailbox capacity; a member whose mailbox is full is evicted.
    pub mailbox_capacity: usize,
    /// Deadline for a single outbound write.
    pub write_wait: Duration,
    /// How long the reader waits for any inbound frame.
    pub pong_wait: Duration,
    /// Keepalive interval. Must be shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            mailbox_capacity: 10,
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_message_size: huddle_protocol::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// How a client's session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The hub did not admit the client.
    Rejected(Admission),
    /// The hub was not running.
    HubClosed,
    /// The connection ended and the client unregistered.
    Left,
    /// The hub evicted the client for falling behind.
    Evicted,
}

impl Departure {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Departure::Rejected(Admission::RoomNotFound) => "room_not_found",
            Departure::Rejected(_) => "duplicate",
            Departure::HubClosed => "hub_closed",
            Departure::Left => "left",
            Departure::Evicted => "evicted",
        }
    }

    /// Whether the session ended without ever being admitted.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Departure::Rejected(_) | Departure::HubClosed)
    }
}

/// Why the reader loop stopped.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Nothing arrived within the idle deadline.
    #[error("No frame received within {0:?}")]
    Timeout(Duration),

    /// Oversized or malformed frame.
    #[error("Malformed frame: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The hub stopped accepting broadcasts.
    #[error(transparent)]
    Hub(#[from] HubError),
}

/// Drives a single participant's connection.
pub struct ClientActor {
    info: Arc<ClientInfo>,
    config: ClientConfig,
}

impl ClientActor {
    #[must_use]
    pub fn new(info: ClientInfo, config: ClientConfig) -> Self {
        Self {
            info: Arc::new(info),
            config,
        }
    }

    /// Register with the hub and run both loops until the connection ends.
    pub async fn run<W, R>(self, hub: HubHandle, mut sink: W, mut source: R) -> Departure
    where
        W: FrameSink + 'static,
        R: FrameSource,
    {
        let info = self.info;
        let config = self.config;

        let (handle, mailbox) = ClientHandle::from_shared(Arc::clone(&info), config.mailbox_capacity);
        let lifecycle = handle.lifecycle().clone();

        let departure = match hub.register(handle).await {
            Ok(Admission::Admitted) => None,
            Ok(rejected) => Some(Departure::Rejected(rejected)),
            Err(e) => {
                warn!(client = %info.id, error = %e, "Registration failed");
                Some(Departure::HubClosed)
            }
        };
        if let Some(departure) = departure {
            debug!(client = %info.id, room = %info.room_id, reason = departure.as_str(), "Client not admitted");
            lifecycle.close();
            let _ = timeout(config.write_wait, sink.close()).await;
            return departure;
        }

        debug!(client = %info.id, room = %info.room_id, connection = %info.connection, "Client running");

        let (stop, stopped) = oneshot::channel();
        let mut writer = tokio::spawn(write_loop(
            sink,
            mailbox,
            stopped,
            config.clone(),
            Arc::clone(&info),
        ));
        let mut writer_finished = false;

        tokio::select! {
            result = read_loop(&hub, &mut source, &info, &config) => match result {
                Ok(()) => debug!(client = %info.id, "Peer closed connection"),
                Err(e) => debug!(client = %info.id, error = %e, "Reader stopped"),
            },
            joined = &mut writer => {
                writer_finished = true;
                if let Err(e) = joined {
                    warn!(client = %info.id, error = %e, "Writer task failed");
                }
                debug!(client = %info.id, "Writer stopped; ending reader");
            }
        }

        // The peer is done; whatever is still queued for it is discarded.
        let _ = stop.send(());

        lifecycle.leave();
        if let Err(e) = hub.unregister(Arc::clone(&info)).await {
            warn!(client = %info.id, error = %e, "Unregister failed");
        }

        if !writer_finished {
            if let Err(e) = writer.await {
                warn!(client = %info.id, error = %e, "Writer task failed");
            }
        }

        let departure = match lifecycle.close() {
            ClientState::Evicted => Departure::Evicted,
            _ => Departure::Left,
        };
        info!(client = %info.id, room = %info.room_id, reason = departure.as_str(), "Client disconnected");
        departure
    }
}

async fn read_loop<R: FrameSource>(
    hub: &HubHandle,
    source: &mut R,
    info: &ClientInfo,
    config: &ClientConfig,
) -> Result<(), ReadError> {
    loop {
        // Each frame, keepalive acknowledgments included, restarts the deadline.
        let frame = match timeout(config.pong_wait, source.recv()).await {
            Ok(frame) => frame?,
            Err(_) => return Err(ReadError::Timeout(config.pong_wait)),
        };

        let content = match frame {
            None => return Ok(()),
            Some(Inbound::Ping | Inbound::Pong) => {
                trace!(client = %info.id, "Keepalive");
                continue;
            }
            Some(Inbound::Text(text)) => {
                if text.len() > config.max_message_size {
                    return Err(ProtocolError::FrameTooLarge {
                        size: text.len(),
                        max: config.max_message_size,
                    }
                    .into());
                }
                text
            }
            Some(Inbound::Binary(data)) => codec::inbound_content(data, config.max_message_size)?,
        };

        hub.broadcast(Message::new(
            content,
            info.room_id.clone(),
            info.username.clone(),
        ))
        .await?;
    }
}

async fn write_loop<W: FrameSink>(
    mut sink: W,
    mut mailbox: Mailbox,
    mut stopped: oneshot::Receiver<()>,
    config: ClientConfig,
    info: Arc<ClientInfo>,
) {
    let mut keepalive = interval_at(Instant::now() + config.ping_period, config.ping_period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut stopped => {
                debug!(client = %info.id, "Reader finished; closing");
                break;
            }
            item = mailbox.recv() => {
                let Some(message) = item else {
                    debug!(client = %info.id, "Mailbox closed");
                    break;
                };

                let text = match codec::encode(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(client = %info.id, error = %e, "Dropping unencodable message");
                        continue;
                    }
                };

                match timeout(config.write_wait, sink.send_text(text)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(client = %info.id, error = %e, "Write failed");
                        break;
                    }
                    Err(_) => {
                        warn!(client = %info.id, "Write deadline exceeded");
                        break;
                    }
                }
            }
            _ = keepalive.tick() => {
                match timeout(config.write_wait, sink.ping()).await {
                    Ok(Ok(())) => trace!(client = %info.id, "Sent keepalive"),
                    Ok(Err(e)) => {
                        debug!(client = %info.id, error = %e, "Keepalive failed");
                        break;
                    }
                    Err(_) => {
                        warn!(client = %info.id, "Keepalive deadline exceeded");
                        break;
                    }
                }
            }
        }
    }

    match timeout(config.write_wait, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => trace!(client = %info.id, error = %e, "Close failed"),
        Err(_) => trace!(client = %info.id, "Close deadline exceeded"),
    }
}
