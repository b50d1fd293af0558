//! # huddle-transport
//!
//! Transport abstraction for Huddle client connections.
//!
//! A client actor drives two independent halves of one duplex connection:
//!
//! - **FrameSource** - inbound frames, read by the reader loop
//! - **FrameSink** - outbound frames, written by the writer loop
//!
//! Implementations:
//!
//! - **websocket** - axum WebSocket connections (default feature)
//! - **memory** - in-process channel pairs for tests and benchmarks
//!
//! ```rust,ignore
//! use huddle_transport::{FrameSource, Inbound};
//!
//! async fn drain(mut source: impl FrameSource) {
//!     while let Ok(Some(frame)) = source.recv().await {
//!         // Process frame
//!     }
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use traits::{FrameSink, FrameSource, Inbound, TransportError};
