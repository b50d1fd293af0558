//! # huddle-server
//!
//! HTTP and WebSocket front end for the Huddle room broadcast hub.
//!
//! Routes:
//!
//! - `POST /ws/create-room` - create a room (idempotent per id)
//! - `GET /ws/rooms` - list rooms
//! - `GET /ws/clients/{roomId}` - list a room's members
//! - `GET /ws/join/{roomId}?userId=..&username=..` - join a room over WebSocket
//! - `GET /health` - liveness and counts

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;

pub use crate::config::Config;
pub use crate::error::ApiError;
pub use crate::handlers::{app, run_server, AppState};
