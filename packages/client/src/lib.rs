//! Terminal chat client for ChatterX.
//!
//! The client registers a username over HTTP, opens one Socket.IO connection,
//! and keeps an ordered message log, the online roster, and a typing indicator
//! in sync with the events the server pushes.
//!
//! A second, legacy mode speaks bare JSON frames over a raw WebSocket.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod dto;
pub mod error;
pub mod formatter;
pub mod legacy;
pub mod session;
pub mod transport;
pub mod typing;
mod ui;

pub use config::ClientConfig;
pub use controller::ChatClient;
pub use error::ClientError;
pub use session::run_client;
