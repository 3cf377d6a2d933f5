//! relay-server
//!
//! Multi-client WebSocket server for the message relay.

pub mod config;
pub mod error;
pub mod types;
pub mod registry;
pub mod broadcast;
pub mod handshake;
pub mod router;
pub mod server;

// internal module, not re-exported
mod client;

pub use config::{Cli, Config};
pub use error::RelayError;
pub use registry::SharedRegistry;
pub use server::{run, Server};
