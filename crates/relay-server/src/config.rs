//! Configuration for the relay server.
//!
//! Two knobs only, both taken from the command line with an
//! environment fallback:
//!
//! - `port`        (`RELAY_PORT`)
//! - `max_clients` (`RELAY_MAX_CLIENTS`)
//!
//! The listen address is always the loopback interface.

use std::net::{Ipv4Addr, SocketAddr};

use clap::Parser;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP port to listen on. `0` lets the OS pick one.
    pub port: u16,

    /// Maximum number of simultaneously admitted clients.
    pub max_clients: usize,
}

impl Config {
    pub fn new(port: u16, max_clients: usize) -> Self {
        Config { port, max_clients }
    }

    /// Loopback socket address for `port`.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

#[derive(Debug, Parser)]
#[command(name = "relay-server")]
#[command(about = "Real-time WebSocket message relay")]
pub struct Cli {
    /// The port the server should listen to.
    #[arg(env = "RELAY_PORT")]
    pub port: u16,

    /// The number of concurrent connections permissible.
    #[arg(env = "RELAY_MAX_CLIENTS")]
    pub max_clients: usize,

    /// Enable debug logging (ignored when RUST_LOG is set)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config::new(self.port, self.max_clients)
    }
}
