//! Shared types for the relay server.
//!
//! This module defines:
//! - WebSocket stream aliases
//! - `Client`: an admitted peer and the write half of its connection

use std::fmt;
use std::net::SocketAddr;

use futures::stream::{SplitSink, SplitStream};
use futures::SinkExt;
use relay_core::{ClientId, Member};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

pub type WsStream = WebSocketStream<TcpStream>;
pub type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = SplitStream<WsStream>;

/// An admitted, connected peer.
///
/// Owns the write half of its WebSocket for its whole lifetime; the
/// read half stays with the connection task. The sink sits behind its
/// own mutex, so concurrent broadcasts only serialize per peer.
pub struct Client {
    member: Member,
    peer: SocketAddr,
    sink: Mutex<WsSink>,
}

impl Client {
    pub fn new(member: Member, peer: SocketAddr, sink: WsSink) -> Self {
        Client {
            member,
            peer,
            sink: Mutex::new(sink),
        }
    }

    pub fn id(&self) -> ClientId {
        self.member.id
    }

    pub fn name(&self) -> &str {
        &self.member.name
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Hand one frame to the transport.
    pub async fn send(&self, frame: Message) -> Result<(), tungstenite::Error> {
        let mut sink = self.sink.lock().await;
        sink.send(frame).await
    }

    /// Send a close frame.
    pub async fn close(&self) -> Result<(), tungstenite::Error> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.member.id)
            .field("name", &self.member.name)
            .field("peer", &self.peer)
            .finish()
    }
}
