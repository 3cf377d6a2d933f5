// crates/relay-server/tests/relay_scenarios.rs
//
// End-to-end scenarios over real loopback WebSockets.
//
// Known gap, on purpose: there is no departure event. Remaining clients
// only notice a peer has left because it stops receiving broadcasts, so
// none of these tests expect a "left" message.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_core::{ClientId, ClientRequest, HelloStatus, Member, ServerEvent};
use relay_protocol::{decode_event, encode_request};
use relay_server::{Config, RelayError, Server, SharedRegistry};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

struct TestServer {
    addr: SocketAddr,
    registry: SharedRegistry,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), RelayError>>,
}

impl TestServer {
    async fn start(max_clients: usize) -> Self {
        let server = Server::bind(Config::new(0, max_clients)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_until(async move {
            let _ = rx.await;
        }));

        TestServer {
            addr,
            registry,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(STEP, self.handle)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }

    async fn wait_for_members(&self, n: usize) {
        timeout(STEP, async {
            while self.registry.len().await != n {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("registry never reached {n} members"));
    }
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

async fn send_text(ws: &mut Ws, text: &str) {
    ws.send(Message::text(text.to_string())).await.unwrap();
}

async fn send_request(ws: &mut Ws, req: ClientRequest) {
    let text = encode_request(&req).unwrap();
    send_text(ws, &text).await;
}

/// Next server event, skipping control frames.
async fn next_event(ws: &mut Ws) -> ServerEvent {
    timeout(STEP, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return decode_event(text.as_str()).unwrap(),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for an event")
}

async fn assert_quiet(ws: &mut Ws) {
    if let Ok(frame) = timeout(QUIET, ws.next()).await {
        panic!("expected silence, got {frame:?}");
    }
}

async fn assert_closed(ws: &mut Ws) {
    let closed = timeout(STEP, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(other)) => panic!("expected close, got {other:?}"),
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection was not closed");
}

/// Full handshake; returns the socket and the member the server announced.
async fn join(addr: SocketAddr, name: &str) -> (Ws, Member) {
    let mut ws = connect(addr).await;
    assert_eq!(next_event(&mut ws).await, ServerEvent::Hello(HelloStatus::Allowed));

    send_request(&mut ws, ClientRequest::Hello { name: name.into() }).await;

    let id = match next_event(&mut ws).await {
        ServerEvent::IdAssign(id) => id,
        other => panic!("expected ID_ASSIGN, got {other:?}"),
    };
    let me = Member::new(id, name);
    assert_eq!(next_event(&mut ws).await, ServerEvent::NewMember(me.clone()));

    (ws, me)
}

#[tokio::test]
async fn capacity_two_admits_alice_and_bob_then_refuses() {
    let server = TestServer::start(2).await;

    let (mut alice_ws, alice) = join(server.addr, "alice").await;
    let (mut bob_ws, bob) = join(server.addr, "bob").await;
    assert_ne!(alice.id, bob.id);

    // Alice was registered when bob arrived, so she sees him too.
    assert_eq!(next_event(&mut alice_ws).await, ServerEvent::NewMember(bob.clone()));

    let mut carol_ws = connect(server.addr).await;
    assert_eq!(next_event(&mut carol_ws).await, ServerEvent::Hello(HelloStatus::Disallowed));
    assert_closed(&mut carol_ws).await;

    assert_eq!(server.registry.len().await, 2);
    assert_eq!(server.registry.reserved().await, 0);
    assert_quiet(&mut alice_ws).await;
    assert_quiet(&mut bob_ws).await;

    server.stop().await;
}

#[tokio::test]
async fn create_message_reaches_everyone_including_sender() {
    let server = TestServer::start(2).await;
    let (mut alice_ws, alice) = join(server.addr, "alice").await;
    let (mut bob_ws, _bob) = join(server.addr, "bob").await;
    next_event(&mut alice_ws).await; // NEW_MEMBER bob

    send_request(&mut alice_ws, ClientRequest::CreateMessage { content: "hi".into() }).await;

    let expected = ServerEvent::new_message(alice.clone(), "hi");
    assert_eq!(next_event(&mut alice_ws).await, expected);
    assert_eq!(next_event(&mut bob_ws).await, expected);

    server.stop().await;
}

#[tokio::test]
async fn message_content_is_relayed_unchanged() {
    let server = TestServer::start(1).await;
    let (mut ws, me) = join(server.addr, "ünï \"quoted\" name").await;

    let content = "line one\nline two\t{\"not\": \"parsed\"} 🚀";
    send_request(&mut ws, ClientRequest::CreateMessage { content: content.into() }).await;

    match next_event(&mut ws).await {
        ServerEvent::NewMessage { from, content: got } => {
            assert_eq!(from, me);
            assert_eq!(got, content);
        }
        other => panic!("expected NEW_MESSAGE, got {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn junk_frames_are_dropped_and_connection_stays_open() {
    let server = TestServer::start(2).await;
    let (mut alice_ws, alice) = join(server.addr, "alice").await;
    let (mut bob_ws, _bob) = join(server.addr, "bob").await;
    next_event(&mut alice_ws).await; // NEW_MEMBER bob

    send_text(&mut alice_ws, "this is not json").await;
    send_text(&mut alice_ws, r#"{"op":"DANCE","message":"now"}"#).await;
    send_text(&mut alice_ws, r#"{"op":"CREATE_MESSAGE","message":{"text":"hi"}}"#).await;
    send_text(&mut alice_ws, r#"{"op":"CREATE_MESSAGE"}"#).await;
    alice_ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();

    assert_quiet(&mut bob_ws).await;
    assert_quiet(&mut alice_ws).await;
    assert_eq!(server.registry.len().await, 2);

    // Alice is still connected and routed normally.
    send_request(&mut alice_ws, ClientRequest::CreateMessage { content: "after".into() }).await;
    let expected = ServerEvent::new_message(alice, "after");
    assert_eq!(next_event(&mut bob_ws).await, expected);
    assert_eq!(next_event(&mut alice_ws).await, expected);

    server.stop().await;
}

#[tokio::test]
async fn hello_after_admission_is_ignored() {
    let server = TestServer::start(1).await;
    let (mut ws, me) = join(server.addr, "alice").await;

    send_request(&mut ws, ClientRequest::Hello { name: "renamed".into() }).await;
    assert_quiet(&mut ws).await;

    send_request(&mut ws, ClientRequest::CreateMessage { content: "still alice".into() }).await;
    assert_eq!(next_event(&mut ws).await, ServerEvent::new_message(me, "still alice"));

    server.stop().await;
}

#[tokio::test]
async fn abrupt_disconnect_removes_client() {
    let server = TestServer::start(2).await;
    let (mut alice_ws, alice) = join(server.addr, "alice").await;
    let (bob_ws, bob) = join(server.addr, "bob").await;
    next_event(&mut alice_ws).await; // NEW_MEMBER bob

    // No close handshake: just drop the socket.
    drop(bob_ws);
    server.wait_for_members(1).await;
    assert!(!server.registry.contains(&bob.id).await);
    assert!(server.registry.contains(&alice.id).await);

    send_request(&mut alice_ws, ClientRequest::CreateMessage { content: "anyone?".into() }).await;
    assert_eq!(
        next_event(&mut alice_ws).await,
        ServerEvent::new_message(alice.clone(), "anyone?")
    );

    let recipients = server.registry.snapshot().await;
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].id(), alice.id);

    server.stop().await;
}

#[tokio::test]
async fn freed_slot_can_be_reused() {
    let server = TestServer::start(1).await;

    let (mut alice_ws, _alice) = join(server.addr, "alice").await;
    alice_ws.close(None).await.unwrap();
    server.wait_for_members(0).await;

    let (_bob_ws, bob) = join(server.addr, "bob").await;
    assert_eq!(server.registry.len().await, 1);
    assert!(server.registry.contains(&bob.id).await);

    server.stop().await;
}

#[tokio::test]
async fn wrong_handshake_op_closes_and_releases_slot() {
    let server = TestServer::start(1).await;

    let mut ws = connect(server.addr).await;
    assert_eq!(next_event(&mut ws).await, ServerEvent::Hello(HelloStatus::Allowed));
    send_request(&mut ws, ClientRequest::CreateMessage { content: "let me in".into() }).await;
    assert_closed(&mut ws).await;

    assert!(server.registry.is_empty().await);
    assert_eq!(server.registry.reserved().await, 0);

    // The only slot is free again.
    let (_ws, _member) = join(server.addr, "bob").await;

    server.stop().await;
}

#[tokio::test]
async fn malformed_or_binary_handshake_reply_closes() {
    let server = TestServer::start(1).await;

    let mut ws = connect(server.addr).await;
    next_event(&mut ws).await;
    send_text(&mut ws, "{not json").await;
    assert_closed(&mut ws).await;

    let mut ws = connect(server.addr).await;
    next_event(&mut ws).await;
    ws.send(Message::binary(b"HELLO".to_vec())).await.unwrap();
    assert_closed(&mut ws).await;

    assert!(server.registry.is_empty().await);
    assert_eq!(server.registry.reserved().await, 0);

    server.stop().await;
}

#[tokio::test]
async fn pending_handshake_holds_a_slot() {
    let server = TestServer::start(1).await;

    // Allowed, but never answers.
    let mut silent = connect(server.addr).await;
    assert_eq!(next_event(&mut silent).await, ServerEvent::Hello(HelloStatus::Allowed));

    let mut late = connect(server.addr).await;
    assert_eq!(next_event(&mut late).await, ServerEvent::Hello(HelloStatus::Disallowed));
    assert_closed(&mut late).await;

    assert_eq!(server.registry.reserved().await, 1);
    assert!(server.registry.is_empty().await);

    server.stop().await;
}

#[tokio::test]
async fn concurrent_admissions_never_exceed_capacity() {
    let server = TestServer::start(3).await;
    let addr = server.addr;

    let attempts: Vec<_> = (0..10)
        .map(|i| {
            tokio::spawn(async move {
                let mut ws = connect(addr).await;
                match next_event(&mut ws).await {
                    ServerEvent::Hello(HelloStatus::Allowed) => {
                        send_request(&mut ws, ClientRequest::Hello { name: format!("peer-{i}") }).await;
                        match next_event(&mut ws).await {
                            ServerEvent::IdAssign(id) => Some((ws, id)),
                            other => panic!("expected ID_ASSIGN, got {other:?}"),
                        }
                    }
                    ServerEvent::Hello(HelloStatus::Disallowed) => None,
                    other => panic!("expected HELLO, got {other:?}"),
                }
            })
        })
        .collect();

    let mut admitted: Vec<(Ws, ClientId)> = Vec::new();
    for attempt in attempts {
        if let Some(entry) = attempt.await.unwrap() {
            admitted.push(entry);
        }
    }

    assert_eq!(admitted.len(), 3);
    server.wait_for_members(3).await;
    assert_eq!(server.registry.len().await, 3);

    let mut ids: Vec<ClientId> = admitted.iter().map(|(_, id)| *id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_clients_and_clears_registry() {
    let server = TestServer::start(2).await;
    let registry = server.registry.clone();
    let addr = server.addr;

    let (mut alice_ws, _alice) = join(addr, "alice").await;
    server.stop().await;

    assert_closed(&mut alice_ws).await;
    assert!(registry.is_empty().await);
    assert_eq!(registry.reserved().await, 0);

    // Listener is gone.
    assert!(connect_async(format!("ws://{addr}")).await.is_err());
}

#[tokio::test]
async fn shutdown_completes_with_a_peer_that_stopped_reading() {
    let server = TestServer::start(2).await;
    let registry = server.registry.clone();

    let (alice_ws, _alice) = join(server.addr, "alice").await;
    // Admitted, then never reads again; its receive buffer fills up and
    // every send to it eventually blocks.
    let (_stalled_ws, _stalled) = join(server.addr, "stalled").await;
    server.wait_for_members(2).await;

    let (mut alice_tx, mut alice_rx) = alice_ws.split();
    let drain = tokio::spawn(async move { while let Some(Ok(_)) = alice_rx.next().await {} });
    let flood = tokio::spawn(async move {
        let content = "x".repeat(256 * 1024);
        for _ in 0..400 {
            let text = encode_request(&ClientRequest::CreateMessage { content: content.clone() }).unwrap();
            if alice_tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    sleep(Duration::from_millis(500)).await;
    server.stop().await;

    assert!(registry.is_empty().await);
    assert_eq!(registry.reserved().await, 0);

    flood.abort();
    drain.abort();
}
