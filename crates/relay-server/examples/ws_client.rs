use std::env;
use std::error::Error;

use futures::{SinkExt, Stream, StreamExt};
use relay_core::{ClientRequest, HelloStatus, ServerEvent};
use relay_protocol::{decode_event, encode_request};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Where to connect and who we are: env override or default.
    let addr = env::var("RELAY_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:8765".to_string());
    let name = env::args().nth(1).unwrap_or_else(|| "anonymous".to_string());

    println!("Connecting to ws://{}...", addr);
    let (ws, _) = connect_async(format!("ws://{}", addr)).await?;
    let (mut sink, mut source) = ws.split();

    // HELLO gate.
    match next_event(&mut source).await {
        Some(ServerEvent::Hello(HelloStatus::Allowed)) => {}
        Some(ServerEvent::Hello(HelloStatus::Disallowed)) => {
            println!("Server is full, try again later.");
            return Ok(());
        }
        other => {
            println!("Unexpected greeting: {:?}", other);
            return Ok(());
        }
    }

    let hello = encode_request(&ClientRequest::Hello { name: name.clone() })?;
    sink.send(Message::text(hello)).await?;

    match next_event(&mut source).await {
        Some(ServerEvent::IdAssign(id)) => println!("Joined as {} (id {}).", name, id),
        other => {
            println!("Handshake failed: {:?}", other);
            return Ok(());
        }
    }
    println!("Type a message and press enter. Type 'quit' or 'exit' to leave.\n");

    // Printer task: everything the relay broadcasts.
    let printer = tokio::spawn(async move {
        while let Some(event) = next_event(&mut source).await {
            match event {
                ServerEvent::NewMember(member) => println!("* {} joined", member.name),
                ServerEvent::NewMessage { from, content } => println!("<{}> {}", from.name, content),
                other => println!("? {:?}", other),
            }
        }
        println!("\nConnection closed by server.");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            println!("Exiting client.");
            break;
        }

        let req = encode_request(&ClientRequest::CreateMessage {
            content: trimmed.to_string(),
        })?;
        if sink.send(Message::text(req)).await.is_err() {
            break;
        }
    }

    let _ = sink.close().await;
    printer.abort();
    Ok(())
}

/// Next decodable event, skipping control frames and junk.
async fn next_event<S>(source: &mut S) -> Option<ServerEvent>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode_event(text.as_str()) {
                Ok(event) => return Some(event),
                Err(e) => eprintln!("undecodable frame: {}", e),
            },
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}
