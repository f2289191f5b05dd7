//! Interactive chat session on stdin/stdout.

use chrono::Local;
use raiderhub_core::{Message, RaiderClient, ServerEvent, UserRef};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Handle socket events until the first presence snapshot lands (or a short
/// grace period passes).
pub async fn await_presence(client: &mut RaiderClient, events: &mut mpsc::UnboundedReceiver<ServerEvent>) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);

    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        let snapshot = matches!(event, ServerEvent::OnlineUsers(_));
        client.handle_event(event).await;
        if snapshot {
            break;
        }
    }
}

pub async fn run(client: &mut RaiderClient, peer: UserRef, show_timestamps: bool) -> anyhow::Result<()> {
    let mut events = client.connect()?;

    if let Err(e) = client.reload_conversations().await {
        tracing::warn!(error = %e, "Could not load conversations");
    }
    client.open_conversation(peer.clone()).await?;

    println!("Chatting with {} - type /quit to leave", peer.username);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0;
    let mut peer_typing = false;

    loop {
        printed = render(client, &peer, printed, show_timestamps);

        let typing = client
            .store()
            .open_conversation()
            .is_some_and(|o| o.is_peer_typing());
        if typing && !peer_typing {
            println!("  {} is typing...", peer.username);
        }
        peer_typing = typing;

        for notice in client.drain_notices() {
            eprintln!("! {}", notice.message);
        }

        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) => {
                    if let Err(e) = client.send_message(&line).await {
                        eprintln!("! Message not sent: {}", e);
                    }
                }
                None => break,
            },
            Some(event) = events.recv() => {
                client.handle_event(event).await;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.close_conversation().await?;
    client.disconnect();
    Ok(())
}

fn render(client: &RaiderClient, peer: &UserRef, printed: usize, show_timestamps: bool) -> usize {
    let Some(open) = client.store().open_conversation() else {
        return printed;
    };
    let messages = open.messages();

    for msg in messages.iter().skip(printed) {
        println!("{}", format_line(msg, peer, show_timestamps));
    }
    messages.len()
}

fn format_line(msg: &Message, peer: &UserRef, show_timestamps: bool) -> String {
    let who = if msg.is_own { "You" } else { peer.username.as_str() };
    let read = if msg.is_own && msg.read { " ✓" } else { "" };

    if show_timestamps {
        let time = msg.created_at.with_timezone(&Local).format("%H:%M");
        format!("[{}] {}: {}{}", time, who, msg.content, read)
    } else {
        format!("{}: {}{}", who, msg.content, read)
    }
}
