//! A minimal fake upstream IRC server: accepts one connection, completes
//! registration (`NICK`/`USER` -> `001`), auto-confirms any `JOIN` the way a
//! real server would (so the bridge's own channel table observes its own
//! membership), and exposes the raw lines it receives plus a way to inject
//! scripted lines from "other users" on the channel.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub struct FakeIrcServer {
    pub port: u16,
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

impl FakeIrcServer {
    /// Bind an ephemeral loopback port and spawn the accept/registration
    /// loop in the background.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
        let port = listener.local_addr().expect("local_addr").port();

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            let mut nick = "bridge".to_string();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(rest) = line.strip_prefix("NICK ") {
                    nick = rest.trim().to_string();
                }
                if line.starts_with("USER ") {
                    let _ = write_half
                        .write_all(format!(":fake.test 001 {nick} :Welcome\r\n").as_bytes())
                        .await;
                    break;
                }
            }

            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Ok(Some(line)) = line else { break };
                        if let Some(rest) = line.strip_prefix("JOIN ") {
                            let channel = rest.split_whitespace().next().unwrap_or("").to_string();
                            let confirm = format!(":{nick}!bridge@test JOIN {channel}\r\n");
                            if write_half.write_all(confirm.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        let _ = inbound_tx.send(line);
                    }
                    Some(line) = outbound_rx.recv() => {
                        if write_half.write_all(format!("{line}\r\n").as_bytes()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            port,
            inbound: inbound_rx,
            outbound: outbound_tx,
        }
    }

    /// Inject a raw line as if another connected user sent it.
    pub fn send(&self, line: impl Into<String>) {
        let _ = self.outbound.send(line.into());
    }

    /// Wait (up to `timeout`) for a received line containing `needle`.
    pub async fn recv_matching(&mut self, needle: &str, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match tokio::time::timeout(remaining, self.inbound.recv()).await {
                Ok(Some(line)) if line.contains(needle) => return Some(line),
                Ok(Some(_)) => continue,
                _ => return None,
            }
        }
    }
}
