// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the rb-relay binary.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Helper to spawn a relay process and clean it up on drop.
struct RelayProcess {
    child: Child,
    port: u16,
}

impl RelayProcess {
    fn spawn(extra_args: &[&str]) -> Self {
        // Use a port range that's less likely to conflict
        let port = 50152 + (std::process::id() % 1000) as u16 + extra_args.len() as u16;

        let child = Command::new(env!("CARGO_BIN_EXE_rb-relay"))
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .args(extra_args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn relay process");

        RelayProcess { child, port }
    }

    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    async fn connect(
        &self,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        // CI runners can be slow, so we use generous timeouts
        for _ in 0..20 {
            if let Ok(Ok((stream, _))) =
                tokio::time::timeout(Duration::from_millis(500), connect_async(&self.ws_url()))
                    .await
            {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        panic!("should connect to relay within retries");
    }
}

impl Drop for RelayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

async fn next_text<S>(stream: &mut S) -> String
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text.to_string(),
        other => panic!("Expected text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_relay_lifecycle() {
    let relay = RelayProcess::spawn(&[]);
    let (mut sink, mut stream) = relay.connect().await.split();

    let frames = [
        serde_json::json!({"type": "hello", "client_id": "it"}),
        serde_json::json!({"type": "subscribe", "topic": "home/lamp1/state"}),
        serde_json::json!({"type": "publish", "topic": "home/lamp1/state", "payload": "on"}),
    ];
    for frame in frames {
        sink.send(Message::Text(frame.to_string().into()))
            .await
            .expect("send frame");
    }

    assert_eq!(next_text(&mut stream).await, r#"{"type":"welcome"}"#);
    assert_eq!(
        next_text(&mut stream).await,
        r#"{"type":"message","topic":"home/lamp1/state","payload":"on"}"#
    );
}

#[tokio::test]
async fn test_relay_requires_credentials_when_configured() {
    let relay = RelayProcess::spawn(&["--username", "bridge", "--password", "secret"]);
    let (mut sink, mut stream) = relay.connect().await.split();

    let hello = serde_json::json!({"type": "hello", "client_id": "it"});
    sink.send(Message::Text(hello.to_string().into()))
        .await
        .expect("send hello");

    let text = next_text(&mut stream).await;
    assert!(text.contains("bad credentials"), "got: {}", text);
}
