// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, per-connection topic subscriptions, and
//! broadcast fanout of published messages.

use std::collections::HashSet;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use rb_core::protocol::{ClientFrame, RelayFrame};

use crate::state::RelayState;

/// Per-connection protocol state.
#[derive(Debug, Default)]
pub(crate) struct Session {
    /// Set once `hello` was accepted.
    client_id: Option<String>,
    topics: HashSet<String>,
}

impl Session {
    fn wants(&self, topic: &str) -> bool {
        self.client_id.is_some() && self.topics.contains(topic)
    }
}

/// What the connection loop should do after a client frame.
#[derive(Debug, PartialEq)]
pub(crate) enum Reply {
    Nothing,
    Send(RelayFrame),
    /// Send the frame, then close the connection.
    Close(RelayFrame),
}

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state)
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)
}

/// Accepts connections on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    state: RelayState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: RelayState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // Subscribe before reading any frame so nothing published after our
    // own subscribe is missed.
    let mut broadcast_rx = state.subscribe();
    let mut session = Session::default();

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match handle_client_frame(&text, &mut session, &state) {
                            Reply::Nothing => {}
                            Reply::Send(frame) => {
                                ws_sink.send(Message::Text(frame.to_json()?.into())).await?;
                            }
                            Reply::Close(frame) => {
                                ws_sink.send(Message::Text(frame.to_json()?.into())).await?;
                                let _ = ws_sink.close().await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Ignore other message types (Binary, Pong, Frame)
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            broadcast = broadcast_rx.recv() => {
                match broadcast {
                    Ok(published) => {
                        if !session.wants(&published.topic) {
                            continue;
                        }
                        let frame = RelayFrame::message(published.topic, published.payload);
                        if let Err(e) = ws_sink.send(Message::Text(frame.to_json()?.into())).await {
                            warn!("Failed to deliver message to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages", peer_addr, n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    if session.client_id.is_some() {
        state.client_left();
    }
    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process one client frame against the session.
pub(crate) fn handle_client_frame(text: &str, session: &mut Session, state: &RelayState) -> Reply {
    let frame = match ClientFrame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => return Reply::Send(RelayFrame::error(format!("invalid frame: {}", e))),
    };
    debug!("Received frame: {:?}", frame);

    match frame {
        ClientFrame::Hello {
            client_id,
            username,
            password,
        } => {
            if session.client_id.is_some() {
                return Reply::Send(RelayFrame::error("hello already received"));
            }
            if !state.authorize(username.as_deref(), password.as_deref()) {
                warn!("Rejected client {}: bad credentials", client_id);
                return Reply::Close(RelayFrame::error("bad credentials"));
            }
            state.client_joined();
            info!("Client {} connected ({} online)", client_id, state.client_count());
            session.client_id = Some(client_id);
            Reply::Send(RelayFrame::Welcome)
        }

        ClientFrame::Ping { id } => Reply::Send(RelayFrame::pong(id)),

        _ if session.client_id.is_none() => {
            Reply::Close(RelayFrame::error("expected hello first"))
        }

        ClientFrame::Subscribe { topic } => {
            debug!("Subscribe: {}", topic);
            session.topics.insert(topic);
            Reply::Nothing
        }

        ClientFrame::Unsubscribe { topic } => {
            debug!("Unsubscribe: {}", topic);
            session.topics.remove(&topic);
            Reply::Nothing
        }

        ClientFrame::Publish { topic, payload } => {
            let reached = state.publish(&topic, &payload);
            debug!("Publish to {} reached {} connections", topic, reached);
            Reply::Nothing
        }
    }
}
