// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the broker connection.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections to a relay for production
//! - Mock transports for unit testing

use std::future::Future;
use std::pin::Pin;

use rb_core::protocol::{ClientFrame, RelayFrame};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The relay answered `hello` with an error.
    #[error("broker rejected the connection: {0}")]
    Rejected(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Broker connection as seen by the supervisor.
pub trait BrokerTransport: Send {
    /// Connect and introduce ourselves with `hello`.
    ///
    /// Succeeds once the broker has accepted the hello.
    fn connect<'a>(&'a mut self, url: &'a str, hello: ClientFrame) -> TransportFuture<'a, ()>;

    /// Disconnect from the broker.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    /// Send a frame to the broker.
    fn send(&mut self, frame: ClientFrame) -> TransportFuture<'_, ()>;

    /// Receive a frame from the broker.
    ///
    /// Returns `None` if the connection is closed.
    fn recv(&mut self) -> TransportFuture<'_, Option<RelayFrame>>;

    /// Check if connected.
    fn is_connected(&self) -> bool;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket transport implementation using tokio-tungstenite.
#[derive(Default)]
pub struct WebSocketTransport {
    /// The WebSocket connection, if connected.
    ws: Option<WebSocketConnection>,
}

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, tokio_tungstenite::tungstenite::Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport { ws: None }
    }
}

impl BrokerTransport for WebSocketTransport {
    fn connect<'a>(&'a mut self, url: &'a str, hello: ClientFrame) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            use futures_util::StreamExt;

            // Drop any previous connection first
            self.ws = None;

            let (ws_stream, _) = tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            self.ws = Some(WebSocketConnection { sink, stream });

            self.send(hello).await?;
            match self.recv().await {
                Ok(Some(RelayFrame::Welcome)) => Ok(()),
                Ok(Some(RelayFrame::Error { message })) => {
                    self.ws = None;
                    Err(TransportError::Rejected(message))
                }
                Ok(Some(other)) => {
                    self.ws = None;
                    Err(TransportError::ConnectionFailed(format!(
                        "unexpected reply to hello: {:?}",
                        other
                    )))
                }
                Ok(None) => Err(TransportError::ConnectionClosed),
                Err(e) => {
                    self.ws = None;
                    Err(e)
                }
            }
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                use futures_util::SinkExt;
                let _ = ws.sink.close().await;
            }
            Ok(())
        })
    }

    fn send(&mut self, frame: ClientFrame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            use futures_util::SinkExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            let json = frame
                .to_json()
                .map_err(|e| TransportError::SerializationError(e.to_string()))?;

            if let Err(e) = ws.sink.send(Message::Text(json.into())).await {
                // Connection is broken, clear it
                self.ws = None;
                return Err(TransportError::SendFailed(e.to_string()));
            }

            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<RelayFrame>> {
        Box::pin(async move {
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or(TransportError::ConnectionClosed)?;

            loop {
                match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let frame = RelayFrame::from_json(&text)
                            .map_err(|e| TransportError::SerializationError(e.to_string()))?;
                        return Ok(Some(frame));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        // Connection closed, clear it
                        self.ws = None;
                        return Ok(None);
                    }
                    Some(Ok(_)) => {
                        // Ignore ping/pong and binary frames
                        continue;
                    }
                    Some(Err(e)) => {
                        // Connection is broken, clear it
                        self.ws = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
pub(crate) mod tests;
