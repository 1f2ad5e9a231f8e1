// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the real-time channel.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing
//!
//! Framing and auth handshake belong to the transport implementation; the
//! channel session only consumes connect/disconnect, frame send, and typed
//! event receive.

use std::future::Future;
use std::pin::Pin;

use rq_core::error::{Error, Result};
use rq_core::event::{ChannelEvent, ClientFrame};

/// Transport trait for the push channel.
///
/// Transport failures surface as [`Error::Network`]; a cleanly closed
/// connection is `Ok(None)` from `recv`.
pub trait ChannelTransport: Send + Sync {
    /// Connect to the channel endpoint.
    fn connect(&mut self, url: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Disconnect from the channel endpoint.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Send a client frame.
    fn send(&mut self, frame: ClientFrame) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Receive the next event from the server.
    ///
    /// Returns `None` if the connection is closed.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ChannelEvent>>> + Send + '_>>;

    /// Check if connected.
    fn is_connected(&self) -> bool;
}

/// WebSocket transport implementation using tokio-tungstenite.
pub struct WebSocketTransport {
    /// The WebSocket connection, if connected.
    ws: Option<WebSocketConnection>,
}

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        tokio_tungstenite::tungstenite::Message,
    >,
    stream: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport { ws: None }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport for WebSocketTransport {
    fn connect(&mut self, url: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move {
            use futures_util::StreamExt;

            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| Error::Network(format!("connect failed: {e}")))?;

            let (sink, stream) = ws_stream.split();
            self.ws = Some(WebSocketConnection { sink, stream });
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                use futures_util::SinkExt;
                let _ = ws.sink.close().await;
            }
            Ok(())
        })
    }

    fn send(&mut self, frame: ClientFrame) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            use futures_util::SinkExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or_else(|| Error::Network("not connected".into()))?;

            let json = frame.to_json()?;

            if let Err(e) = ws.sink.send(Message::Text(json.into())).await {
                // Connection is broken, clear it
                self.ws = None;
                return Err(Error::Network(format!("send failed: {e}")));
            }

            // Flush so connection failures are detected here, not later
            if let Err(e) = ws.sink.flush().await {
                self.ws = None;
                return Err(Error::Network(format!("send failed: {e}")));
            }

            Ok(())
        })
    }

    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ChannelEvent>>> + Send + '_>> {
        Box::pin(async move {
            use futures_util::StreamExt;
            use tokio_tungstenite::tungstenite::Message;

            let ws = self.ws.as_mut().ok_or_else(|| Error::Network("not connected".into()))?;

            loop {
                match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let event = ChannelEvent::from_json(&text)?;
                        return Ok(Some(event));
                    }
                    Some(Ok(Message::Close(_))) => {
                        self.ws = None;
                        return Ok(None);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Keepalive traffic, keep waiting
                        continue;
                    }
                    Some(Ok(_)) => {
                        continue;
                    }
                    Some(Err(e)) => {
                        self.ws = None;
                        return Err(Error::Network(format!("receive failed: {e}")));
                    }
                    None => {
                        self.ws = None;
                        return Ok(None);
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}
