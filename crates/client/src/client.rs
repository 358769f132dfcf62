//! WebSocket transport for the realtime detection stream.
//!
//! [`StreamConnector`] and [`StreamTransport`] are the seam between the
//! [`StreamManager`](crate::stream::StreamManager) and the network. The
//! production implementation, [`WsConnector`], speaks WebSocket through
//! `tokio-tungstenite`; tests substitute scripted transports.

use async_trait::async_trait;
use futures::StreamExt;
use laneguard_core::params::StreamParams;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// One thing that happened on an open transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text frame.
    Text(String),
    /// A transport-level error. A `Closed` event normally follows.
    Error(String),
    /// The peer closed the connection or the stream ended.
    Closed,
}

/// An established live connection.
#[async_trait]
pub trait StreamTransport: Send {
    /// Wait for the next event. Returns [`TransportEvent::Closed`] forever
    /// once the connection is gone.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the connection. Idempotent; close errors are swallowed.
    async fn close(&mut self);
}

/// Opens [`StreamTransport`]s.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamTransport>, StreamError>;
}

/// Errors that can occur when working with the stream transport.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The stream target could not be built.
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    /// The parameter set was rejected before connecting.
    #[error(transparent)]
    Params(#[from] laneguard_core::CoreError),
}

/// Build the realtime WebSocket target for a parameter set.
///
/// * `ws_url` - WebSocket base URL, e.g. `ws://127.0.0.1:8000`.
pub fn realtime_ws_url(ws_url: &str, params: &StreamParams) -> Result<String, StreamError> {
    let base = format!("{}/ws/realtime", ws_url.trim_end_matches('/'));
    reqwest::Url::parse_with_params(&base, params.query_pairs())
        .map(|u| u.to_string())
        .map_err(|e| StreamError::InvalidUrl(format!("{base}: {e}")))
}

/// Build the MJPEG live image URL for a parameter set.
///
/// `cache_buster` is appended as `t` so that a parameter round trip
/// forces the image element to reload.
pub fn realtime_image_url(
    api_url: &str,
    params: &StreamParams,
    cache_buster: u128,
) -> Result<String, StreamError> {
    let base = format!("{}/api/realtime/stream", api_url.trim_end_matches('/'));
    let mut pairs = params.query_pairs();
    pairs.push(("t", cache_buster.to_string()));
    reqwest::Url::parse_with_params(&base, pairs)
        .map(|u| u.to_string())
        .map_err(|e| StreamError::InvalidUrl(format!("{base}: {e}")))
}

/// Derive the WebSocket base from the HTTP base (`http` → `ws`,
/// `https` → `wss`).
pub fn ws_base_from_http(api_url: &str) -> String {
    match api_url.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => api_url.to_string(),
    }
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamTransport>, StreamError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| StreamError::Connection(format!("Failed to connect to {url}: {e}")))?;

        tracing::info!(url, "Connected to realtime stream");

        Ok(Box::new(WsTransport {
            ws_stream,
            finished: false,
        }))
    }
}

/// A live WebSocket connection to the realtime endpoint.
pub struct WsTransport {
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    /// Set once the peer closed, the stream ended, or an error was seen.
    finished: bool,
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn next_event(&mut self) -> TransportEvent {
        if self.finished {
            return TransportEvent::Closed;
        }
        loop {
            match self.ws_stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text),
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!("Ignoring binary frame on realtime stream");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Realtime stream closed by server");
                    self.finished = true;
                    return TransportEvent::Closed;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    self.finished = true;
                    return TransportEvent::Closed;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws_stream.close(None).await {
            tracing::debug!(error = %e, "Ignoring error while closing realtime stream");
        }
        self.finished = true;
    }
}
