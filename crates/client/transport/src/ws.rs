//! Websocket gesture channel.

use async_trait::async_trait;
use client_core::{ClientId, EndpointConfig, GestureConnection, GestureTransport, TransportError};
use futures_util::StreamExt;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Opens `<ws-base>/ws?clientId=<id>` connections.
#[derive(Clone, Debug)]
pub struct WsGestureTransport {
    ws_base: String,
}

impl WsGestureTransport {
    pub fn new(ws_base: impl Into<String>) -> Self {
        let ws_base = ws_base.into();
        Self {
            ws_base: ws_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(endpoints: &EndpointConfig) -> Self {
        Self::new(endpoints.ws_base.clone())
    }

    /// Channel URL for `client_id`.
    pub fn channel_url(&self, client_id: &ClientId) -> Result<Url, TransportError> {
        let mut url = Url::parse(&format!("{}/ws", self.ws_base))
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", self.ws_base, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }
        url.query_pairs_mut()
            .append_pair("clientId", client_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl GestureTransport for WsGestureTransport {
    async fn connect(
        &self,
        client_id: &ClientId,
    ) -> Result<Box<dyn GestureConnection>, TransportError> {
        let url = self.channel_url(client_id)?;
        debug!("Connecting gesture channel: {}", url);

        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Box::new(WsConnection { stream }))
    }
}

/// One open websocket.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl GestureConnection for WsConnection {
    async fn next_message(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => warn!("Dropping non-UTF-8 binary message: {}", e),
                },
                Ok(Message::Close(frame)) => {
                    debug!("Gesture channel closed by server: {:?}", frame);
                    return None;
                }
                // Control frames are answered by the protocol layer.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(TransportError::Network(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Gesture channel close: {}", e);
        }
    }
}
