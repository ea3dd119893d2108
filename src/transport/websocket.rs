//! WebSocket Transport
//!
//! Production transport built on `tokio-tungstenite`. One `WsTransport`
//! wraps one socket; protocol-level ping/pong control frames are handled
//! by the library, so only text frames surface as events.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Connector, Transport, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens real WebSocket connections
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        tracing::debug!(url = %url, "WebSocket connected");

        let (sink, source) = stream.split();
        Ok(Box::new(WsTransport {
            sink,
            source,
            closed: false,
        }))
    }
}

/// A live WebSocket channel
struct WsTransport {
    sink: SplitSink<WsStream, Message>,
    source: SplitStream<WsStream>,
    closed: bool,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            match self.source.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(TransportEvent::Message(text));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Some(TransportEvent::Closed);
                }
                Some(Ok(_)) => {
                    // Binary and control frames carry nothing for us
                    continue;
                }
                Some(Err(e)) => {
                    return Some(TransportEvent::Error(e.to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "WebSocket close handshake failed");
        }
        let _ = self.sink.close().await;
    }
}
