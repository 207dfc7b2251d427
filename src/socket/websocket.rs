use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::packet::EnginePacket;
use super::transport::{engine_url, Link, Transport};

pub struct WebSocketTransport;

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, base_url: &str, path: &str) -> Result<Box<dyn Link>> {
        let url = engine_url(&to_ws_scheme(base_url), path, "websocket");
        info!("Opening websocket: {}", url);

        let (stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to open websocket at {}", url))?;

        Ok(Box::new(WebSocketLink { stream }))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

struct WebSocketLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl Link for WebSocketLink {
    async fn send(&mut self, packet: EnginePacket) -> Result<()> {
        self.stream
            .send(Message::Text(packet.encode().into()))
            .await
            .context("Failed to write to websocket")
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return EnginePacket::decode(text.as_str()).map(Some),
                Some(Ok(other)) => debug!("Ignoring websocket frame: {:?}", other),
                Some(Err(e)) => return Err(e).context("Websocket read failed"),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await.context("Failed to close websocket")
    }
}

fn to_ws_scheme(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    }
}
