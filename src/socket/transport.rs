use anyhow::Result;
use std::sync::Arc;

use super::packet::EnginePacket;
use super::polling::PollingTransport;
use super::websocket::WebSocketTransport;
use crate::config::{SocketConfig, TransportKind};

/// Way of reaching the realtime server
///
/// Implementations:
/// - `polling`: HTTP long-polling, works through restrictive networks
/// - `websocket`: persistent socket
/// - in-memory fakes for tests
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open a raw engine link. The first packet received on it is the server's `open`.
    async fn open(&self, base_url: &str, path: &str) -> Result<Box<dyn Link>>;

    /// Transport name for logging
    fn name(&self) -> &str;
}

/// An open engine-level link
#[async_trait::async_trait]
pub trait Link: Send {
    async fn send(&mut self, packet: EnginePacket) -> Result<()>;

    /// Next packet from the server, `None` once the peer has closed.
    ///
    /// Must be cancel-safe: the connector polls it inside `select!`.
    async fn recv(&mut self) -> Result<Option<EnginePacket>>;

    async fn close(&mut self) -> Result<()>;
}

/// Build the transports named in the configuration, preserving order
pub fn transports_for(config: &SocketConfig) -> Vec<Arc<dyn Transport>> {
    config
        .transports
        .iter()
        .map(|kind| -> Arc<dyn Transport> {
            match kind {
                TransportKind::Polling => Arc::new(PollingTransport::new(config.timeout())),
                TransportKind::Websocket => Arc::new(WebSocketTransport),
            }
        })
        .collect()
}

/// `https://host` + `/socket.io/` + engine query for the given transport
pub(crate) fn engine_url(base_url: &str, path: &str, transport: &str) -> String {
    format!(
        "{}{}?EIO=4&transport={}",
        base_url.trim_end_matches('/'),
        path,
        transport
    )
}
