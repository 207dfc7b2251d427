//! Realtime channel to the conversation server
//!
//! This module provides:
//! - Engine.IO / Socket.IO text framing
//! - Long-polling and websocket transports with in-order fallback
//! - The connector: handshake, bounded reconnection, idempotent disconnect
//! - Typed client and server events

mod connector;
mod events;
pub mod packet;
mod polling;
mod transport;
mod websocket;

pub use connector::{Channel, ChannelEvents, Connector};
pub use events::{describe_error, ChannelEvent, ClientEvent, ServerEvent};
pub use packet::{EnginePacket, OpenInfo, SocketPacket};
pub use polling::PollingTransport;
pub use transport::{transports_for, Link, Transport};
pub use websocket::WebSocketTransport;
