//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Only what the conversation channel needs: the default namespace, JSON
//! events, no binary attachments.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Separator between packets in a long-polling payload
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Handshake data carried by the Engine.IO `open` packet
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(String),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        let kind = chars.next().context("Empty engine packet")?;
        let data = chars.as_str().to_string();

        Ok(match kind {
            '0' => EnginePacket::Open(data),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(data),
            '3' => EnginePacket::Pong(data),
            '4' => EnginePacket::Message(data),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => bail!("Unknown engine packet type '{}'", other),
        })
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(data) => format!("0{}", data),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    pub fn open_info(&self) -> Result<OpenInfo> {
        match self {
            EnginePacket::Open(data) => {
                serde_json::from_str(data).context("Malformed engine open packet")
            }
            other => bail!("Expected open packet, got {:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, payload: Value },
    ConnectError(Value),
}

impl SocketPacket {
    /// Decode the body of an engine `message` packet
    pub fn decode(data: &str) -> Result<Self> {
        let mut chars = data.chars();
        let kind = chars.next().context("Empty socket packet")?;
        let mut rest = chars.as_str();

        if kind == '5' || kind == '6' {
            bail!("Binary socket packets are not supported");
        }

        // Non-default namespace prefix: "/chat,..."
        if rest.starts_with('/') {
            rest = match rest.find(',') {
                Some(pos) => &rest[pos + 1..],
                None => "",
            };
        }

        // Ack id
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

        let body = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest).context("Malformed socket packet body")?)
        };

        Ok(match kind {
            '0' => SocketPacket::Connect(body),
            '1' => SocketPacket::Disconnect,
            '2' | '3' => {
                let mut items = match body {
                    Some(Value::Array(items)) if !items.is_empty() => items.into_iter(),
                    other => bail!("Event packet without event name: {:?}", other),
                };
                let name = match items.next() {
                    Some(Value::String(name)) => name,
                    other => bail!("Event name must be a string, got {:?}", other),
                };
                SocketPacket::Event {
                    name,
                    payload: items.next().unwrap_or(Value::Null),
                }
            }
            '4' => SocketPacket::ConnectError(body.unwrap_or(Value::Null)),
            other => bail!("Unknown socket packet type '{}'", other),
        })
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{}", auth),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, payload } => {
                format!("2{}", Value::Array(vec![Value::String(name.clone()), payload.clone()]))
            }
            SocketPacket::ConnectError(body) => format!("4{}", body),
        }
    }

    /// Wrap into the engine `message` packet that carries it
    pub fn into_engine(self) -> EnginePacket {
        EnginePacket::Message(self.encode())
    }
}

/// Split a long-polling response into individual engine packets
pub fn split_payload(payload: &str) -> impl Iterator<Item = &str> {
    payload.split(RECORD_SEPARATOR).filter(|p| !p.is_empty())
}
