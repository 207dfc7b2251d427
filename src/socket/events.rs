use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::packet::SocketPacket;
use crate::conversation::{Message, ProcessingStatus};

/// Events the client emits once connected
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: i64 },
    #[serde(rename_all = "camelCase")]
    SendMessage { room_id: i64, text: String },
    #[serde(rename_all = "camelCase")]
    SendVoiceMessage { room_id: i64, audio_data: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::SendVoiceMessage { .. } => "sendVoiceMessage",
        }
    }

    pub fn room_id(&self) -> i64 {
        match self {
            ClientEvent::JoinRoom { room_id }
            | ClientEvent::SendMessage { room_id, .. }
            | ClientEvent::SendVoiceMessage { room_id, .. } => *room_id,
        }
    }

    /// Payload object without the variant wrapper
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut outer)) => outer.remove(self.name()).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    pub fn to_packet(&self) -> SocketPacket {
        SocketPacket::Event {
            name: self.name().to_string(),
            payload: self.payload(),
        }
    }
}

/// Events pushed by the server for the joined room
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Message(Message),
    Processing(ProcessingStatus),
    SessionTimeout(Value),
    Error(Value),
    JoinedRoom(Value),
}

impl ServerEvent {
    /// Decode a named event; `Ok(None)` for events this client does not handle
    pub fn from_named(name: &str, payload: Value) -> Result<Option<Self>> {
        let event = match name {
            "message" => ServerEvent::Message(
                serde_json::from_value(payload).context("Malformed message event")?,
            ),
            "processing" => ServerEvent::Processing(
                serde_json::from_value(payload).context("Malformed processing event")?,
            ),
            "sessionTimeout" => ServerEvent::SessionTimeout(payload),
            "error" => ServerEvent::Error(payload),
            "joinedRoom" => ServerEvent::JoinedRoom(payload),
            other => {
                debug!("Ignoring unknown server event: {}", other);
                return Ok(None);
            }
        };

        Ok(Some(event))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Message(_) => "message",
            ServerEvent::Processing(_) => "processing",
            ServerEvent::SessionTimeout(_) => "sessionTimeout",
            ServerEvent::Error(_) => "error",
            ServerEvent::JoinedRoom(_) => "joinedRoom",
        }
    }
}

/// Human-readable text out of a free-form `error` payload
pub fn describe_error(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string()),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}

/// What the connector reports to whoever owns the channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Handshake finished; emits are accepted from now on
    Connected { transport: String },
    /// An established link dropped; automatic reconnection follows
    Disconnected { reason: String },
    /// Retry budget exhausted, the driver has stopped
    ConnectFailed { attempts: u32, reason: String },
    Server(ServerEvent),
}
