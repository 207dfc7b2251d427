use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const PRODUCTION_URL: &str = "https://www.iailog.store";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub socket: SocketConfig,
    pub audio: AudioConfig,
    pub session: ConversationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "iailog-client".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL for REST calls (rooms, diaries, reports)
    pub api_base_url: String,
    /// Base URL the realtime channel connects to
    pub socket_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base_url: PRODUCTION_URL.to_string(),
            socket_url: PRODUCTION_URL.to_string(),
        }
    }
}

/// Realtime transport kinds, tried in the configured order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Polling,
    Websocket,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Polling => write!(f, "polling"),
            TransportKind::Websocket => write!(f, "websocket"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    pub transports: Vec<TransportKind>,
    /// Total connection attempts before the failure is reported upward
    pub reconnection_attempts: u32,
    pub reconnection_delay_ms: u64,
    /// Per-attempt handshake timeout
    pub timeout_ms: u64,
    pub path: String,
}

impl SocketConfig {
    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            transports: vec![TransportKind::Polling, TransportKind::Websocket],
            reconnection_attempts: 5,
            reconnection_delay_ms: 1000,
            timeout_ms: 15000,
            path: "/socket.io/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Where transient recordings live until they are sent
    pub scratch_dir: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("iailog"),
            sample_rate: 16000,
            channels: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Window inside which an AI reply with identical text upgrades the earlier one
    pub dedup_window_ms: u64,
    /// Force the busy indicator back to idle after this much silence (unset = never)
    pub processing_watchdog_secs: Option<u64>,
}

impl ConversationConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn processing_watchdog(&self) -> Option<Duration> {
        self.processing_watchdog_secs.map(Duration::from_secs)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 5000,
            processing_watchdog_secs: None,
        }
    }
}

impl Config {
    /// Load from a config file, with `IAILOG__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("IAILOG").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
