// Shared fakes for integration tests
//
// A scripted in-memory realtime server, transports that fail or hang,
// a diary service that can be told to fail, and capture/playback doubles.

#![allow(dead_code)]

use anyhow::{bail, Result};
use iailog_client::audio::AudioPlayback;
use iailog_client::config::{SocketConfig, TransportKind};
use iailog_client::recording::{AudioCapture, CaptureHandle};
use iailog_client::socket::{Connector, EnginePacket, Link, SocketPacket, Transport};
use iailog_client::{Diary, DiaryService};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn socket_config() -> SocketConfig {
    SocketConfig {
        transports: vec![TransportKind::Websocket],
        ..SocketConfig::default()
    }
}

pub fn fake_connector(transport: Arc<dyn Transport>) -> Connector {
    Connector::with_transports("http://fake", socket_config(), vec![transport])
}

/// Server side of one fake link
pub struct FakeServer {
    to_client: mpsc::UnboundedSender<EnginePacket>,
    from_client: mpsc::UnboundedReceiver<EnginePacket>,
}

impl FakeServer {
    pub fn send(&self, packet: EnginePacket) {
        let _ = self.to_client.send(packet);
    }

    pub fn emit(&self, name: &str, payload: Value) {
        self.send(
            SocketPacket::Event {
                name: name.to_string(),
                payload,
            }
            .into_engine(),
        );
    }

    /// Next packet the client wrote, or `None` once the client side is gone
    pub async fn recv(&mut self) -> Option<EnginePacket> {
        tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for the client")
    }

    /// Play the server half of the engine and namespace handshake
    pub async fn accept(&mut self) {
        self.send(EnginePacket::Open(
            json!({"sid": "fake-sid", "upgrades": [], "pingInterval": 25000, "pingTimeout": 20000})
                .to_string(),
        ));
        assert_eq!(self.recv().await, Some(EnginePacket::Message("0".to_string())));
        self.send(EnginePacket::Message(r#"0{"sid":"fake-socket"}"#.to_string()));
    }

    /// Next named event the client emitted, skipping anything else
    pub async fn expect_event(&mut self) -> (String, Value) {
        loop {
            match self.recv().await {
                Some(EnginePacket::Message(data)) => {
                    if let Ok(SocketPacket::Event { name, payload }) = SocketPacket::decode(&data) {
                        return (name, payload);
                    }
                }
                Some(_) => {}
                None => panic!("client closed before emitting an event"),
            }
        }
    }

    /// Wait for the namespace disconnect the client sends when it closes
    pub async fn expect_disconnect(&mut self) {
        loop {
            match self.recv().await {
                Some(EnginePacket::Message(data)) if data == "1" => return,
                Some(_) => {}
                None => panic!("link closed without a disconnect packet"),
            }
        }
    }
}

struct FakeLink {
    incoming: mpsc::UnboundedReceiver<EnginePacket>,
    outgoing: mpsc::UnboundedSender<EnginePacket>,
    stalled: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Link for FakeLink {
    async fn send(&mut self, packet: EnginePacket) -> Result<()> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.outgoing.send(packet).is_err() {
            bail!("fake server went away");
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>> {
        Ok(self.incoming.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transport whose every `open` hands a new [`FakeServer`] to the test
pub struct FakeTransport {
    servers: mpsc::UnboundedSender<FakeServer>,
    stalled: Arc<AtomicBool>,
}

impl FakeTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let transport = Self {
            servers,
            stalled: Arc::new(AtomicBool::new(false)),
        };
        (Arc::new(transport), rx)
    }

    /// From now on, every write on every link hangs forever
    pub fn stall_sends(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn open(&self, _base_url: &str, _path: &str) -> Result<Box<dyn Link>> {
        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();

        if self
            .servers
            .send(FakeServer {
                to_client,
                from_client,
            })
            .is_err()
        {
            bail!("test dropped the server receiver");
        }

        Ok(Box::new(FakeLink {
            incoming,
            outgoing,
            stalled: Arc::clone(&self.stalled),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub async fn next_server(servers: &mut mpsc::UnboundedReceiver<FakeServer>) -> FakeServer {
    tokio::time::timeout(WAIT, servers.recv())
        .await
        .expect("timed out waiting for a connection attempt")
        .expect("transport dropped")
}

/// Transport that refuses every attempt and remembers when each one happened
#[derive(Default)]
pub struct FailingTransport {
    attempts: Mutex<Vec<Instant>>,
}

impl FailingTransport {
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for FailingTransport {
    async fn open(&self, _base_url: &str, _path: &str) -> Result<Box<dyn Link>> {
        self.attempts.lock().unwrap().push(Instant::now());
        bail!("connection refused")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Transport whose `open` never completes
#[derive(Default)]
pub struct HangingTransport {
    attempts: AtomicUsize,
}

impl HangingTransport {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for HangingTransport {
    async fn open(&self, _base_url: &str, _path: &str) -> Result<Box<dyn Link>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        bail!("unreachable")
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

pub fn sample_diary(room_id: i64) -> Diary {
    Diary {
        id: format!("diary-{}", room_id),
        room_id,
        content: "Today I talked about my puppy.".to_string(),
        summary: "A happy day".to_string(),
        image_url: Some("https://cdn.example/diary.png".to_string()),
        created_at: "2025-05-01T10:00:00Z".to_string(),
    }
}

/// Diary service that counts calls and fails a configurable number of times
#[derive(Default)]
pub struct FakeDiaryService {
    rooms: Mutex<Vec<i64>>,
    failures_left: AtomicUsize,
}

impl FakeDiaryService {
    pub fn fail_next(&self, times: usize) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<i64> {
        self.rooms.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DiaryService for FakeDiaryService {
    async fn create_diary(&self, room_id: i64) -> Result<Diary> {
        self.rooms.lock().unwrap().push(room_id);

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            bail!("diary service unavailable");
        }

        Ok(sample_diary(room_id))
    }
}

/// Remembers which replies were played
#[derive(Default)]
pub struct RecordingPlayback {
    played: Mutex<Vec<String>>,
}

impl RecordingPlayback {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AudioPlayback for RecordingPlayback {
    async fn play(&self, message_id: &str, _audio_base64: &str) -> Result<()> {
        self.played.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

/// Capture double that writes fixed bytes on stop
pub struct FakeCapture {
    dir: PathBuf,
    pub inits: Arc<AtomicUsize>,
    pub starts: Arc<AtomicUsize>,
    pub bytes: Vec<u8>,
}

impl FakeCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            inits: Arc::new(AtomicUsize::new(0)),
            starts: Arc::new(AtomicUsize::new(0)),
            bytes: b"RIFF-fake-clip".to_vec(),
        }
    }
}

#[async_trait::async_trait]
impl AudioCapture for FakeCapture {
    async fn init(&mut self) -> Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&mut self) -> Result<CaptureHandle> {
        let n = self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureHandle::new(self.dir.join(format!("clip-{}.wav", n))))
    }

    async fn stop(&mut self, handle: CaptureHandle) -> Result<PathBuf> {
        tokio::fs::write(handle.path(), &self.bytes).await?;
        Ok(handle.into_path())
    }
}
