use anyhow::{anyhow, bail, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::events::{describe_error, ChannelEvent, ClientEvent, ServerEvent};
use super::packet::{EnginePacket, OpenInfo, SocketPacket};
use super::transport::{transports_for, Link, Transport};
use crate::config::SocketConfig;
use crate::error::SessionError;

/// Receiving side of a channel: connection changes and server events, in order
pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

/// Opens realtime channels with the configured retry policy
#[derive(Clone)]
pub struct Connector {
    base_url: String,
    config: SocketConfig,
    transports: Vec<Arc<dyn Transport>>,
}

impl Connector {
    pub fn new(base_url: impl Into<String>, config: SocketConfig) -> Self {
        let transports = transports_for(&config);
        Self::with_transports(base_url, config, transports)
    }

    pub fn with_transports(
        base_url: impl Into<String>,
        config: SocketConfig,
        transports: Vec<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            config,
            transports,
        }
    }

    /// Start connecting in the background and return the handle immediately.
    ///
    /// Every call produces a fresh channel; handles are never reused across rooms.
    pub fn connect(&self) -> (Channel, ChannelEvents) {
        info!("Connecting realtime channel to {}", self.base_url);

        // Unbounded: the owner may be awaiting disconnect() rather than draining events
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connected = Arc::new(AtomicBool::new(false));

        let driver = Driver {
            base_url: self.base_url.clone(),
            config: self.config.clone(),
            transports: self.transports.clone(),
            connected: Arc::clone(&connected),
            events: event_tx,
            outgoing: outgoing_rx,
        };
        let task = tokio::spawn(driver.run(shutdown_rx));

        let channel = Channel {
            outgoing: outgoing_tx,
            connected,
            shutdown: shutdown_tx,
            closed: AtomicBool::new(false),
            driver: Mutex::new(Some(task)),
        };

        (channel, event_rx)
    }
}

/// Handle to one realtime channel
pub struct Channel {
    outgoing: mpsc::UnboundedSender<EnginePacket>,
    connected: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    /// True between a finished handshake and the next drop
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connected.load(Ordering::SeqCst)
    }

    /// Queue an event for the server. Refused while not connected.
    pub fn emit(&self, event: &ClientEvent) -> Result<(), SessionError> {
        if !self.is_connected() {
            warn!("Dropping {} for room {}: channel not connected", event.name(), event.room_id());
            return Err(SessionError::NotConnected);
        }

        debug!("Emitting {} for room {}", event.name(), event.room_id());
        self.outgoing
            .send(event.to_packet().into_engine())
            .map_err(|_| SessionError::NotConnected)
    }

    pub fn join_room(&self, room_id: i64) -> Result<(), SessionError> {
        info!("Joining room {}", room_id);
        self.emit(&ClientEvent::JoinRoom { room_id })
    }

    /// Close the channel and abandon any pending reconnection. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Channel already disconnected");
            return;
        }

        info!("Disconnecting realtime channel");
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.shutdown.send(true);

        let task = self.driver.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Channel driver panicked: {}", e);
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown.send(true);
        }
    }
}

enum Exit {
    Shutdown,
    Dropped(String),
}

struct Driver {
    base_url: String,
    config: SocketConfig,
    transports: Vec<Arc<dyn Transport>>,
    connected: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    outgoing: mpsc::UnboundedReceiver<EnginePacket>,
}

impl Driver {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let max_attempts = self.config.reconnection_attempts.max(1);
        let mut failures = 0u32;
        let mut first = true;

        loop {
            if !first {
                let delay = self.config.reconnection_delay();
                tokio::select! {
                    _ = shutdown_signal(&mut shutdown) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            first = false;

            let attempt = tokio::select! {
                _ = shutdown_signal(&mut shutdown) => break,
                result = tokio::time::timeout(self.config.timeout(), self.establish()) => result,
            };

            let (link, info, transport) = match attempt {
                Ok(Ok(established)) => established,
                Ok(Err(e)) => {
                    failures += 1;
                    if self.record_failure(failures, max_attempts, format!("{:#}", e)) {
                        break;
                    }
                    continue;
                }
                Err(_) => {
                    failures += 1;
                    let reason = format!("connection timed out after {:?}", self.config.timeout());
                    if self.record_failure(failures, max_attempts, reason) {
                        break;
                    }
                    continue;
                }
            };

            failures = 0;
            self.connected.store(true, Ordering::SeqCst);
            info!("Realtime channel connected via {}", transport);

            if self.events.send(ChannelEvent::Connected { transport }).is_err() {
                break;
            }

            let exit = self.pump(link, &info, &mut shutdown).await;
            self.connected.store(false, Ordering::SeqCst);
            self.discard_queued();

            match exit {
                Exit::Shutdown => break,
                Exit::Dropped(reason) => {
                    warn!("Realtime channel dropped: {}", reason);
                    if self.events.send(ChannelEvent::Disconnected { reason }).is_err() {
                        break;
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        debug!("Channel driver stopped");
    }

    /// Returns true once the retry budget is spent
    fn record_failure(&self, failures: u32, max_attempts: u32, reason: String) -> bool {
        warn!("Connection attempt {}/{} failed: {}", failures, max_attempts, reason);

        if failures < max_attempts {
            return false;
        }

        error!("Giving up after {} connection attempts", failures);
        let _ = self.events.send(ChannelEvent::ConnectFailed {
            attempts: failures,
            reason,
        });
        true
    }

    /// Packets queued for a link that is gone must not reach the next one ahead of its `joinRoom`
    fn discard_queued(&mut self) {
        let mut stale = 0;
        while self.outgoing.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("Discarded {} packets queued for the dropped link", stale);
        }
    }

    /// Try every configured transport in order
    async fn establish(&self) -> Result<(Box<dyn Link>, OpenInfo, String)> {
        let mut last_error = None;

        for transport in &self.transports {
            match self.handshake(transport.as_ref()).await {
                Ok((link, info)) => return Ok((link, info, transport.name().to_string())),
                Err(e) => {
                    warn!("{} transport failed: {:#}", transport.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No transports configured")))
    }

    async fn handshake(&self, transport: &dyn Transport) -> Result<(Box<dyn Link>, OpenInfo)> {
        let mut link = transport.open(&self.base_url, &self.config.path).await?;

        let open = link
            .recv()
            .await?
            .context("Server closed before the engine handshake")?;
        let info = open.open_info()?;
        debug!(
            "Engine session {} (ping interval {}ms, timeout {}ms)",
            info.sid, info.ping_interval, info.ping_timeout
        );

        link.send(SocketPacket::Connect(None).into_engine()).await?;

        loop {
            let packet = link
                .recv()
                .await?
                .context("Server closed before acknowledging the connection")?;

            match packet {
                EnginePacket::Message(data) => match SocketPacket::decode(&data)? {
                    SocketPacket::Connect(_) => return Ok((link, info)),
                    SocketPacket::ConnectError(body) => {
                        bail!("Server refused connection: {}", describe_error(&body))
                    }
                    other => debug!("Ignoring {:?} before connect acknowledgement", other),
                },
                EnginePacket::Ping(data) => link.send(EnginePacket::Pong(data)).await?,
                EnginePacket::Close => bail!("Server closed during handshake"),
                _ => {}
            }
        }
    }

    /// Shuttle packets until the link drops or the channel is shut down.
    ///
    /// A server that stays silent for longer than its advertised ping interval
    /// plus ping timeout is treated as gone.
    async fn pump(
        &mut self,
        mut link: Box<dyn Link>,
        info: &OpenInfo,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Exit {
        let silence = Duration::from_millis(info.ping_interval.saturating_add(info.ping_timeout));
        let mut deadline = Instant::now() + silence;

        loop {
            tokio::select! {
                _ = shutdown_signal(shutdown) => {
                    self.teardown(link.as_mut()).await;
                    return Exit::Shutdown;
                }
                _ = tokio::time::sleep_until(deadline), if !silence.is_zero() => {
                    return Exit::Dropped(format!("ping timeout after {:?}", silence));
                }
                outgoing = self.outgoing.recv() => match outgoing {
                    Some(packet) => {
                        if let Err(e) = link.send(packet).await {
                            return Exit::Dropped(format!("{:#}", e));
                        }
                    }
                    None => return Exit::Shutdown,
                },
                incoming = link.recv() => match incoming {
                    Ok(Some(packet)) => {
                        deadline = Instant::now() + silence;
                        if let Some(exit) = self.handle_incoming(packet, link.as_mut()).await {
                            return exit;
                        }
                    }
                    Ok(None) => return Exit::Dropped("transport closed".to_string()),
                    Err(e) => return Exit::Dropped(format!("{:#}", e)),
                },
            }
        }
    }

    /// Say goodbye to the server, bounded by the connect timeout
    async fn teardown(&self, link: &mut dyn Link) {
        let goodbye = async {
            if let Err(e) = link.send(SocketPacket::Disconnect.into_engine()).await {
                debug!("Disconnect not delivered: {:#}", e);
            }
            link.close().await
        };

        match tokio::time::timeout(self.config.timeout(), goodbye).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Error closing link: {:#}", e),
            Err(_) => warn!("Gave up closing link after {:?}", self.config.timeout()),
        }
    }

    async fn handle_incoming(&self, packet: EnginePacket, link: &mut dyn Link) -> Option<Exit> {
        match packet {
            EnginePacket::Ping(data) => {
                if let Err(e) = link.send(EnginePacket::Pong(data)).await {
                    return Some(Exit::Dropped(format!("{:#}", e)));
                }
            }
            EnginePacket::Close => return Some(Exit::Dropped("server closed the session".to_string())),
            EnginePacket::Message(data) => match SocketPacket::decode(&data) {
                Ok(SocketPacket::Event { name, payload }) => {
                    match ServerEvent::from_named(&name, payload) {
                        Ok(Some(event)) => {
                            debug!("Received {}", event.name());
                            if self.events.send(ChannelEvent::Server(event)).is_err() {
                                return Some(Exit::Shutdown);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Dropping malformed {} event: {:#}", name, e),
                    }
                }
                Ok(SocketPacket::Disconnect) => {
                    return Some(Exit::Dropped("server disconnected the namespace".to_string()))
                }
                Ok(SocketPacket::ConnectError(body)) => {
                    return Some(Exit::Dropped(describe_error(&body)))
                }
                Ok(SocketPacket::Connect(_)) => {}
                Err(e) => warn!("Dropping malformed socket packet: {:#}", e),
            },
            _ => {}
        }

        None
    }
}

/// Resolves once shutdown was requested or the channel handle is gone
async fn shutdown_signal(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
