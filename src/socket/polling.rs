use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::packet::{split_payload, EnginePacket};
use super::transport::{engine_url, Link, Transport};

/// HTTP long-polling transport.
///
/// Long-poll GETs are held open by the server and rely on the connector's
/// ping timeout; POSTs are bounded by `post_timeout`.
pub struct PollingTransport {
    http: reqwest::Client,
    post_timeout: Duration,
}

impl PollingTransport {
    pub fn new(post_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            post_timeout,
        }
    }
}

#[async_trait::async_trait]
impl Transport for PollingTransport {
    async fn open(&self, base_url: &str, path: &str) -> Result<Box<dyn Link>> {
        let url = engine_url(base_url, path, "polling");
        info!("Opening long-polling session: {}", url);

        let body = poll_once(&self.http, &url).await?;
        let mut pending = VecDeque::new();
        for raw in split_payload(&body) {
            pending.push_back(EnginePacket::decode(raw)?);
        }

        let sid = match pending.front() {
            Some(open @ EnginePacket::Open(_)) => open.open_info()?.sid,
            other => bail!("Expected open packet from polling handshake, got {:?}", other),
        };
        let session_url = format!("{}&sid={}", url, sid);

        let (packet_tx, packet_rx) = mpsc::channel(100);
        let poller = tokio::spawn(poll_loop(self.http.clone(), session_url.clone(), packet_tx));

        Ok(Box::new(PollingLink {
            http: self.http.clone(),
            post_timeout: self.post_timeout,
            url: session_url,
            pending,
            packet_rx,
            poller,
        }))
    }

    fn name(&self) -> &str {
        "polling"
    }
}

struct PollingLink {
    http: reqwest::Client,
    post_timeout: Duration,
    url: String,
    /// Packets that arrived with the handshake response
    pending: VecDeque<EnginePacket>,
    packet_rx: mpsc::Receiver<Result<EnginePacket>>,
    poller: JoinHandle<()>,
}

#[async_trait::async_trait]
impl Link for PollingLink {
    async fn send(&mut self, packet: EnginePacket) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .timeout(self.post_timeout)
            .body(packet.encode())
            .send()
            .await
            .context("Failed to post polling packet")?;

        if !response.status().is_success() {
            bail!("Polling post rejected: {}", response.status());
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>> {
        if let Some(packet) = self.pending.pop_front() {
            return Ok(Some(packet));
        }

        match self.packet_rx.recv().await {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.poller.abort();
        // Best effort; the session is gone either way
        if let Err(e) = self.send(EnginePacket::Close).await {
            debug!("Polling close not delivered: {}", e);
        }
        Ok(())
    }
}

impl Drop for PollingLink {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

async fn poll_once(http: &reqwest::Client, url: &str) -> Result<String> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("Polling request to {} failed", url))?;

    if !response.status().is_success() {
        bail!("Polling request rejected: {}", response.status());
    }

    response.text().await.context("Failed to read polling response")
}

/// Long-poll until the server closes or a request fails
async fn poll_loop(
    http: reqwest::Client,
    url: String,
    packet_tx: mpsc::Sender<Result<EnginePacket>>,
) {
    loop {
        let body = match poll_once(&http, &url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Long-poll failed: {}", e);
                let _ = packet_tx.send(Err(e)).await;
                return;
            }
        };

        for raw in split_payload(&body) {
            let packet = EnginePacket::decode(raw);
            let closed = matches!(packet, Ok(EnginePacket::Close));

            if packet_tx.send(packet).await.is_err() || closed {
                return;
            }
        }
    }
}
