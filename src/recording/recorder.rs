use anyhow::{Context, Result};
use base64::Engine;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Token for one in-flight capture
#[derive(Debug)]
pub struct CaptureHandle {
    path: PathBuf,
}

impl CaptureHandle {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Platform capture capability: the only thing the session needs from the microphone
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Prepare the device (permissions, scratch space)
    async fn init(&mut self) -> Result<()>;

    async fn start(&mut self) -> Result<CaptureHandle>;

    /// Finish the capture and return the recorded file
    async fn stop(&mut self, handle: CaptureHandle) -> Result<PathBuf>;
}

/// A finished utterance waiting to be sent
#[derive(Debug)]
pub struct RecordedClip {
    path: PathBuf,
}

impl RecordedClip {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the clip as base64 and delete the scratch file
    pub async fn into_base64(self) -> Result<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read recording: {:?}", self.path))?;

        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!("Failed to delete scratch recording {:?}: {}", self.path, e);
        }

        debug!("Encoded {} bytes of recorded audio", bytes.len());
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// Owns the microphone for one session; at most one recording at a time
pub struct VoiceRecorder {
    capture: Box<dyn AudioCapture>,
    active: Option<CaptureHandle>,
    initialized: bool,
}

impl VoiceRecorder {
    pub fn new(capture: Box<dyn AudioCapture>) -> Self {
        Self {
            capture,
            active: None,
            initialized: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Start capturing. Returns `Ok(false)` without touching the device if already recording.
    pub async fn start_recording(&mut self) -> Result<bool> {
        if self.active.is_some() {
            warn!("Recording already started");
            return Ok(false);
        }

        if !self.initialized {
            self.capture.init().await.context("Failed to initialise audio capture")?;
            self.initialized = true;
        }

        let handle = self.capture.start().await?;
        info!("Recording started: {}", handle.path().display());
        self.active = Some(handle);

        Ok(true)
    }

    /// Stop capturing. Returns `Ok(None)` if nothing was being recorded.
    ///
    /// The recorder is back to "not recording" even when this fails.
    pub async fn stop_recording(&mut self) -> Result<Option<RecordedClip>> {
        let Some(handle) = self.active.take() else {
            warn!("Recording not active");
            return Ok(None);
        };

        let path = self.capture.stop(handle).await?;
        info!("Recording stopped: {}", path.display());

        Ok(Some(RecordedClip::new(path)))
    }
}
