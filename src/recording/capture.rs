use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::recorder::{AudioCapture, CaptureHandle};
use crate::audio::{AudioBackend, AudioFrame};

/// Capture capability that writes backend frames to a scratch WAV file
pub struct WavCapture {
    backend: Box<dyn AudioBackend>,
    scratch_dir: PathBuf,
    sample_rate: u32,
    channels: u16,
    writer_task: Option<JoinHandle<Result<ClipSummary>>>,
}

impl WavCapture {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        scratch_dir: impl Into<PathBuf>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            backend,
            scratch_dir: scratch_dir.into(),
            sample_rate,
            channels,
            writer_task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioCapture for WavCapture {
    async fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.scratch_dir)
            .context("Failed to create scratch directory")?;

        info!(
            "Voice capture ready: {} backend, scratch dir {}",
            self.backend.name(),
            self.scratch_dir.display()
        );
        Ok(())
    }

    async fn start(&mut self) -> Result<CaptureHandle> {
        if self.writer_task.is_some() {
            bail!("Capture already in progress");
        }

        let path = self.scratch_dir.join(format!("voice-{}.wav", uuid::Uuid::new_v4()));
        let writer = ClipWriter::new(path.clone(), self.sample_rate, self.channels)?;

        let frames = match self.backend.start().await {
            Ok(frames) => frames,
            Err(e) => {
                drop(writer);
                let _ = fs::remove_file(&path);
                return Err(e).context("Failed to start audio capture");
            }
        };

        self.writer_task = Some(tokio::spawn(write_clip(writer, frames)));
        info!("Capturing voice into {}", path.display());

        Ok(CaptureHandle::new(path))
    }

    async fn stop(&mut self, handle: CaptureHandle) -> Result<PathBuf> {
        let stop_result = self.backend.stop().await;

        let task = self
            .writer_task
            .take()
            .context("No capture in progress")?;
        let summary = task.await.context("Capture writer panicked")??;

        stop_result.context("Failed to stop audio capture")?;

        info!(
            "Captured {:.1}s of audio ({} samples) into {}",
            summary.end_ms as f64 / 1000.0,
            summary.sample_count,
            handle.path().display()
        );

        Ok(handle.into_path())
    }
}

#[derive(Debug)]
struct ClipSummary {
    end_ms: u64,
    sample_count: usize,
}

async fn write_clip(mut writer: ClipWriter, mut frames: mpsc::Receiver<AudioFrame>) -> Result<ClipSummary> {
    while let Some(frame) = frames.recv().await {
        writer.write_frame(&frame)?;
    }
    writer.finish()
}

/// Writes one utterance to disk as a WAV file
struct ClipWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    summary: ClipSummary,
}

impl ClipWriter {
    fn new(file_path: PathBuf, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&file_path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;

        Ok(Self {
            writer: Some(writer),
            summary: ClipSummary {
                end_ms: 0,
                sample_count: 0,
            },
        })
    }

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer.write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            self.summary.end_ms = frame.timestamp_ms + frame.duration_ms();
            self.summary.sample_count += frame.samples.len();
        }

        Ok(())
    }

    fn finish(mut self) -> Result<ClipSummary> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()
                .context("Failed to finalize WAV file")?;
        }

        Ok(ClipSummary {
            end_ms: self.summary.end_ms,
            sample_count: self.summary.sample_count,
        })
    }
}

impl Drop for ClipWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
