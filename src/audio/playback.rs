use anyhow::{Context, Result};
use base64::Engine;
use std::path::PathBuf;
use tracing::info;

/// Plays synthesized AI replies
#[async_trait::async_trait]
pub trait AudioPlayback: Send + Sync {
    /// Play one reply. Called at most once per message.
    async fn play(&self, message_id: &str, audio_base64: &str) -> Result<()>;
}

/// Decodes replies into WAV files for an external player
pub struct FilePlayback {
    output_dir: PathBuf,
}

impl FilePlayback {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl AudioPlayback for FilePlayback {
    async fn play(&self, message_id: &str, audio_base64: &str) -> Result<()> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(audio_base64)
            .context("Reply audio is not valid base64")?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context("Failed to create reply directory")?;

        let safe_id: String = message_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let path = self.output_dir.join(format!("reply-{}.wav", safe_id));

        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write reply audio: {:?}", path))?;

        info!("Reply {} ready for playback: {} ({} bytes)", message_id, path.display(), bytes.len());
        Ok(())
    }
}

/// Drops reply audio; for hosts without a speaker
pub struct NoPlayback;

#[async_trait::async_trait]
impl AudioPlayback for NoPlayback {
    async fn play(&self, _message_id: &str, _audio_base64: &str) -> Result<()> {
        Ok(())
    }
}
