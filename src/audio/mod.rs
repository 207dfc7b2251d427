pub mod backend;
pub mod file;
pub mod playback;

pub use backend::{AudioBackend, AudioBackendConfig, AudioFrame};
pub use file::{AudioFile, FileBackend};
pub use playback::{AudioPlayback, FilePlayback, NoPlayback};
