pub mod api;
pub mod app;
pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod recording;
pub mod socket;

pub use api::{ApiClient, Diary, DiaryService};
pub use app::{AppStore, Screen, SessionHost};
pub use audio::{AudioBackend, AudioBackendConfig, AudioFile, AudioFrame, AudioPlayback, FileBackend, FilePlayback};
pub use config::Config;
pub use conversation::{
    ConversationRoom, ConversationSession, Message, MessageKind, ProcessingState, ProcessingStatus,
    Sender, SessionState, Stage, Transcript,
};
pub use error::SessionError;
pub use recording::{AudioCapture, VoiceRecorder, WavCapture};
pub use socket::{Channel, ChannelEvent, ClientEvent, Connector, ServerEvent};
