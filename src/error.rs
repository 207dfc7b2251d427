use thiserror::Error;

/// Failures surfaced to the person using the app.
///
/// Everything that goes wrong at a network, channel or audio boundary is
/// converted into one of these and handed to [`crate::app::SessionHost::alert`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The realtime channel could not be established within the retry budget
    #[error("Could not connect to the conversation server after {attempts} attempts: {reason}")]
    Connection { attempts: u32, reason: String },

    /// An emit was attempted while the channel is down
    #[error("Not connected to the conversation server")]
    NotConnected,

    #[error("Diary creation failed: {0}")]
    Finalization(String),

    /// Error pushed by the server over the channel
    #[error("Server error: {0}")]
    Server(String),

    #[error("Recording failed: {0}")]
    Recording(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Cannot {action} while the session is {state}")]
    InvalidState { action: &'static str, state: String },
}
