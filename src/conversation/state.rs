use serde::{Deserialize, Serialize};
use std::fmt;

/// Room a session talks in; fixed for the session's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRoom {
    pub room_id: i64,
    pub character_id: i64,
    pub emotion: String,
}

/// Lifecycle of a conversation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Channel up and `joinRoom` sent
    Joined,
    /// At least one message went out or came in
    Active,
    /// Diary creation requested; stays here until it succeeds or the user leaves
    Finalizing,
    Ended,
}

impl SessionState {
    /// States in which text or voice can be exchanged
    pub fn accepts_input(&self) -> bool {
        matches!(self, SessionState::Joined | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Joined => "joined",
            SessionState::Active => "active",
            SessionState::Finalizing => "finalizing",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}
