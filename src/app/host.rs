use serde::{Deserialize, Serialize};

use crate::api::Diary;
use crate::conversation::{Message, ProcessingState};
use crate::error::SessionError;

/// Screens of the app, in the order a child normally walks through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    Onboarding,
    Signup,
    Concept,
    Character,
    Emotion,
    Conversation,
    Diary,
    Collection,
    DiaryDetail,
    ChatHistory,
}

/// What a conversation session needs from the application hosting it.
///
/// The session calls these from its own task; implementations should only
/// record state or forward it, never block.
pub trait SessionHost: Send + Sync {
    fn transcript_updated(&self, _messages: &[Message]) {}

    fn processing_changed(&self, _state: &ProcessingState) {}

    /// Gates the send affordances
    fn connection_changed(&self, _connected: bool) {}

    /// User-visible error feedback
    fn alert(&self, error: &SessionError);

    fn diary_ready(&self, diary: Diary);

    fn navigate(&self, screen: Screen);
}
