//! Conversation session core
//!
//! This module provides:
//! - The `Message` shape shared by the realtime channel and history view
//! - Transcript bookkeeping with the text/voice reply merge
//! - The processing-stage tracker behind the busy indicator
//! - `ConversationSession`, the lifecycle from connect to diary

mod controller;
pub(crate) mod message;
mod processing;
mod state;
mod transcript;

pub use controller::ConversationSession;
pub use message::{Message, MessageKind, Sender};
pub use processing::{ProcessingState, ProcessingStatus, ProcessingTracker, Stage};
pub use state::{ConversationRoom, SessionState};
pub use transcript::{Applied, Transcript};
