use std::time::Duration;

use super::message::{Message, MessageKind};

/// What happened when an incoming message was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A new bubble was appended at `index`
    Inserted { index: usize, play_audio: bool },
    /// An earlier AI bubble with the same text received audio
    Upgraded { index: usize, play_audio: bool },
    /// Same text as an earlier AI bubble that already had everything this one carries
    Duplicate { index: usize },
}

impl Applied {
    pub fn index(&self) -> usize {
        match self {
            Applied::Inserted { index, .. }
            | Applied::Upgraded { index, .. }
            | Applied::Duplicate { index } => *index,
        }
    }

    /// True exactly once per AI reply that carries playable audio
    pub fn should_play(&self) -> bool {
        matches!(
            self,
            Applied::Inserted { play_audio: true, .. } | Applied::Upgraded { play_audio: true, .. }
        )
    }
}

/// Ordered messages of one room.
///
/// The server answers a turn with a fast text-only reply and, later, a
/// synthesized voice version of the same text. An AI message whose text
/// matches an AI message stamped within `dedup_window` of it is merged into
/// that earlier bubble instead of being appended. Two different replies
/// that happen to share text inside the window merge as well.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    dedup_window: Duration,
}

impl Transcript {
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            messages: Vec::new(),
            dedup_window,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append the optimistic echo of something the user sent
    pub fn push_local(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Take back the most recent echo when its emit was refused
    pub fn pop_local(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    /// Apply a message pushed by the server
    pub fn apply_incoming(&mut self, incoming: Message) -> Applied {
        if incoming.is_ai() {
            if let Some(index) = self.find_recent_twin(&incoming) {
                let existing = &mut self.messages[index];

                if incoming.has_audio() && !existing.has_audio() {
                    existing.audio_data = incoming.audio_data;
                    existing.kind = MessageKind::Voice;
                    return Applied::Upgraded {
                        index,
                        play_audio: true,
                    };
                }

                return Applied::Duplicate { index };
            }
        }

        let play_audio =
            incoming.is_ai() && incoming.kind == MessageKind::Voice && incoming.has_audio();
        self.messages.push(incoming);

        Applied::Inserted {
            index: self.messages.len() - 1,
            play_audio,
        }
    }

    fn find_recent_twin(&self, incoming: &Message) -> Option<usize> {
        let window_ms = self.dedup_window.as_millis() as i64;

        self.messages.iter().rposition(|m| {
            m.is_ai()
                && m.text == incoming.text
                && (incoming.timestamp - m.timestamp).num_milliseconds().abs() <= window_ms
        })
    }
}
