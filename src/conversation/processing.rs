use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Phase of the server's reply pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Stt,
    Ai,
    Tts,
    Complete,
}

/// Payload of a `processing` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub stage: Stage,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    Busy { stage: Stage, message: String },
}

impl ProcessingState {
    pub fn is_busy(&self) -> bool {
        matches!(self, ProcessingState::Busy { .. })
    }
}

/// Mirrors the last `processing` event into a busy flag.
///
/// Only `complete` clears the flag. Without a watchdog a lost `complete`
/// leaves the indicator busy for good.
#[derive(Debug)]
pub struct ProcessingTracker {
    state: ProcessingState,
    last_event_at: Option<Instant>,
    watchdog: Option<Duration>,
}

impl ProcessingTracker {
    pub fn new(watchdog: Option<Duration>) -> Self {
        Self {
            state: ProcessingState::Idle,
            last_event_at: None,
            watchdog,
        }
    }

    pub fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn apply(&mut self, status: ProcessingStatus) -> &ProcessingState {
        debug!("Processing stage: {:?} ({})", status.stage, status.message);
        self.last_event_at = Some(Instant::now());

        self.state = match status.stage {
            Stage::Complete => ProcessingState::Idle,
            stage => ProcessingState::Busy {
                stage,
                message: status.message,
            },
        };

        &self.state
    }

    /// When the watchdog would fire, if it is armed and the tracker is busy
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        match (self.watchdog, self.last_event_at, &self.state) {
            (Some(limit), Some(last), ProcessingState::Busy { .. }) => Some(last + limit),
            _ => None,
        }
    }

    /// Clear a stale busy state. Returns true if the state changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.watchdog_deadline() {
            Some(deadline) if now >= deadline => {
                warn!("No processing update for {:?}, clearing busy indicator", self.watchdog);
                self.state = ProcessingState::Idle;
                true
            }
            _ => false,
        }
    }
}
