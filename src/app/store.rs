use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use super::host::{Screen, SessionHost};
use crate::api::{Character, Diary};
use crate::conversation::{Message, ProcessingState};
use crate::error::SessionError;

/// Application state shared between screens
#[derive(Debug, Clone)]
pub struct AppState {
    pub current_step: Screen,
    pub jwt_token: Option<String>,
    pub profile_completed: bool,
    pub selected_character: Option<Character>,
    pub selected_emotion: Option<String>,
    pub current_room: Option<i64>,
    pub transcript: Vec<Message>,
    pub connected: bool,
    pub busy: bool,
    pub busy_label: Option<String>,
    pub alerts: Vec<SessionError>,
    pub current_diary: Option<Diary>,
    pub diary_entries: Vec<Diary>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            current_step: Screen::Onboarding,
            jwt_token: None,
            profile_completed: false,
            selected_character: None,
            selected_emotion: None,
            current_room: None,
            transcript: Vec::new(),
            connected: false,
            busy: false,
            busy_label: None,
            alerts: Vec::new(),
            current_diary: None,
            diary_entries: Vec::new(),
        }
    }
}

/// Cloneable handle to the application state, injected into sessions
#[derive(Debug, Clone, Default)]
pub struct AppStore {
    inner: Arc<RwLock<AppState>>,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> AppState {
        self.read().clone()
    }

    pub fn current_step(&self) -> Screen {
        self.read().current_step
    }

    pub fn set_current_step(&self, step: Screen) {
        debug!("Navigating to {:?}", step);
        self.write().current_step = step;
    }

    pub fn set_jwt_token(&self, token: Option<String>) {
        self.write().jwt_token = token;
    }

    pub fn set_profile_completed(&self, completed: bool) {
        self.write().profile_completed = completed;
    }

    pub fn set_selected_character(&self, character: Character) {
        self.write().selected_character = Some(character);
    }

    pub fn set_selected_emotion(&self, emotion: impl Into<String>) {
        self.write().selected_emotion = Some(emotion.into());
    }

    /// Start tracking a new room; clears the previous conversation
    pub fn begin_conversation(&self, room_id: i64) {
        let mut state = self.write();
        state.current_room = Some(room_id);
        state.transcript.clear();
        state.busy = false;
        state.busy_label = None;
        state.connected = false;
        state.current_step = Screen::Conversation;
    }

    pub fn set_current_diary(&self, diary: Option<Diary>) {
        self.write().current_diary = diary;
    }

    /// Alerts not yet shown to the user, oldest first
    pub fn take_alerts(&self) -> Vec<SessionError> {
        std::mem::take(&mut self.write().alerts)
    }

    pub fn reset(&self) {
        *self.write() = AppState::default();
    }

    fn read(&self) -> RwLockReadGuard<'_, AppState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppState> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionHost for AppStore {
    fn transcript_updated(&self, messages: &[Message]) {
        self.write().transcript = messages.to_vec();
    }

    fn processing_changed(&self, processing: &ProcessingState) {
        let mut state = self.write();
        match processing {
            ProcessingState::Idle => {
                state.busy = false;
                state.busy_label = None;
            }
            ProcessingState::Busy { message, .. } => {
                state.busy = true;
                state.busy_label = Some(message.clone());
            }
        }
    }

    fn connection_changed(&self, connected: bool) {
        self.write().connected = connected;
    }

    fn alert(&self, error: &SessionError) {
        warn!("Alert: {}", error);
        self.write().alerts.push(error.clone());
    }

    fn diary_ready(&self, diary: Diary) {
        let mut state = self.write();
        state.diary_entries.push(diary.clone());
        state.current_diary = Some(diary);
    }

    fn navigate(&self, screen: Screen) {
        self.set_current_step(screen);
    }
}
