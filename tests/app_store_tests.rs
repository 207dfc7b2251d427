// Tests for the shared application store

mod support;

use chrono::Utc;
use iailog_client::api::Character;
use iailog_client::conversation::{Message, ProcessingState, Stage};
use iailog_client::{AppStore, Screen, SessionError, SessionHost};

#[test]
fn test_new_store_starts_at_onboarding() {
    let store = AppStore::new();
    let state = store.snapshot();

    assert_eq!(state.current_step, Screen::Onboarding);
    assert!(state.jwt_token.is_none());
    assert!(state.transcript.is_empty());
}

#[test]
fn test_begin_conversation_clears_previous_room() {
    let store = AppStore::new();
    store.set_selected_character(Character {
        id: 1,
        name: "Bori".to_string(),
        category: "animal".to_string(),
        description: "A curious puppy".to_string(),
        persona: "cheerful".to_string(),
    });
    store.set_selected_emotion("happy");
    store.transcript_updated(&[Message::user_text("hi", Utc::now())]);
    store.processing_changed(&ProcessingState::Busy {
        stage: Stage::Ai,
        message: "Thinking...".to_string(),
    });

    store.begin_conversation(42);

    let state = store.snapshot();
    assert_eq!(state.current_room, Some(42));
    assert_eq!(state.current_step, Screen::Conversation);
    assert!(state.transcript.is_empty());
    assert!(!state.busy);
    assert_eq!(state.selected_emotion.as_deref(), Some("happy"));
    assert_eq!(state.selected_character.map(|c| c.id), Some(1));
}

#[test]
fn test_session_callbacks_update_state() {
    let store = AppStore::new();
    let host: &dyn SessionHost = &store;

    host.connection_changed(true);
    host.alert(&SessionError::NotConnected);
    host.diary_ready(support::sample_diary(42));
    host.navigate(Screen::Diary);

    let state = store.snapshot();
    assert!(state.connected);
    assert_eq!(state.current_step, Screen::Diary);
    assert_eq!(state.diary_entries.len(), 1);
    assert_eq!(state.current_diary.map(|d| d.room_id), Some(42));

    assert_eq!(store.take_alerts(), vec![SessionError::NotConnected]);
    assert!(store.take_alerts().is_empty());
}

#[test]
fn test_clones_share_state_and_reset() {
    let store = AppStore::new();
    let other = store.clone();

    other.set_jwt_token(Some("jwt".to_string()));
    other.set_profile_completed(true);
    assert_eq!(store.snapshot().jwt_token.as_deref(), Some("jwt"));
    assert!(store.snapshot().profile_completed);

    store.reset();
    assert!(other.snapshot().jwt_token.is_none());
    assert_eq!(other.current_step(), Screen::Onboarding);
}
