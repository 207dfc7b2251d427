// Tests for typed client and server events

use chrono::{TimeZone, Utc};
use iailog_client::conversation::{MessageKind, Sender, Stage};
use iailog_client::socket::{describe_error, ClientEvent, ServerEvent, SocketPacket};
use serde_json::json;

#[test]
fn test_client_event_payloads() {
    let join = ClientEvent::JoinRoom { room_id: 42 };
    assert_eq!(join.name(), "joinRoom");
    assert_eq!(join.payload(), json!({"roomId": 42}));

    let text = ClientEvent::SendMessage {
        room_id: 42,
        text: "I drew a cat".to_string(),
    };
    assert_eq!(text.payload(), json!({"roomId": 42, "text": "I drew a cat"}));

    let voice = ClientEvent::SendVoiceMessage {
        room_id: 7,
        audio_data: "UklGRg==".to_string(),
    };
    assert_eq!(voice.room_id(), 7);
    assert_eq!(
        voice.to_packet(),
        SocketPacket::Event {
            name: "sendVoiceMessage".to_string(),
            payload: json!({"roomId": 7, "audioData": "UklGRg=="}),
        }
    );
}

#[test]
fn test_message_event_with_epoch_timestamp() {
    let event = ServerEvent::from_named(
        "message",
        json!({
            "id": "1715000000000",
            "text": "Hello!",
            "sender": "ai",
            "type": "voice",
            "audioData": "UklGRg==",
            "timestamp": 1_715_000_000_000i64
        }),
    )
    .unwrap()
    .unwrap();

    let ServerEvent::Message(message) = event else {
        panic!("expected a message event");
    };
    assert_eq!(message.sender, Sender::Ai);
    assert_eq!(message.kind, MessageKind::Voice);
    assert!(message.has_audio());
    assert_eq!(message.timestamp, Utc.timestamp_millis_opt(1_715_000_000_000).unwrap());
}

#[test]
fn test_message_event_with_numeric_id() {
    let event = ServerEvent::from_named(
        "message",
        json!({
            "id": 17,
            "text": "What did you eat?",
            "sender": "ai",
            "type": "text",
            "timestamp": "2025-05-01T10:00:00Z"
        }),
    )
    .unwrap()
    .unwrap();

    let ServerEvent::Message(message) = event else {
        panic!("expected a message event");
    };
    assert_eq!(message.id, "17");
    assert_eq!(message.text, "What did you eat?");
}

#[test]
fn test_message_event_with_rfc3339_timestamp() {
    let event = ServerEvent::from_named(
        "message",
        json!({
            "id": "m2",
            "text": "What did you eat?",
            "sender": "ai",
            "type": "text",
            "timestamp": "2025-05-01T10:00:02.500Z"
        }),
    )
    .unwrap();

    match event {
        Some(ServerEvent::Message(message)) => {
            assert!(!message.has_audio());
            assert_eq!(message.timestamp.timestamp_millis() % 1000, 500);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_processing_event() {
    let event = ServerEvent::from_named("processing", json!({"stage": "tts", "message": "Speaking..."}))
        .unwrap()
        .unwrap();

    match event {
        ServerEvent::Processing(status) => {
            assert_eq!(status.stage, Stage::Tts);
            assert_eq!(status.message, "Speaking...");
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(ServerEvent::from_named("processing", json!({"stage": "dreaming"})).is_err());
}

#[test]
fn test_unknown_and_passthrough_events() {
    assert_eq!(ServerEvent::from_named("typing", json!({})).unwrap(), None);

    let timeout = ServerEvent::from_named("sessionTimeout", json!({"roomId": 42}))
        .unwrap()
        .unwrap();
    assert_eq!(timeout.name(), "sessionTimeout");
}

#[test]
fn test_describe_error() {
    assert_eq!(describe_error(&json!("boom")), "boom");
    assert_eq!(describe_error(&json!({"message": "Room not found"})), "Room not found");
    assert_eq!(describe_error(&json!({"code": 500})), r#"{"code":500}"#);
    assert_eq!(describe_error(&serde_json::Value::Null), "unknown error");
}
