use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::message::string_or_number;
use crate::conversation::{Message, MessageKind, Sender};

/// Character offered for a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub persona: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRoomRequest {
    pub character_id: i64,
    pub emotion: String,
}

/// Room created for one conversation; `id` scopes every realtime operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectCharacterRequest {
    pub character_id: i64,
}

/// Persisted message as returned by the history endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub room_id: i64,
    pub user_type: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for Message {
    fn from(record: ChatMessage) -> Self {
        Message {
            id: record.id,
            text: record.content,
            sender: record.user_type,
            kind: MessageKind::Text,
            audio_data: None,
            timestamp: record.created_at,
        }
    }
}

/// Diary produced from a finished conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub room_id: i64,
    pub content: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoLoginRequest {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoLoginResponse {
    pub access_token: String,
    pub profile_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub child_name: String,
    pub child_gender: String,
    pub child_age: u32,
    pub mother_name: String,
    pub child_interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentScores {
    pub language: f64,
    pub social: f64,
    pub emotional: f64,
    pub creativity: f64,
    pub curiosity: f64,
}

/// Parent-facing development report for one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReport {
    pub emotional_state: String,
    pub interests: Vec<String>,
    pub language_development: String,
    pub social_skills: String,
    pub highlights: Vec<String>,
    pub suggestions: Vec<String>,
    pub overall_assessment: String,
    pub development_scores: DevelopmentScores,
    pub overall_score: f64,
    pub created_at: String,
}
