//! REST access to the diary backend
//!
//! Rooms are created here before a realtime session starts, and the
//! finished conversation is turned into a diary through [`DiaryService`].

mod client;
mod types;

pub use client::{ApiClient, DiaryService};
pub use types::{
    Character, ChatMessage, ChatRoom, CreateChatRoomRequest, DevelopmentScores, Diary,
    KakaoLoginRequest, KakaoLoginResponse, ParentReport, SelectCharacterRequest, SignupRequest,
    SignupResponse,
};
