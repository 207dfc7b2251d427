use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{error, info};

use super::types::{
    Character, ChatMessage, ChatRoom, CreateChatRoomRequest, Diary, KakaoLoginRequest,
    KakaoLoginResponse, ParentReport, SelectCharacterRequest, SignupRequest, SignupResponse,
};

/// Turns a finished conversation into a diary entry.
///
/// This is the only REST call the session controller makes itself, so it
/// sits behind a trait the controller can be handed in tests.
#[async_trait::async_trait]
pub trait DiaryService: Send + Sync {
    async fn create_diary(&self, room_id: i64) -> Result<Diary>;
}

/// JSON client for the diary backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach the JWT issued by the login flow
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /characters
    pub async fn get_characters(&self) -> Result<Vec<Character>> {
        let response = self.send(self.request(Method::GET, "/characters"), "fetch characters").await?;
        Self::json(response, "fetch characters").await
    }

    /// POST /chat/room
    pub async fn create_chat_room(&self, character_id: i64, emotion: &str) -> Result<ChatRoom> {
        let body = CreateChatRoomRequest {
            character_id,
            emotion: emotion.to_string(),
        };
        info!("Creating chat room (character={}, emotion={})", character_id, emotion);

        let request = self.request(Method::POST, "/chat/room").json(&body);
        let response = self.send(request, "create chat room").await?;
        let room: ChatRoom = Self::json(response, "create chat room").await?;

        info!("Chat room created: {}", room.id);
        Ok(room)
    }

    /// POST /chat/room/{roomId}/character
    pub async fn select_character(&self, room_id: i64, character_id: i64) -> Result<()> {
        let body = SelectCharacterRequest { character_id };
        let request = self
            .request(Method::POST, &format!("/chat/room/{}/character", room_id))
            .json(&body);
        self.send(request, "select character").await?;
        Ok(())
    }

    /// GET /chat/room/{roomId}/messages
    pub async fn get_chat_messages(&self, room_id: i64) -> Result<Vec<ChatMessage>> {
        let request = self.request(Method::GET, &format!("/chat/room/{}/messages", room_id));
        let response = self.send(request, "fetch messages").await?;
        Self::json(response, "fetch messages").await
    }

    /// GET /diary/room/{roomId}
    pub async fn get_diary(&self, room_id: i64) -> Result<Diary> {
        let request = self.request(Method::GET, &format!("/diary/room/{}", room_id));
        let response = self.send(request, "fetch diary").await?;
        Self::json(response, "fetch diary").await
    }

    /// GET /diary
    pub async fn get_all_diaries(&self) -> Result<Vec<Diary>> {
        let response = self.send(self.request(Method::GET, "/diary"), "fetch diaries").await?;
        Self::json(response, "fetch diaries").await
    }

    /// POST /auth/kakao/native
    pub async fn kakao_login(&self, access_token: &str) -> Result<KakaoLoginResponse> {
        let body = KakaoLoginRequest {
            access_token: access_token.to_string(),
        };
        let request = self.request(Method::POST, "/auth/kakao/native").json(&body);
        let response = self.send(request, "kakao login").await?;
        Self::json(response, "kakao login").await
    }

    /// POST /auth/sign-up (bearer)
    pub async fn signup(&self, signup: &SignupRequest) -> Result<SignupResponse> {
        let request = self.request(Method::POST, "/auth/sign-up").json(signup);
        let response = self.send(request, "sign up").await?;
        Self::json(response, "sign up").await
    }

    /// GET /auth/me (bearer)
    pub async fn get_me(&self) -> Result<serde_json::Value> {
        let response = self.send(self.request(Method::GET, "/auth/me"), "fetch profile").await?;
        Self::json(response, "fetch profile").await
    }

    /// GET /diary/room/{roomId}/parent-report (bearer)
    pub async fn get_parent_report(&self, room_id: i64) -> Result<ParentReport> {
        let request = self.request(
            Method::GET,
            &format!("/diary/room/{}/parent-report", room_id),
        );
        let response = self.send(request, "fetch parent report").await?;
        Self::json(response, "fetch parent report").await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            error!("Request to {} failed: {}", what, e);
            anyhow::anyhow!("Cannot reach the server ({}): {}", what, e)
        })?;

        let status = response.status();
        info!("{}: {}", what, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} returned {}: {}", what, status, body);
            anyhow::bail!("Failed to {}: {} {}", what, status, body);
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode {} response", what))
    }
}

#[async_trait::async_trait]
impl DiaryService for ApiClient {
    /// POST /diary/room/{roomId}
    async fn create_diary(&self, room_id: i64) -> Result<Diary> {
        info!("Creating diary for room {}", room_id);

        let request = self.request(Method::POST, &format!("/diary/room/{}", room_id));
        let response = self.send(request, "create diary").await?;
        let diary: Diary = Self::json(response, "create diary").await?;

        info!("Diary {} created for room {}", diary.id, room_id);
        Ok(diary)
    }
}
