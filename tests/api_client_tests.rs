// Integration tests for the REST client
//
// A small axum app stands in for the diary backend on a random local port.

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use iailog_client::api::SignupRequest;
use iailog_client::{ApiClient, DiaryService, Message, Sender};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const TOKEN: &str = "test-jwt";

#[derive(Clone, Default)]
struct Backend {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Backend {
    fn record(&self, route: &str, body: Value) {
        self.requests.lock().unwrap().push((route.to_string(), body));
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn characters() -> Json<Value> {
    Json(json!([
        {"id": 1, "name": "Bori", "category": "animal", "description": "A curious puppy", "persona": "cheerful"},
        {"id": 2, "name": "Luna", "category": "fantasy", "description": "A moon fairy", "persona": "calm"}
    ]))
}

async fn create_room(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    backend.record("create_room", body);
    Json(json!({"id": 42, "createdAt": "2025-05-01T10:00:00Z"}))
}

async fn select_character(
    State(backend): State<Backend>,
    Path(room_id): Path<i64>,
    Json(body): Json<Value>,
) -> StatusCode {
    backend.record(&format!("select_character/{}", room_id), body);
    StatusCode::CREATED
}

async fn messages(Path(room_id): Path<i64>) -> Json<Value> {
    Json(json!([
        {"id": 1, "roomId": room_id, "userType": "user", "content": "I went to the zoo", "createdAt": "2025-05-01T10:00:00Z"},
        {"id": 2, "roomId": room_id, "userType": "ai", "content": "Which animal did you like?", "createdAt": "2025-05-01T10:00:03Z"}
    ]))
}

fn diary_json(id: Value, room_id: i64) -> Value {
    json!({
        "id": id,
        "roomId": room_id,
        "content": "I saw an elephant at the zoo.",
        "summary": "Zoo day",
        "imageUrl": "https://cdn.example/zoo.png",
        "createdAt": "2025-05-01T10:05:00Z"
    })
}

async fn create_diary(Path(room_id): Path<i64>) -> (StatusCode, Json<Value>) {
    if room_id == 500 {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "summary model unavailable"})),
        );
    }
    (StatusCode::CREATED, Json(diary_json(json!(7), room_id)))
}

async fn get_diary(Path(room_id): Path<i64>) -> Json<Value> {
    Json(diary_json(json!("d-9"), room_id))
}

async fn all_diaries() -> Json<Value> {
    Json(json!([diary_json(json!(1), 10), diary_json(json!("2"), 11)]))
}

async fn parent_report(headers: HeaderMap, Path(room_id): Path<i64>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})));
    }

    (
        StatusCode::OK,
        Json(json!({
            "emotionalState": format!("room {} was cheerful", room_id),
            "interests": ["animals"],
            "languageDevelopment": "good",
            "socialSkills": "good",
            "highlights": ["named five animals"],
            "suggestions": ["visit the aquarium"],
            "overallAssessment": "healthy curiosity",
            "developmentScores": {"language": 80.0, "social": 75.5, "emotional": 90.0, "creativity": 70.0, "curiosity": 95.0},
            "overallScore": 82.1,
            "createdAt": "2025-05-01T10:06:00Z"
        })),
    )
}

async fn kakao_login(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    backend.record("kakao", body);
    Json(json!({"accessToken": TOKEN, "profileCompleted": false}))
}

async fn sign_up(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"success": false})));
    }
    backend.record("sign_up", body);
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    (StatusCode::OK, Json(json!({"childName": "Minji", "profileCompleted": true})))
}

async fn spawn_backend() -> Result<(String, Backend)> {
    let backend = Backend::default();

    let app = Router::new()
        .route("/characters", get(characters))
        .route("/chat/room", post(create_room))
        .route("/chat/room/:room_id/character", post(select_character))
        .route("/chat/room/:room_id/messages", get(messages))
        .route("/diary", get(all_diaries))
        .route("/diary/room/:room_id", post(create_diary).get(get_diary))
        .route("/diary/room/:room_id/parent-report", get(parent_report))
        .route("/auth/kakao/native", post(kakao_login))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/me", get(me))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{}/", addr), backend))
}

#[tokio::test]
async fn test_characters_and_room_creation() -> Result<()> {
    let (url, backend) = spawn_backend().await?;
    let client = ApiClient::new(url);
    assert!(!client.base_url().ends_with('/'));

    let characters = client.get_characters().await?;
    assert_eq!(characters.len(), 2);
    assert_eq!(characters[0].name, "Bori");

    let room = client.create_chat_room(1, "happy").await?;
    assert_eq!(room.id, 42);

    client.select_character(room.id, 2).await?;

    assert_eq!(
        backend.requests(),
        vec![
            ("create_room".to_string(), json!({"characterId": 1, "emotion": "happy"})),
            ("select_character/42".to_string(), json!({"characterId": 2})),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_history_converts_to_transcript_messages() -> Result<()> {
    let (url, _) = spawn_backend().await?;
    let client = ApiClient::new(url);

    let history = client.get_chat_messages(42).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, "1");

    let messages: Vec<Message> = history.into_iter().map(Message::from).collect();
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[1].sender, Sender::Ai);
    assert_eq!(messages[1].text, "Which animal did you like?");
    assert!(!messages[1].has_audio());
    Ok(())
}

#[tokio::test]
async fn test_create_diary_through_service_trait() -> Result<()> {
    let (url, _) = spawn_backend().await?;
    let service: Arc<dyn DiaryService> = Arc::new(ApiClient::new(url));

    let diary = service.create_diary(42).await?;
    assert_eq!(diary.id, "7");
    assert_eq!(diary.room_id, 42);
    assert_eq!(diary.summary, "Zoo day");
    assert_eq!(diary.image_url.as_deref(), Some("https://cdn.example/zoo.png"));
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_reported() -> Result<()> {
    let (url, _) = spawn_backend().await?;
    let client = ApiClient::new(url);

    let err = client.create_diary(500).await.unwrap_err();
    let text = format!("{:#}", err);
    assert!(text.contains("500"), "error: {}", text);
    assert!(text.contains("summary model unavailable"), "error: {}", text);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server() {
    let client = ApiClient::new("http://127.0.0.1:1");
    let err = client.get_characters().await.unwrap_err();
    assert!(format!("{}", err).contains("Cannot reach the server"));
}

#[tokio::test]
async fn test_diary_lookups_accept_string_and_numeric_ids() -> Result<()> {
    let (url, _) = spawn_backend().await?;
    let client = ApiClient::new(url);

    assert_eq!(client.get_diary(11).await?.id, "d-9");

    let ids: Vec<String> = client.get_all_diaries().await?.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_bearer_token_is_sent() -> Result<()> {
    let (url, backend) = spawn_backend().await?;

    let anonymous = ApiClient::new(url.clone());
    assert!(anonymous.get_parent_report(42).await.is_err());
    assert!(anonymous.get_me().await.is_err());

    let login = anonymous.kakao_login("kakao-access").await?;
    assert!(!login.profile_completed);

    let client = ApiClient::new(url).with_token(login.access_token);
    let report = client.get_parent_report(42).await?;
    assert_eq!(report.emotional_state, "room 42 was cheerful");
    assert!((report.development_scores.social - 75.5).abs() < 1e-9);

    let signup = client
        .signup(&SignupRequest {
            child_name: "Minji".to_string(),
            child_gender: "female".to_string(),
            child_age: 6,
            mother_name: "Sora".to_string(),
            child_interests: vec!["animals".to_string(), "drawing".to_string()],
        })
        .await?;
    assert!(signup.success);

    let me = client.get_me().await?;
    assert_eq!(me["childName"], "Minji");

    let requests = backend.requests();
    assert_eq!(requests[0], ("kakao".to_string(), json!({"accessToken": "kakao-access"})));
    assert_eq!(requests[1].1["childInterests"], json!(["animals", "drawing"]));
    assert_eq!(requests[1].1["motherName"], "Sora");
    Ok(())
}
