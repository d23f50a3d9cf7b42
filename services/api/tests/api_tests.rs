use api_lib::{
    config::{Config, Secrets},
    web::{router, AppState, LlmProvider, SessionStore},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use study_kit_core::{
    ChatTurn, DocumentTextExtractor, FeedbackRecord, FeedbackStore, LanguageModelService,
    PortError, PortResult, StudyService, TranscriptEntry, TranscriptService,
};
use tower::ServiceExt;
use uuid::Uuid;

const KIT: &str = r#"{"summary_points": ["Water is H2O"], "flashcards": [
    {"question": "Formula of water?", "answer": "H2O"}
], "quiz": [
    {"question": "What is H2O?", "options": ["A) Water", "B) Salt"], "correct_answer": "A"}
]}"#;
const CONCEPTS: &str = r#"```json
{"concepts": [{"title": "Photosynthesis", "summary": "Light becomes sugar"}]}
```"#;

//=========================================================================================
// Fake Adapters
//=========================================================================================

/// Answers generation prompts by mode and echoes chat turns.
struct FakeModel;

#[async_trait]
impl LanguageModelService for FakeModel {
    async fn generate(&self, prompt: &str, _json_output: bool) -> PortResult<String> {
        if prompt.contains("not json please") {
            return Ok("Sure! Here are your notes.".to_string());
        }
        if prompt.contains("\"concepts\"") {
            Ok(CONCEPTS.to_string())
        } else {
            Ok(KIT.to_string())
        }
    }

    async fn chat(&self, turns: &[ChatTurn]) -> PortResult<String> {
        Ok(format!("Answering after {} turns", turns.len()))
    }
}

struct FakeTranscripts;

#[async_trait]
impl TranscriptService for FakeTranscripts {
    async fn fetch_transcript(
        &self,
        video_id: &str,
        _languages: &[String],
    ) -> PortResult<Vec<TranscriptEntry>> {
        if video_id == "NoCaptions0" {
            return Err(PortError::NotFound("Transcripts are disabled".to_string()));
        }
        Ok(vec![
            TranscriptEntry {
                text: "Plants use light".to_string(),
                start: 0.0,
                duration: 1.5,
            },
            TranscriptEntry {
                text: "to make sugar".to_string(),
                start: 1.5,
                duration: 1.5,
            },
        ])
    }
}

struct FakePdf;

#[async_trait]
impl DocumentTextExtractor for FakePdf {
    async fn extract_pages(&self, document: &[u8]) -> PortResult<Vec<Option<String>>> {
        if !document.starts_with(b"%PDF") {
            return Err(PortError::InvalidInput("not a PDF".to_string()));
        }
        Ok(vec![Some("Chlorophyll absorbs light.".to_string()), None])
    }
}

#[derive(Default)]
struct FakeSheet {
    fail: bool,
    rows: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl FeedbackStore for FakeSheet {
    async fn append_feedback(&self, record: &FeedbackRecord) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Unexpected("quota exceeded".to_string()));
        }
        self.rows.lock().unwrap().push(record.to_row());
        Ok(())
    }
}

//=========================================================================================
// Harness
//=========================================================================================

fn test_config() -> Config {
    Config::from_sources(Secrets::default(), |key| match key {
        "GOOGLE_APPLICATION_CREDENTIALS" => Some("/nonexistent/credentials.json".to_string()),
        _ => None,
    })
    .unwrap()
}

fn app(llm: Option<Arc<dyn LanguageModelService>>, sheet: Arc<FakeSheet>) -> Router {
    let config = Arc::new(test_config());
    let study = Arc::new(StudyService::new(
        Arc::new(FakeTranscripts),
        Arc::new(FakePdf),
        sheet,
        config.study_settings(),
    ));
    let state = Arc::new(AppState {
        config: config.clone(),
        study,
        llm: LlmProvider::new(llm, &config.llm_api_base, &config.llm_model),
        sessions: SessionStore::default(),
    });
    router(state)
}

fn default_app() -> Router {
    app(Some(Arc::new(FakeModel)), Arc::new(FakeSheet::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn pdf_upload(uri: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "study-kit-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.pdf\"\r\nContent-Type: application/pdf\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::post(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn new_session(app: &Router) -> String {
    let (status, body) = send(app, Request::post("/sessions").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn health_reports_configured_key() {
    let (status, body) = send(&default_app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["llm_key_configured"], true);
}

#[tokio::test]
async fn session_lifecycle() {
    let app = default_app();
    let id = new_session(&app).await;

    let (status, body) = send(&app, get(&format!("/sessions/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], id.as_str());
    assert!(body["content"].is_null());

    let delete = Request::delete(format!("/sessions/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&format!("/sessions/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "session_not_found");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let uri = format!("/sessions/{}/generate/text", Uuid::new_v4());
    let (status, body) = send(&default_app(), post_json(&uri, json!({"text": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "session_not_found");
}

#[tokio::test]
async fn text_generation_then_quiz_grading() {
    let app = default_app();
    let id = new_session(&app).await;

    let (status, body) = send(
        &app,
        post_json(
            &format!("/sessions/{}/generate/text", id),
            json!({"text": "Water is made of hydrogen and oxygen."}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"]["kind"], "study_kit");
    assert_eq!(body["content"]["data"]["summary_points"][0], "Water is H2O");

    let quiz_uri = format!("/sessions/{}/quiz/0/answer", id);
    let (status, body) = send(&app, post_json(&quiz_uri, json!({"selected": "A) Water"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);

    let (_, body) = send(&app, post_json(&quiz_uri, json!({"selected": "B) Salt"}))).await;
    assert_eq!(body["correct"], false);
    assert_eq!(body["correct_option"], "A) Water");

    let (status, body) = send(
        &app,
        post_json(
            &format!("/sessions/{}/quiz/5/answer", id),
            json!({"selected": "A) Water"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "quiz_index_out_of_range");
}

#[tokio::test]
async fn quiz_before_generation_conflicts() {
    let app = default_app();
    let id = new_session(&app).await;
    let (status, body) = send(
        &app,
        post_json(&format!("/sessions/{}/quiz/0/answer", id), json!({"selected": "A"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "no_quiz");
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let app = default_app();
    let id = new_session(&app).await;
    let (status, body) = send(
        &app,
        post_json(&format!("/sessions/{}/generate/text", id), json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "empty_input");
}

#[tokio::test]
async fn malformed_model_output_is_a_gateway_error() {
    let app = default_app();
    let id = new_session(&app).await;
    let (status, body) = send(
        &app,
        post_json(
            &format!("/sessions/{}/generate/text", id),
            json!({"text": "not json please"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "malformed_model_output");

    let (_, session) = send(&app, get(&format!("/sessions/{}", id))).await;
    assert!(session["content"].is_null());
    assert_eq!(session["source"], "text");
}

#[tokio::test]
async fn missing_key_is_unauthorized() {
    let app = app(None, Arc::new(FakeSheet::default()));
    let id = new_session(&app).await;
    let (status, body) = send(
        &app,
        post_json(&format!("/sessions/{}/generate/text", id), json!({"text": "notes"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "missing_api_key");
}

#[tokio::test]
async fn video_generation_uses_transcript() {
    let app = default_app();
    let id = new_session(&app).await;
    let uri = format!("/sessions/{}/generate/video", id);

    let (status, body) = send(
        &app,
        post_json(&uri, json!({"url": "https://youtu.be/dQw4w9WgXcQ", "mode": "concepts"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"]["kind"], "concepts");

    let (_, session) = send(&app, get(&format!("/sessions/{}", id))).await;
    assert_eq!(session["source"], "video");
    assert_eq!(
        session["material_chars"],
        "Plants use light to make sugar".chars().count()
    );
}

#[tokio::test]
async fn video_errors_map_to_client_and_gateway_statuses() {
    let app = default_app();
    let id = new_session(&app).await;
    let uri = format!("/sessions/{}/generate/video", id);

    let (status, body) = send(&app, post_json(&uri, json!({"url": "https://example.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "unparseable_url");

    let (status, body) = send(
        &app,
        post_json(&uri, json!({"url": "https://www.youtube.com/watch?v=NoCaptions0"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "no_transcript");
}

#[tokio::test]
async fn pdf_upload_defaults_to_concepts_and_supports_chat() {
    let app = default_app();
    let id = new_session(&app).await;

    let (status, body) = send(
        &app,
        pdf_upload(&format!("/sessions/{}/generate/pdf", id), b"%PDF-1.7 fake"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"]["kind"], "concepts");
    assert_eq!(
        body["content"]["data"]["concepts"][0]["title"],
        "Photosynthesis"
    );

    let chat_uri = format!("/sessions/{}/chat", id);
    let (status, body) = send(
        &app,
        post_json(
            &chat_uri,
            json!({"concept": "Photosynthesis", "message": "Why green?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"]["role"], "model");
    assert_eq!(body["reply"]["body"]["type"], "content");
    assert_eq!(body["reply"]["body"]["text"], "Answering after 2 turns");
    assert_eq!(body["history"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app,
        post_json(&chat_uri, json!({"concept": "Gravity", "message": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_concept");
}

#[tokio::test]
async fn unreadable_pdf_is_unprocessable() {
    let app = default_app();
    let id = new_session(&app).await;
    let (status, body) = send(
        &app,
        pdf_upload(
            &format!("/sessions/{}/generate/pdf?mode=study_kit", id),
            b"plain text",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "unreadable_document");
}

#[tokio::test]
async fn feedback_is_appended_as_a_row() {
    let sheet = Arc::new(FakeSheet::default());
    let app = app(Some(Arc::new(FakeModel)), sheet.clone());
    let id = new_session(&app).await;

    let (status, body) = send(
        &app,
        post_json(
            &format!("/sessions/{}/feedback", id),
            json!({"rating": 4, "comment": "Helpful"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rating"], 4);

    let rows = sheet.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1..], ["4".to_string(), "Helpful".to_string(), id.clone()]);
}

#[tokio::test]
async fn feedback_rating_out_of_range_is_rejected() {
    let app = default_app();
    let id = new_session(&app).await;
    let (status, body) = send(
        &app,
        post_json(&format!("/sessions/{}/feedback", id), json!({"rating": 6})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_rating");
}

#[tokio::test]
async fn feedback_store_failure_is_a_gateway_error() {
    let sheet = Arc::new(FakeSheet {
        fail: true,
        ..FakeSheet::default()
    });
    let app = app(Some(Arc::new(FakeModel)), sheet);
    let id = new_session(&app).await;

    let (status, body) = send(
        &app,
        post_json(
            &format!("/sessions/{}/feedback", id),
            json!({"rating": 3, "comment": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "persistence");

    let (_, session) = send(&app, get(&format!("/sessions/{}", id))).await;
    assert_eq!(session["feedback_submitted"], false);
}
