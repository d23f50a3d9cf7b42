//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::{
    error::{ApiError, ErrorBody},
    web::{
        protocol::{
            ChatRequest, ChatResponse, CreateSessionResponse, FeedbackRequest, FeedbackResponse,
            GenerateResponse, GenerateTextRequest, GenerateVideoRequest, HealthResponse,
            PdfGenerationParams, QuizAnswerRequest, QuizAnswerResponse, SessionView,
        },
        state::{AppState, SharedSession},
    },
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Duration;
use std::sync::Arc;
use study_kit_core::{GenerationMode, LanguageModelService};
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

/// Header carrying a user-entered LLM key when none is configured.
pub const API_KEY_HEADER: &str = "x-api-key";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        create_session_handler,
        get_session_handler,
        delete_session_handler,
        generate_text_handler,
        generate_video_handler,
        generate_pdf_handler,
        answer_quiz_handler,
        chat_handler,
        feedback_handler,
    ),
    components(
        schemas(
            HealthResponse, CreateSessionResponse, SessionView, GenerateTextRequest,
            GenerateVideoRequest, GenerateResponse, QuizAnswerRequest, QuizAnswerResponse,
            ChatRequest, ChatResponse, FeedbackRequest, FeedbackResponse, ErrorBody
        )
    ),
    tags(
        (name = "AutoStudy API", description = "Turn text, videos and PDFs into study material.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Handler Helpers
//=========================================================================================

async fn load_session(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

fn resolve_llm(state: &AppState, headers: &HeaderMap) -> Option<Arc<dyn LanguageModelService>> {
    let entered = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    state.llm.resolve(entered)
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        llm_key_configured: state.llm.has_configured_key(),
    })
}

/// Start a new study session. Idle sessions are expired first.
#[utoipa::path(
    post,
    path = "/sessions",
    responses((status = 201, description = "Session created", body = CreateSessionResponse))
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .sessions
        .expire_idle(Duration::minutes(state.config.session_idle_minutes))
        .await;
    let session_id = state.sessions.create().await;
    info!("Session {} started", session_id);
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id })))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Current session state", body = SessionView),
        (status = 404, description = "Unknown or expired session", body = ErrorBody)
    )
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = load_session(&state, id).await?;
    let session = session.lock().await;
    Ok(Json(SessionView::from(&*session)))
}

/// End a session and drop everything it holds.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "Unknown or expired session", body = ErrorBody)
    )
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.sessions.remove(id).await {
        return Err(ApiError::SessionNotFound(id));
    }
    info!("Session {} ended", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Generate study content from pasted text.
#[utoipa::path(
    post,
    path = "/sessions/{id}/generate/text",
    request_body = GenerateTextRequest,
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("x-api-key" = Option<String>, Header, description = "LLM key, used only when none is configured.")
    ),
    responses(
        (status = 200, description = "Content generated", body = GenerateResponse),
        (status = 400, description = "Empty input", body = ErrorBody),
        (status = 401, description = "No API key available", body = ErrorBody),
        (status = 502, description = "The model failed or returned malformed output", body = ErrorBody)
    )
)]
pub async fn generate_text_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<GenerateTextRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let session = load_session(&state, id).await?;
    let llm = resolve_llm(&state, &headers);
    let mut session = session.lock().await;
    session.touch();

    let content = state
        .study
        .generate_from_text(
            &mut session,
            llm.as_deref(),
            &request.text,
            request.mode.unwrap_or_default(),
        )
        .await?;
    Ok(Json(GenerateResponse {
        session_id: id,
        content,
    }))
}

/// Generate study content from a YouTube video's transcript.
#[utoipa::path(
    post,
    path = "/sessions/{id}/generate/video",
    request_body = GenerateVideoRequest,
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("x-api-key" = Option<String>, Header, description = "LLM key, used only when none is configured.")
    ),
    responses(
        (status = 200, description = "Content generated", body = GenerateResponse),
        (status = 400, description = "No video id in the URL", body = ErrorBody),
        (status = 401, description = "No API key available", body = ErrorBody),
        (status = 502, description = "No transcript, or the model failed", body = ErrorBody)
    )
)]
pub async fn generate_video_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<GenerateVideoRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let session = load_session(&state, id).await?;
    let llm = resolve_llm(&state, &headers);
    let mut session = session.lock().await;
    session.touch();

    let content = state
        .study
        .generate_from_video(
            &mut session,
            llm.as_deref(),
            &request.url,
            request.mode.unwrap_or_default(),
        )
        .await?;
    Ok(Json(GenerateResponse {
        session_id: id,
        content,
    }))
}

/// Generate study content from an uploaded PDF.
///
/// Accepts a multipart/form-data request; the first part is the document.
#[utoipa::path(
    post,
    path = "/sessions/{id}/generate/pdf",
    request_body(content_type = "multipart/form-data", description = "The PDF to study."),
    params(
        ("id" = Uuid, Path, description = "Session id"),
        PdfGenerationParams,
        ("x-api-key" = Option<String>, Header, description = "LLM key, used only when none is configured.")
    ),
    responses(
        (status = 200, description = "Content generated", body = GenerateResponse),
        (status = 400, description = "Missing file", body = ErrorBody),
        (status = 422, description = "Unreadable document or no extractable text", body = ErrorBody),
        (status = 502, description = "The model failed or returned malformed output", body = ErrorBody)
    )
)]
pub async fn generate_pdf_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PdfGenerationParams>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
        .ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;
    let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
    let document = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
    if document.is_empty() {
        return Err(ApiError::BadRequest("The uploaded file is empty".to_string()));
    }
    info!("Session {}: received '{}' ({} bytes)", id, file_name, document.len());

    let session = load_session(&state, id).await?;
    let llm = resolve_llm(&state, &headers);
    let mut session = session.lock().await;
    session.touch();

    let content = state
        .study
        .generate_from_pdf(
            &mut session,
            llm.as_deref(),
            &document,
            params.mode.unwrap_or(GenerationMode::Concepts),
        )
        .await?;
    Ok(Json(GenerateResponse {
        session_id: id,
        content,
    }))
}

/// Grade one quiz answer against the current study kit.
#[utoipa::path(
    post,
    path = "/sessions/{id}/quiz/{index}/answer",
    request_body = QuizAnswerRequest,
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("index" = usize, Path, description = "Zero-based question index")
    ),
    responses(
        (status = 200, description = "Answer graded", body = QuizAnswerResponse),
        (status = 404, description = "No such question", body = ErrorBody),
        (status = 409, description = "No quiz generated yet", body = ErrorBody)
    )
)]
pub async fn answer_quiz_handler(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(request): Json<QuizAnswerRequest>,
) -> Result<Json<QuizAnswerResponse>, ApiError> {
    let session = load_session(&state, id).await?;
    let mut session = session.lock().await;
    session.touch();

    let grade = state.study.answer_quiz(&session, index, &request.selected)?;
    Ok(Json(grade.into()))
}

/// Ask a follow-up question about one concept of the current document.
///
/// A model failure is returned as an error turn in a 200 response; the thread stays usable.
#[utoipa::path(
    post,
    path = "/sessions/{id}/chat",
    request_body = ChatRequest,
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("x-api-key" = Option<String>, Header, description = "LLM key, used only when none is configured.")
    ),
    responses(
        (status = 200, description = "Reply and updated history", body = ChatResponse),
        (status = 400, description = "Empty message", body = ErrorBody),
        (status = 404, description = "Unknown concept", body = ErrorBody)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session = load_session(&state, id).await?;
    let llm = resolve_llm(&state, &headers);
    let mut session = session.lock().await;
    session.touch();

    let exchange = state
        .study
        .send_chat_message(&mut session, llm.as_deref(), &request.concept, &request.message)
        .await?;
    Ok(Json(exchange.into()))
}

/// Record a rating and comment in the feedback spreadsheet.
#[utoipa::path(
    post,
    path = "/sessions/{id}/feedback",
    request_body = FeedbackRequest,
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 201, description = "Feedback saved", body = FeedbackResponse),
        (status = 400, description = "Rating outside 1 to 5", body = ErrorBody),
        (status = 502, description = "The feedback store failed", body = ErrorBody)
    )
)]
pub async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&state, id).await?;
    let mut session = session.lock().await;
    session.touch();

    let record = state
        .study
        .submit_feedback(&mut session, request.rating, &request.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(FeedbackResponse::from(record))))
}
