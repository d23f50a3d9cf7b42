//! services/api/src/web/protocol.rs
//!
//! Defines the JSON request and response payloads exchanged between the browser
//! client and the API server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use study_kit_core::{
    grading::QuizGrade, ChatExchange, ChatTurn, FeedbackRecord, GeneratedContent,
    GenerationMode, SessionContext, SourceKind,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Requests Sent FROM the Client TO the Server
//=========================================================================================

/// Generate study content from pasted text.
#[derive(Deserialize, Debug, ToSchema)]
pub struct GenerateTextRequest {
    pub text: String,
    /// `study_kit` (default) or `concepts`.
    #[schema(value_type = Option<String>, example = "study_kit")]
    pub mode: Option<GenerationMode>,
}

/// Generate study content from a YouTube video's transcript.
#[derive(Deserialize, Debug, ToSchema)]
pub struct GenerateVideoRequest {
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    pub url: String,
    #[schema(value_type = Option<String>, example = "study_kit")]
    pub mode: Option<GenerationMode>,
}

/// Query parameters of the PDF upload. Documents default to concept extraction.
#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PdfGenerationParams {
    #[param(value_type = Option<String>, example = "concepts")]
    pub mode: Option<GenerationMode>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct QuizAnswerRequest {
    /// The full text of the chosen option.
    pub selected: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ChatRequest {
    /// Title of the concept the question is about.
    pub concept: String,
    pub message: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct FeedbackRequest {
    /// 1 to 5.
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

//=========================================================================================
// Responses Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Whether an LLM key was configured at startup; otherwise clients send `x-api-key`.
    pub llm_key_configured: bool,
}

/// The response payload sent after successfully creating a session.
#[derive(Serialize, Debug, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// A snapshot of one session.
#[derive(Serialize, Debug, ToSchema)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub source: Option<SourceKind>,
    /// Length of the current material in characters.
    pub material_chars: Option<usize>,
    #[schema(value_type = Option<Object>)]
    pub content: Option<GeneratedContent>,
    pub chat_threads: usize,
    pub feedback_submitted: bool,
}

impl From<&SessionContext> for SessionView {
    fn from(session: &SessionContext) -> Self {
        Self {
            session_id: session.id,
            created_at: session.created_at,
            last_active_at: session.last_active_at,
            source: session.material.as_ref().map(|m| m.source),
            material_chars: session.material.as_ref().map(|m| m.text.chars().count()),
            content: session.content.clone(),
            chat_threads: session.chats.len(),
            feedback_submitted: session.feedback_submitted,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct GenerateResponse {
    pub session_id: Uuid,
    /// Tagged by `kind`: `study_kit` or `concepts`.
    #[schema(value_type = Object)]
    pub content: GeneratedContent,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuizAnswerResponse {
    pub correct: bool,
    pub selected: String,
    pub correct_option: String,
}

impl From<QuizGrade> for QuizAnswerResponse {
    fn from(grade: QuizGrade) -> Self {
        Self {
            correct: grade.correct,
            selected: grade.selected,
            correct_option: grade.correct_option,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ChatResponse {
    pub concept: String,
    /// Either `{"type": "content"}` or `{"type": "error"}` in the body.
    #[schema(value_type = Object)]
    pub reply: ChatTurn,
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<ChatTurn>,
}

impl From<ChatExchange> for ChatResponse {
    fn from(exchange: ChatExchange) -> Self {
        Self {
            concept: exchange.concept,
            reply: exchange.reply,
            history: exchange.history,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct FeedbackResponse {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub rating: u8,
}

impl From<FeedbackRecord> for FeedbackResponse {
    fn from(record: FeedbackRecord) -> Self {
        Self {
            session_id: record.session_id,
            timestamp: record.timestamp,
            rating: record.rating.value(),
        }
    }
}
