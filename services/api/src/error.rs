//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use study_kit_core::{PortError, StudyError};
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the service adapters.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A user action failed; the message is meant for the user.
    #[error("{0}")]
    Study(#[from] StudyError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session {0} not found or expired")]
    SessionNotFound(Uuid),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Stable machine-readable identifier, e.g. `no_transcript`.
    pub code: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Port(PortError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Port(_) => StatusCode::BAD_GATEWAY,
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Study(e) => study_status(e),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Config(_) => "config",
            ApiError::Port(_) => "upstream",
            ApiError::Io(_) => "io",
            ApiError::SessionNotFound(_) => "session_not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
            ApiError::Study(e) => study_code(e),
        }
    }
}

fn study_status(e: &StudyError) -> StatusCode {
    match e {
        e if e.is_upstream() => StatusCode::BAD_GATEWAY,
        StudyError::MissingApiKey => StatusCode::UNAUTHORIZED,
        StudyError::UnknownConcept(_) | StudyError::QuizIndexOutOfRange { .. } => {
            StatusCode::NOT_FOUND
        }
        StudyError::NoQuiz => StatusCode::CONFLICT,
        StudyError::UnreadableDocument(_) | StudyError::NoExtractableText => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

fn study_code(e: &StudyError) -> &'static str {
    match e {
        StudyError::EmptyInput => "empty_input",
        StudyError::UnparseableUrl(_) => "unparseable_url",
        StudyError::NoTranscript(_) => "no_transcript",
        StudyError::UnreadableDocument(_) => "unreadable_document",
        StudyError::NoExtractableText => "no_extractable_text",
        StudyError::MissingApiKey => "missing_api_key",
        StudyError::MalformedModelOutput(_) => "malformed_model_output",
        StudyError::Upstream(_) => "upstream",
        StudyError::InvalidRating(_) => "invalid_rating",
        StudyError::Persistence(_) => "persistence",
        StudyError::UnknownConcept(_) => "unknown_concept",
        StudyError::NoQuiz => "no_quiz",
        StudyError::QuizIndexOutOfRange { .. } => "quiz_index_out_of_range",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
