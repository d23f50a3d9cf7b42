pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use rest::ApiDoc;
pub use state::{AppState, LlmProvider, SessionStore};

/// Builds the REST router. Cross-cutting layers (CORS, tracing, Swagger UI) are
/// added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(rest::health_handler))
        .route("/sessions", post(rest::create_session_handler))
        .route(
            "/sessions/{id}",
            get(rest::get_session_handler).delete(rest::delete_session_handler),
        )
        .route("/sessions/{id}/generate/text", post(rest::generate_text_handler))
        .route("/sessions/{id}/generate/video", post(rest::generate_video_handler))
        .route("/sessions/{id}/generate/pdf", post(rest::generate_pdf_handler))
        .route("/sessions/{id}/quiz/{index}/answer", post(rest::answer_quiz_handler))
        .route("/sessions/{id}/chat", post(rest::chat_handler))
        .route("/sessions/{id}/feedback", post(rest::feedback_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
