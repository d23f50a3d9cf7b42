//! crates/study_kit_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the study kit's external collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete LLM, transcript, PDF and spreadsheet services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ChatTurn, FeedbackRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, parsing).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Service not configured: {0}")]
    NotConfigured(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Port Payloads
//=========================================================================================

/// One timed caption span returned by a transcript service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Sends a single prompt and returns the raw generated text.
    /// When `json_output` is set the model is asked for a JSON-typed response.
    async fn generate(&self, prompt: &str, json_output: bool) -> PortResult<String>;

    /// Continues a conversation. `turns` never contains error turns.
    async fn chat(&self, turns: &[ChatTurn]) -> PortResult<String>;
}

#[async_trait]
pub trait TranscriptService: Send + Sync {
    /// Fetches the caption track for a video, honoring `languages` as an ordered preference.
    async fn fetch_transcript(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> PortResult<Vec<TranscriptEntry>>;
}

#[async_trait]
pub trait DocumentTextExtractor: Send + Sync {
    /// Extracts text page by page. A page without extractable text is `None`.
    /// Fails only when the document cannot be opened at all.
    async fn extract_pages(&self, document: &[u8]) -> PortResult<Vec<Option<String>>>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Appends one row for the record. Must not leave a partial row on failure.
    async fn append_feedback(&self, record: &FeedbackRecord) -> PortResult<()>;
}
