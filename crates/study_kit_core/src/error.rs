//! crates/study_kit_core/src/error.rs
//!
//! The error taxonomy for user actions. Every variant's message is meant to be
//! shown inline to the user; none of them trigger a retry.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    // --- Input acquisition ---
    #[error("Please provide some study material; the input is empty.")]
    EmptyInput,
    #[error("Could not find a video id in '{0}'.")]
    UnparseableUrl(String),
    #[error("No transcript available for this video (captions may be disabled): {0}")]
    NoTranscript(String),
    #[error("The document could not be read: {0}")]
    UnreadableDocument(String),
    #[error("The document contains no extractable text.")]
    NoExtractableText,

    // --- Content generation ---
    #[error("An API key is required. Configure GOOGLE_API_KEY or send the x-api-key header.")]
    MissingApiKey,
    #[error("The model returned malformed output: {0}")]
    MalformedModelOutput(String),
    #[error("The model service failed: {0}")]
    Upstream(#[from] PortError),

    // --- Feedback persistence ---
    #[error("Rating must be between 1 and 5, got {0}.")]
    InvalidRating(i64),
    #[error("Feedback could not be saved: {0}")]
    Persistence(String),

    // --- Session requests ---
    #[error("No concept named '{0}' in the current document.")]
    UnknownConcept(String),
    #[error("There is no quiz for the current material.")]
    NoQuiz,
    #[error("Quiz question {index} does not exist ({len} questions).")]
    QuizIndexOutOfRange { index: usize, len: usize },
}

impl StudyError {
    /// True for failures caused by an external service rather than the request itself.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            StudyError::NoTranscript(_)
                | StudyError::MalformedModelOutput(_)
                | StudyError::Upstream(_)
                | StudyError::Persistence(_)
        )
    }
}

pub type StudyResult<T> = Result<T, StudyError>;
