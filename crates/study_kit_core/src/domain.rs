//! crates/study_kit_core/src/domain.rs
//!
//! Defines the core data structures for the study kit.
//! These are short-lived, value-like records owned by a single session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Study Material
//=========================================================================================

/// Which acquisition adapter produced a piece of study material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Text,
    Video,
    Document,
}

/// The raw text to analyze. Replaced wholesale on every new acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyMaterial {
    pub source: SourceKind,
    pub text: String,
}

impl StudyMaterial {
    pub fn new(source: SourceKind, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }
}

//=========================================================================================
// Generated Study Content
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// A multiple-choice question. `correct_answer` is an option label (e.g. "A"),
/// not necessarily the full option text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl QuizQuestion {
    /// The full text of the option identified by `correct_answer`, or the raw
    /// label when no option starts with it.
    pub fn correct_option_text(&self) -> &str {
        self.options
            .iter()
            .find(|option| option.starts_with(self.correct_answer.as_str()))
            .map(String::as_str)
            .unwrap_or(&self.correct_answer)
    }
}

/// The flat study kit: summary points, flashcards and a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyContent {
    pub summary_points: Vec<String>,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub title: String,
    pub summary: String,
}

/// The concept-list shape used by the document + chat variant.
/// Titles double as chat-history keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptList {
    pub concepts: Vec<Concept>,
}

impl ConceptList {
    pub fn find(&self, title: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.title == title)
    }
}

/// Which schema the model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    StudyKit,
    Concepts,
}

/// The validated result of one generation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum GeneratedContent {
    StudyKit(StudyContent),
    Concepts(ConceptList),
}

impl GeneratedContent {
    pub fn mode(&self) -> GenerationMode {
        match self {
            GeneratedContent::StudyKit(_) => GenerationMode::StudyKit,
            GeneratedContent::Concepts(_) => GenerationMode::Concepts,
        }
    }
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Model,
}

/// A turn either carries real content or records a failure in place of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum TurnBody {
    Content(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub body: TurnBody,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            body: TurnBody::Content(text.into()),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            body: TurnBody::Content(text.into()),
        }
    }

    pub fn model_error(message: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            body: TurnBody::Error(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, TurnBody::Error(_))
    }

    /// The turn's text when it carries content.
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            TurnBody::Content(text) => Some(text),
            TurnBody::Error(_) => None,
        }
    }
}

/// The ordered conversation for one concept. Entry 0, once present, is the
/// synthesized system instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub(crate) fn turns_mut(&mut self) -> &mut Vec<ChatTurn> {
        &mut self.turns
    }
}

impl From<Vec<ChatTurn>> for ChatHistory {
    fn from(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }
}

//=========================================================================================
// Feedback
//=========================================================================================

/// A 1–5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(value)
        }
    }
}

/// One feedback submission. Written once, never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub rating: Rating,
    pub comment: String,
    pub session_id: Uuid,
}

impl FeedbackRecord {
    /// The spreadsheet row: `[timestamp, rating, comment, session_id]`.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.rating.value().to_string(),
            self.comment.clone(),
            self.session_id.to_string(),
        ]
    }
}
