//! crates/study_kit_core/src/service.rs
//!
//! One entry point per user action. Each handler takes the session it acts on
//! and explicit inputs, and returns an explicit result or a `StudyError`.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use crate::{
    acquisition::{acquire_document, acquire_text, acquire_video},
    chat::send_message,
    domain::{
        ChatTurn, FeedbackRecord, GeneratedContent, GenerationMode, Rating, StudyMaterial,
    },
    error::{StudyError, StudyResult},
    generation::{generate_content, GenerationBudget},
    grading::{grade_answer, QuizGrade},
    ports::{DocumentTextExtractor, FeedbackStore, LanguageModelService, TranscriptService},
    session::SessionContext,
};

/// Tunables for the study pipeline.
#[derive(Debug, Clone)]
pub struct StudySettings {
    pub budget: GenerationBudget,
    /// Upper bound on the document excerpt embedded in a chat's instruction turn.
    pub chat_excerpt_chars: usize,
    pub transcript_languages: Vec<String>,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            budget: GenerationBudget::default(),
            chat_excerpt_chars: 10_000,
            transcript_languages: vec!["en".to_string(), "en-US".to_string(), "en-GB".to_string()],
        }
    }
}

/// The reply to a chat message plus the concept's updated history.
#[derive(Debug, Clone, Serialize)]
pub struct ChatExchange {
    pub concept: String,
    pub reply: ChatTurn,
    pub history: Vec<ChatTurn>,
}

pub struct StudyService {
    transcripts: Arc<dyn TranscriptService>,
    documents: Arc<dyn DocumentTextExtractor>,
    feedback: Arc<dyn FeedbackStore>,
    settings: StudySettings,
}

impl StudyService {
    pub fn new(
        transcripts: Arc<dyn TranscriptService>,
        documents: Arc<dyn DocumentTextExtractor>,
        feedback: Arc<dyn FeedbackStore>,
        settings: StudySettings,
    ) -> Self {
        Self {
            transcripts,
            documents,
            feedback,
            settings,
        }
    }

    pub fn settings(&self) -> &StudySettings {
        &self.settings
    }

    pub async fn generate_from_text(
        &self,
        session: &mut SessionContext,
        llm: Option<&dyn LanguageModelService>,
        text: &str,
        mode: GenerationMode,
    ) -> StudyResult<GeneratedContent> {
        let material = acquire_text(text)?;
        self.generate(session, llm, material, mode).await
    }

    pub async fn generate_from_video(
        &self,
        session: &mut SessionContext,
        llm: Option<&dyn LanguageModelService>,
        url: &str,
        mode: GenerationMode,
    ) -> StudyResult<GeneratedContent> {
        let material = acquire_video(
            self.transcripts.as_ref(),
            url,
            &self.settings.transcript_languages,
        )
        .await?;
        self.generate(session, llm, material, mode).await
    }

    pub async fn generate_from_pdf(
        &self,
        session: &mut SessionContext,
        llm: Option<&dyn LanguageModelService>,
        document: &[u8],
        mode: GenerationMode,
    ) -> StudyResult<GeneratedContent> {
        let material = acquire_document(self.documents.as_ref(), document).await?;
        self.generate(session, llm, material, mode).await
    }

    /// Stores the acquired material, then attempts one generation. Previously
    /// generated content is only replaced on success.
    async fn generate(
        &self,
        session: &mut SessionContext,
        llm: Option<&dyn LanguageModelService>,
        material: StudyMaterial,
        mode: GenerationMode,
    ) -> StudyResult<GeneratedContent> {
        session.set_material(material);
        let llm = llm.ok_or(StudyError::MissingApiKey)?;
        let text = session
            .material
            .as_ref()
            .map(|m| m.text.clone())
            .unwrap_or_default();

        let content = generate_content(llm, &text, mode, &self.settings.budget).await?;
        info!("Session {}: generated {:?} content", session.id, mode);
        session.install_content(content.clone(), text);
        Ok(content)
    }

    pub async fn send_chat_message(
        &self,
        session: &mut SessionContext,
        llm: Option<&dyn LanguageModelService>,
        concept_title: &str,
        message: &str,
    ) -> StudyResult<ChatExchange> {
        if message.trim().is_empty() {
            return Err(StudyError::EmptyInput);
        }
        let concept = session
            .concepts()
            .and_then(|list| list.find(concept_title))
            .cloned()
            .ok_or_else(|| StudyError::UnknownConcept(concept_title.to_string()))?;
        let llm = llm.ok_or(StudyError::MissingApiKey)?;

        let document = session.content_source.clone().unwrap_or_default();
        let history = session.chats.entry(&concept.title);
        let reply = send_message(
            llm,
            history,
            &concept,
            &document,
            message,
            self.settings.chat_excerpt_chars,
        )
        .await;

        Ok(ChatExchange {
            concept: concept.title,
            reply,
            history: history.turns().to_vec(),
        })
    }

    pub fn answer_quiz(
        &self,
        session: &SessionContext,
        index: usize,
        selected: &str,
    ) -> StudyResult<QuizGrade> {
        let kit = session.study_kit().ok_or(StudyError::NoQuiz)?;
        let question = kit.quiz.get(index).ok_or(StudyError::QuizIndexOutOfRange {
            index,
            len: kit.quiz.len(),
        })?;
        Ok(grade_answer(question, selected))
    }

    /// Appends one feedback row. A failure here never touches study content.
    pub async fn submit_feedback(
        &self,
        session: &mut SessionContext,
        rating: i64,
        comment: &str,
    ) -> StudyResult<FeedbackRecord> {
        let rating = Rating::try_from(rating).map_err(StudyError::InvalidRating)?;
        let record = FeedbackRecord {
            timestamp: Utc::now(),
            rating,
            comment: comment.to_string(),
            session_id: session.id,
        };

        self.feedback.append_feedback(&record).await.map_err(|e| {
            error!("Failed to save feedback for session {}: {}", session.id, e);
            StudyError::Persistence(e.to_string())
        })?;

        session.feedback_submitted = true;
        info!("Session {}: feedback saved", session.id);
        Ok(record)
    }
}
