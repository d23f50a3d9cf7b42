//! crates/study_kit_core/src/prompt.rs
//!
//! Fixed prompt templates for content generation and concept chat.

use crate::domain::{Concept, GenerationMode};

const STUDY_KIT_TEMPLATE: &str = r#"You are an expert educational AI. Analyze the text and produce structured study content.

Detect the language of the text and write every summary point, flashcard and quiz item in that same language.

TEXT TO ANALYZE:
{text}

OUTPUT FORMAT (JSON ONLY, no commentary, no markdown):
{
    "summary_points": ["Point 1", "Point 2", "Point 3", "Point 4"],
    "flashcards": [
        {"question": "Question?", "answer": "Answer"}
    ],
    "quiz": [
        {"question": "Question?", "options": ["A) ...", "B) ...", "C) ...", "D) ..."], "correct_answer": "A"}
    ]
}"#;

const CONCEPT_LIST_TEMPLATE: &str = r#"You are an expert educational AI. Break the document below into its key concepts so a student can study them one at a time.

Detect the language of the document and write every title and summary in that same language.

DOCUMENT:
{text}

OUTPUT FORMAT (JSON ONLY, no commentary, no markdown):
{
    "concepts": [
        {"title": "Short, unique concept title", "summary": "A clear explanation of the concept in a few sentences."}
    ]
}"#;

const CHAT_INSTRUCTION_TEMPLATE: &str = r#"You are a friendly tutor helping a student understand one concept from a document they uploaded.

CONCEPT: {title}
SUMMARY: {summary}

DOCUMENT EXCERPT:
---
{excerpt}
---

Answer the student's questions about this concept. Ground your answers in the excerpt where possible, keep them concise, and reply in the language the student writes in."#;

/// Hard truncation to at most `max_chars` characters. Content past the budget is dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Fills the template for `mode` with `text`, which must already be truncated.
pub fn generation_prompt(mode: GenerationMode, text: &str) -> String {
    let template = match mode {
        GenerationMode::StudyKit => STUDY_KIT_TEMPLATE,
        GenerationMode::Concepts => CONCEPT_LIST_TEMPLATE,
    };
    template.replace("{text}", text)
}

/// The synthesized first turn of a concept's chat history.
pub fn chat_instruction(concept: &Concept, document: &str, excerpt_chars: usize) -> String {
    CHAT_INSTRUCTION_TEMPLATE
        .replace("{title}", &concept.title)
        .replace("{summary}", &concept.summary)
        .replace("{excerpt}", truncate_chars(document, excerpt_chars))
}
