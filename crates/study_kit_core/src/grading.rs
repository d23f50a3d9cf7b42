//! crates/study_kit_core/src/grading.rs
//!
//! Self-graded quiz answers using prefix matching.

use serde::Serialize;

use crate::domain::QuizQuestion;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizGrade {
    pub correct: bool,
    pub selected: String,
    /// Full text of the correct option, or the raw label if no option matches it.
    pub correct_option: String,
}

/// A selection is correct when it starts with the stored correct-answer label.
pub fn grade_answer(question: &QuizQuestion, selected: &str) -> QuizGrade {
    QuizGrade {
        correct: selected.starts_with(question.correct_answer.as_str()),
        selected: selected.to_string(),
        correct_option: question.correct_option_text().to_string(),
    }
}
