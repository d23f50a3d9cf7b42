//! crates/study_kit_core/src/generation.rs
//!
//! Content generation: truncate, fill the prompt, call the model once, then
//! clean and validate its payload. A malformed response ends the attempt; there
//! is no repair and no retry.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::{
    domain::{ConceptList, GeneratedContent, GenerationMode, StudyContent},
    error::{StudyError, StudyResult},
    ports::LanguageModelService,
    prompt::{generation_prompt, truncate_chars},
};

/// Character budgets applied before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationBudget {
    pub study_kit_chars: usize,
    pub concept_chars: usize,
}

impl Default for GenerationBudget {
    fn default() -> Self {
        Self {
            study_kit_chars: 30_000,
            concept_chars: 50_000,
        }
    }
}

impl GenerationBudget {
    pub fn for_mode(&self, mode: GenerationMode) -> usize {
        match mode {
            GenerationMode::StudyKit => self.study_kit_chars,
            GenerationMode::Concepts => self.concept_chars,
        }
    }
}

/// Removes literal ```json and ``` markers.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parses a study kit. Every quiz question needs a non-blank answer label, since
/// grading matches selections by prefix.
pub fn parse_study_content(raw: &str) -> StudyResult<StudyContent> {
    let cleaned = strip_code_fences(raw);
    let kit: StudyContent = serde_json::from_str(&cleaned)
        .map_err(|e| StudyError::MalformedModelOutput(e.to_string()))?;
    if let Some(index) = kit
        .quiz
        .iter()
        .position(|q| q.correct_answer.trim().is_empty())
    {
        return Err(StudyError::MalformedModelOutput(format!(
            "quiz question {} has no correct answer",
            index
        )));
    }
    Ok(kit)
}

/// Parses a concept list and makes titles unique, since they key chat histories.
pub fn parse_concept_list(raw: &str) -> StudyResult<ConceptList> {
    let cleaned = strip_code_fences(raw);
    let mut list: ConceptList = serde_json::from_str(&cleaned)
        .map_err(|e| StudyError::MalformedModelOutput(e.to_string()))?;
    disambiguate_titles(&mut list);
    Ok(list)
}

/// Renames the second and later occurrences of a title to `"<title> (n)"`.
fn disambiguate_titles(list: &mut ConceptList) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for concept in &mut list.concepts {
        let count = seen.entry(concept.title.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let mut n = *count;
            let mut candidate = format!("{} ({})", concept.title, n);
            while seen.contains_key(&candidate) {
                n += 1;
                candidate = format!("{} ({})", concept.title, n);
            }
            warn!(
                "Duplicate concept title '{}' renamed to '{}'",
                concept.title, candidate
            );
            seen.insert(candidate.clone(), 1);
            concept.title = candidate;
        }
    }
}

pub fn parse_generated(mode: GenerationMode, raw: &str) -> StudyResult<GeneratedContent> {
    match mode {
        GenerationMode::StudyKit => parse_study_content(raw).map(GeneratedContent::StudyKit),
        GenerationMode::Concepts => parse_concept_list(raw).map(GeneratedContent::Concepts),
    }
}

/// Runs one generation attempt for `text`.
pub async fn generate_content(
    llm: &dyn LanguageModelService,
    text: &str,
    mode: GenerationMode,
    budget: &GenerationBudget,
) -> StudyResult<GeneratedContent> {
    let limit = budget.for_mode(mode);
    let truncated = truncate_chars(text, limit);
    if truncated.len() < text.len() {
        info!(
            "Input truncated to {} chars for {:?} generation",
            limit, mode
        );
    }

    let prompt = generation_prompt(mode, truncated);
    let raw = llm.generate(&prompt, true).await?;

    parse_generated(mode, &raw).inspect_err(|e| warn!("Discarding model response: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatTurn;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const STUDY_KIT_JSON: &str = r#"{
        "summary_points": ["Cells are the unit of life", "DNA stores information", "Enzymes catalyse"],
        "flashcards": [
            {"question": "What stores genetic information?", "answer": "DNA"},
            {"question": "What speeds up reactions?", "answer": "Enzymes"}
        ],
        "quiz": [
            {"question": "Unit of life?", "options": ["A) Cell", "B) Atom"], "correct_answer": "A"}
        ]
    }"#;

    /// Returns a fixed response and records the prompt it was sent.
    struct ScriptedModel {
        response: PortResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn replying(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModelService for ScriptedModel {
        async fn generate(&self, prompt: &str, json_output: bool) -> PortResult<String> {
            assert!(json_output);
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(PortError::Unexpected(e.to_string())),
            }
        }

        async fn chat(&self, _turns: &[ChatTurn]) -> PortResult<String> {
            unreachable!("generation never chats")
        }
    }

    #[test]
    fn well_formed_payload_preserves_sequence_lengths() {
        let content = parse_study_content(STUDY_KIT_JSON).unwrap();
        assert_eq!(content.summary_points.len(), 3);
        assert_eq!(content.flashcards.len(), 2);
        assert_eq!(content.quiz.len(), 1);
        assert_eq!(content.flashcards[1].answer, "Enzymes");
    }

    #[test]
    fn fenced_payload_parses_identically() {
        let fenced = format!("```json\n{}\n```", STUDY_KIT_JSON);
        assert_eq!(
            parse_study_content(&fenced).unwrap(),
            parse_study_content(STUDY_KIT_JSON).unwrap()
        );
    }

    #[test]
    fn blank_answer_label_is_malformed() {
        let raw = r#"{"summary_points": [], "flashcards": [], "quiz": [
            {"question": "q", "options": ["A) x", "B) y"], "correct_answer": " "}
        ]}"#;
        assert!(matches!(
            parse_study_content(raw),
            Err(StudyError::MalformedModelOutput(_))
        ));
    }

    #[test]
    fn non_json_is_malformed() {
        let result = parse_study_content("Sure! Here are your flashcards: ...");
        assert!(matches!(result, Err(StudyError::MalformedModelOutput(_))));
    }

    #[test]
    fn missing_required_key_is_malformed() {
        let result = parse_study_content(r#"{"summary_points": [], "flashcards": []}"#);
        assert!(matches!(result, Err(StudyError::MalformedModelOutput(_))));
    }

    #[test]
    fn duplicate_concept_titles_get_index_suffixes() {
        let raw = r#"{"concepts": [
            {"title": "Cells", "summary": "a"},
            {"title": "Cells", "summary": "b"},
            {"title": "DNA", "summary": "c"},
            {"title": "Cells", "summary": "d"}
        ]}"#;
        let list = parse_concept_list(raw).unwrap();
        let titles: Vec<&str> = list.concepts.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Cells", "Cells (2)", "DNA", "Cells (3)"]);
    }

    #[test]
    fn suffix_skips_titles_the_model_already_used() {
        let raw = r#"{"concepts": [
            {"title": "Cells (2)", "summary": "a"},
            {"title": "Cells", "summary": "b"},
            {"title": "Cells", "summary": "c"}
        ]}"#;
        let list = parse_concept_list(raw).unwrap();
        let titles: Vec<&str> = list.concepts.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Cells (2)", "Cells", "Cells (3)"]);
    }

    #[tokio::test]
    async fn generate_truncates_input_to_budget() {
        let model = ScriptedModel::replying(STUDY_KIT_JSON);
        let budget = GenerationBudget {
            study_kit_chars: 10,
            concept_chars: 50,
        };
        let text = format!("{}{}", "a".repeat(10), "TAIL");

        let content = generate_content(&model, &text, GenerationMode::StudyKit, &budget)
            .await
            .unwrap();

        assert_eq!(content.mode(), GenerationMode::StudyKit);
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&"a".repeat(10)));
        assert!(!prompts[0].contains("TAIL"));
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let model = ScriptedModel::replying("not json");
        let result = generate_content(
            &model,
            "text",
            GenerationMode::Concepts,
            &GenerationBudget::default(),
        )
        .await;

        assert!(matches!(result, Err(StudyError::MalformedModelOutput(_))));
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_is_reported() {
        let model = ScriptedModel {
            response: Err(PortError::Unexpected("503".to_string())),
            prompts: Mutex::new(Vec::new()),
        };
        let result = generate_content(
            &model,
            "text",
            GenerationMode::StudyKit,
            &GenerationBudget::default(),
        )
        .await;

        assert!(matches!(result, Err(StudyError::Upstream(_))));
    }
}
