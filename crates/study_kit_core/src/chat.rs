//! crates/study_kit_core/src/chat.rs
//!
//! Per-concept follow-up chat with a fixed-window history.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::{
    domain::{ChatHistory, ChatTurn, Concept},
    ports::LanguageModelService,
    prompt::chat_instruction,
};

/// Histories longer than this are collapsed before the next submission.
pub const HISTORY_PRUNE_THRESHOLD: usize = 10;
/// Most recent turns kept alongside the system instruction when pruning.
pub const HISTORY_KEEP_RECENT: usize = 4;

/// Collapses the history to `[entry 0] + last 4` once it exceeds the threshold.
/// Returns whether anything was dropped.
pub fn prune_history(history: &mut ChatHistory) -> bool {
    let turns = history.turns_mut();
    if turns.len() <= HISTORY_PRUNE_THRESHOLD {
        return false;
    }
    let tail_start = turns.len() - HISTORY_KEEP_RECENT;
    turns.drain(1..tail_start);
    true
}

/// Chat histories for the current document, keyed by concept title.
#[derive(Debug, Clone, Default)]
pub struct ChatThreads {
    threads: HashMap<String, ChatHistory>,
}

impl ChatThreads {
    pub fn get(&self, concept_title: &str) -> Option<&ChatHistory> {
        self.threads.get(concept_title)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn clear(&mut self) {
        self.threads.clear();
    }

    pub(crate) fn entry(&mut self, concept_title: &str) -> &mut ChatHistory {
        self.threads.entry(concept_title.to_string()).or_default()
    }
}

/// Sends one user message for `concept` and returns the reply turn.
///
/// Failures never break the thread: they are recorded as a model error turn and
/// returned like any other reply. Error turns are not sent back to the model.
pub async fn send_message(
    llm: &dyn LanguageModelService,
    history: &mut ChatHistory,
    concept: &Concept,
    document: &str,
    message: &str,
    excerpt_chars: usize,
) -> ChatTurn {
    if history.is_empty() {
        history.push(ChatTurn::user(chat_instruction(
            concept,
            document,
            excerpt_chars,
        )));
    }

    history.push(ChatTurn::user(message));
    if prune_history(history) {
        info!("Pruned chat history for concept '{}'", concept.title);
    }

    let outgoing: Vec<ChatTurn> = history
        .turns()
        .iter()
        .filter(|turn| !turn.is_error())
        .cloned()
        .collect();

    let reply = match llm.chat(&outgoing).await {
        Ok(text) => ChatTurn::model(text),
        Err(e) => {
            warn!("Chat reply failed for concept '{}': {}", concept.title, e);
            ChatTurn::model_error(format!("Sorry, I couldn't answer that: {}", e))
        }
    };
    history.push(reply.clone());
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatRole, TurnBody};
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoModel {
        fail: bool,
        seen: Mutex<Vec<Vec<ChatTurn>>>,
    }

    impl EchoModel {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModelService for EchoModel {
        async fn generate(&self, _prompt: &str, _json_output: bool) -> PortResult<String> {
            unreachable!("chat never generates")
        }

        async fn chat(&self, turns: &[ChatTurn]) -> PortResult<String> {
            self.seen.lock().unwrap().push(turns.to_vec());
            if self.fail {
                return Err(PortError::Unexpected("model unreachable".to_string()));
            }
            let last = turns.last().and_then(ChatTurn::content).unwrap_or_default();
            Ok(format!("re: {}", last))
        }
    }

    fn concept() -> Concept {
        Concept {
            title: "Entropy".to_string(),
            summary: "Disorder tends to increase".to_string(),
        }
    }

    fn numbered_history(len: usize) -> ChatHistory {
        (0..len)
            .map(|i| ChatTurn::user(format!("turn {}", i)))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn history_at_threshold_is_left_alone() {
        let mut history = numbered_history(10);
        assert!(!prune_history(&mut history));
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn history_over_threshold_keeps_first_and_last_four() {
        let mut history = numbered_history(11);
        assert!(prune_history(&mut history));

        let texts: Vec<&str> = history.turns().iter().filter_map(ChatTurn::content).collect();
        assert_eq!(texts, vec!["turn 0", "turn 7", "turn 8", "turn 9", "turn 10"]);
    }

    #[tokio::test]
    async fn first_message_synthesizes_instruction_turn() {
        let model = EchoModel::new(false);
        let mut history = ChatHistory::new();

        let reply = send_message(&model, &mut history, &concept(), "doc body", "why?", 100).await;

        assert_eq!(reply, ChatTurn::model("re: why?"));
        assert_eq!(history.len(), 3);
        let instruction = history.turns()[0].content().unwrap();
        assert!(instruction.contains("Entropy"));
        assert!(instruction.contains("Disorder tends to increase"));
        assert!(instruction.contains("doc body"));
    }

    #[tokio::test]
    async fn submission_is_pruned_before_sending() {
        let model = EchoModel::new(false);
        let mut history = numbered_history(10);

        send_message(&model, &mut history, &concept(), "doc", "eleventh", 100).await;

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 5);
        assert_eq!(seen[0][0].content(), Some("turn 0"));
        assert_eq!(seen[0][4].content(), Some("eleventh"));
        assert_eq!(history.len(), 6);
    }

    #[tokio::test]
    async fn failure_becomes_a_distinguishable_error_turn() {
        let model = EchoModel::new(true);
        let mut history = ChatHistory::new();

        let reply = send_message(&model, &mut history, &concept(), "doc", "hello", 100).await;

        assert_eq!(reply.role, ChatRole::Model);
        assert!(matches!(reply.body, TurnBody::Error(ref m) if m.contains("model unreachable")));
        assert!(history.turns().last().unwrap().is_error());
    }

    #[tokio::test]
    async fn error_turns_are_not_sent_to_the_model() {
        let failing = EchoModel::new(true);
        let mut history = ChatHistory::new();
        send_message(&failing, &mut history, &concept(), "doc", "first", 100).await;

        let model = EchoModel::new(false);
        send_message(&model, &mut history, &concept(), "doc", "second", 100).await;

        let seen = model.seen.lock().unwrap();
        assert!(seen[0].iter().all(|turn| !turn.is_error()));
        assert_eq!(seen[0].len(), 3);
        assert_eq!(history.len(), 5);
    }
}
