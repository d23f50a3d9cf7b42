//! crates/study_kit_core/src/session.rs
//!
//! The explicit per-session context. Created when a session starts, reset when a
//! new document is generated, dropped when the session ends.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    chat::ChatThreads,
    domain::{ConceptList, GeneratedContent, StudyContent, StudyMaterial},
};

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub material: Option<StudyMaterial>,
    pub content: Option<GeneratedContent>,
    /// The text `content` was generated from. Chats are grounded in this, not in
    /// `material`, which may belong to a later failed generation.
    pub content_source: Option<String>,
    pub chats: ChatThreads,
    pub feedback_submitted: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active_at: now,
            material: None,
            content: None,
            content_source: None,
            chats: ChatThreads::default(),
            feedback_submitted: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub fn is_idle(&self, idle_for: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_active_at > idle_for
    }

    /// Replaces the current material. Generated content stays until a new
    /// generation succeeds.
    pub fn set_material(&mut self, material: StudyMaterial) {
        self.material = Some(material);
    }

    /// Installs freshly generated content; chat histories belong to the previous
    /// document and are discarded.
    pub fn install_content(&mut self, content: GeneratedContent, source: String) {
        self.chats.clear();
        self.content = Some(content);
        self.content_source = Some(source);
    }

    pub fn study_kit(&self) -> Option<&StudyContent> {
        match &self.content {
            Some(GeneratedContent::StudyKit(kit)) => Some(kit),
            _ => None,
        }
    }

    pub fn concepts(&self) -> Option<&ConceptList> {
        match &self.content {
            Some(GeneratedContent::Concepts(list)) => Some(list),
            _ => None,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
