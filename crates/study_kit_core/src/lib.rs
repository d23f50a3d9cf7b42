pub mod acquisition;
pub mod chat;
pub mod domain;
pub mod error;
pub mod generation;
pub mod grading;
pub mod ports;
pub mod prompt;
pub mod service;
pub mod session;

pub use domain::{
    ChatHistory, ChatRole, ChatTurn, Concept, ConceptList, FeedbackRecord, Flashcard,
    GeneratedContent, GenerationMode, QuizQuestion, Rating, SourceKind, StudyContent,
    StudyMaterial, TurnBody,
};
pub use error::{StudyError, StudyResult};
pub use ports::{
    DocumentTextExtractor, FeedbackStore, LanguageModelService, PortError, PortResult,
    TranscriptEntry, TranscriptService,
};
pub use service::{ChatExchange, StudyService, StudySettings};
pub use session::SessionContext;
