pub mod llm;
pub mod pdf;
pub mod sheets;
pub mod transcript;

pub use llm::OpenAiStudyAdapter;
pub use pdf::LopdfExtractor;
pub use sheets::{GoogleSheetsFeedbackStore, UnconfiguredFeedbackStore};
pub use transcript::YoutubeTranscriptAdapter;
