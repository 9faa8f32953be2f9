pub mod conversation;
pub mod generator;
pub mod language;
pub mod llm_service;

pub use generator::{BackendError, FragmentStream, TextGenerator};
pub use language::LanguageService;
pub use llm_service::LlmService;
