pub mod capture;
pub mod classify;
pub mod export;
pub mod generation;
pub mod liked_store;
pub mod prompt_builder;
pub mod upload;

pub use classify::{LlmClassifier, SubjectClassifier};
pub use generation::{GeminiGenerator, GenerationError, GenerationResponse, ImageGenerator};
pub use liked_store::{JsonFileStore, LikedSet, LikedStore, MemoryStore};
pub use prompt_builder::{build_prompt, AUTO_ENHANCE_PROMPT};
