//! Retrieval-augmented weekly business recommendation

pub mod generator;
pub mod knowledge_base;
pub mod prompt;

pub use generator::{generate_weekly_recommendation, RecommendationOutcome};
pub use knowledge_base::{KnowledgeBase, TextSplitter};
