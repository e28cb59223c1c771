//! LLM provider implementations
//!
//! Concrete implementations of the LlmProvider trait for the hosted models
//! the recommendation generator can use.

pub mod gemini;
pub mod openai;

pub use gemini::*;
pub use openai::*;
