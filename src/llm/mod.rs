//! LLM provider abstraction layer
//!
//! Provider-agnostic interface to the hosted model that writes the weekly
//! recommendation, plus the factory that picks a backend from config.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;

use crate::config::AppConfig;
use std::sync::Arc;

/// Build the provider named in `[llm]`, reading its key from the environment
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let api_key = config
        .get_llm_api_key()
        .map_err(|e| LlmError::NotConfigured(e.to_string()))?;

    match config.llm.provider.as_str() {
        "gemini" => {
            let mut gemini = GeminiConfig {
                api_key,
                ..Default::default()
            };
            if let Some(base_url) = &config.llm.base_url {
                gemini.base_url = base_url.trim_end_matches('/').to_string();
            }
            Ok(Arc::new(GeminiProvider::new(gemini)?))
        }
        "openai" => {
            let mut openai = OpenAiConfig {
                api_key,
                ..Default::default()
            };
            if let Some(base_url) = &config.llm.base_url {
                openai.base_url = base_url.trim_end_matches('/').to_string();
            }
            Ok(Arc::new(OpenAiProvider::new(openai)?))
        }
        other => Err(LlmError::NotConfigured(format!(
            "Unsupported LLM provider: {other}"
        ))),
    }
}
