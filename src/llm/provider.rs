//! Provider presets

use serde::{Deserialize, Serialize};

use crate::core::error::{RankerError, Result};

/// Chat completion provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
pub enum Provider {
    #[default]
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "openrouter")]
    OpenRouter,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::OpenRouter => "OpenRouter",
        }
    }

    pub fn all() -> &'static [Provider] {
        &[Provider::OpenAi, Provider::OpenRouter]
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Resolve the model name the provider expects
    pub fn model_name(&self, model: &str) -> String {
        match self {
            Self::OpenAi => model.to_string(),
            Self::OpenRouter => full_model_name(model).to_string(),
        }
    }

    /// Explicit key first, then the provider's environment variable
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        std::env::var(self.api_key_env())
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RankerError::Config(format!(
                    "{} API key is required: pass --api-key or set {}",
                    self.label(),
                    self.api_key_env()
                ))
            })
    }
}

const OPENROUTER_MODELS: &[(&str, &str)] = &[
    ("gpt-3.5-turbo", "openai/gpt-3.5-turbo"),
    ("gpt-4", "openai/gpt-4"),
    ("gpt-4-turbo", "openai/gpt-4-turbo"),
    ("claude-instant", "anthropic/claude-instant-1"),
    ("claude-2", "anthropic/claude-2"),
    ("claude-3-opus", "anthropic/claude-3-opus"),
    ("gemini-pro", "google/gemini-pro"),
    ("gemini-flash", "google/gemini-flash"),
];

/// Expand an OpenRouter short model name; unknown names pass through
pub fn full_model_name(model: &str) -> &str {
    OPENROUTER_MODELS
        .iter()
        .find(|(short, _)| *short == model)
        .map(|(_, full)| *full)
        .unwrap_or(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_short_names() {
        assert_eq!(full_model_name("gpt-4"), "openai/gpt-4");
        assert_eq!(full_model_name("gemini-flash"), "google/gemini-flash");
        assert_eq!(full_model_name("anthropic/claude-2"), "anthropic/claude-2");
        assert_eq!(full_model_name("my-model"), "my-model");
    }

    #[test]
    fn openai_keeps_model_names() {
        assert_eq!(Provider::OpenAi.model_name("gpt-4"), "gpt-4");
        assert_eq!(Provider::OpenRouter.model_name("gpt-4"), "openai/gpt-4");
    }

    #[test]
    fn explicit_key_wins() {
        let key = Provider::OpenRouter.resolve_api_key(Some("sk-test")).unwrap();
        assert_eq!(key, "sk-test");
    }
}
