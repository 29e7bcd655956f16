//! LLM backends - Chat completion seam and HTTP providers

mod openai;
mod provider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::{RankerError, Result};

pub use openai::OpenAiClient;
pub use provider::Provider;

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Parameters for one chat completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

/// Log probability the model assigned to one generated token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
}

impl TokenLogprob {
    pub fn new(token: impl Into<String>, logprob: f64) -> Self {
        Self {
            token: token.into(),
            logprob,
        }
    }
}

/// Assistant reply together with its per-token log probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub token_logprobs: Vec<TokenLogprob>,
}

/// Anything that can turn a chat request into the assistant's reply
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Run the completion and return the assistant message content
    async fn chat_completion(&self, request: ChatRequest) -> Result<String>;

    /// Run the completion asking for token log probabilities.
    ///
    /// Fails with [`RankerError::LogprobsUnavailable`] when the backend cannot
    /// report them, or the reply carries none.
    async fn chat_completion_with_logprobs(&self, _request: ChatRequest) -> Result<ChatCompletion> {
        Err(RankerError::LogprobsUnavailable(format!(
            "{} does not report token logprobs",
            self.name()
        )))
    }
}
