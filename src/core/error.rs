//! Error types for the ranking engine and LLM backends

use thiserror::Error;

/// Errors produced while generating, evaluating or ranking outputs
#[derive(Debug, Error)]
pub enum RankerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid template: {0}")]
    Template(String),

    #[error("failed to parse evaluation: {0}")]
    EvaluationParse(String),

    #[error("invalid evaluation prompt: {0}")]
    Prompt(String),

    #[error("score calculation failed: {0}")]
    Score(String),

    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    #[error("LLM returned no choices")]
    EmptyResponse,

    #[error("token logprobs not available: {0}")]
    LogprobsUnavailable(String),

    #[error("malformed token logprobs: {0}")]
    MalformedLogprobs(String),

    #[error("variant {index}: {source}")]
    Variant {
        index: usize,
        #[source]
        source: Box<RankerError>,
    },

    #[error("all variants failed: {}", .0.join("; "))]
    AllVariantsFailed(Vec<String>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RankerError {
    /// Attach the variant index to an error raised while processing that variant
    pub fn for_variant(index: usize, source: RankerError) -> Self {
        Self::Variant {
            index,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, RankerError>;
