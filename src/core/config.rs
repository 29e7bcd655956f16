//! Ranker configuration - Sampling, ranking and prompt settings

use serde::{Deserialize, Serialize};

use super::error::{RankerError, Result};

/// Criteria template used when none is supplied
pub const DEFAULT_TEMPLATE: &str = r#"{
  "interesting": LOGPROB_TRUE,
  "creative": LOGPROB_TRUE,
  "useful": LOGPROB_TRUE
}"#;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a creative assistant that provides a single concise response.";

pub const DEFAULT_EVALUATION_PROMPT: &str = "You are an evaluator. Evaluate the following text based on the criteria.\n\
     Return ONLY a JSON object with your evaluation. \
     Use JSON boolean values (true/false).";

/// Configuration for a ranking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    // Generation
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,

    // Ranking
    /// Number of variants to generate
    pub num_variants: u32,
    /// Maximum variants in flight at once
    pub thread_count: u32,

    /// Criteria template with `LOGPROB_TRUE` placeholders
    pub template: String,

    // Prompts
    pub system_prompt: String,
    pub evaluation_prompt: String,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 1.0,
            num_variants: 5,
            thread_count: 1,
            template: DEFAULT_TEMPLATE.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            evaluation_prompt: DEFAULT_EVALUATION_PROMPT.to_string(),
        }
    }
}

impl RankerConfig {
    /// Reject configurations the ranker cannot run
    pub fn validate(&self) -> Result<()> {
        if self.num_variants == 0 {
            return Err(RankerError::Config("num_variants must be positive".into()));
        }
        if self.thread_count == 0 {
            return Err(RankerError::Config("thread_count must be positive".into()));
        }
        Ok(())
    }
}
