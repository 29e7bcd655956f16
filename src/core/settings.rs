//! Application settings management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::config::RankerConfig;
use crate::llm::Provider;

/// Application theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
        }
    }

    pub fn all() -> &'static [Theme] {
        &[Theme::Dark, Theme::Light]
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // General
    /// Application theme
    pub theme: Theme,

    // Model
    /// Chat completion provider
    pub provider: Provider,
    /// Model name (OpenRouter short names are expanded)
    pub model: String,
    /// Override for the provider's base URL
    pub api_base: Option<String>,

    // Ranking
    /// Defaults for new runs
    pub ranker: RankerConfig,

    // Advanced
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            provider: Provider::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            api_base: None,
            ranker: RankerConfig::default(),
            request_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.ranker.num_variants = self.ranker.num_variants.clamp(1, 50);
        self.ranker.thread_count = self.ranker.thread_count.clamp(1, 16);
        self.ranker.temperature = self.ranker.temperature.clamp(0.0, 2.0);
        self.ranker.top_p = self.ranker.top_p.clamp(0.0, 1.0);
        self.ranker.max_tokens = self.ranker.max_tokens.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(5);
        if self.model.trim().is_empty() {
            self.model = Settings::default().model;
        }
        if self.api_base.as_deref().is_some_and(|b| b.trim().is_empty()) {
            self.api_base = None;
        }
    }
}

/// Default location for the database and exported reports
pub fn default_data_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::APP_NAME)
}
