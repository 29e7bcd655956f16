//! OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ChatBackend, ChatCompletion, ChatMessage, ChatRequest, Provider, TokenLogprob};
use crate::core::error::{RankerError, Result};
use crate::core::Settings;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    logprobs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_logprobs: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    logprobs: Option<ChoiceLogprobs>,
}

#[derive(Debug, Deserialize)]
struct ChoiceLogprobs {
    /// Kept loose so malformed entries can be reported by position
    #[serde(default)]
    content: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or(RankerError::EmptyResponse)
    }

    /// First choice's content and token logprobs; every entry must be well formed
    fn into_completion(self) -> Result<ChatCompletion> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(RankerError::EmptyResponse)?;

        let entries = choice
            .logprobs
            .ok_or_else(|| RankerError::LogprobsUnavailable("no logprobs on the first choice".into()))?
            .content
            .ok_or_else(|| RankerError::LogprobsUnavailable("logprobs.content is missing".into()))?;
        if entries.is_empty() {
            return Err(RankerError::LogprobsUnavailable(
                "logprobs.content is empty".into(),
            ));
        }

        let token_logprobs = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let token = entry.get("token").and_then(Value::as_str);
                let logprob = entry.get("logprob").and_then(Value::as_f64);
                match (token, logprob) {
                    (Some(token), Some(logprob)) => Ok(TokenLogprob::new(token, logprob)),
                    _ => Err(RankerError::MalformedLogprobs(format!(
                        "entry #{} is not a (token, logprob) pair: {}",
                        i, entry
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            token_logprobs,
        })
    }
}

/// Alternatives reported per token when logprobs are requested
const TOP_LOGPROBS: u8 = 5;

/// Client for any endpoint speaking the OpenAI chat completions API
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    http_client: Client,
}

impl OpenAiClient {
    pub fn builder(provider: Provider) -> OpenAiClientBuilder {
        OpenAiClientBuilder::new(provider)
    }

    /// Build a client from the saved provider settings
    pub fn from_settings(settings: &Settings, api_key: Option<&str>) -> Result<Self> {
        let mut builder = Self::builder(settings.provider)
            .model(&settings.model)
            .timeout(Duration::from_secs(settings.request_timeout_secs));
        if let Some(base) = &settings.api_base {
            builder = builder.base_url(base);
        }
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        builder.build()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<String> {
        self.send(&request, false).await?.into_content()
    }

    async fn chat_completion_with_logprobs(&self, request: ChatRequest) -> Result<ChatCompletion> {
        self.send(&request, true).await?.into_completion()
    }
}

impl OpenAiClient {
    async fn send(&self, request: &ChatRequest, logprobs: bool) -> Result<CompletionResponse> {
        let body = CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            logprobs,
            top_logprobs: logprobs.then_some(TOP_LOGPROBS),
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} (model {}, logprobs {})", url, self.model, logprobs);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(RankerError::RequestFailed(format!(
                "{} from {}: {}",
                status, self.model, error_text
            )));
        }

        Ok(response.json::<CompletionResponse>().await?)
    }
}

pub struct OpenAiClientBuilder {
    provider: Provider,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout: Duration,
}

impl OpenAiClientBuilder {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            base_url: None,
            api_key: None,
            model: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenAiClient> {
        let api_key = self.provider.resolve_api_key(self.api_key.as_deref())?;
        let model = self
            .provider
            .model_name(self.model.as_deref().unwrap_or("gpt-3.5-turbo"));
        let base_url = self
            .base_url
            .unwrap_or_else(|| self.provider.base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        let http_client = Client::builder().timeout(self.timeout).build()?;

        Ok(OpenAiClient {
            base_url,
            api_key,
            model,
            http_client,
        })
    }
}
