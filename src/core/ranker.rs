//! Ranker - Generates variants, has the model evaluate them, and ranks the results

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config::RankerConfig;
use super::error::{RankerError, Result};
use super::evaluation::{
    average_token_logprob, calculate_score, extract_template_attributes,
    format_evaluation_prompt, parse_evaluation_json, score_attributes, sort_ranked_outputs,
    token_attribute_scores,
};
use super::example::{AttributeScore, RankedOutput};
use crate::llm::{ChatBackend, ChatMessage, ChatRequest, TokenLogprob};

/// System prompt for evaluation requests
const EVALUATOR_SYSTEM_PROMPT: &str = "You are an evaluator.";

/// System prompt when attributes are scored from token logprobs
const ATTRIBUTE_EVALUATOR_SYSTEM_PROMPT: &str =
    "You are an evaluator that outputs JSON with boolean values.";

/// Completion budget for [`LogProbRanker::evaluate_text`]
const TEXT_EVALUATION_MAX_TOKENS: u32 = 150;

/// A completion and how confident the model was in it
#[derive(Debug, Clone, PartialEq)]
pub struct TextEvaluation {
    pub text: String,
    pub average_logprob: f64,
    pub num_tokens: usize,
    pub token_logprobs: Vec<TokenLogprob>,
}

/// Called for every variant that was generated and evaluated successfully
pub type OutputCallback = Arc<dyn Fn(&RankedOutput) -> anyhow::Result<()> + Send + Sync>;

/// Ranks LLM outputs by self-evaluation against a criteria template
pub struct LogProbRanker<B: ChatBackend> {
    backend: Arc<B>,
    config: Arc<RankerConfig>,
    on_output: Option<OutputCallback>,
}

impl<B: ChatBackend> LogProbRanker<B> {
    pub fn new(backend: B, config: RankerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
            on_output: None,
        })
    }

    /// Register a callback for each successfully ranked output
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RankedOutput) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_output = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Generate one output and evaluate it
    pub async fn generate_and_evaluate(&self, prompt: &str, index: usize) -> Result<RankedOutput> {
        run_variant(self.backend.as_ref(), &self.config, prompt, index).await
    }

    /// Complete `messages` greedily and report the average token logprob.
    ///
    /// Fails when the backend returns no usable token logprobs.
    pub async fn evaluate_text(&self, messages: Vec<ChatMessage>) -> Result<TextEvaluation> {
        let completion = self
            .backend
            .chat_completion_with_logprobs(ChatRequest {
                messages,
                temperature: 0.0,
                max_tokens: TEXT_EVALUATION_MAX_TOKENS,
                top_p: 1.0,
            })
            .await?;

        Ok(TextEvaluation {
            average_logprob: average_token_logprob(&completion.token_logprobs),
            num_tokens: completion.token_logprobs.len(),
            text: completion.content,
            token_logprobs: completion.token_logprobs,
        })
    }

    /// Score `text` against a criteria template by the logprob of each
    /// boolean the evaluator emits. Uses the configured template when
    /// `template` is `None`.
    pub async fn score_text_attributes(
        &self,
        text: &str,
        template: Option<&str>,
    ) -> Result<Vec<AttributeScore>> {
        let template = template.unwrap_or(self.config.template.as_str());
        let attributes = extract_template_attributes(template)?;
        let prompt = format_evaluation_prompt(&self.config.evaluation_prompt, text, template)?;

        let completion = self
            .backend
            .chat_completion_with_logprobs(ChatRequest {
                messages: vec![
                    ChatMessage::system(ATTRIBUTE_EVALUATOR_SYSTEM_PROMPT),
                    ChatMessage::user(prompt),
                ],
                temperature: 0.0,
                max_tokens: self.config.max_tokens,
                top_p: 1.0,
            })
            .await?;
        debug!("Evaluation reply: {}", completion.content);

        token_attribute_scores(&completion.token_logprobs, &attributes)
    }

    /// Generate `num_variants` outputs concurrently and return them best first.
    ///
    /// Failed variants are logged and skipped. The call only fails when every
    /// variant failed.
    pub async fn rank_outputs(&self, prompt: &str) -> Result<Vec<RankedOutput>> {
        let variants = self.config.num_variants as usize;
        let limit = Arc::new(Semaphore::new(self.config.thread_count as usize));
        let prompt: Arc<str> = Arc::from(prompt);

        info!(
            "Ranking {} variants with {} (concurrency {})",
            variants,
            self.backend.name(),
            self.config.thread_count
        );

        let mut tasks = JoinSet::new();
        for index in 0..variants {
            let backend = Arc::clone(&self.backend);
            let config = Arc::clone(&self.config);
            let prompt = Arc::clone(&prompt);
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                let _permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|e| RankerError::for_variant(index, RankerError::RequestFailed(e.to_string())))?;
                run_variant(backend.as_ref(), &config, &prompt, index).await
            });
        }

        let mut outputs = Vec::with_capacity(variants);
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(output)) => {
                    debug!("Variant {} scored {:.3}", output.index, output.logprob);
                    if let Some(callback) = &self.on_output {
                        if let Err(e) = callback(&output) {
                            warn!("Output callback failed for variant {}: {}", output.index, e);
                        }
                    }
                    outputs.push(output);
                }
                Ok(Err(e)) => {
                    warn!("Error processing output variant: {}", e);
                    errors.push(e.to_string());
                }
                Err(e) => {
                    warn!("Variant task aborted: {}", e);
                    errors.push(e.to_string());
                }
            }
        }

        if outputs.is_empty() && !errors.is_empty() {
            return Err(RankerError::AllVariantsFailed(errors));
        }

        if !errors.is_empty() {
            info!("{} of {} variants failed", errors.len(), variants);
        }

        outputs.sort_by_key(|o| o.index);
        Ok(sort_ranked_outputs(outputs))
    }

    /// Blocking version of [`rank_outputs`](Self::rank_outputs).
    ///
    /// Must not be called from inside a tokio runtime.
    pub fn rank_outputs_blocking(&self, prompt: &str) -> Result<Vec<RankedOutput>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.rank_outputs(prompt))
    }
}

async fn run_variant<B: ChatBackend>(
    backend: &B,
    config: &RankerConfig,
    prompt: &str,
    index: usize,
) -> Result<RankedOutput> {
    evaluate_variant(backend, config, prompt, index)
        .await
        .map_err(|e| RankerError::for_variant(index, e))
}

async fn evaluate_variant<B: ChatBackend>(
    backend: &B,
    config: &RankerConfig,
    prompt: &str,
    index: usize,
) -> Result<RankedOutput> {
    let output = backend
        .chat_completion(ChatRequest {
            messages: vec![
                ChatMessage::system(&config.system_prompt),
                ChatMessage::user(prompt),
            ],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        })
        .await?;

    let evaluation_prompt =
        format_evaluation_prompt(&config.evaluation_prompt, &output, &config.template)?;

    // Evaluation runs greedy so the same text always gets the same verdict
    let raw_evaluation = backend
        .chat_completion(ChatRequest {
            messages: vec![
                ChatMessage::system(EVALUATOR_SYSTEM_PROMPT),
                ChatMessage::user(evaluation_prompt),
            ],
            temperature: 0.0,
            max_tokens: config.max_tokens,
            top_p: 1.0,
        })
        .await?;

    let evaluation = parse_evaluation_json(&raw_evaluation)?;
    let attributes = extract_template_attributes(&config.template)?;
    let attribute_scores = score_attributes(&evaluation, &attributes)?;
    let logprob = calculate_score(&evaluation, &attributes)?;

    Ok(RankedOutput {
        output,
        logprob,
        index,
        attribute_scores: Some(attribute_scores),
        raw_evaluation: Some(raw_evaluation),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::ChatCompletion;

    /// Backend replaying canned generations and evaluations
    struct ScriptedBackend {
        generations: Mutex<VecDeque<Result<String>>>,
        evaluations: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(generations: Vec<Result<String>>, evaluations: Vec<&str>) -> Self {
            Self {
                generations: Mutex::new(generations.into()),
                evaluations: Mutex::new(evaluations.into_iter().map(String::from).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat_completion(&self, request: ChatRequest) -> Result<String> {
            let is_evaluation = request.messages[0].content == EVALUATOR_SYSTEM_PROMPT;
            self.requests.lock().unwrap().push(request);
            if is_evaluation {
                Ok(self
                    .evaluations
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| "{}".to_string()))
            } else {
                self.generations
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Ok("extra".to_string()))
            }
        }
    }

    fn config(variants: u32) -> RankerConfig {
        RankerConfig {
            num_variants: variants,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn single_variant_is_scored() {
        let backend = ScriptedBackend::new(
            vec![Ok("A cat sat.".to_string())],
            vec![r#"{"interesting": true, "creative": false, "useful": true}"#],
        );
        let ranker = LogProbRanker::new(backend, config(1)).unwrap();

        let output = ranker.generate_and_evaluate("Cats", 7).await.unwrap();
        assert_eq!(output.output, "A cat sat.");
        assert_eq!(output.index, 7);
        assert!((output.logprob - 2.0 / 3.0).abs() < 1e-9);
        let scores = output.attribute_scores.unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[1].score, 0.0);
    }

    #[tokio::test]
    async fn evaluation_uses_greedy_sampling() {
        let backend = ScriptedBackend::new(vec![Ok("text".to_string())], vec![r#"{"useful": true}"#]);
        let ranker = LogProbRanker::new(backend, config(1)).unwrap();
        ranker.generate_and_evaluate("p", 0).await.unwrap();

        let requests = ranker.backend().requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].temperature, 0.7);
        assert_eq!(requests[0].messages[1].content, "p");
        assert_eq!(requests[1].temperature, 0.0);
        assert!(requests[1].messages[1].content.contains("Text to evaluate:\ntext"));
    }

    #[tokio::test]
    async fn unparseable_evaluation_reports_variant() {
        let backend = ScriptedBackend::new(vec![Ok("text".to_string())], vec!["no idea"]);
        let ranker = LogProbRanker::new(backend, config(1)).unwrap();

        let err = ranker.generate_and_evaluate("p", 3).await.unwrap_err();
        assert!(matches!(err, RankerError::Variant { index: 3, .. }));
    }

    #[tokio::test]
    async fn outputs_are_sorted_best_first() {
        let backend = ScriptedBackend::new(
            vec![Ok("a".into()), Ok("b".into()), Ok("c".into())],
            vec![
                r#"{"interesting": false, "creative": false, "useful": true}"#,
                r#"{"interesting": true, "creative": true, "useful": true}"#,
                r#"{"interesting": true, "creative": false, "useful": true}"#,
            ],
        );
        let ranker = LogProbRanker::new(backend, config(3)).unwrap();

        let outputs = ranker.rank_outputs("p").await.unwrap();
        assert_eq!(outputs.len(), 3);
        assert!(outputs.windows(2).all(|w| w[0].logprob >= w[1].logprob));
        assert_eq!(outputs[0].logprob, 1.0);
    }

    #[tokio::test]
    async fn failed_variants_are_skipped() {
        let backend = ScriptedBackend::new(
            vec![
                Ok("a".into()),
                Err(RankerError::RequestFailed("boom".into())),
                Ok("c".into()),
            ],
            vec![r#"{"useful": true}"#, r#"{"useful": true}"#],
        );
        let ranker = LogProbRanker::new(backend, config(3)).unwrap();

        let outputs = ranker.rank_outputs("p").await.unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[tokio::test]
    async fn all_failures_are_reported_together() {
        let backend = ScriptedBackend::new(
            vec![
                Err(RankerError::RequestFailed("one".into())),
                Err(RankerError::RequestFailed("two".into())),
            ],
            vec![],
        );
        let ranker = LogProbRanker::new(backend, config(2)).unwrap();

        match ranker.rank_outputs("p").await {
            Err(RankerError::AllVariantsFailed(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected AllVariantsFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn callback_sees_every_output_and_failures_do_not_stop_the_run() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let backend = ScriptedBackend::new(vec![Ok("a".into()), Ok("b".into())], vec![]);
        let ranker = LogProbRanker::new(backend, config(2))
            .unwrap()
            .with_callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("display failed")
            });

        let outputs = ranker.rank_outputs("p").await.unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let backend = ScriptedBackend::new(vec![], vec![]);
        assert!(LogProbRanker::new(backend, config(0)).is_err());
    }

    #[test]
    fn blocking_wrapper_runs_the_ranking() {
        let backend = ScriptedBackend::new(vec![Ok("a".into())], vec![r#"{"creative": "true"}"#]);
        let ranker = LogProbRanker::new(backend, config(1)).unwrap();

        let outputs = ranker.rank_outputs_blocking("p").unwrap();
        assert_eq!(outputs.len(), 1);
        assert!((outputs[0].logprob - 1.0 / 3.0).abs() < 1e-9);
    }

    /// Backend recording how many calls overlap
    #[derive(Default)]
    struct SlowBackend {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        async fn chat_completion(&self, request: ChatRequest) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if request.messages[0].content == EVALUATOR_SYSTEM_PROMPT {
                Ok(r#"{"useful": true}"#.to_string())
            } else {
                Ok("text".to_string())
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn thread_count_bounds_variants_in_flight() {
        let config = RankerConfig {
            num_variants: 6,
            thread_count: 2,
            ..Default::default()
        };
        let ranker = LogProbRanker::new(SlowBackend::default(), config).unwrap();

        let outputs = ranker.rank_outputs("p").await.unwrap();
        assert_eq!(outputs.len(), 6);
        let peak = ranker.backend().peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "{} calls overlapped", peak);
        assert_eq!(peak, 2);
    }

    /// Backend replying with a fixed completion and its token logprobs
    struct LogprobBackend {
        completion: ChatCompletion,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl LogprobBackend {
        fn new(content: &str, tokens: &[(&str, f64)]) -> Self {
            Self {
                completion: ChatCompletion {
                    content: content.to_string(),
                    token_logprobs: tokens
                        .iter()
                        .map(|(t, lp)| TokenLogprob::new(*t, *lp))
                        .collect(),
                },
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for LogprobBackend {
        fn name(&self) -> &str {
            "logprob"
        }

        async fn chat_completion(&self, _request: ChatRequest) -> Result<String> {
            Ok(self.completion.content.clone())
        }

        async fn chat_completion_with_logprobs(&self, request: ChatRequest) -> Result<ChatCompletion> {
            self.requests.lock().unwrap().push(request);
            Ok(self.completion.clone())
        }
    }

    #[tokio::test]
    async fn evaluate_text_averages_token_logprobs() {
        let backend = LogprobBackend::new("Hi there", &[("Hi", -0.5), (" there", -1.5)]);
        let ranker = LogProbRanker::new(backend, config(1)).unwrap();

        let result = ranker
            .evaluate_text(vec![ChatMessage::user("Say hi")])
            .await
            .unwrap();
        assert_eq!(result.text, "Hi there");
        assert_eq!(result.num_tokens, 2);
        assert!((result.average_logprob + 1.0).abs() < 1e-12);

        let requests = ranker.backend().requests.lock().unwrap();
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, TEXT_EVALUATION_MAX_TOKENS);
    }

    #[tokio::test]
    async fn backends_without_logprobs_cannot_evaluate_text() {
        let backend = ScriptedBackend::new(vec![Ok("a".into())], vec![]);
        let ranker = LogProbRanker::new(backend, config(1)).unwrap();

        let err = ranker
            .evaluate_text(vec![ChatMessage::user("Say hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, RankerError::LogprobsUnavailable(_)));
    }

    #[tokio::test]
    async fn attributes_are_scored_from_boolean_tokens() {
        let backend = LogprobBackend::new(
            r#"{"interesting": true, "creative": false, "useful": true}"#,
            &[
                ("{\"", -0.01),
                ("interesting", -0.01),
                ("\":", -0.01),
                (" true", -0.2),
                (",", -0.01),
                ("\"", -0.01),
                ("creative", -0.01),
                ("\":", -0.01),
                (" false", -0.9),
                (",", -0.01),
                ("\"", -0.01),
                ("useful", -0.01),
                ("\":", -0.01),
                (" true", -0.05),
                ("}", -0.01),
            ],
        );
        let ranker = LogProbRanker::new(backend, config(1)).unwrap();

        let scores = ranker.score_text_attributes("A cat sat.", None).await.unwrap();
        let values: Vec<(&str, f64)> = scores.iter().map(|s| (s.name.as_str(), s.score)).collect();
        assert_eq!(
            values,
            vec![("interesting", -0.2), ("creative", -0.9), ("useful", -0.05)]
        );

        let requests = ranker.backend().requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].content, ATTRIBUTE_EVALUATOR_SYSTEM_PROMPT);
        assert!(requests[0].messages[1].content.contains("A cat sat."));
    }
}
