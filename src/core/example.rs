//! Examples - Ranked runs and the records they are made of

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use super::config::RankerConfig;

/// Unique identifier for a stored example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExampleId(pub Uuid);

impl ExampleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExampleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single criterion and how the evaluator scored it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeScore {
    pub name: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub explanation: String,
}

impl AttributeScore {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            explanation: String::new(),
        }
    }
}

/// A generated output with its evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOutput {
    /// Generated text
    pub output: String,
    /// Fraction of template criteria met, 0.0 - 1.0
    pub logprob: f64,
    /// Position of the variant in generation order
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_scores: Option<Vec<AttributeScore>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_evaluation: Option<String>,
}

/// One displayable ranking run: the prompt, how many variants were asked for,
/// the criteria template and the ranked results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub prompt: String,
    pub variants: u32,
    pub template: String,
    #[serde(default)]
    pub results: Vec<RankedOutput>,
}

impl Example {
    pub fn new(
        prompt: impl Into<String>,
        variants: u32,
        template: impl Into<String>,
        results: Vec<RankedOutput>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            variants,
            template: template.into(),
            results,
        }
    }

    /// Best scoring result, if any
    pub fn best(&self) -> Option<&RankedOutput> {
        self.results
            .iter()
            .max_by(|a, b| a.logprob.total_cmp(&b.logprob))
    }
}

/// Settings recorded alongside a saved report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub variants: u32,
    pub temperature: f32,
    pub threads: u32,
    pub template: String,
}

/// On-disk JSON document written by `rank --output`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub prompt: String,
    #[serde(serialize_with = "serialize_report_results")]
    pub results: Vec<RankedOutput>,
    pub config: ReportConfig,
}

/// Attribute as written to report files: explanations stay in the gallery
#[derive(Serialize)]
struct ReportAttribute<'a> {
    name: &'a str,
    score: f64,
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    output: &'a str,
    logprob: f64,
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    attribute_scores: Option<Vec<ReportAttribute<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_evaluation: Option<&'a str>,
}

impl<'a> From<&'a RankedOutput> for ReportOutput<'a> {
    fn from(ranked: &'a RankedOutput) -> Self {
        Self {
            output: &ranked.output,
            logprob: ranked.logprob,
            index: ranked.index,
            attribute_scores: ranked
                .attribute_scores
                .as_deref()
                .filter(|scores| !scores.is_empty())
                .map(|scores| {
                    scores
                        .iter()
                        .map(|a| ReportAttribute {
                            name: &a.name,
                            score: a.score,
                        })
                        .collect()
                }),
            raw_evaluation: ranked.raw_evaluation.as_deref().filter(|raw| !raw.is_empty()),
        }
    }
}

fn serialize_report_results<S: Serializer>(
    results: &[RankedOutput],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(results.iter().map(ReportOutput::from))
}

impl RunReport {
    pub fn new(prompt: impl Into<String>, results: Vec<RankedOutput>, config: &RankerConfig) -> Self {
        Self {
            prompt: prompt.into(),
            results,
            config: ReportConfig {
                variants: config.num_variants,
                temperature: config.temperature,
                threads: config.thread_count,
                template: config.template.clone(),
            },
        }
    }
}

impl From<RunReport> for Example {
    fn from(report: RunReport) -> Self {
        Self {
            prompt: report.prompt,
            variants: report.config.variants,
            template: report.config.template,
            results: report.results,
        }
    }
}

/// An example kept in the gallery
#[derive(Debug, Clone, PartialEq)]
pub struct StoredExample {
    pub id: ExampleId,
    pub created_at: DateTime<Utc>,
    pub example: Example,
}

impl StoredExample {
    pub fn new(example: Example) -> Self {
        Self {
            id: ExampleId::new(),
            created_at: Utc::now(),
            example,
        }
    }
}
