//! Evaluation helpers - Template parsing, evaluation parsing and scoring

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::error::{RankerError, Result};
use super::example::{AttributeScore, RankedOutput};
use crate::llm::TokenLogprob;

/// Placeholder marking a criterion in an evaluation template
pub const LOGPROB_TRUE: &str = "LOGPROB_TRUE";

/// Parsed evaluator response
pub type Evaluation = Map<String, Value>;

fn embedded_object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^}]+\}").expect("valid regex"))
}

fn template_attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^" ]+)":\s*LOGPROB_TRUE"#).expect("valid regex"))
}

/// Parse an evaluator response into a JSON object.
///
/// Falls back to the first brace-delimited span when the whole text is not
/// JSON, so responses wrapped in prose or code fences still parse.
pub fn parse_evaluation_json(text: &str) -> Result<Evaluation> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => {
            let span = embedded_object_regex().find(text).ok_or_else(|| {
                RankerError::EvaluationParse(format!(
                    "no JSON object found in evaluation text ({})",
                    err
                ))
            })?;
            serde_json::from_str::<Value>(span.as_str()).map_err(|nested| {
                RankerError::EvaluationParse(format!(
                    "failed to parse evaluation JSON: {}. Nested error: {}",
                    err, nested
                ))
            })?
        }
    };

    match value {
        Value::Object(mut map) => {
            normalize_string_booleans(&mut map);
            Ok(map)
        }
        _ => Err(RankerError::EvaluationParse(
            "evaluation text did not parse into a JSON object".into(),
        )),
    }
}

fn normalize_string_booleans(map: &mut Evaluation) {
    for value in map.values_mut() {
        if let Value::String(s) = value {
            if s.eq_ignore_ascii_case("true") {
                *value = Value::Bool(true);
            } else if s.eq_ignore_ascii_case("false") {
                *value = Value::Bool(false);
            }
        }
    }
}

/// Extract the criteria names marked with `LOGPROB_TRUE`, in template order
pub fn extract_template_attributes(template: &str) -> Result<Vec<String>> {
    let parsed = serde_json::from_str::<Value>(template).or_else(|_| {
        serde_json::from_str::<Value>(
            &template.replace(LOGPROB_TRUE, &format!("\"{}\"", LOGPROB_TRUE)),
        )
    });

    let mut attributes: Vec<String> = match parsed {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter(|(_, v)| {
                v.as_str()
                    .is_some_and(|s| s.trim_matches('"') == LOGPROB_TRUE)
            })
            .map(|(k, _)| k)
            .collect(),
        _ => Vec::new(),
    };

    if attributes.is_empty() {
        attributes = template_attribute_regex()
            .captures_iter(template)
            .map(|c| c[1].to_string())
            .collect();
    }

    if attributes.is_empty() {
        let msg = if template.trim() == LOGPROB_TRUE {
            "template contains only the LOGPROB_TRUE token, cannot extract attributes"
        } else {
            "no LOGPROB_TRUE attributes found in template"
        };
        return Err(RankerError::Template(msg.into()));
    }

    Ok(attributes)
}

/// JSON truthiness: null, false, zero and empty values are false
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Numeric value of a detailed `{"score": ..}` entry; numeric strings are accepted
fn detail_score(name: &str, score: &Value) -> Result<f64> {
    let parsed = match score {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        RankerError::EvaluationParse(format!("score for '{}' is not a number: {}", name, score))
    })
}

/// Score each attribute from the evaluation; missing attributes score zero.
///
/// A detailed entry whose score is not numeric fails the whole evaluation.
pub fn score_attributes(evaluation: &Evaluation, attributes: &[String]) -> Result<Vec<AttributeScore>> {
    attributes
        .iter()
        .map(|name| {
            let mut score = AttributeScore::new(name.as_str(), 0.0);
            match evaluation.get(name) {
                Some(Value::Bool(true)) => score.score = 1.0,
                Some(Value::Object(detail)) if detail.get("score").is_some_and(|s| !s.is_null()) => {
                    if let Some(value) = detail.get("score") {
                        score.score = detail_score(name, value)?;
                    }
                    score.explanation = match detail.get("explanation") {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    };
                }
                Some(value) if is_truthy(value) => score.score = 1.0,
                _ => {}
            }
            Ok(score)
        })
        .collect()
}

/// Fraction of attributes the evaluation marks as met
pub fn calculate_score(evaluation: &Evaluation, attributes: &[String]) -> Result<f64> {
    if attributes.is_empty() {
        return Err(RankerError::Score(
            "attributes list cannot be empty for score calculation".into(),
        ));
    }

    let met = attributes
        .iter()
        .filter(|a| evaluation.get(a.as_str()).is_some_and(is_truthy))
        .count();

    Ok(met as f64 / attributes.len() as f64)
}

/// Build the evaluator's user message
pub fn format_evaluation_prompt(eval_prompt: &str, generated: &str, template: &str) -> Result<String> {
    if eval_prompt.is_empty() || generated.is_empty() || template.is_empty() {
        return Err(RankerError::Prompt(
            "missing required components for evaluation prompt".into(),
        ));
    }

    Ok(format!(
        "{}\n\nText to evaluate:\n{}\n\nCriteria template:\n{}",
        eval_prompt, generated, template
    ))
}

/// Order outputs best first; ties keep generation order
pub fn sort_ranked_outputs(mut outputs: Vec<RankedOutput>) -> Vec<RankedOutput> {
    outputs.sort_by(|a, b| b.logprob.total_cmp(&a.logprob));
    outputs
}

/// Mean log probability over the tokens; zero when there are none
pub fn average_token_logprob(tokens: &[TokenLogprob]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    tokens.iter().map(|t| t.logprob).sum::<f64>() / tokens.len() as f64
}

/// Strip `{"..."` or `"..."` wrapping from an accumulated key
fn unquote_key(key: &str) -> &str {
    if key.starts_with("{\"") && key.ends_with('"') {
        key[2..].strip_suffix('"').unwrap_or("")
    } else if key.starts_with('"') && key.ends_with('"') {
        key[1..].strip_suffix('"').unwrap_or("")
    } else {
        key
    }
}

fn is_structural(token: &str) -> bool {
    matches!(token.trim(), ":" | "{" | "}" | "[" | "]" | ",")
        || token.contains("\" :")
        || token.contains(":\"")
        || token == "\""
}

/// Index just past the tokens spelling `name`, searching from `from`.
/// Keys may be split over several tokens.
fn find_key(tokens: &[TokenLogprob], from: usize, name: &str) -> Option<usize> {
    for start in from..tokens.len() {
        let mut spelled = String::new();
        for (i, token) in tokens.iter().enumerate().skip(start) {
            if is_structural(&token.token) {
                break;
            }
            spelled.push_str(&token.token);
            let key = unquote_key(spelled.trim());
            if key == name {
                return Some(i + 1);
            }
            if key.len() > name.len() + 5
                || (!key.is_empty() && !name.starts_with(key.trim_matches('"')))
            {
                break;
            }
        }
    }
    None
}

/// Index just past the colon following a key
fn find_colon(tokens: &[TokenLogprob], from: usize) -> Option<usize> {
    for (i, token) in tokens.iter().enumerate().skip(from) {
        if token.token.contains(':') {
            return Some(i + 1);
        }
        if (token.token.starts_with('"') && i > from) || matches!(token.token.as_str(), "}" | "]") {
            return None;
        }
    }
    None
}

/// Position of the `true`/`false` token that is the value
fn find_boolean(tokens: &[TokenLogprob], from: usize) -> Option<usize> {
    for (i, token) in tokens.iter().enumerate().skip(from) {
        let word = token.token.trim().to_lowercase().replace('"', "");
        if word == "true" || word == "false" {
            return Some(i);
        }
        if matches!(token.token.as_str(), "," | "}" | "]") || (token.token.starts_with('"') && i > from) {
            return None;
        }
    }
    None
}

/// Score attributes by the logprob of the boolean token the evaluator wrote
/// for each, walking the token stream in template order.
///
/// An attribute whose value token cannot be located fails the whole call, as
/// does a logprob of exactly 0.0, which providers report when they did not
/// compute real logprobs.
pub fn token_attribute_scores(tokens: &[TokenLogprob], attributes: &[String]) -> Result<Vec<AttributeScore>> {
    let mut cursor = 0;
    let mut scores = Vec::with_capacity(attributes.len());

    for name in attributes {
        let position = find_key(tokens, cursor, name)
            .and_then(|after_key| find_colon(tokens, after_key))
            .and_then(|after_colon| find_boolean(tokens, after_colon))
            .ok_or_else(|| {
                RankerError::MalformedLogprobs(format!("value token for '{}' not found", name))
            })?;

        let token = &tokens[position];
        let word = token.token.trim();
        if token.logprob == 0.0 {
            return Err(RankerError::MalformedLogprobs(format!(
                "suspicious logprob of 0.0 for token '{}' of '{}'",
                word, name
            )));
        }

        let mut score = AttributeScore::new(name.as_str(), token.logprob);
        score.explanation = format!(
            "Logprob of token '{}' for '{}' is {:.4}",
            word, name, token.logprob
        );
        scores.push(score);
        cursor = position + 1;
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_TEMPLATE;

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_plain_json() {
        let eval = parse_evaluation_json(r#"{"a": true, "b": false}"#).unwrap();
        assert_eq!(eval["a"], Value::Bool(true));
        assert_eq!(eval["b"], Value::Bool(false));
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let text = "Sure! Here is my evaluation:\n```json\n{\"a\": true, \"b\": \"FALSE\"}\n```";
        let eval = parse_evaluation_json(text).unwrap();
        assert_eq!(eval["a"], Value::Bool(true));
        assert_eq!(eval["b"], Value::Bool(false));
    }

    #[test]
    fn string_booleans_are_normalized() {
        let eval = parse_evaluation_json(r#"{"a": "True", "b": "maybe"}"#).unwrap();
        assert_eq!(eval["a"], Value::Bool(true));
        assert_eq!(eval["b"], Value::String("maybe".into()));
    }

    #[test]
    fn rejects_non_object_json() {
        let err = parse_evaluation_json("[true, false]").unwrap_err();
        assert!(matches!(err, RankerError::EvaluationParse(_)));
    }

    #[test]
    fn rejects_text_without_object() {
        assert!(parse_evaluation_json("no json here").is_err());
    }

    #[test]
    fn extracts_default_template_attributes_in_order() {
        let names = extract_template_attributes(DEFAULT_TEMPLATE).unwrap();
        assert_eq!(names, attrs(&["interesting", "creative", "useful"]));
    }

    #[test]
    fn extracts_quoted_placeholders() {
        let names =
            extract_template_attributes(r#"{"clear": "LOGPROB_TRUE", "other": "x"}"#).unwrap();
        assert_eq!(names, attrs(&["clear"]));
    }

    #[test]
    fn falls_back_to_regex_for_invalid_json() {
        let names = extract_template_attributes(r#"criteria: "short": LOGPROB_TRUE, "funny":LOGPROB_TRUE"#)
            .unwrap();
        assert_eq!(names, attrs(&["short", "funny"]));
    }

    #[test]
    fn bare_placeholder_template_is_rejected() {
        let err = extract_template_attributes("  LOGPROB_TRUE ").unwrap_err();
        assert!(err.to_string().contains("only the LOGPROB_TRUE token"));
    }

    #[test]
    fn template_without_placeholders_is_rejected() {
        assert!(matches!(
            extract_template_attributes(r#"{"a": true}"#),
            Err(RankerError::Template(_))
        ));
    }

    #[test]
    fn scores_attributes() {
        let eval = parse_evaluation_json(
            r#"{"a": true, "b": false, "c": {"score": 0.5, "explanation": "meh"}, "d": "yes"}"#,
        )
        .unwrap();
        let scores = score_attributes(&eval, &attrs(&["a", "b", "c", "d", "e"])).unwrap();

        let values: Vec<f64> = scores.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![1.0, 0.0, 0.5, 1.0, 0.0]);
        assert_eq!(scores[2].explanation, "meh");
        assert_eq!(scores[4].name, "e");
    }

    #[test]
    fn numeric_string_scores_are_parsed() {
        let eval = parse_evaluation_json(
            r#"{"a": {"score": "0.5"}, "b": {"score": " 0.25 ", "explanation": 3}}"#,
        )
        .unwrap();
        let scores = score_attributes(&eval, &attrs(&["a", "b"])).unwrap();

        assert_eq!(scores[0].score, 0.5);
        assert_eq!(scores[1].score, 0.25);
        assert_eq!(scores[1].explanation, "3");
    }

    #[test]
    fn junk_score_fails_the_evaluation() {
        for json in [r#"{"a": {"score": "high"}}"#, r#"{"a": {"score": [1]}}"#] {
            let eval = parse_evaluation_json(json).unwrap();
            assert!(matches!(
                score_attributes(&eval, &attrs(&["a"])),
                Err(RankerError::EvaluationParse(_))
            ));
        }
    }

    #[test]
    fn score_is_fraction_of_met_criteria() {
        let eval = parse_evaluation_json(r#"{"a": true, "b": false, "c": true}"#).unwrap();
        let score = calculate_score(&eval, &attrs(&["a", "b", "c", "missing"])).unwrap();
        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_attribute_list_cannot_be_scored() {
        let eval = Evaluation::new();
        assert!(calculate_score(&eval, &[]).is_err());
    }

    #[test]
    fn formats_evaluation_prompt() {
        let prompt = format_evaluation_prompt("Judge.", "Hello", "{}").unwrap();
        assert_eq!(prompt, "Judge.\n\nText to evaluate:\nHello\n\nCriteria template:\n{}");
        assert!(format_evaluation_prompt("Judge.", "", "{}").is_err());
    }

    #[test]
    fn sorts_best_first_and_keeps_ties_stable() {
        let make = |index, logprob| RankedOutput {
            output: String::new(),
            logprob,
            index,
            attribute_scores: None,
            raw_evaluation: None,
        };
        let sorted = sort_ranked_outputs(vec![make(0, 0.3), make(1, 1.0), make(2, 0.3), make(3, 0.6)]);
        let order: Vec<usize> = sorted.iter().map(|o| o.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    fn stream(tokens: &[(&str, f64)]) -> Vec<TokenLogprob> {
        tokens.iter().map(|(t, lp)| TokenLogprob::new(*t, *lp)).collect()
    }

    #[test]
    fn average_logprob_of_tokens() {
        assert_eq!(average_token_logprob(&[]), 0.0);
        let tokens = stream(&[("a", -1.0), ("b", -0.5), ("c", 0.0)]);
        assert!((average_token_logprob(&tokens) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn token_scores_follow_the_evaluation_stream() {
        let tokens = stream(&[
            ("{\"", -0.01),
            ("inter", -0.02),
            ("esting", -0.03),
            ("\":", -0.04),
            (" true", -0.1),
            (",", -0.01),
            (" \"", -0.01),
            ("creative", -0.02),
            ("\":", -0.01),
            (" false", -0.7),
            ("}", -0.01),
        ]);
        let scores =
            token_attribute_scores(&tokens, &attrs(&["interesting", "creative"])).unwrap();

        assert_eq!(scores[0].name, "interesting");
        assert_eq!(scores[0].score, -0.1);
        assert_eq!(scores[1].score, -0.7);
        assert!(scores[1].explanation.contains("'false'"));
    }

    #[test]
    fn missing_value_token_is_an_error() {
        let tokens = stream(&[("{\"", -0.1), ("useful", -0.1), ("\":", -0.1), (" 1", -0.1), ("}", -0.1)]);
        assert!(matches!(
            token_attribute_scores(&tokens, &attrs(&["useful"])),
            Err(RankerError::MalformedLogprobs(_))
        ));
    }

    #[test]
    fn zero_logprob_value_is_rejected() {
        let tokens = stream(&[("useful", -0.1), ("\":", -0.1), (" true", 0.0)]);
        let err = token_attribute_scores(&tokens, &attrs(&["useful"])).unwrap_err();
        assert!(err.to_string().contains("0.0"));
    }
}
