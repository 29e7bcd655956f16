//! Run reports - JSON files written by `rank --output` and imported by the gallery

use std::path::Path;

use crate::core::error::Result;
use crate::core::RunReport;

/// Write a report as pretty-printed JSON
pub fn save_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a report written by [`save_report`]
pub fn load_report(path: &Path) -> Result<RunReport> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Read a criteria template file, trimming surrounding whitespace
pub fn load_template(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RankedOutput, RankerConfig};

    #[test]
    fn saved_report_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let report = RunReport::new(
            "Cats",
            vec![RankedOutput {
                output: "A cat sat.".into(),
                logprob: 0.5,
                index: 0,
                attribute_scores: None,
                raw_evaluation: None,
            }],
            &RankerConfig::default(),
        );

        save_report(&path, &report).unwrap();
        assert_eq!(load_report(&path).unwrap(), report);
    }

    #[test]
    fn loads_hand_written_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{
              "prompt": "Cats",
              "results": [{"output": "x", "logprob": 1.0, "index": 2,
                           "attribute_scores": [{"name": "useful", "score": 1.0}]}],
              "config": {"variants": 3, "temperature": 0.7, "threads": 1, "template": "A {animal} sat."}
            }"#,
        )
        .unwrap();

        let report = load_report(&path).unwrap();
        assert_eq!(report.config.variants, 3);
        let scores = report.results[0].attribute_scores.as_ref().unwrap();
        assert_eq!(scores[0].explanation, "");
    }

    #[test]
    fn missing_report_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_report(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn template_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        std::fs::write(&path, "\n{\"a\": LOGPROB_TRUE}\n\n").unwrap();
        assert_eq!(load_template(&path).unwrap(), "{\"a\": LOGPROB_TRUE}");
    }
}
