//! JSON export of the analysis report
//!
//! `--format json` and `report.json` share this envelope: a version tag,
//! the input path and the whole [`AnalysisReport`].

use crate::pipeline::{AnalysisReport, ComparisonRow};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Top-level JSON document
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    /// Crate version that produced the report
    pub version: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Period coefficient across the completed models
    pub comparison: Vec<ComparisonRow>,
    pub report: &'a AnalysisReport,
}

impl<'a> JsonOutput<'a> {
    pub fn new(report: &'a AnalysisReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "marginfx-json-v1".to_string(),
            input: None,
            comparison: report.comparison(),
            report,
        }
    }

    pub fn with_input(mut self, input: &Path) -> Self {
        self.input = Some(input.display().to_string());
        self
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::loader::{LoadedData, ValidationReport};
    use crate::pipeline;
    use crate::transaction::{Period, ProductCategory, Transaction};

    fn report() -> AnalysisReport {
        let transactions = (0..60)
            .map(|i| Transaction {
                margin: 10.0 + (i % 7) as f64 + if i % 2 == 0 { 0.0 } else { 3.0 },
                period: if i % 2 == 0 { Period::Before } else { Period::After },
                category: ProductCategory::ALL[(i / 2) % 4],
                store: 1,
                region: "North".to_string(),
            })
            .collect();
        pipeline::run(
            &LoadedData {
                transactions,
                validation: ValidationReport::default(),
            },
            &AnalysisConfig::default(),
        )
    }

    #[test]
    fn test_json_envelope() {
        let report = report();
        let json = JsonOutput::new(&report)
            .with_input(Path::new("data/sales.csv"))
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["format"], "marginfx-json-v1");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["input"], "data/sales.csv");
        assert_eq!(value["report"]["models"][0]["model"], "raw");
        assert!(value["report"]["models"][0]["outcome"]["completed"].is_object());
    }

    #[test]
    fn test_failed_stage_serializes_reason() {
        // One store only: the fixed-effects dummies are all zero
        let report = report();
        let json = JsonOutput::new(&report).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let m3 = &value["report"]["models"][2];
        assert_eq!(m3["model"], "store_fixed_effects");
        assert!(m3["outcome"]["failed"]["reason"]
            .as_str()
            .unwrap()
            .contains("store[T.2]"));
        assert_eq!(value["comparison"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_input_omitted_when_unset() {
        let report = report();
        let json = JsonOutput::new(&report).to_json().unwrap();
        assert!(!json.contains("\"input\""));
    }
}
