// Robustness diagnostics for the controlled model
//
// - Normality of residuals: Shapiro-Wilk W with Royston's p-value approximation
// - Heteroskedasticity: n * R^2 of squared residuals regressed on fitted values,
//   compared with the chi-squared(1) critical value
// - Heterogeneity: before/after mean margin per store and per region
//
// The tests are advisory. They are attached to the report and never change
// the estimated effects.

mod heterogeneity;
mod heteroskedasticity;
mod normality;

pub use heterogeneity::{by_region, by_store, GroupKind, HeterogeneityRecord, HeterogeneityTable};
pub use heteroskedasticity::{breusch_pagan, HeteroskedasticityTest};
pub use normality::{shapiro_wilk, NormalityTest};

use crate::model::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosticsError {
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Residuals and fitted values differ in length ({residuals} vs {fitted})")]
    LengthMismatch { residuals: usize, fitted: usize },

    #[error("All values are identical; the test statistic is undefined")]
    ZeroRange,

    #[error("Auxiliary regression failed: {0}")]
    Auxiliary(#[from] ModelError),

    #[error("Distribution error: {0}")]
    Distribution(String),
}

pub type Result<T> = std::result::Result<T, DiagnosticsError>;

/// Outcome label of an advisory test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    /// Assumption questionable; results still reported
    Caution,
    Fail,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Caution => "caution",
            Verdict::Fail => "fail",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
