// Fitted model results with name-based coefficient lookup

use super::spec::{ModelKind, TERM_ACCESSORY, TERM_DEVICE, TERM_INSURANCE, TERM_PERIOD};
use super::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// One row of a coefficient table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_stat: f64,
    /// Two-tailed p-value against Student's t with n - k degrees of freedom
    pub p_value: f64,
}

/// Coefficients and fit statistics of one model
///
/// Coefficients keep design-matrix order; lookups go through the term name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model: ModelKind,
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub n_obs: usize,
    /// Residual degrees of freedom (n - k)
    pub df_resid: usize,
}

impl ModelResult {
    /// Look up a coefficient by term name
    pub fn term(&self, name: &str) -> Result<&Coefficient> {
        self.coefficients
            .iter()
            .find(|c| c.term == name)
            .ok_or_else(|| ModelError::MissingTerm {
                term: name.to_string(),
            })
    }

    pub fn period(&self) -> Result<&Coefficient> {
        self.term(TERM_PERIOD)
    }

    pub fn device(&self) -> Result<&Coefficient> {
        self.term(TERM_DEVICE)
    }

    pub fn insurance(&self) -> Result<&Coefficient> {
        self.term(TERM_INSURANCE)
    }

    pub fn accessory(&self) -> Result<&Coefficient> {
        self.term(TERM_ACCESSORY)
    }
}

/// A fitted model plus the per-row vectors the diagnostics need
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub result: ModelResult,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
}
