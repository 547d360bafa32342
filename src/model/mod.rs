// Nested OLS models for the before/after margin analysis
//
// Three fixed specifications are fitted against the same transactions:
// - M1 (raw): margin ~ period
// - M2 (controlled): margin ~ period + device + insurance + accessory
// - M3 (store fixed effects): M2 + one dummy per non-reference store
//
// Each specification is a static list of named extractors. Least squares is
// solved by QR decomposition (nalgebra) and inference uses Student's t with
// n - k degrees of freedom (statrs). Coefficients are always looked up by term
// name, never by position.

mod ols;
mod result;
mod spec;

pub use ols::{fit, fit_matrix, OlsSolution};
pub use result::{Coefficient, ModelFit, ModelResult};
pub use spec::{
    store_term, Extractor, ModelKind, ModelSpec, Predictor, TERM_ACCESSORY, TERM_DEVICE,
    TERM_INSURANCE, TERM_INTERCEPT, TERM_PERIOD,
};

use thiserror::Error;

/// Errors raised while fitting one model
///
/// Each error is local to the model that raised it; the other models in the
/// run are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Insufficient observations: {n} rows for {k} coefficients (need more rows than coefficients)")]
    InsufficientObservations { n: usize, k: usize },

    #[error("Rank-deficient design matrix: term '{term}' is a linear combination of earlier terms")]
    RankDeficient { term: String },

    #[error("Zero-variance predictor '{term}': column is constant, design matrix is rank-deficient")]
    ZeroVariancePredictor { term: String },

    #[error("Zero-variance response: every margin is identical")]
    ZeroVarianceResponse,

    #[error("Non-finite value in column '{term}'")]
    NonFinite { term: String },

    #[error("Term '{term}' not present in model")]
    MissingTerm { term: String },

    #[error("Distribution error: {0}")]
    Distribution(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests;
