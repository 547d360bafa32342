// Breusch-Pagan style heteroskedasticity test
//
// Squared residuals are regressed on an intercept and the fitted values. Under
// homoskedasticity LM = n * R^2 of that auxiliary regression is chi-squared
// with one degree of freedom.

use super::{DiagnosticsError, Result, Verdict};
use crate::model::{fit_matrix, TERM_INTERCEPT};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeteroskedasticityTest {
    /// LM = n * R^2 of the auxiliary regression
    pub statistic: f64,
    pub auxiliary_r_squared: f64,
    /// chi-squared(1) quantile at 1 - alpha (3.841 for alpha = 0.05)
    pub critical_value: f64,
    pub p_value: f64,
    pub n: usize,
    pub alpha: f64,
    /// Pass when the statistic stays below the critical value
    pub verdict: Verdict,
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Test residual variance against fitted values at significance level `alpha`
///
/// A constant squared-residual vector is perfectly homoskedastic and yields
/// LM = 0, as do constant fitted values (nothing to explain the variance with).
pub fn breusch_pagan(
    residuals: &[f64],
    fitted: &[f64],
    alpha: f64,
) -> Result<HeteroskedasticityTest> {
    let n = residuals.len();
    if n != fitted.len() {
        return Err(DiagnosticsError::LengthMismatch {
            residuals: n,
            fitted: fitted.len(),
        });
    }
    if n < 3 {
        return Err(DiagnosticsError::InsufficientData {
            required: 3,
            actual: n,
        });
    }

    let squared: Vec<f64> = residuals.iter().map(|e| e * e).collect();

    let auxiliary_r_squared = if is_constant(&squared) || is_constant(fitted) {
        0.0
    } else {
        let x = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { fitted[i] });
        let y = DVector::from_vec(squared);
        let terms = [TERM_INTERCEPT.to_string(), "fitted".to_string()];
        fit_matrix(&terms, &x, &y)?.r_squared.max(0.0)
    };

    let statistic = n as f64 * auxiliary_r_squared;
    let chi2 =
        ChiSquared::new(1.0).map_err(|e| DiagnosticsError::Distribution(e.to_string()))?;
    let critical_value = chi2.inverse_cdf(1.0 - alpha);
    let p_value = chi2.sf(statistic).clamp(0.0, 1.0);

    let verdict = if statistic < critical_value {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    Ok(HeteroskedasticityTest {
        statistic,
        auxiliary_r_squared,
        critical_value,
        p_value,
        n,
        alpha,
        verdict,
    })
}
