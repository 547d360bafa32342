// Shapiro-Wilk normality test
//
// Coefficients and p-values follow Royston (1992, 1995): polynomial
// corrections for the two most extreme weights, a log-normal approximation of
// 1 - W for n >= 12 and a separate transform for 4 <= n <= 11. For n = 3 the
// null distribution of W is exact.

use super::{DiagnosticsError, Result, Verdict};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Royston's correction polynomial for the largest weight
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
/// ... and for the second largest
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityTest {
    /// Shapiro-Wilk W in (0, 1]
    pub statistic: f64,
    pub p_value: f64,
    pub n: usize,
    pub alpha: f64,
    /// Pass when p > alpha, otherwise caution
    pub verdict: Verdict,
}

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| DiagnosticsError::Distribution(e.to_string()))
}

/// Shapiro-Wilk weights for a sample of size n (ascending order)
fn weights(n: usize, normal: &Normal) -> Vec<f64> {
    if n == 3 {
        return vec![-FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2];
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let mm: f64 = m.iter().map(|v| v * v).sum();
    let u = 1.0 / nf.sqrt();

    let a_n = m[n - 1] / mm.sqrt() + poly(&C1, u);
    let mut a = vec![0.0; n];

    if n > 5 {
        let a_n1 = m[n - 2] / mm.sqrt() + poly(&C2, u);
        let phi = (mm - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * a_n.powi(2) - 2.0 * a_n1.powi(2));
        for i in 2..n - 2 {
            a[i] = m[i] / phi.sqrt();
        }
        a[1] = -a_n1;
        a[n - 2] = a_n1;
    } else {
        let phi = (mm - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * a_n.powi(2));
        for i in 1..n - 1 {
            a[i] = m[i] / phi.sqrt();
        }
    }
    a[0] = -a_n;
    a[n - 1] = a_n;
    a
}

/// Upper-tail p-value of W for sample size n
fn p_value(w: f64, n: usize, normal: &Normal) -> f64 {
    if w >= 1.0 {
        return 1.0;
    }
    let nf = n as f64;

    if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - 0.75_f64.sqrt().asin());
        return p.clamp(0.0, 1.0);
    }

    let w1 = (1.0 - w).ln();
    let z = if n <= 11 {
        let gamma = poly(&[-2.273, 0.459], nf);
        if w1 >= gamma {
            return 0.0;
        }
        let y = -(gamma - w1).ln();
        let mean = poly(&[0.544, -0.39978, 0.025054, -6.714e-4], nf);
        let sd = poly(&[1.3822, -0.77857, 0.062767, -0.0020322], nf).exp();
        (y - mean) / sd
    } else {
        let ln_n = nf.ln();
        let mean = poly(&[-1.5861, -0.31082, -0.083751, 0.0038915], ln_n);
        let sd = poly(&[-0.4803, -0.082676, 0.0030302], ln_n).exp();
        (w1 - mean) / sd
    };

    normal.sf(z).clamp(0.0, 1.0)
}

/// Shapiro-Wilk test of `values` at significance level `alpha`
///
/// # Example
/// ```
/// use marginfx::diagnostics::{shapiro_wilk, Verdict};
///
/// let values = [2.1, 2.9, 3.2, 3.5, 3.9, 4.1, 4.4, 4.8, 5.2, 5.9, 6.4, 7.1];
/// let test = shapiro_wilk(&values, 0.05).unwrap();
/// assert!(test.statistic > 0.9);
/// assert_eq!(test.verdict, Verdict::Pass);
/// ```
pub fn shapiro_wilk(values: &[f64], alpha: f64) -> Result<NormalityTest> {
    let n = values.len();
    if n < 3 {
        return Err(DiagnosticsError::InsufficientData {
            required: 3,
            actual: n,
        });
    }

    let mut x = values.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    if x[n - 1] - x[0] == 0.0 {
        return Err(DiagnosticsError::ZeroRange);
    }
    if n > 5000 {
        tracing::warn!(n, "Shapiro-Wilk p-value may be inaccurate above 5000 observations");
    }

    let normal = standard_normal()?;
    let a = weights(n, &normal);

    let mean = x.iter().sum::<f64>() / n as f64;
    let ssq: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let numerator: f64 = a.iter().zip(&x).map(|(a, x)| a * x).sum();
    let w = (numerator * numerator / ssq).min(1.0);

    let p = p_value(w, n, &normal);
    let verdict = if p > alpha {
        Verdict::Pass
    } else {
        Verdict::Caution
    };

    Ok(NormalityTest {
        statistic: w,
        p_value: p,
        n,
        alpha,
        verdict,
    })
}
