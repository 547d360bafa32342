// Ordinary least squares via QR decomposition
//
// X = QR, beta = R^-1 Q^T y, Cov(beta) = sigma^2 (R^T R)^-1 with
// sigma^2 = SSR / (n - k). A diagonal entry of R that is negligible relative
// to its column norm means that column is a linear combination of the earlier
// ones, and the fit is rejected instead of returning NaN coefficients.

use super::result::{Coefficient, ModelFit, ModelResult};
use super::spec::ModelSpec;
use super::{ModelError, Result};
use crate::transaction::Transaction;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Relative tolerance for detecting linearly dependent columns
const RANK_TOLERANCE: f64 = 1e-10;

/// Raw least-squares output for an arbitrary design matrix
#[derive(Debug, Clone)]
pub struct OlsSolution {
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub n_obs: usize,
    pub df_resid: usize,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
}

/// Fit one model specification against the transactions
///
/// # Example
/// ```
/// use marginfx::model::{fit, ModelSpec};
/// use marginfx::transaction::{Period, ProductCategory, Transaction};
///
/// let sale = |margin: f64, period: Period| Transaction {
///     margin,
///     period,
///     category: ProductCategory::Device,
///     store: 1,
///     region: "North".to_string(),
/// };
/// let data = vec![
///     sale(10.0, Period::Before),
///     sale(12.0, Period::Before),
///     sale(15.0, Period::After),
///     sale(17.0, Period::After),
/// ];
///
/// let fit = fit(&ModelSpec::raw(), &data).unwrap();
/// let period = fit.result.period().unwrap();
/// assert!((period.estimate - 5.0).abs() < 1e-9);
/// ```
pub fn fit(spec: &ModelSpec, data: &[Transaction]) -> Result<ModelFit> {
    let n = data.len();
    let k = spec.n_columns();
    if n <= k {
        return Err(ModelError::InsufficientObservations { n, k });
    }

    let x = DMatrix::from_fn(n, k, |i, j| {
        if j == 0 {
            1.0
        } else {
            spec.predictors[j - 1].value(&data[i])
        }
    });
    let y = DVector::from_iterator(n, data.iter().map(|t| t.margin));

    let solution = fit_matrix(&spec.term_names(), &x, &y)?;

    tracing::debug!(
        model = spec.kind.label(),
        n_obs = solution.n_obs,
        r_squared = solution.r_squared,
        "fitted model"
    );

    Ok(ModelFit {
        result: ModelResult {
            model: spec.kind,
            coefficients: solution.coefficients,
            r_squared: solution.r_squared,
            adj_r_squared: solution.adj_r_squared,
            n_obs: solution.n_obs,
            df_resid: solution.df_resid,
        },
        fitted: solution.fitted,
        residuals: solution.residuals,
    })
}

/// Least squares on a prepared design matrix whose first column is the intercept
pub fn fit_matrix(terms: &[String], x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsSolution> {
    let (n, k) = x.shape();
    debug_assert_eq!(terms.len(), k);
    if n <= k {
        return Err(ModelError::InsufficientObservations { n, k });
    }

    if y.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite {
            term: "response".to_string(),
        });
    }
    for (j, term) in terms.iter().enumerate() {
        let column = x.column(j);
        if column.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { term: term.clone() });
        }
        // Intercept is the only column allowed to be constant
        if j > 0 && column.iter().all(|v| *v == column[0]) {
            return Err(ModelError::ZeroVariancePredictor { term: term.clone() });
        }
    }

    let y_mean = y.mean();
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    if sst == 0.0 {
        return Err(ModelError::ZeroVarianceResponse);
    }

    let qr = x.clone().qr();
    let r = qr.r();
    let q = qr.q();

    for (j, term) in terms.iter().enumerate() {
        let column_norm = x.column(j).norm();
        if r[(j, j)].abs() <= RANK_TOLERANCE * column_norm.max(1.0) {
            return Err(ModelError::RankDeficient { term: term.clone() });
        }
    }

    let qty = q.transpose() * y;
    let beta = r
        .solve_upper_triangular(&qty)
        .ok_or_else(|| ModelError::RankDeficient {
            term: terms[k - 1].clone(),
        })?;
    let r_inv = r
        .solve_upper_triangular(&DMatrix::identity(k, k))
        .ok_or_else(|| ModelError::RankDeficient {
            term: terms[k - 1].clone(),
        })?;
    let xtx_inv = &r_inv * r_inv.transpose();

    let fitted = x * &beta;
    let residuals = y - &fitted;
    let ssr = residuals.norm_squared();

    let df_resid = n - k;
    let sigma2 = ssr / df_resid as f64;
    let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)
        .map_err(|e| ModelError::Distribution(e.to_string()))?;

    let coefficients = terms
        .iter()
        .enumerate()
        .map(|(j, term)| {
            let estimate = beta[j];
            let std_error = (sigma2 * xtx_inv[(j, j)]).sqrt();
            let (t_stat, p_value) = if std_error > 0.0 {
                let t = estimate / std_error;
                (t, (2.0 * t_dist.sf(t.abs())).min(1.0))
            } else if estimate == 0.0 {
                (0.0, 1.0)
            } else {
                // Perfect fit: residual variance is exactly zero
                (f64::INFINITY.copysign(estimate), 0.0)
            };
            Coefficient {
                term: term.clone(),
                estimate,
                std_error,
                t_stat,
                p_value,
            }
        })
        .collect();

    let r_squared = 1.0 - ssr / sst;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_resid as f64;

    Ok(OlsSolution {
        coefficients,
        r_squared,
        adj_r_squared,
        n_obs: n,
        df_resid,
        fitted: fitted.iter().copied().collect(),
        residuals: residuals.iter().copied().collect(),
    })
}
