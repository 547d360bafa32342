//! Grouped descriptive statistics
//!
//! Margin distribution by period, product-mix shares by period and a Welch
//! t-test of before vs after margins. Moments are computed in f64;
//! quantiles (on a trueno vector) and the t-test come from aprender.

use crate::transaction::{Period, ProductCategory, Transaction};
use aprender::stats::DescriptiveStats;
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// Distribution summary of a set of margins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
}

/// Summarize a set of margins; `None` when empty
pub fn summarize(values: &[f64]) -> Option<MarginSummary> {
    if values.is_empty() {
        return None;
    }

    let samples: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    let v = Vector::from_slice(&samples);
    let stats = DescriptiveStats::new(&v);
    let quantile = |q| stats.quantile(q).map(f64::from).unwrap_or(f64::NAN);

    // Moments stay in f64 so the period means agree with the model estimates
    let n = values.len();
    let mean = mean_of(values);
    let std_dev = if n > 1 {
        let ss: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(MarginSummary {
        count: n,
        mean,
        median: quantile(0.5),
        std_dev,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        q1: quantile(0.25),
        q3: quantile(0.75),
    })
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Margin summary for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub summary: MarginSummary,
}

/// Share of sales in one category before and after
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMixRow {
    pub category: ProductCategory,
    /// Fraction of before-period sales (mean of the indicator)
    pub before_share: f64,
    pub after_share: f64,
    /// after_share - before_share
    pub shift: f64,
}

/// Welch two-sample t-test of margins, after vs before
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTest {
    pub statistic: f64,
    pub p_value: f64,
    pub df: f64,
}

/// All descriptive outputs of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveSummary {
    pub overall: MarginSummary,
    pub by_period: Vec<PeriodSummary>,
    pub product_mix: Vec<ProductMixRow>,
    /// After mean minus before mean, in percentage points
    pub raw_difference: Option<f64>,
    pub period_test: Option<PeriodTest>,
}

impl DescriptiveSummary {
    pub fn period(&self, period: Period) -> Option<&MarginSummary> {
        self.by_period
            .iter()
            .find(|p| p.period == period)
            .map(|p| &p.summary)
    }
}

fn margins_in(transactions: &[Transaction], period: Period) -> Vec<f64> {
    transactions
        .iter()
        .filter(|t| t.period == period)
        .map(|t| t.margin)
        .collect()
}

fn share(transactions: &[Transaction], period: Period, category: ProductCategory) -> f64 {
    let (hits, total) = transactions
        .iter()
        .filter(|t| t.period == period)
        .fold((0.0, 0usize), |(hits, total), t| {
            (hits + t.indicator(category), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        hits / total as f64
    }
}

/// Welch's t-test via aprender; needs two samples per period
fn period_test(before: &[f64], after: &[f64]) -> Option<PeriodTest> {
    if before.len() < 2 || after.len() < 2 {
        return None;
    }
    let before: Vec<f32> = before.iter().map(|&v| v as f32).collect();
    let after: Vec<f32> = after.iter().map(|&v| v as f32).collect();

    // Sign convention: positive statistic means after > before
    match aprender::stats::hypothesis::ttest_ind(&after, &before, false) {
        Ok(result) => Some(PeriodTest {
            statistic: f64::from(result.statistic),
            p_value: f64::from(result.pvalue),
            df: f64::from(result.df),
        }),
        Err(e) => {
            tracing::warn!("Failed to compute period t-test: {}", e);
            None
        }
    }
}

/// Compute every descriptive table
///
/// The caller guarantees `transactions` is non-empty (the loader rejects
/// empty datasets).
pub fn describe(transactions: &[Transaction]) -> DescriptiveSummary {
    let all: Vec<f64> = transactions.iter().map(|t| t.margin).collect();
    let before = margins_in(transactions, Period::Before);
    let after = margins_in(transactions, Period::After);

    let by_period: Vec<PeriodSummary> = [(Period::Before, &before), (Period::After, &after)]
        .into_iter()
        .filter_map(|(period, values)| {
            summarize(values).map(|summary| PeriodSummary { period, summary })
        })
        .collect();

    let product_mix = ProductCategory::ALL
        .iter()
        .map(|&category| {
            let before_share = share(transactions, Period::Before, category);
            let after_share = share(transactions, Period::After, category);
            ProductMixRow {
                category,
                before_share,
                after_share,
                shift: after_share - before_share,
            }
        })
        .collect();

    let raw_difference = if before.is_empty() || after.is_empty() {
        None
    } else {
        Some(mean_of(&after) - mean_of(&before))
    };

    DescriptiveSummary {
        overall: summarize(&all).unwrap_or(MarginSummary {
            count: 0,
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            q1: 0.0,
            q3: 0.0,
        }),
        by_period,
        product_mix,
        raw_difference,
        period_test: period_test(&before, &after),
    }
}
