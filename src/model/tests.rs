// Model fitting tests against hand-checkable datasets
//
// - Two-group data where the period coefficient equals the mean difference
// - Mix-shift data where the period effect vanishes once product mix is controlled
// - Degenerate designs that must error instead of producing NaN

use super::*;
use crate::transaction::{Period, ProductCategory, Transaction};

fn sale(margin: f64, period: Period, category: ProductCategory, store: u32) -> Transaction {
    Transaction {
        margin,
        period,
        category,
        store,
        region: "North".to_string(),
    }
}

/// 724 before rows averaging 12.60 and 849 after rows averaging 17.05
fn documented_sample() -> Vec<Transaction> {
    let mut data = Vec::new();
    for i in 0..724 {
        let deviation = [-3.0, -1.0, 1.0, 3.0][i % 4];
        let category = ProductCategory::ALL[i % 4];
        let store = (i % 13) as u32 + 1;
        data.push(sale(12.60 + deviation, Period::Before, category, store));
    }
    for i in 0..849 {
        let deviation = [-2.0, 0.0, 2.0][i % 3];
        let category = ProductCategory::ALL[(i / 3) % 4];
        let store = (i % 13) as u32 + 1;
        data.push(sale(17.05 + deviation, Period::After, category, store));
    }
    data
}

/// Margins depend on category only; the after period sells more insurance
fn mix_shift_sample() -> Vec<Transaction> {
    let base = |c: ProductCategory| match c {
        ProductCategory::Device => 8.0,
        ProductCategory::Insurance => 30.0,
        ProductCategory::Accessory => 20.0,
        ProductCategory::Undeclared => 12.0,
    };
    let noise = [-0.5, 0.25, 0.5, -0.25];
    let before = [
        ProductCategory::Device,
        ProductCategory::Device,
        ProductCategory::Accessory,
        ProductCategory::Undeclared,
    ];
    let after = [
        ProductCategory::Insurance,
        ProductCategory::Insurance,
        ProductCategory::Accessory,
        ProductCategory::Undeclared,
        ProductCategory::Device,
    ];

    let mut data = Vec::new();
    for i in 0..200 {
        let c = before[i % before.len()];
        let store = (i % 4) as u32 + 1;
        data.push(sale(base(c) + noise[i % 4], Period::Before, c, store));
    }
    for i in 0..200 {
        let c = after[i % after.len()];
        let store = (i % 4) as u32 + 1;
        data.push(sale(base(c) + noise[(i + 1) % 4], Period::After, c, store));
    }
    data
}

#[test]
fn test_raw_period_equals_mean_difference() {
    let data = documented_sample();
    let fit = fit(&ModelSpec::raw(), &data).unwrap();
    let period = fit.result.period().unwrap();

    assert!(
        (period.estimate - 4.45).abs() < 0.01,
        "period coefficient {} should be 4.45",
        period.estimate
    );
    let intercept = fit.result.term(TERM_INTERCEPT).unwrap();
    assert!((intercept.estimate - 12.60).abs() < 1e-9);
    assert!(period.p_value < 0.001);
    assert_eq!(fit.result.n_obs, 1573);
    assert_eq!(fit.result.df_resid, 1571);
}

#[test]
fn test_refit_is_deterministic() {
    let data = documented_sample();
    let first = fit(&ModelSpec::raw(), &data).unwrap();
    let second = fit(&ModelSpec::raw(), &data).unwrap();
    assert_eq!(first.result, second.result);
}

#[test]
fn test_r_squared_never_decreases_across_nested_models() {
    for data in [documented_sample(), mix_shift_sample()] {
        let stores = data.iter().map(|t| t.store).max().unwrap();
        let [m1, m2, m3] = ModelSpec::all(stores, 1);
        let r1 = fit(&m1, &data).unwrap().result.r_squared;
        let r2 = fit(&m2, &data).unwrap().result.r_squared;
        let r3 = fit(&m3, &data).unwrap().result.r_squared;
        assert!(r2 >= r1 - 1e-12, "R2(M2)={} < R2(M1)={}", r2, r1);
        assert!(r3 >= r2 - 1e-12, "R2(M3)={} < R2(M2)={}", r3, r2);
    }
}

#[test]
fn test_controlling_for_mix_absorbs_period_effect() {
    let data = mix_shift_sample();
    let raw = fit(&ModelSpec::raw(), &data).unwrap();
    let controlled = fit(&ModelSpec::controlled(), &data).unwrap();

    let total = raw.result.period().unwrap().estimate;
    let direct = controlled.result.period().unwrap().estimate;
    assert!(total > 3.0, "mix shift should raise raw margin, got {}", total);
    assert!(direct.abs() < 0.5, "direct effect should be near zero, got {}", direct);

    let insurance = controlled.result.insurance().unwrap().estimate;
    assert!((insurance - 18.0).abs() < 0.5, "insurance vs undeclared ~ 18pp, got {}", insurance);
}

#[test]
fn test_period_t_stat_matches_pooled_t_test() {
    let data = vec![
        sale(10.0, Period::Before, ProductCategory::Device, 1),
        sale(12.0, Period::Before, ProductCategory::Device, 1),
        sale(11.0, Period::Before, ProductCategory::Device, 1),
        sale(15.0, Period::After, ProductCategory::Device, 1),
        sale(14.0, Period::After, ProductCategory::Device, 1),
        sale(16.0, Period::After, ProductCategory::Device, 1),
    ];
    let fit = fit(&ModelSpec::raw(), &data).unwrap();
    let period = fit.result.period().unwrap();

    // Pooled variance: each group has SS = 2, so sp^2 = 4 / 4 = 1
    let expected_se = (1.0_f64 * (1.0 / 3.0 + 1.0 / 3.0)).sqrt();
    assert!((period.estimate - 4.0).abs() < 1e-9);
    assert!((period.std_error - expected_se).abs() < 1e-9);
    assert!((period.t_stat - 4.0 / expected_se).abs() < 1e-9);
    assert!(period.p_value > 0.0 && period.p_value < 0.01);
}

#[test]
fn test_adjusted_r_squared_formula() {
    let data = mix_shift_sample();
    let result = fit(&ModelSpec::controlled(), &data).unwrap().result;
    let n = result.n_obs as f64;
    let p = 4.0;
    let expected = 1.0 - (1.0 - result.r_squared) * (n - 1.0) / (n - p - 1.0);
    assert!((result.adj_r_squared - expected).abs() < 1e-12);
    assert!(result.adj_r_squared <= result.r_squared);
}

#[test]
fn test_residuals_and_fitted_reconstruct_response() {
    let data = mix_shift_sample();
    let fit = fit(&ModelSpec::controlled(), &data).unwrap();
    assert_eq!(fit.fitted.len(), data.len());
    for ((t, f), e) in data.iter().zip(&fit.fitted).zip(&fit.residuals) {
        assert!((t.margin - (f + e)).abs() < 1e-9);
    }
    // OLS residuals with an intercept sum to zero
    let sum: f64 = fit.residuals.iter().sum();
    assert!(sum.abs() < 1e-8);
}

#[test]
fn test_store_without_observations_is_an_error() {
    // Stores 1-4 only; the fixed-effects universe says 5
    let data = mix_shift_sample();
    let err = fit(&ModelSpec::store_fixed_effects(5, 1), &data).unwrap_err();
    assert_eq!(
        err,
        ModelError::ZeroVariancePredictor {
            term: store_term(5)
        }
    );
}

#[test]
fn test_collinear_indicator_is_rank_deficient() {
    // Every after-period sale is a device and no before-period sale is
    let mut data = Vec::new();
    let before = [
        ProductCategory::Insurance,
        ProductCategory::Accessory,
        ProductCategory::Undeclared,
    ];
    for i in 0..30 {
        data.push(sale(10.0 + (i % 5) as f64, Period::Before, before[i % 3], 1));
        data.push(sale(
            14.0 + (i % 7) as f64,
            Period::After,
            ProductCategory::Device,
            1,
        ));
    }

    let err = fit(&ModelSpec::controlled(), &data).unwrap_err();
    assert_eq!(
        err,
        ModelError::RankDeficient {
            term: TERM_DEVICE.to_string()
        }
    );

    // M1 on the same data still fits
    assert!(fit(&ModelSpec::raw(), &data).is_ok());
}

#[test]
fn test_insufficient_observations() {
    let data = vec![
        sale(10.0, Period::Before, ProductCategory::Device, 1),
        sale(12.0, Period::After, ProductCategory::Device, 1),
    ];
    let err = fit(&ModelSpec::raw(), &data).unwrap_err();
    assert_eq!(err, ModelError::InsufficientObservations { n: 2, k: 2 });
}

#[test]
fn test_zero_variance_response() {
    let data: Vec<_> = (0..10)
        .map(|i| {
            let period = if i % 2 == 0 { Period::Before } else { Period::After };
            sale(15.0, period, ProductCategory::Device, 1)
        })
        .collect();
    let err = fit(&ModelSpec::raw(), &data).unwrap_err();
    assert_eq!(err, ModelError::ZeroVarianceResponse);
}

#[test]
fn test_missing_term_lookup() {
    let data = documented_sample();
    let result = fit(&ModelSpec::raw(), &data).unwrap().result;
    assert_eq!(
        result.device().unwrap_err(),
        ModelError::MissingTerm {
            term: TERM_DEVICE.to_string()
        }
    );
}

#[test]
fn test_store_fixed_effects_terms() {
    let spec = ModelSpec::store_fixed_effects(13, 1);
    let names = spec.term_names();
    assert_eq!(names.len(), 1 + 4 + 12);
    assert_eq!(names[0], TERM_INTERCEPT);
    assert_eq!(names[1], TERM_PERIOD);
    assert!(!names.contains(&store_term(1)));
    assert!(names.contains(&store_term(13)));

    let data = documented_sample();
    let result = fit(&spec, &data).unwrap().result;
    assert_eq!(result.coefficients.len(), 17);
    assert!(result.period().unwrap().estimate.is_finite());
}
