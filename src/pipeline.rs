//! One analysis run over the loaded transactions
//!
//! Runs the descriptive aggregator, the three models, the mediation
//! decomposer and the diagnostics once, and collects everything into an
//! immutable [`AnalysisReport`]. A failing stage is recorded as
//! [`StageOutcome::Failed`] and never stops its siblings.

use crate::config::AnalysisConfig;
use crate::descriptive::{describe, DescriptiveSummary};
use crate::diagnostics::{
    breusch_pagan, by_region, by_store, shapiro_wilk, HeterogeneityTable, HeteroskedasticityTest,
    NormalityTest, Verdict,
};
use crate::loader::{LoadedData, ValidationReport};
use crate::mediation::{analyze, MediationAnalysis};
use crate::model::{fit, ModelFit, ModelKind, ModelResult, ModelSpec};
use crate::transaction::Transaction;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Result of a stage that may fail without aborting the run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Completed(T),
    Failed { reason: String },
}

impl<T> StageOutcome<T> {
    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(e) => StageOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StageOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            StageOutcome::Completed(_) => None,
            StageOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }
}

/// Status label of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pass,
    Warning,
    Fail,
}

impl StageStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            StageStatus::Pass => "✅",
            StageStatus::Warning => "⚠️",
            StageStatus::Fail => "❌",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageStatus::Pass => "pass",
            StageStatus::Warning => "warning",
            StageStatus::Fail => "fail",
        }
    }
}

/// One line of the stage summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub status: StageStatus,
    pub detail: String,
}

/// Outcome of one model fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelOutcome {
    pub model: ModelKind,
    pub outcome: StageOutcome<ModelResult>,
}

/// One row of the model-comparison table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub model: ModelKind,
    pub period_coef: f64,
    pub period_std_error: f64,
    pub p_value: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub n_obs: usize,
}

/// Residual diagnostics of the controlled model plus heterogeneity tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub normality: StageOutcome<NormalityTest>,
    pub heteroskedasticity: StageOutcome<HeteroskedasticityTest>,
    pub by_store: HeterogeneityTable,
    pub by_region: HeterogeneityTable,
}

/// Everything computed in one run; read-only once built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub significance_level: f64,
    pub validation: ValidationReport,
    pub descriptive: DescriptiveSummary,
    pub models: Vec<ModelOutcome>,
    pub mediation: StageOutcome<MediationAnalysis>,
    pub diagnostics: DiagnosticsReport,
    pub stages: Vec<StageReport>,
}

impl AnalysisReport {
    pub fn model(&self, kind: ModelKind) -> Option<&ModelResult> {
        self.models
            .iter()
            .find(|m| m.model == kind)
            .and_then(|m| m.outcome.completed())
    }

    /// Period coefficient and fit statistics of every completed model
    pub fn comparison(&self) -> Vec<ComparisonRow> {
        self.models
            .iter()
            .filter_map(|m| {
                let result = m.outcome.completed()?;
                let period = result.period().ok()?;
                Some(ComparisonRow {
                    model: m.model,
                    period_coef: period.estimate,
                    period_std_error: period.std_error,
                    p_value: period.p_value,
                    r_squared: result.r_squared,
                    adj_r_squared: result.adj_r_squared,
                    n_obs: result.n_obs,
                })
            })
            .collect()
    }

    /// True when any stage failed outright
    pub fn has_failures(&self) -> bool {
        self.stages.iter().any(|s| s.status == StageStatus::Fail)
    }
}

fn stage(stage: &str, status: StageStatus, detail: impl Into<String>) -> StageReport {
    let report = StageReport {
        stage: stage.to_string(),
        status,
        detail: detail.into(),
    };
    match status {
        StageStatus::Pass => info!(stage, detail = %report.detail, "stage passed"),
        StageStatus::Warning => warn!(stage, detail = %report.detail, "stage passed with warnings"),
        StageStatus::Fail => warn!(stage, detail = %report.detail, "stage failed"),
    }
    report
}

/// Fit each specification independently
fn fit_models(
    specs: &[ModelSpec],
    transactions: &[Transaction],
) -> Vec<(ModelKind, crate::model::Result<ModelFit>)> {
    specs
        .iter()
        .map(|spec| {
            debug!(
                model = spec.kind.slug(),
                columns = spec.n_columns(),
                "fitting model"
            );
            (spec.kind, fit(spec, transactions))
        })
        .collect()
}

fn validation_stage(validation: &ValidationReport) -> StageReport {
    let warnings = validation.warnings();
    if warnings.is_empty() {
        stage(
            "validation",
            StageStatus::Pass,
            format!("{} rows, no warnings", validation.rows_kept),
        )
    } else {
        stage(
            "validation",
            StageStatus::Warning,
            format!("{} rows, {}", validation.rows_kept, warnings.join("; ")),
        )
    }
}

fn descriptive_stage(descriptive: &DescriptiveSummary) -> StageReport {
    match descriptive.raw_difference {
        Some(difference) => stage(
            "descriptive",
            StageStatus::Pass,
            format!("raw before/after difference {:+.2} pp", difference),
        ),
        None => stage(
            "descriptive",
            StageStatus::Warning,
            "only one period present, no before/after difference",
        ),
    }
}

fn model_stage(kind: ModelKind, outcome: &StageOutcome<ModelResult>) -> StageReport {
    let name = kind.label();
    match outcome {
        StageOutcome::Completed(result) => {
            let detail = match result.period() {
                Ok(period) => format!(
                    "period {:+.3} (p={:.4}), R²={:.4}",
                    period.estimate, period.p_value, result.r_squared
                ),
                Err(_) => format!("R²={:.4}", result.r_squared),
            };
            stage(name, StageStatus::Pass, detail)
        }
        StageOutcome::Failed { reason } => stage(name, StageStatus::Fail, reason.clone()),
    }
}

fn mediation_outcome(
    raw: &StageOutcome<ModelResult>,
    controlled: &StageOutcome<ModelResult>,
) -> StageOutcome<MediationAnalysis> {
    match (raw, controlled) {
        (StageOutcome::Completed(raw), StageOutcome::Completed(controlled)) => {
            StageOutcome::from_result(analyze(raw, controlled))
        }
        (StageOutcome::Failed { reason }, _) => {
            StageOutcome::failed(format!(
                "{} unavailable: {}",
                ModelKind::Raw.label(),
                reason
            ))
        }
        (_, StageOutcome::Failed { reason }) => StageOutcome::failed(format!(
            "{} unavailable: {}",
            ModelKind::Controlled.label(),
            reason
        )),
    }
}

fn mediation_stage(outcome: &StageOutcome<MediationAnalysis>) -> StageReport {
    match outcome {
        StageOutcome::Completed(analysis) => {
            let d = &analysis.decomposition;
            stage(
                "mediation",
                StageStatus::Pass,
                format!(
                    "total {:+.3} = direct {:+.3} + indirect {:+.3} ({:.1}% mediated)",
                    d.total, d.direct, d.indirect, d.mediation_pct
                ),
            )
        }
        StageOutcome::Failed { reason } => stage("mediation", StageStatus::Fail, reason.clone()),
    }
}

fn diagnostics(
    controlled: Option<&ModelFit>,
    transactions: &[Transaction],
    alpha: f64,
) -> DiagnosticsReport {
    let (normality, heteroskedasticity) = match controlled {
        Some(fit) => (
            StageOutcome::from_result(shapiro_wilk(&fit.residuals, alpha)),
            StageOutcome::from_result(breusch_pagan(&fit.residuals, &fit.fitted, alpha)),
        ),
        None => {
            let reason = format!("{} unavailable", ModelKind::Controlled.label());
            (
                StageOutcome::failed(reason.clone()),
                StageOutcome::failed(reason),
            )
        }
    };

    DiagnosticsReport {
        normality,
        heteroskedasticity,
        by_store: by_store(transactions),
        by_region: by_region(transactions),
    }
}

fn diagnostics_stages(report: &DiagnosticsReport) -> Vec<StageReport> {
    let normality = match &report.normality {
        StageOutcome::Completed(test) => {
            let status = match test.verdict {
                Verdict::Pass => StageStatus::Pass,
                _ => StageStatus::Warning,
            };
            stage(
                "normality",
                status,
                format!(
                    "Shapiro-Wilk W={:.4}, p={:.4} ({})",
                    test.statistic, test.p_value, test.verdict
                ),
            )
        }
        StageOutcome::Failed { reason } => stage("normality", StageStatus::Fail, reason.clone()),
    };

    let heteroskedasticity = match &report.heteroskedasticity {
        StageOutcome::Completed(test) => {
            let status = match test.verdict {
                Verdict::Pass => StageStatus::Pass,
                _ => StageStatus::Warning,
            };
            stage(
                "heteroskedasticity",
                status,
                format!(
                    "LM={:.3} vs critical {:.3}, p={:.4} ({})",
                    test.statistic, test.critical_value, test.p_value, test.verdict
                ),
            )
        }
        StageOutcome::Failed { reason } => {
            stage("heteroskedasticity", StageStatus::Fail, reason.clone())
        }
    };

    let heterogeneity = match report.by_store.top() {
        Some(top) => stage(
            "heterogeneity",
            StageStatus::Pass,
            format!(
                "{} stores, {} regions; top store {} ({:+.2} pp)",
                report.by_store.records.len(),
                report.by_region.records.len(),
                top.group,
                top.effect.unwrap_or(0.0)
            ),
        ),
        None => stage(
            "heterogeneity",
            StageStatus::Warning,
            "no store has observations in both periods",
        ),
    };

    vec![normality, heteroskedasticity, heterogeneity]
}

fn run_with_specs(
    data: &LoadedData,
    config: &AnalysisConfig,
    specs: &[ModelSpec],
) -> AnalysisReport {
    let transactions = &data.transactions;
    let alpha = config.significance_level;
    info!(rows = transactions.len(), alpha, "starting analysis");

    let mut stages = vec![validation_stage(&data.validation)];

    let descriptive = describe(transactions);
    stages.push(descriptive_stage(&descriptive));

    let fits = fit_models(specs, transactions);
    let controlled_fit = fits.iter().find_map(|(kind, fit)| match (kind, fit) {
        (ModelKind::Controlled, Ok(fit)) => Some(fit),
        _ => None,
    });

    let models: Vec<ModelOutcome> = fits
        .iter()
        .map(|(kind, fit)| ModelOutcome {
            model: *kind,
            outcome: StageOutcome::from_result(fit.as_ref().map(|f| f.result.clone())),
        })
        .collect();
    for model in &models {
        stages.push(model_stage(model.model, &model.outcome));
    }

    let missing =
        |kind: ModelKind| StageOutcome::failed(format!("{} was not fitted", kind.label()));
    let outcome_of = |kind: ModelKind| {
        models
            .iter()
            .find(|m| m.model == kind)
            .map(|m| m.outcome.clone())
            .unwrap_or_else(|| missing(kind))
    };
    let mediation = mediation_outcome(
        &outcome_of(ModelKind::Raw),
        &outcome_of(ModelKind::Controlled),
    );
    stages.push(mediation_stage(&mediation));

    let diagnostics = diagnostics(controlled_fit, transactions, alpha);
    stages.extend(diagnostics_stages(&diagnostics));

    AnalysisReport {
        significance_level: alpha,
        validation: data.validation.clone(),
        descriptive,
        models,
        mediation,
        diagnostics,
        stages,
    }
}

/// Run every analysis stage once
pub fn run(data: &LoadedData, config: &AnalysisConfig) -> AnalysisReport {
    let specs = ModelSpec::all(config.store_count, config.reference_store());
    run_with_specs(data, config, &specs)
}
