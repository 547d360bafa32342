//! Plain-text run summary

use crate::model::ModelKind;
use crate::pipeline::{AnalysisReport, StageOutcome};
use crate::transaction::Period;

/// Human-readable summary of a run
pub fn to_report_string(report: &AnalysisReport) -> String {
    let mut out = String::new();

    out.push_str("=== Bonus Program Margin Analysis ===\n\n");

    // Stage status
    for stage in &report.stages {
        out.push_str(&format!(
            "{} {:<26} {}\n",
            stage.status.symbol(),
            stage.stage,
            stage.detail
        ));
    }

    // Descriptives
    out.push_str("\n📊 Margin by period:\n");
    for period in [Period::Before, Period::After] {
        match report.descriptive.period(period) {
            Some(s) => out.push_str(&format!(
                "  {:<7} n={:<6} mean={:.2} median={:.2} sd={:.2}\n",
                period.name(),
                s.count,
                s.mean,
                s.median,
                s.std_dev
            )),
            None => out.push_str(&format!("  {:<7} no observations\n", period.name())),
        }
    }
    if let Some(test) = &report.descriptive.period_test {
        out.push_str(&format!(
            "  Welch t={:.3}, df={:.1}, p={:.4}\n",
            test.statistic, test.df, test.p_value
        ));
    }

    // Models
    out.push_str("\n📈 Period effect by model:\n");
    for kind in ModelKind::ALL {
        let outcome = report
            .models
            .iter()
            .find(|m| m.model == kind)
            .map(|m| &m.outcome);
        match outcome {
            Some(StageOutcome::Completed(result)) => match result.period() {
                Ok(p) => out.push_str(&format!(
                    "  {:<26} {:+.3} (SE {:.3}, p={:.4})  R²={:.4} adj R²={:.4}\n",
                    kind.label(),
                    p.estimate,
                    p.std_error,
                    p.p_value,
                    result.r_squared,
                    result.adj_r_squared
                )),
                Err(e) => out.push_str(&format!("  {:<26} {}\n", kind.label(), e)),
            },
            Some(StageOutcome::Failed { reason }) => {
                out.push_str(&format!("  {:<26} failed: {}\n", kind.label(), reason))
            }
            None => out.push_str(&format!("  {:<26} not fitted\n", kind.label())),
        }
    }

    // Mediation
    out.push_str("\n🔀 Mediation by product mix:\n");
    match &report.mediation {
        StageOutcome::Completed(analysis) => {
            for row in analysis.decomposition.table() {
                out.push_str(&format!("  {:<11} {:>8.3} {}\n", row.pathway, row.value, row.unit));
            }
            for pathway in &analysis.pathways {
                out.push_str(&format!(
                    "  {:<11} {:>+8.3} pp vs undeclared\n",
                    pathway.category.name(),
                    pathway.effect
                ));
            }
        }
        StageOutcome::Failed { reason } => {
            out.push_str(&format!("  mediation undefined: {}\n", reason))
        }
    }

    // Heterogeneity
    out.push_str("\n🏬 Heterogeneity:\n");
    for table in [&report.diagnostics.by_store, &report.diagnostics.by_region] {
        match table.top() {
            Some(top) => out.push_str(&format!(
                "  top {} {} ({:+.2} pp of {} groups)\n",
                table.kind.name(),
                top.group,
                top.effect.unwrap_or(0.0),
                table.records.len()
            )),
            None => out.push_str(&format!("  no {} has both periods\n", table.kind.name())),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::loader::{LoadedData, ValidationReport};
    use crate::pipeline;
    use crate::transaction::{ProductCategory, Transaction};

    fn run(transactions: Vec<Transaction>) -> AnalysisReport {
        pipeline::run(
            &LoadedData {
                transactions,
                validation: ValidationReport::default(),
            },
            &AnalysisConfig::default(),
        )
    }

    fn sales(periods: &[Period]) -> Vec<Transaction> {
        (0..260)
            .map(|i| Transaction {
                margin: 11.0 + (i % 5) as f64 + (i % 3) as f64 * 0.7,
                period: periods[i % periods.len()],
                category: ProductCategory::ALL[(i / 2) % 4],
                store: (i % 13) as u32 + 1,
                region: "North".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_summary_sections() {
        let report = run(sales(&[Period::Before, Period::After]));
        let text = to_report_string(&report);

        assert!(text.contains("✅ validation"));
        assert!(text.contains("📊 Margin by period:"));
        assert!(text.contains("M2 (controlled)"));
        assert!(text.contains("🔀 Mediation by product mix:"));
        assert!(text.contains("top store"));
        assert!(text.contains("Welch t="));
    }

    #[test]
    fn test_summary_reports_failures() {
        let report = run(sales(&[Period::After]));
        let text = to_report_string(&report);

        assert!(text.contains("❌ M1 (raw)"));
        assert!(text.contains("before  no observations"));
        assert!(text.contains("mediation undefined"));
        assert!(text.contains("no store has both periods"));
    }
}
