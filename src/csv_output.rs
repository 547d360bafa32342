//! CSV export of the analysis tables
//!
//! Every exported table is a [`CsvTable`]: a file name, a header and string
//! rows. Quoting is left to the `csv` writer.

use crate::diagnostics::HeterogeneityTable;
use crate::model::{ModelKind, ModelResult};
use crate::pipeline::{AnalysisReport, StageOutcome};
use crate::transaction::Transaction;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One exported table
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub file_name: String,
    header: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(file_name: impl Into<String>, header: Vec<&'static str>) -> Self {
        Self {
            file_name: file_name.into(),
            header,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render with a header row
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV buffer: {}", e.error()))?;
        String::from_utf8(bytes).context("CSV output is not valid UTF-8")
    }
}

fn number(value: f64) -> String {
    value.to_string()
}

fn optional(value: Option<f64>) -> String {
    value.map(number).unwrap_or_default()
}

/// Normalized transactions with the four indicators spelled out
pub fn transactions_table(transactions: &[Transaction]) -> CsvTable {
    let mut table = CsvTable::new(
        "transactions_normalized.csv",
        vec![
            "margin",
            "period",
            "device",
            "insurance",
            "accessory",
            "undeclared",
            "store",
            "region",
        ],
    );
    for t in transactions {
        table.add_row(vec![
            number(t.margin),
            number(t.period.indicator()),
            number(t.device()),
            number(t.insurance()),
            number(t.accessory()),
            number(t.undeclared()),
            t.store.to_string(),
            t.region.clone(),
        ]);
    }
    table
}

pub fn coefficients_table(kind: ModelKind, result: &ModelResult) -> CsvTable {
    let mut table = CsvTable::new(
        format!("coefficients_{}.csv", kind.slug()),
        vec!["term", "estimate", "std_error", "t_stat", "p_value"],
    );
    for c in &result.coefficients {
        table.add_row(vec![
            c.term.clone(),
            number(c.estimate),
            number(c.std_error),
            number(c.t_stat),
            number(c.p_value),
        ]);
    }
    table
}

pub fn comparison_table(report: &AnalysisReport) -> CsvTable {
    let mut table = CsvTable::new(
        "model_comparison.csv",
        vec!["model", "period_coef", "r_squared", "adj_r_squared", "p_value", "n_obs"],
    );
    for row in report.comparison() {
        table.add_row(vec![
            row.model.label().to_string(),
            number(row.period_coef),
            number(row.r_squared),
            number(row.adj_r_squared),
            number(row.p_value),
            row.n_obs.to_string(),
        ]);
    }
    table
}

pub fn mediation_table(report: &AnalysisReport) -> CsvTable {
    let mut table = CsvTable::new("mediation.csv", vec!["pathway", "value", "unit", "description"]);
    if let Some(analysis) = report.mediation.completed() {
        for row in analysis.decomposition.table() {
            table.add_row(vec![row.pathway, number(row.value), row.unit, row.description]);
        }
    }
    table
}

pub fn pathways_table(report: &AnalysisReport) -> CsvTable {
    let mut table = CsvTable::new("pathways.csv", vec!["category", "effect", "p_value"]);
    if let Some(analysis) = report.mediation.completed() {
        for pathway in &analysis.pathways {
            table.add_row(vec![
                pathway.category.name().to_string(),
                number(pathway.effect),
                optional(pathway.p_value),
            ]);
        }
    }
    table
}

pub fn descriptive_table(report: &AnalysisReport) -> CsvTable {
    let mut table = CsvTable::new(
        "descriptive_by_period.csv",
        vec!["period", "count", "mean", "median", "std_dev", "min", "q1", "q3", "max"],
    );
    for p in &report.descriptive.by_period {
        let s = &p.summary;
        table.add_row(vec![
            p.period.name().to_string(),
            s.count.to_string(),
            number(s.mean),
            number(s.median),
            number(s.std_dev),
            number(s.min),
            number(s.q1),
            number(s.q3),
            number(s.max),
        ]);
    }
    table
}

pub fn product_mix_table(report: &AnalysisReport) -> CsvTable {
    let mut table = CsvTable::new(
        "product_mix_by_period.csv",
        vec!["category", "before_share", "after_share", "shift"],
    );
    for row in &report.descriptive.product_mix {
        table.add_row(vec![
            row.category.name().to_string(),
            number(row.before_share),
            number(row.after_share),
            number(row.shift),
        ]);
    }
    table
}

pub fn heterogeneity_table(heterogeneity: &HeterogeneityTable) -> CsvTable {
    let mut table = CsvTable::new(
        format!("heterogeneity_{}.csv", heterogeneity.kind.name()),
        vec!["group", "before_mean", "after_mean", "n_before", "n_after", "effect"],
    );
    for r in &heterogeneity.records {
        table.add_row(vec![
            r.group.clone(),
            optional(r.before_mean),
            optional(r.after_mean),
            r.n_before.to_string(),
            r.n_after.to_string(),
            optional(r.effect),
        ]);
    }
    table
}

/// Advisory tests; a failed test is listed with its reason as the verdict
pub fn diagnostics_table(report: &AnalysisReport) -> CsvTable {
    let mut table = CsvTable::new(
        "diagnostics.csv",
        vec!["test", "statistic", "p_value", "threshold", "verdict"],
    );
    let diagnostics = &report.diagnostics;

    match &diagnostics.normality {
        StageOutcome::Completed(t) => table.add_row(vec![
            "shapiro_wilk".to_string(),
            number(t.statistic),
            number(t.p_value),
            number(t.alpha),
            t.verdict.to_string(),
        ]),
        StageOutcome::Failed { reason } => table.add_row(vec![
            "shapiro_wilk".to_string(),
            String::new(),
            String::new(),
            number(report.significance_level),
            format!("error: {}", reason),
        ]),
    }

    match &diagnostics.heteroskedasticity {
        StageOutcome::Completed(t) => table.add_row(vec![
            "breusch_pagan".to_string(),
            number(t.statistic),
            number(t.p_value),
            number(t.critical_value),
            t.verdict.to_string(),
        ]),
        StageOutcome::Failed { reason } => table.add_row(vec![
            "breusch_pagan".to_string(),
            String::new(),
            String::new(),
            String::new(),
            format!("error: {}", reason),
        ]),
    }

    table
}

/// Every exported table, in write order
pub fn tables(report: &AnalysisReport, transactions: &[Transaction]) -> Vec<CsvTable> {
    let mut tables = vec![transactions_table(transactions)];
    for outcome in &report.models {
        if let Some(result) = outcome.outcome.completed() {
            tables.push(coefficients_table(outcome.model, result));
        }
    }
    tables.extend([
        comparison_table(report),
        mediation_table(report),
        pathways_table(report),
        descriptive_table(report),
        product_mix_table(report),
        heterogeneity_table(&report.diagnostics.by_store),
        heterogeneity_table(&report.diagnostics.by_region),
        diagnostics_table(report),
    ]);
    tables
}

/// Write every table into `out_dir`, creating it if needed
pub fn write_all(
    report: &AnalysisReport,
    transactions: &[Transaction],
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let mut written = Vec::new();
    for table in tables(report, transactions) {
        let path = out_dir.join(&table.file_name);
        fs::write(&path, table.to_csv()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), rows = table.len(), "wrote table");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{GroupKind, HeterogeneityRecord};
    use crate::model::Coefficient;
    use crate::transaction::{Period, ProductCategory};

    #[test]
    fn test_table_header_and_rows() {
        let mut table = CsvTable::new("t.csv", vec!["a", "b"]);
        table.add_row(vec!["1".to_string(), "x".to_string()]);
        assert_eq!(table.to_csv().unwrap(), "a,b\n1,x\n");
    }

    #[test]
    fn test_fields_are_quoted() {
        let mut table = CsvTable::new("t.csv", vec!["pathway", "description"]);
        table.add_row(vec![
            "total".to_string(),
            "before, after and \"mix\"".to_string(),
        ]);
        let csv = table.to_csv().unwrap();
        assert!(csv.contains("total,\"before, after and \"\"mix\"\"\""));
    }

    #[test]
    fn test_transactions_table_indicators() {
        let data = vec![Transaction {
            margin: 12.5,
            period: Period::After,
            category: ProductCategory::Insurance,
            store: 7,
            region: "Central".to_string(),
        }];
        let csv = transactions_table(&data).to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("margin,period,device,insurance,accessory,undeclared,store,region")
        );
        assert_eq!(lines.next(), Some("12.5,1,0,1,0,0,7,Central"));
    }

    #[test]
    fn test_coefficients_file_name() {
        let result = ModelResult {
            model: ModelKind::StoreFixedEffects,
            coefficients: vec![Coefficient {
                term: "store[T.2]".to_string(),
                estimate: -0.5,
                std_error: 0.25,
                t_stat: -2.0,
                p_value: 0.046,
            }],
            r_squared: 0.3,
            adj_r_squared: 0.29,
            n_obs: 100,
            df_resid: 83,
        };
        let table = coefficients_table(ModelKind::StoreFixedEffects, &result);
        assert_eq!(table.file_name, "coefficients_m3_store_fe.csv");
        assert!(table.to_csv().unwrap().contains("store[T.2],-0.5,0.25,-2,0.046"));
    }

    #[test]
    fn test_heterogeneity_missing_effect_is_blank() {
        let table = heterogeneity_table(&HeterogeneityTable {
            kind: GroupKind::Store,
            records: vec![HeterogeneityRecord {
                group: "12".to_string(),
                before_mean: Some(9.0),
                after_mean: None,
                n_before: 1,
                n_after: 0,
                effect: None,
            }],
        });
        assert_eq!(table.file_name, "heterogeneity_store.csv");
        assert!(table.to_csv().unwrap().contains("12,9,,1,0,\n"));
    }
}
