//! HTML dashboard for an analysis report
//!
//! Static page with KPI cards, styled tables and CSS bar charts. Every number
//! comes from the [`AnalysisReport`]; nothing is recomputed here.

use crate::diagnostics::{GroupKind, HeterogeneityTable};
use crate::model::ModelKind;
use crate::pipeline::{AnalysisReport, StageOutcome};
use crate::transaction::Period;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// HTML report formatter
#[derive(Debug)]
pub struct HtmlOutput<'a> {
    report: &'a AnalysisReport,
    title: String,
}

impl<'a> HtmlOutput<'a> {
    pub fn new(report: &'a AnalysisReport) -> Self {
        Self {
            report,
            title: "Bonus Program Margin Analysis".to_string(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Escape HTML special characters to prevent XSS
    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    fn generate_styles() -> &'static str {
        r#"
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 20px;
            background-color: #f5f5f5;
        }
        h1, h2 {
            color: #333;
        }
        table {
            border-collapse: collapse;
            width: 100%;
            background-color: white;
            box-shadow: 0 1px 3px rgba(0,0,0,0.1);
            margin-bottom: 20px;
        }
        th, td {
            border: 1px solid #ddd;
            padding: 8px;
            text-align: left;
        }
        th {
            background-color: #4a90d9;
            color: white;
            font-weight: bold;
        }
        tr:nth-child(even) {
            background-color: #f9f9f9;
        }
        .cards {
            display: flex;
            gap: 16px;
            margin-bottom: 20px;
        }
        .card {
            flex: 1;
            background-color: white;
            box-shadow: 0 1px 3px rgba(0,0,0,0.1);
            padding: 16px;
        }
        .card .label {
            font-size: 0.85em;
            color: #666;
        }
        .card .value {
            font-size: 1.8em;
            font-weight: bold;
            color: #333;
        }
        .num {
            font-family: monospace;
            text-align: right;
        }
        .bar {
            display: inline-block;
            height: 12px;
            background-color: #4a90d9;
        }
        .bar-negative {
            background-color: #d9534f;
        }
        .status-pass {
            color: #3c763d;
        }
        .status-warning {
            color: #8a6d3b;
        }
        .status-fail {
            color: #cc0000;
        }
        .footer {
            margin-top: 20px;
            font-size: 0.8em;
            color: #888;
            text-align: center;
        }
        "#
    }

    fn table_header(headers: &[&str]) -> String {
        let cells: Vec<String> = headers.iter().map(|h| format!("<th>{}</th>", h)).collect();
        format!("        <tr>{}</tr>\n", cells.join(""))
    }

    fn num(value: f64, decimals: usize) -> String {
        format!(r#"<td class="num">{:.*}</td>"#, decimals, value)
    }

    fn optional_num(value: Option<f64>, decimals: usize) -> String {
        match value {
            Some(v) => Self::num(v, decimals),
            None => r#"<td class="num">n/a</td>"#.to_string(),
        }
    }

    /// Horizontal bar scaled against `max` (200px at full scale)
    fn bar(value: f64, max: f64) -> String {
        let width = if max > 0.0 {
            (value.abs() / max * 200.0).round()
        } else {
            0.0
        };
        let class = if value < 0.0 { "bar bar-negative" } else { "bar" };
        format!(
            r#"<td><span class="{}" style="width: {}px"></span></td>"#,
            class, width
        )
    }

    fn card(label: &str, value: &str) -> String {
        format!(
            "        <div class=\"card\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>\n",
            Self::escape_html(label),
            Self::escape_html(value)
        )
    }

    fn render_cards(&self) -> String {
        let report = self.report;
        let mean = |period| {
            report
                .descriptive
                .period(period)
                .map(|s| format!("{:.2}%", s.mean))
                .unwrap_or_else(|| "n/a".to_string())
        };
        let (total, mediated) = match report.mediation.completed() {
            Some(m) => (
                format!("{:+.2} pp", m.decomposition.total),
                format!("{:.1}%", m.decomposition.mediation_pct),
            ),
            None => ("n/a".to_string(), "undefined".to_string()),
        };

        let mut html = String::from("    <div class=\"cards\">\n");
        html.push_str(&Self::card("Mean margin before", &mean(Period::Before)));
        html.push_str(&Self::card("Mean margin after", &mean(Period::After)));
        html.push_str(&Self::card("Total effect", &total));
        html.push_str(&Self::card("Mediated by product mix", &mediated));
        html.push_str("    </div>\n");
        html
    }

    fn render_stages(&self) -> String {
        let mut html = String::from("    <h2>Pipeline Stages</h2>\n    <table>\n");
        html.push_str(&Self::table_header(&["Stage", "Status", "Detail"]));
        for stage in &self.report.stages {
            html.push_str(&format!(
                "        <tr><td>{}</td><td class=\"status-{}\">{} {}</td><td>{}</td></tr>\n",
                Self::escape_html(&stage.stage),
                stage.status.label(),
                stage.status.symbol(),
                stage.status.label(),
                Self::escape_html(&stage.detail)
            ));
        }
        html.push_str("    </table>\n");
        html
    }

    fn render_models(&self) -> String {
        let mut html = String::from("    <h2>Model Comparison</h2>\n    <table>\n");
        html.push_str(&Self::table_header(&[
            "Model",
            "Period coefficient",
            "Std. error",
            "p-value",
            "R²",
            "Adj. R²",
            "N",
        ]));
        for model in &self.report.models {
            match &model.outcome {
                StageOutcome::Completed(result) => {
                    let period = result.period().ok();
                    html.push_str(&format!(
                        "        <tr><td>{}</td>{}{}{}{}{}<td class=\"num\">{}</td></tr>\n",
                        Self::escape_html(model.model.label()),
                        Self::optional_num(period.map(|c| c.estimate), 3),
                        Self::optional_num(period.map(|c| c.std_error), 3),
                        Self::optional_num(period.map(|c| c.p_value), 4),
                        Self::num(result.r_squared, 4),
                        Self::num(result.adj_r_squared, 4),
                        result.n_obs
                    ));
                }
                StageOutcome::Failed { reason } => {
                    html.push_str(&format!(
                        "        <tr><td>{}</td><td class=\"status-fail\" colspan=\"6\">❌ {}</td></tr>\n",
                        Self::escape_html(model.model.label()),
                        Self::escape_html(reason)
                    ));
                }
            }
        }
        html.push_str("    </table>\n");

        if let Some(controlled) = self.report.model(ModelKind::Controlled) {
            html.push_str("    <h2>Controlled Model Coefficients</h2>\n    <table>\n");
            html.push_str(&Self::table_header(&["Term", "Estimate", "Std. error", "t", "p-value"]));
            for c in &controlled.coefficients {
                html.push_str(&format!(
                    "        <tr><td>{}</td>{}{}{}{}</tr>\n",
                    Self::escape_html(&c.term),
                    Self::num(c.estimate, 3),
                    Self::num(c.std_error, 3),
                    Self::num(c.t_stat, 2),
                    Self::num(c.p_value, 4)
                ));
            }
            html.push_str("    </table>\n");
        }
        html
    }

    fn render_mediation(&self) -> String {
        let mut html = String::from("    <h2>Mediation</h2>\n");
        match &self.report.mediation {
            StageOutcome::Completed(analysis) => {
                html.push_str("    <table>\n");
                html.push_str(&Self::table_header(&["Pathway", "Value", "Unit", "Description"]));
                for row in analysis.decomposition.table() {
                    html.push_str(&format!(
                        "        <tr><td>{}</td>{}<td>{}</td><td>{}</td></tr>\n",
                        Self::escape_html(&row.pathway),
                        Self::num(row.value, 3),
                        Self::escape_html(&row.unit),
                        Self::escape_html(&row.description)
                    ));
                }
                html.push_str("    </table>\n");

                let max = analysis
                    .pathways
                    .iter()
                    .map(|p| p.effect.abs())
                    .fold(0.0, f64::max);
                html.push_str("    <table>\n");
                html.push_str(&Self::table_header(&["Category", "Effect vs undeclared", ""]));
                for pathway in &analysis.pathways {
                    html.push_str(&format!(
                        "        <tr><td>{}</td>{}{}</tr>\n",
                        pathway.category.name(),
                        Self::num(pathway.effect, 3),
                        Self::bar(pathway.effect, max)
                    ));
                }
                html.push_str("    </table>\n");
            }
            StageOutcome::Failed { reason } => {
                html.push_str(&format!(
                    "    <p class=\"status-fail\">❌ {}</p>\n",
                    Self::escape_html(reason)
                ));
            }
        }
        html
    }

    fn render_product_mix(&self) -> String {
        let mut html = String::from("    <h2>Product Mix by Period</h2>\n    <table>\n");
        html.push_str(&Self::table_header(&["Category", "Before", "After", "Shift", ""]));
        let max = self
            .report
            .descriptive
            .product_mix
            .iter()
            .map(|r| r.shift.abs())
            .fold(0.0, f64::max);
        for row in &self.report.descriptive.product_mix {
            html.push_str(&format!(
                "        <tr><td>{}</td>{}{}{}{}</tr>\n",
                row.category.name(),
                Self::num(row.before_share * 100.0, 1),
                Self::num(row.after_share * 100.0, 1),
                Self::num(row.shift * 100.0, 1),
                Self::bar(row.shift, max)
            ));
        }
        html.push_str("    </table>\n");
        html
    }

    fn render_heterogeneity(table: &HeterogeneityTable) -> String {
        let title = match table.kind {
            GroupKind::Store => "Effect by Store",
            GroupKind::Region => "Effect by Region",
        };
        let mut html = format!("    <h2>{}</h2>\n    <table>\n", title);
        html.push_str(&Self::table_header(&[
            "Group", "Before", "After", "N before", "N after", "Effect", "",
        ]));
        let max = table
            .records
            .iter()
            .filter_map(|r| r.effect)
            .map(f64::abs)
            .fold(0.0, f64::max);
        for r in &table.records {
            html.push_str(&format!(
                "        <tr><td>{}</td>{}{}<td class=\"num\">{}</td><td class=\"num\">{}</td>{}{}</tr>\n",
                Self::escape_html(&r.group),
                Self::optional_num(r.before_mean, 2),
                Self::optional_num(r.after_mean, 2),
                r.n_before,
                r.n_after,
                Self::optional_num(r.effect, 2),
                Self::bar(r.effect.unwrap_or(0.0), max)
            ));
        }
        html.push_str("    </table>\n");
        html
    }

    fn render_diagnostics(&self) -> String {
        let diagnostics = &self.report.diagnostics;
        let mut html = String::from("    <h2>Diagnostics</h2>\n    <table>\n");
        html.push_str(&Self::table_header(&[
            "Test",
            "Statistic",
            "p-value",
            "Threshold",
            "Verdict",
        ]));

        match &diagnostics.normality {
            StageOutcome::Completed(t) => html.push_str(&format!(
                "        <tr><td>Shapiro-Wilk (normality)</td>{}{}{}<td>{}</td></tr>\n",
                Self::num(t.statistic, 4),
                Self::num(t.p_value, 4),
                Self::num(t.alpha, 2),
                t.verdict
            )),
            StageOutcome::Failed { reason } => html.push_str(&format!(
                "        <tr><td>Shapiro-Wilk (normality)</td><td class=\"status-fail\" colspan=\"4\">❌ {}</td></tr>\n",
                Self::escape_html(reason)
            )),
        }
        match &diagnostics.heteroskedasticity {
            StageOutcome::Completed(t) => html.push_str(&format!(
                "        <tr><td>n·R² (heteroskedasticity)</td>{}{}{}<td>{}</td></tr>\n",
                Self::num(t.statistic, 3),
                Self::num(t.p_value, 4),
                Self::num(t.critical_value, 3),
                t.verdict
            )),
            StageOutcome::Failed { reason } => html.push_str(&format!(
                "        <tr><td>n·R² (heteroskedasticity)</td><td class=\"status-fail\" colspan=\"4\">❌ {}</td></tr>\n",
                Self::escape_html(reason)
            )),
        }

        html.push_str("    </table>\n");
        html
    }

    /// Generate complete HTML document
    pub fn to_html(&self) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n");
        html.push_str("<html lang=\"en\">\n");

        html.push_str("<head>\n");
        html.push_str("    <meta charset=\"UTF-8\">\n");
        html.push_str(
            "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str(&format!("    <title>{}</title>\n", Self::escape_html(&self.title)));
        html.push_str("    <style>");
        html.push_str(Self::generate_styles());
        html.push_str("</style>\n");
        html.push_str("</head>\n");

        html.push_str("<body>\n");
        html.push_str(&format!("    <h1>{}</h1>\n", Self::escape_html(&self.title)));
        html.push_str(&self.render_cards());
        html.push_str(&self.render_stages());
        html.push_str(&self.render_models());
        html.push_str(&self.render_mediation());
        html.push_str(&self.render_product_mix());
        html.push_str(&Self::render_heterogeneity(&self.report.diagnostics.by_store));
        html.push_str(&Self::render_heterogeneity(&self.report.diagnostics.by_region));
        html.push_str(&self.render_diagnostics());

        html.push_str("    <div class=\"footer\">\n");
        html.push_str(&format!(
            "        Generated by marginfx {}\n",
            env!("CARGO_PKG_VERSION")
        ));
        html.push_str("    </div>\n");

        html.push_str("</body>\n");
        html.push_str("</html>\n");

        html
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_html())
            .with_context(|| format!("Failed to write HTML report: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::loader::{LoadedData, ValidationReport};
    use crate::pipeline;
    use crate::transaction::{ProductCategory, Transaction};

    fn report(stores: u32) -> AnalysisReport {
        let transactions = (0..130)
            .map(|i| Transaction {
                margin: 10.0 + (i % 7) as f64 + if i % 2 == 0 { 0.0 } else { 2.5 },
                period: if i % 2 == 0 { Period::Before } else { Period::After },
                category: ProductCategory::ALL[(i / 2) % 4],
                store: (i as u32 % stores) + 1,
                region: "<North>".to_string(),
            })
            .collect();
        pipeline::run(
            &LoadedData {
                transactions,
                validation: ValidationReport::default(),
            },
            &AnalysisConfig::default(),
        )
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(HtmlOutput::escape_html("<script>"), "&lt;script&gt;");
        assert_eq!(HtmlOutput::escape_html("a&b"), "a&amp;b");
        assert_eq!(HtmlOutput::escape_html("\"test\""), "&quot;test&quot;");
        assert_eq!(HtmlOutput::escape_html("'test'"), "&#39;test&#39;");
    }

    #[test]
    fn test_html_document_sections() {
        let report = report(13);
        let html = HtmlOutput::new(&report).to_html();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Bonus Program Margin Analysis</title>"));
        assert!(html.contains("Model Comparison"));
        assert!(html.contains("M3 (store fixed effects)"));
        assert!(html.contains("Mediated by product mix"));
        assert!(html.contains("Effect by Store"));
        assert!(html.contains("Effect by Region"));
        assert!(html.contains("Shapiro-Wilk"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_region_labels_escaped() {
        let report = report(13);
        let html = HtmlOutput::new(&report).to_html();
        assert!(html.contains("&lt;North&gt;"));
        assert!(!html.contains("<North>"));
    }

    #[test]
    fn test_failed_model_rendered() {
        // A single store leaves every fixed-effect dummy constant
        let report = report(1);
        let html = HtmlOutput::new(&report).with_title("Test").to_html();
        assert!(html.contains("<h1>Test</h1>"));
        assert!(html.contains("❌ Zero-variance predictor"));
    }

    #[test]
    fn test_bar_width() {
        assert_eq!(
            HtmlOutput::bar(-2.0, 4.0),
            r#"<td><span class="bar bar-negative" style="width: 100px"></span></td>"#
        );
        assert!(HtmlOutput::bar(1.0, 0.0).contains("width: 0px"));
    }
}
