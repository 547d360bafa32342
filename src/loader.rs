//! Raw transaction loading and normalization
//!
//! Reads a delimited table, recenters the period code, derives product
//! indicators and region labels, and records every validation problem in a
//! [`ValidationReport`]. Only input-shape problems (missing columns, no data)
//! are fatal; everything else is reported and the pipeline continues.

use crate::config::AnalysisConfig;
use crate::region::{check_store_counts, RegionCheck, RegionMapper};
use crate::transaction::{Period, ProductCategory, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Label given to rows the region mapper cannot place
pub const UNASSIGNED_REGION: &str = "unassigned";

/// Fatal input-shape errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Dataset is empty: no data rows found")]
    EmptyDataset,

    #[error("No usable rows: all {rows_read} rows lack margin, period or store")]
    NoUsableRows { rows_read: usize },

    #[error("Failed to parse delimited input: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Non-fatal problems found while normalizing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Column name → number of empty cells
    pub missing_values: BTreeMap<String, usize>,
    /// Column name → number of cells that failed to parse
    pub invalid_values: BTreeMap<String, usize>,
    /// Rows whose four indicators do not sum to exactly 1
    pub indicator_violations: usize,
    /// Rows with a margin outside 0-100
    pub margin_out_of_range: usize,
    pub unassigned_region: usize,
    /// Store ids outside 1..=store_universe; their rows are excluded
    pub stores_outside_universe: BTreeSet<u32>,
    pub store_universe: u32,
    /// Rows per product category, including undeclared
    pub category_counts: BTreeMap<String, usize>,
    pub region_mapper: String,
    pub region_check: Option<RegionCheck>,
}

impl ValidationReport {
    /// True when no warning was raised
    pub fn passed(&self) -> bool {
        self.warnings().is_empty()
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_read - self.rows_kept
    }

    /// Human-readable warnings, one per problem
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (column, count) in &self.missing_values {
            warnings.push(format!("column '{}' has {} missing value(s)", column, count));
        }
        for (column, count) in &self.invalid_values {
            warnings.push(format!("column '{}' has {} invalid value(s)", column, count));
        }
        if !self.stores_outside_universe.is_empty() {
            let stores: Vec<String> = self
                .stores_outside_universe
                .iter()
                .map(|s| s.to_string())
                .collect();
            warnings.push(format!(
                "store id(s) {} outside 1..={}",
                stores.join(", "),
                self.store_universe
            ));
        }
        if self.rows_dropped() > 0 {
            warnings.push(format!(
                "{} row(s) excluded (no usable margin, period or store)",
                self.rows_dropped()
            ));
        }
        if self.indicator_violations > 0 {
            warnings.push(format!(
                "{} row(s) have product indicators not summing to 1",
                self.indicator_violations
            ));
        }
        if self.margin_out_of_range > 0 {
            warnings.push(format!(
                "{} row(s) have a margin outside 0-100",
                self.margin_out_of_range
            ));
        }
        if self.unassigned_region > 0 {
            warnings.push(format!(
                "{} row(s) could not be mapped to a region ({})",
                self.unassigned_region, self.region_mapper
            ));
        }
        if let Some(check) = &self.region_check {
            for count in check.counts.iter().filter(|c| c.expected != c.observed) {
                warnings.push(format!(
                    "region '{}' has {} store(s), expected {}",
                    count.region, count.observed, count.expected
                ));
            }
            if !check.split_stores.is_empty() {
                let stores: Vec<String> =
                    check.split_stores.iter().map(|s| s.to_string()).collect();
                warnings.push(format!(
                    "store(s) {} appear under more than one region",
                    stores.join(", ")
                ));
            }
        }

        warnings
    }
}

/// Normalized transactions plus the validation report
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub transactions: Vec<Transaction>,
    pub validation: ValidationReport,
}

/// Load and normalize a delimited file
pub fn load_path<P: AsRef<Path>>(
    path: P,
    config: &AnalysisConfig,
    mapper: &dyn RegionMapper,
    delimiter: u8,
) -> Result<LoadedData> {
    let file = File::open(path.as_ref())?;
    load_reader(file, config, mapper, delimiter)
}

/// Column positions resolved from the header row
struct ColumnIndex {
    margin: usize,
    period: usize,
    product_type: usize,
    store: usize,
    region: usize,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, config: &AnalysisConfig) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = config
            .columns
            .required()
            .into_iter()
            .filter(|name| position(*name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns(missing));
        }

        let columns = &config.columns;
        let find = |name: &str| {
            position(name)
                .ok_or_else(|| LoadError::MissingColumns(vec![name.to_string()]))
        };
        Ok(Self {
            margin: find(columns.margin.as_str())?,
            period: find(columns.period.as_str())?,
            product_type: find(columns.product_type.as_str())?,
            store: find(columns.store.as_str())?,
            region: find(columns.region.as_str())?,
        })
    }
}

/// Outcome of reading one numeric cell
enum Cell<T> {
    Value(T),
    Missing,
    Invalid,
}

/// Decode a raw field; undecodable bytes are invalid, blanks are missing
fn parse_text(raw: Option<&[u8]>) -> Cell<&str> {
    match raw.map(std::str::from_utf8) {
        None => Cell::Missing,
        Some(Ok(text)) if text.trim().is_empty() => Cell::Missing,
        Some(Ok(text)) => Cell::Value(text),
        Some(Err(_)) => Cell::Invalid,
    }
}

fn parse_number(raw: Option<&[u8]>) -> Cell<f64> {
    match parse_text(raw) {
        Cell::Value(text) => match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Value(v),
            _ => Cell::Invalid,
        },
        Cell::Missing => Cell::Missing,
        Cell::Invalid => Cell::Invalid,
    }
}

/// Integer codes may be written as "2" or "2.0"
fn parse_code(raw: Option<&[u8]>) -> Cell<i64> {
    match parse_number(raw) {
        Cell::Value(v) if v.fract() == 0.0 => Cell::Value(v as i64),
        Cell::Value(_) | Cell::Invalid => Cell::Invalid,
        Cell::Missing => Cell::Missing,
    }
}

/// Load and normalize delimited text from any reader
pub fn load_reader<R: Read>(
    reader: R,
    config: &AnalysisConfig,
    mapper: &dyn RegionMapper,
    delimiter: u8,
) -> Result<LoadedData> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let index = ColumnIndex::resolve(&headers, config)?;
    let columns = &config.columns;

    let mut validation = ValidationReport {
        region_mapper: mapper.name().to_string(),
        store_universe: config.store_count,
        ..ValidationReport::default()
    };
    let mut transactions = Vec::new();

    for record in csv_reader.byte_records() {
        let record = record?;
        validation.rows_read += 1;

        let mut note = |column: &str, missing: bool| {
            let map = if missing {
                &mut validation.missing_values
            } else {
                &mut validation.invalid_values
            };
            *map.entry(column.to_string()).or_insert(0) += 1;
        };

        let margin = match parse_number(record.get(index.margin)) {
            Cell::Value(v) => Some(v),
            Cell::Missing => {
                note(&columns.margin, true);
                None
            }
            Cell::Invalid => {
                note(&columns.margin, false);
                None
            }
        };

        let period = match parse_code(record.get(index.period)) {
            Cell::Value(code) => {
                let period = Period::from_code(code);
                if period.is_none() {
                    note(&columns.period, false);
                }
                period
            }
            Cell::Missing => {
                note(&columns.period, true);
                None
            }
            Cell::Invalid => {
                note(&columns.period, false);
                None
            }
        };

        let store = match parse_code(record.get(index.store)) {
            Cell::Value(id) => match u32::try_from(id) {
                Ok(store) if (1..=config.store_count).contains(&store) => Some(store),
                Ok(store) if store > config.store_count => {
                    validation.stores_outside_universe.insert(store);
                    None
                }
                _ => {
                    note(&columns.store, false);
                    None
                }
            },
            Cell::Invalid => {
                note(&columns.store, false);
                None
            }
            Cell::Missing => {
                note(&columns.store, true);
                None
            }
        };

        let category = match parse_text(record.get(index.product_type)) {
            Cell::Value(raw) => ProductCategory::from_raw(raw),
            Cell::Missing => {
                note(&columns.product_type, true);
                ProductCategory::Undeclared
            }
            Cell::Invalid => {
                note(&columns.product_type, false);
                ProductCategory::Undeclared
            }
        };

        let raw_region = match parse_text(record.get(index.region)) {
            Cell::Value(raw) => Some(raw),
            Cell::Missing => {
                note(&columns.region, true);
                None
            }
            Cell::Invalid => {
                note(&columns.region, false);
                None
            }
        };

        let (Some(margin), Some(period), Some(store)) = (margin, period, store) else {
            tracing::debug!(
                row = validation.rows_read,
                "excluding row without margin, period or store"
            );
            continue;
        };

        let region = match mapper.assign(store, raw_region) {
            Some(label) => label,
            None => {
                validation.unassigned_region += 1;
                UNASSIGNED_REGION.to_string()
            }
        };

        let transaction = Transaction {
            margin,
            period,
            category,
            store,
            region,
        };

        if transaction.indicator_sum() != 1.0 {
            validation.indicator_violations += 1;
        }
        if !(0.0..=100.0).contains(&margin) {
            validation.margin_out_of_range += 1;
        }
        *validation
            .category_counts
            .entry(category.name().to_string())
            .or_insert(0) += 1;

        transactions.push(transaction);
    }

    if validation.rows_read == 0 {
        return Err(LoadError::EmptyDataset);
    }
    if transactions.is_empty() {
        return Err(LoadError::NoUsableRows {
            rows_read: validation.rows_read,
        });
    }

    validation.rows_kept = transactions.len();
    validation.region_check = Some(check_store_counts(&transactions, &config.regions.region));

    tracing::info!(
        rows_read = validation.rows_read,
        rows_kept = validation.rows_kept,
        warnings = validation.warnings().len(),
        "loaded transactions"
    );

    Ok(LoadedData {
        transactions,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{RegionLabelMapper, StoreRangeMapper};

    fn load(csv: &str) -> Result<LoadedData> {
        let config = AnalysisConfig::default();
        let mapper = StoreRangeMapper::new(config.regions.region.clone());
        load_reader(csv.as_bytes(), &config, &mapper, b',')
    }

    #[test]
    fn test_load_basic_rows() {
        let data = load(
            "margin,period,product_type,store,region\n\
             12.5,1,electronic device,1,north\n\
             18.0,2,insurance + device,7,central\n\
             9.0,2,accessory,12,south\n",
        )
        .unwrap();

        assert_eq!(data.transactions.len(), 3);
        let first = &data.transactions[0];
        assert_eq!(first.period, Period::Before);
        assert_eq!(first.category, ProductCategory::Device);
        assert_eq!(first.region, "North");
        assert_eq!(data.transactions[1].period, Period::After);
        assert_eq!(data.transactions[1].region, "Central");
        assert_eq!(data.transactions[2].region, "South");
        assert_eq!(data.validation.indicator_violations, 0);
    }

    #[test]
    fn test_unknown_product_kept_as_undeclared() {
        let data = load(
            "margin,period,product_type,store,region\n\
             10.0,1,.,1,north\n\
             11.0,1,gift card,2,north\n",
        )
        .unwrap();

        assert_eq!(data.transactions.len(), 2);
        assert!(data
            .transactions
            .iter()
            .all(|t| t.category == ProductCategory::Undeclared && t.indicator_sum() == 1.0));
        assert_eq!(data.validation.category_counts["undeclared"], 2);
    }

    #[test]
    fn test_missing_columns_is_fatal() {
        let err = load("margin,period,store\n10,1,1\n").unwrap_err();
        match err {
            LoadError::MissingColumns(cols) => {
                assert_eq!(cols, vec!["product_type".to_string(), "region".to_string()]);
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_dataset_is_fatal() {
        let err = load("margin,period,product_type,store,region\n").unwrap_err();
        assert!(matches!(err, LoadError::EmptyDataset));
    }

    #[test]
    fn test_no_usable_rows_is_fatal() {
        let err =
            load("margin,period,product_type,store,region\n,1,accessory,1,north\n").unwrap_err();
        assert!(matches!(err, LoadError::NoUsableRows { rows_read: 1 }));
    }

    #[test]
    fn test_missing_values_reported_not_fatal() {
        let data = load(
            "margin,period,product_type,store,region\n\
             10.0,1,accessory,1,north\n\
             ,2,accessory,2,north\n\
             12.0,2,,3,\n\
             13.0,3,accessory,4,north\n",
        )
        .unwrap();

        assert_eq!(data.validation.rows_read, 4);
        assert_eq!(data.validation.rows_kept, 2);
        assert_eq!(data.validation.missing_values["margin"], 1);
        assert_eq!(data.validation.missing_values["product_type"], 1);
        assert_eq!(data.validation.missing_values["region"], 1);
        assert_eq!(data.validation.invalid_values["period"], 1);
        assert!(!data.validation.passed());
        assert!(data
            .validation
            .warnings()
            .iter()
            .any(|w| w.contains("'margin' has 1 missing")));
    }

    #[test]
    fn test_codes_written_as_floats() {
        let data =
            load("margin,period,product_type,store,region\n10,2.0,accessory,3.0,north\n").unwrap();
        assert_eq!(data.transactions[0].period, Period::After);
        assert_eq!(data.transactions[0].store, 3);
    }

    #[test]
    fn test_custom_delimiter_and_column_names() {
        let mut config = AnalysisConfig::default();
        config.columns.margin = "gross_margin".to_string();
        let mapper = RegionLabelMapper::new(&config.regions.region);
        let csv = "gross_margin;period;product_type;store;region\n14.0;1;accessory;2;South\n";

        let data = load_reader(csv.as_bytes(), &config, &mapper, b';').unwrap();
        assert_eq!(data.transactions[0].margin, 14.0);
        assert_eq!(data.transactions[0].region, "South");
        assert_eq!(data.validation.region_mapper, "region-label");
    }

    #[test]
    fn test_oversized_store_id_is_invalid() {
        let data = load(
            "margin,period,product_type,store,region\n\
             10.0,1,accessory,4294967297,north\n\
             11.0,2,accessory,1,north\n",
        )
        .unwrap();

        assert_eq!(data.transactions.len(), 1);
        assert_eq!(data.transactions[0].margin, 11.0);
        assert_eq!(data.validation.invalid_values["store"], 1);
        assert!(data.validation.stores_outside_universe.is_empty());
    }

    #[test]
    fn test_store_outside_universe_is_excluded() {
        let config = AnalysisConfig::default();
        let mapper = RegionLabelMapper::new(&config.regions.region);
        let csv = "margin,period,product_type,store,region\n\
                   10.0,1,accessory,13,south\n\
                   11.0,2,accessory,14,south\n\
                   12.0,1,accessory,0,south\n";

        let data = load_reader(csv.as_bytes(), &config, &mapper, b',').unwrap();
        assert_eq!(data.transactions.len(), 1);
        assert_eq!(data.transactions[0].store, 13);
        assert_eq!(
            data.validation
                .stores_outside_universe
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            vec![14]
        );
        assert_eq!(data.validation.invalid_values["store"], 1);
        assert!(data
            .validation
            .warnings()
            .iter()
            .any(|w| w == "store id(s) 14 outside 1..=13"));
    }

    #[test]
    fn test_non_utf8_fields_are_invalid_not_fatal() {
        let config = AnalysisConfig::default();
        let mapper = StoreRangeMapper::new(config.regions.region.clone());
        let mut csv = b"margin,period,product_type,store,region\n\
                        10.0,1,accessory,1,north\n"
            .to_vec();
        csv.extend_from_slice(b"11.0,2,accessoire \xE9,2,north\n");
        csv.extend_from_slice(b"1\xFF.0,2,accessory,3,north\n");
        csv.extend_from_slice(b"12.0,2,accessory,4,r\xE9gion\n");

        let data = load_reader(csv.as_slice(), &config, &mapper, b',').unwrap();
        assert_eq!(data.validation.rows_read, 4);
        assert_eq!(data.transactions.len(), 3);
        assert_eq!(data.transactions[1].category, ProductCategory::Undeclared);
        assert_eq!(data.transactions[2].region, "North");
        assert_eq!(data.validation.invalid_values["product_type"], 1);
        assert_eq!(data.validation.invalid_values["margin"], 1);
        assert_eq!(data.validation.invalid_values["region"], 1);
    }

    #[test]
    fn test_unmapped_region_is_warning() {
        let config = AnalysisConfig::default();
        let mapper = RegionLabelMapper::new(&config.regions.region);
        let csv = "margin,period,product_type,store,region\n14.0,1,accessory,2,west\n";

        let data = load_reader(csv.as_bytes(), &config, &mapper, b',').unwrap();
        assert_eq!(data.transactions[0].region, UNASSIGNED_REGION);
        assert_eq!(data.validation.unassigned_region, 1);
        assert!(!data.validation.passed());
    }
}
