// Shared fixtures for the integration tests
//
// Builds a synthetic sales table with 13 stores, both periods and every
// product-type string the loader recognizes (plus the "." sentinel).

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER: &str = "margin,period,product_type,store,region";

const PRODUCTS: [&str; 4] = ["electronic device", "insurance + device", "accessory", "."];

pub fn region_of(store: u32) -> &'static str {
    match store {
        1..=5 => "North",
        6..=10 => "Central",
        _ => "South",
    }
}

/// One CSV row per sale: margin depends on product and period, with a small
/// deterministic wobble per row
pub fn sales_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let store = (i % 13) as u32 + 1;
            let period = 1 + i % 2;
            let product_index = (i / 2) % 4;
            let base = [9.0, 26.0, 18.0, 12.0][product_index];
            let lift = if period == 2 { 1.5 } else { 0.0 };
            let wobble = ((i * 37) % 10) as f64 * 0.3;
            format!(
                "{:.2},{},{},{},{}",
                base + lift + wobble + store as f64 * 0.05,
                period,
                PRODUCTS[product_index],
                store,
                region_of(store)
            )
        })
        .collect()
}

pub fn sales_csv(n: usize) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for row in sales_rows(n) {
        csv.push_str(&row);
        csv.push('\n');
    }
    csv
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("failed to write test fixture");
    path
}

/// Files every successful run with --out-dir must produce
pub const EXPORTED_FILES: [&str; 14] = [
    "transactions_normalized.csv",
    "coefficients_m1_raw.csv",
    "coefficients_m2_controlled.csv",
    "coefficients_m3_store_fe.csv",
    "model_comparison.csv",
    "mediation.csv",
    "pathways.csv",
    "descriptive_by_period.csv",
    "product_mix_by_period.csv",
    "heterogeneity_store.csv",
    "heterogeneity_region.csv",
    "diagnostics.csv",
    "report.json",
    "report.html",
];
