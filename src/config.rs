//! Analysis configuration
//!
//! Loaded from an optional TOML file. Every field has a default, so an empty
//! file (or no file at all) reproduces the standard 13-store, three-region
//! analysis at the 5% significance level.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Configuration for one analysis run
///
/// # Example
/// ```
/// use marginfx::config::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.significance_level, 0.05);
/// assert_eq!(config.store_count, 13);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Significance level (alpha) for the diagnostic tests
    ///
    /// Normality passes when p > alpha; the heteroskedasticity test compares
    /// its statistic against the chi-squared(1) quantile at 1 - alpha.
    pub significance_level: f64,

    /// Stores are numbered 1..=store_count
    ///
    /// The fixed-effects model adds one dummy per store in this universe, so a
    /// store with no observations makes that model rank-deficient.
    pub store_count: u32,

    /// Store left out of the fixed-effects dummies (default: store 1)
    pub reference_store: Option<u32>,

    /// Input column names
    pub columns: ColumnNames,

    /// Region mapping
    pub regions: RegionConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            store_count: 13,
            reference_store: None,
            columns: ColumnNames::default(),
            regions: RegionConfig::default(),
        }
    }
}

/// Names of the required input columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub margin: String,
    pub period: String,
    pub product_type: String,
    pub store: String,
    pub region: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            margin: "margin".to_string(),
            period: "period".to_string(),
            product_type: "product_type".to_string(),
            store: "store".to_string(),
            region: "region".to_string(),
        }
    }
}

impl ColumnNames {
    /// All required columns in load order
    pub fn required(&self) -> [&str; 5] {
        [
            self.margin.as_str(),
            self.period.as_str(),
            self.product_type.as_str(),
            self.store.as_str(),
            self.region.as_str(),
        ]
    }
}

/// How a transaction's region label is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RegionStrategy {
    /// Region from the store id falling inside a configured store range
    StoreRange,
    /// Region from the raw region string matched against configured aliases
    RegionLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub strategy: RegionStrategy,
    pub region: Vec<RegionDefinition>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            strategy: RegionStrategy::StoreRange,
            region: vec![
                RegionDefinition::new("North", 1, 5, &["north", "n"]),
                RegionDefinition::new("Central", 6, 10, &["central", "center", "c"]),
                RegionDefinition::new("South", 11, 13, &["south", "s"]),
            ],
        }
    }
}

/// One canonical region
///
/// # Example TOML
/// ```toml
/// [[regions.region]]
/// label = "North"
/// first_store = 1
/// last_store = 5
/// aliases = ["north", "n"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDefinition {
    pub label: String,
    pub first_store: u32,
    pub last_store: u32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl RegionDefinition {
    pub fn new(label: &str, first_store: u32, last_store: u32, aliases: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            first_store,
            last_store,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn contains_store(&self, store: u32) -> bool {
        (self.first_store..=self.last_store).contains(&store)
    }

    /// Number of stores this region is expected to cover
    pub fn expected_store_count(&self) -> usize {
        (self.last_store - self.first_store + 1) as usize
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing keys take their default values. The loaded configuration is
    /// validated before it is returned.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig =
            toml::from_str(content).context("Failed to parse TOML analysis config")?;
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// The fixed-effects reference store
    pub fn reference_store(&self) -> u32 {
        self.reference_store.unwrap_or(1)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            ));
        }

        if self.store_count < 2 {
            return Err(format!(
                "store_count must be >= 2 for store fixed effects, got {}",
                self.store_count
            ));
        }

        let reference = self.reference_store();
        if reference == 0 || reference > self.store_count {
            return Err(format!(
                "reference_store must be in 1..={}, got {}",
                self.store_count, reference
            ));
        }

        for name in self.columns.required() {
            if name.trim().is_empty() {
                return Err("column names must not be empty".to_string());
            }
        }

        if self.regions.region.is_empty() {
            return Err("at least one region must be defined".to_string());
        }

        let mut labels = HashSet::new();
        let mut claimed: Vec<(u32, &str)> = Vec::new();
        for region in &self.regions.region {
            if !labels.insert(region.label.as_str()) {
                return Err(format!("duplicate region label '{}'", region.label));
            }
            if region.first_store == 0 || region.first_store > region.last_store {
                return Err(format!(
                    "region '{}' has invalid store range {}..={}",
                    region.label, region.first_store, region.last_store
                ));
            }
            for store in region.first_store..=region.last_store {
                if let Some((_, other)) = claimed.iter().find(|(s, _)| *s == store) {
                    return Err(format!(
                        "store {} is in both region '{}' and region '{}'",
                        store, other, region.label
                    ));
                }
                claimed.push((store, region.label.as_str()));
            }
        }

        Ok(())
    }
}
