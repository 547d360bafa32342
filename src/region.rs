//! Region assignment
//!
//! Two mapping strategies exist for the same data: one keyed on store-id
//! ranges and one keyed on the raw region string. Neither is treated as
//! authoritative; the loader receives a single [`RegionMapper`] and the
//! resulting store counts per region are checked against the configured
//! ranges afterwards.

use crate::config::{RegionConfig, RegionDefinition, RegionStrategy};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maps a raw row to a canonical region label
pub trait RegionMapper {
    /// Canonical label for this row, or `None` if it cannot be mapped
    fn assign(&self, store: u32, raw_region: Option<&str>) -> Option<String>;

    fn name(&self) -> &'static str;
}

/// Region from the store id range
#[derive(Debug, Clone)]
pub struct StoreRangeMapper {
    regions: Vec<RegionDefinition>,
}

impl StoreRangeMapper {
    pub fn new(regions: Vec<RegionDefinition>) -> Self {
        Self { regions }
    }
}

impl RegionMapper for StoreRangeMapper {
    fn assign(&self, store: u32, _raw_region: Option<&str>) -> Option<String> {
        self.regions
            .iter()
            .find(|r| r.contains_store(store))
            .map(|r| r.label.clone())
    }

    fn name(&self) -> &'static str {
        "store-range"
    }
}

/// Region from the raw region string (case-insensitive, trimmed)
#[derive(Debug, Clone)]
pub struct RegionLabelMapper {
    /// lowercased alias → canonical label
    lookup: BTreeMap<String, String>,
}

impl RegionLabelMapper {
    pub fn new(regions: &[RegionDefinition]) -> Self {
        let mut lookup = BTreeMap::new();
        for region in regions {
            lookup.insert(region.label.to_lowercase(), region.label.clone());
            for alias in &region.aliases {
                lookup.insert(alias.trim().to_lowercase(), region.label.clone());
            }
        }
        Self { lookup }
    }
}

impl RegionMapper for RegionLabelMapper {
    fn assign(&self, _store: u32, raw_region: Option<&str>) -> Option<String> {
        let key = raw_region?.trim().to_lowercase();
        self.lookup.get(&key).cloned()
    }

    fn name(&self) -> &'static str {
        "region-label"
    }
}

/// Build the mapper selected by the configuration
pub fn mapper_for(config: &RegionConfig) -> Box<dyn RegionMapper> {
    match config.strategy {
        RegionStrategy::StoreRange => Box::new(StoreRangeMapper::new(config.region.clone())),
        RegionStrategy::RegionLabel => Box::new(RegionLabelMapper::new(&config.region)),
    }
}

/// Observed vs expected number of distinct stores in one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStoreCount {
    pub region: String,
    pub expected: usize,
    pub observed: usize,
}

/// Result of checking store counts per region (5/5/3 by default)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCheck {
    pub counts: Vec<RegionStoreCount>,
    /// Stores that appear under more than one region label
    pub split_stores: Vec<u32>,
}

impl RegionCheck {
    pub fn passed(&self) -> bool {
        self.split_stores.is_empty() && self.counts.iter().all(|c| c.expected == c.observed)
    }
}

/// Compare distinct stores per region with the configured ranges
pub fn check_store_counts(
    transactions: &[Transaction],
    regions: &[RegionDefinition],
) -> RegionCheck {
    let mut stores_by_region: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();
    let mut regions_by_store: BTreeMap<u32, BTreeSet<&str>> = BTreeMap::new();

    for t in transactions {
        stores_by_region
            .entry(t.region.as_str())
            .or_default()
            .insert(t.store);
        regions_by_store
            .entry(t.store)
            .or_default()
            .insert(t.region.as_str());
    }

    let counts = regions
        .iter()
        .map(|r| RegionStoreCount {
            region: r.label.clone(),
            expected: r.expected_store_count(),
            observed: stores_by_region
                .get(r.label.as_str())
                .map_or(0, |stores| stores.len()),
        })
        .collect();

    let split_stores = regions_by_store
        .into_iter()
        .filter(|(_, labels)| labels.len() > 1)
        .map(|(store, _)| store)
        .collect();

    RegionCheck {
        counts,
        split_stores,
    }
}
