// Before/after effect per store and per region
//
// Groups are recomputed from the transactions for each grouping key. A group
// with no rows in one period has no effect and is listed after every group
// that has one.

use crate::transaction::{Period, Transaction};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Store,
    Region,
}

impl GroupKind {
    pub fn name(&self) -> &'static str {
        match self {
            GroupKind::Store => "store",
            GroupKind::Region => "region",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeterogeneityRecord {
    pub group: String,
    pub before_mean: Option<f64>,
    pub after_mean: Option<f64>,
    pub n_before: usize,
    pub n_after: usize,
    /// after_mean - before_mean, when both periods have rows
    pub effect: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeterogeneityTable {
    pub kind: GroupKind,
    /// Sorted by effect, largest first
    pub records: Vec<HeterogeneityRecord>,
}

impl HeterogeneityTable {
    /// Group with the largest effect
    pub fn top(&self) -> Option<&HeterogeneityRecord> {
        self.records.first().filter(|r| r.effect.is_some())
    }
}

#[derive(Default)]
struct Accumulator {
    before_sum: f64,
    n_before: usize,
    after_sum: f64,
    n_after: usize,
}

impl Accumulator {
    fn add(&mut self, transaction: &Transaction) {
        match transaction.period {
            Period::Before => {
                self.before_sum += transaction.margin;
                self.n_before += 1;
            }
            Period::After => {
                self.after_sum += transaction.margin;
                self.n_after += 1;
            }
        }
    }

    fn into_record(self, group: String) -> HeterogeneityRecord {
        let mean = |sum: f64, n: usize| (n > 0).then(|| sum / n as f64);
        let before_mean = mean(self.before_sum, self.n_before);
        let after_mean = mean(self.after_sum, self.n_after);
        HeterogeneityRecord {
            group,
            before_mean,
            after_mean,
            n_before: self.n_before,
            n_after: self.n_after,
            effect: before_mean.zip(after_mean).map(|(b, a)| a - b),
        }
    }
}

fn compare_effects(a: &HeterogeneityRecord, b: &HeterogeneityRecord) -> Ordering {
    match (a.effect, b.effect) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn build<K: Ord>(
    kind: GroupKind,
    transactions: &[Transaction],
    key: impl Fn(&Transaction) -> K,
    label: impl Fn(&K) -> String,
) -> HeterogeneityTable {
    let mut groups: BTreeMap<K, Accumulator> = BTreeMap::new();
    for transaction in transactions {
        groups.entry(key(transaction)).or_default().add(transaction);
    }

    let mut records: Vec<HeterogeneityRecord> = groups
        .into_iter()
        .map(|(k, acc)| acc.into_record(label(&k)))
        .collect();
    // Stable sort keeps key order among ties
    records.sort_by(compare_effects);

    HeterogeneityTable { kind, records }
}

/// Effect per store id
pub fn by_store(transactions: &[Transaction]) -> HeterogeneityTable {
    build(GroupKind::Store, transactions, |t| t.store, |s| s.to_string())
}

/// Effect per region label
pub fn by_region(transactions: &[Transaction]) -> HeterogeneityTable {
    build(GroupKind::Region, transactions, |t| t.region.clone(), |r| r.clone())
}
