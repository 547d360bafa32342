// Statically typed model specifications
//
// A specification is an ordered list of named predictors. The intercept is
// implicit and always occupies the first design-matrix column.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TERM_INTERCEPT: &str = "Intercept";
pub const TERM_PERIOD: &str = "period";
pub const TERM_DEVICE: &str = "device";
pub const TERM_INSURANCE: &str = "insurance";
pub const TERM_ACCESSORY: &str = "accessory";

/// Term name of a store fixed-effect dummy
pub fn store_term(store: u32) -> String {
    format!("store[T.{}]", store)
}

/// The three models fitted per run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Raw,
    Controlled,
    StoreFixedEffects,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Raw,
        ModelKind::Controlled,
        ModelKind::StoreFixedEffects,
    ];

    /// Display label, e.g. "M2 (controlled)"
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::Raw => "M1 (raw)",
            ModelKind::Controlled => "M2 (controlled)",
            ModelKind::StoreFixedEffects => "M3 (store fixed effects)",
        }
    }

    /// File-name friendly identifier
    pub fn slug(&self) -> &'static str {
        match self {
            ModelKind::Raw => "m1_raw",
            ModelKind::Controlled => "m2_controlled",
            ModelKind::StoreFixedEffects => "m3_store_fe",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a predictor value is read from a transaction
#[derive(Debug, Clone, Copy)]
pub enum Extractor {
    Field(fn(&Transaction) -> f64),
    /// 1 when the transaction belongs to this store
    StoreDummy(u32),
}

/// A named design-matrix column
#[derive(Debug, Clone)]
pub struct Predictor {
    pub name: String,
    pub extractor: Extractor,
}

impl Predictor {
    pub fn field(name: &str, extract: fn(&Transaction) -> f64) -> Self {
        Self {
            name: name.to_string(),
            extractor: Extractor::Field(extract),
        }
    }

    pub fn store_dummy(store: u32) -> Self {
        Self {
            name: store_term(store),
            extractor: Extractor::StoreDummy(store),
        }
    }

    pub fn value(&self, transaction: &Transaction) -> f64 {
        match self.extractor {
            Extractor::Field(extract) => extract(transaction),
            Extractor::StoreDummy(store) => {
                if transaction.store == store {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

fn period(t: &Transaction) -> f64 {
    t.period.indicator()
}

/// A fixed model specification (intercept implied)
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub predictors: Vec<Predictor>,
}

impl ModelSpec {
    /// M1: margin ~ intercept + period
    pub fn raw() -> Self {
        Self {
            kind: ModelKind::Raw,
            predictors: vec![Predictor::field(TERM_PERIOD, period)],
        }
    }

    /// M2: M1 + device + insurance + accessory (undeclared is the baseline)
    pub fn controlled() -> Self {
        Self {
            kind: ModelKind::Controlled,
            predictors: vec![
                Predictor::field(TERM_PERIOD, period),
                Predictor::field(TERM_DEVICE, Transaction::device),
                Predictor::field(TERM_INSURANCE, Transaction::insurance),
                Predictor::field(TERM_ACCESSORY, Transaction::accessory),
            ],
        }
    }

    /// M3: M2 + one dummy per store in 1..=store_count except `reference_store`
    pub fn store_fixed_effects(store_count: u32, reference_store: u32) -> Self {
        let mut predictors = Self::controlled().predictors;
        predictors.extend(
            (1..=store_count)
                .filter(|&s| s != reference_store)
                .map(Predictor::store_dummy),
        );
        Self {
            kind: ModelKind::StoreFixedEffects,
            predictors,
        }
    }

    /// All three specifications in fitting order
    pub fn all(store_count: u32, reference_store: u32) -> [ModelSpec; 3] {
        [
            Self::raw(),
            Self::controlled(),
            Self::store_fixed_effects(store_count, reference_store),
        ]
    }

    /// Term names including the intercept, in design-matrix order
    pub fn term_names(&self) -> Vec<String> {
        std::iter::once(TERM_INTERCEPT.to_string())
            .chain(self.predictors.iter().map(|p| p.name.clone()))
            .collect()
    }

    /// Number of design-matrix columns including the intercept
    pub fn n_columns(&self) -> usize {
        self.predictors.len() + 1
    }
}
