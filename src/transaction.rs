//! Normalized sales transactions
//!
//! One row per sale after loading. Transactions are built once by the loader
//! and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Product category of a sale, derived from the raw product-type string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Device,
    Insurance,
    Accessory,
    /// Sentinel "." or any product type that matches none of the known strings
    Undeclared,
}

impl ProductCategory {
    /// All categories in indicator-column order
    pub const ALL: [ProductCategory; 4] = [
        ProductCategory::Device,
        ProductCategory::Insurance,
        ProductCategory::Accessory,
        ProductCategory::Undeclared,
    ];

    /// Map a raw product-type string by exact match
    ///
    /// Unmatched values fall into [`ProductCategory::Undeclared`].
    ///
    /// # Example
    /// ```
    /// use marginfx::transaction::ProductCategory;
    ///
    /// assert_eq!(ProductCategory::from_raw("accessory"), ProductCategory::Accessory);
    /// assert_eq!(ProductCategory::from_raw("."), ProductCategory::Undeclared);
    /// assert_eq!(ProductCategory::from_raw("gift card"), ProductCategory::Undeclared);
    /// ```
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "electronic device" => ProductCategory::Device,
            "insurance + device" => ProductCategory::Insurance,
            "accessory" => ProductCategory::Accessory,
            _ => ProductCategory::Undeclared,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProductCategory::Device => "device",
            ProductCategory::Insurance => "insurance",
            ProductCategory::Accessory => "accessory",
            ProductCategory::Undeclared => "undeclared",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Program period relative to the bonus launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Before,
    After,
}

impl Period {
    /// Recenter the raw 1/2 period code to before/after
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Period::Before),
            2 => Some(Period::After),
            _ => None,
        }
    }

    /// Binary indicator used as the `period` regressor
    pub fn indicator(&self) -> f64 {
        match self {
            Period::Before => 0.0,
            Period::After => 1.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Period::Before => "before",
            Period::After => "after",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single normalized sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Profit margin in percent (0-100)
    pub margin: f64,
    pub period: Period,
    pub category: ProductCategory,
    pub store: u32,
    /// Canonical region label assigned by the configured region mapper
    pub region: String,
}

impl Transaction {
    /// 0/1 indicator for one product category
    pub fn indicator(&self, category: ProductCategory) -> f64 {
        if self.category == category {
            1.0
        } else {
            0.0
        }
    }

    pub fn device(&self) -> f64 {
        self.indicator(ProductCategory::Device)
    }

    pub fn insurance(&self) -> f64 {
        self.indicator(ProductCategory::Insurance)
    }

    pub fn accessory(&self) -> f64 {
        self.indicator(ProductCategory::Accessory)
    }

    pub fn undeclared(&self) -> f64 {
        self.indicator(ProductCategory::Undeclared)
    }

    /// Sum of the four indicator columns (always 1 for a well-formed row)
    pub fn indicator_sum(&self) -> f64 {
        ProductCategory::ALL.iter().map(|c| self.indicator(*c)).sum()
    }
}
