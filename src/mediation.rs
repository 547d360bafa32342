//! Mediation decomposition of the period effect
//!
//! The raw model's period coefficient is the total effect and the
//! mix-controlled model's period coefficient is the direct effect. Whatever
//! disappears once product mix is controlled is the indirect (mediated)
//! effect.

use crate::model::{ModelError, ModelResult};
use crate::transaction::ProductCategory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediationError {
    #[error("Mediation undefined: total effect is zero, so the mediation ratio is undefined")]
    UndefinedRatio,

    #[error("Required coefficient unavailable: {0}")]
    MissingCoefficient(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, MediationError>;

/// Total/direct/indirect split of the period effect (percentage points)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDecomposition {
    pub total: f64,
    pub direct: f64,
    /// total - direct
    pub indirect: f64,
    /// indirect / total * 100
    pub mediation_pct: f64,
}

impl EffectDecomposition {
    /// Decompose from the two period coefficients
    ///
    /// # Example
    /// ```
    /// use marginfx::mediation::EffectDecomposition;
    ///
    /// let d = EffectDecomposition::from_estimates(4.447, 1.772).unwrap();
    /// assert!((d.indirect - 2.675).abs() < 1e-9);
    /// assert!((d.mediation_pct - 60.2).abs() < 0.1);
    /// ```
    pub fn from_estimates(total: f64, direct: f64) -> Result<Self> {
        if total == 0.0 {
            return Err(MediationError::UndefinedRatio);
        }
        let indirect = total - direct;
        Ok(Self {
            total,
            direct,
            indirect,
            mediation_pct: indirect / total * 100.0,
        })
    }

    /// Decompose from the raw (M1) and controlled (M2) model results
    pub fn from_models(raw: &ModelResult, controlled: &ModelResult) -> Result<Self> {
        let total = raw.period()?.estimate;
        let direct = controlled.period()?.estimate;
        Self::from_estimates(total, direct)
    }

    /// Rows of the exported mediation table
    pub fn table(&self) -> Vec<MediationRow> {
        vec![
            MediationRow {
                pathway: "total".to_string(),
                value: self.total,
                unit: "pp".to_string(),
                description: "Overall before/after change in margin (raw model period coefficient)"
                    .to_string(),
            },
            MediationRow {
                pathway: "direct".to_string(),
                value: self.direct,
                unit: "pp".to_string(),
                description: "Change in margin not explained by the product-mix shift".to_string(),
            },
            MediationRow {
                pathway: "indirect".to_string(),
                value: self.indirect,
                unit: "pp".to_string(),
                description: "Change in margin attributable to the product-mix shift".to_string(),
            },
            MediationRow {
                pathway: "percentage".to_string(),
                value: self.mediation_pct,
                unit: "%".to_string(),
                description: "Share of the total effect mediated by product mix".to_string(),
            },
        ]
    }
}

/// One row of the mediation table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediationRow {
    pub pathway: String,
    pub value: f64,
    pub unit: String,
    pub description: String,
}

/// Margin premium of one product category relative to undeclared sales
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayEffect {
    pub category: ProductCategory,
    pub effect: f64,
    /// None for the baseline category
    pub p_value: Option<f64>,
}

/// Per-category coefficients from the controlled model
///
/// Undeclared is the omitted baseline and is reported with effect 0.
pub fn pathway_effects(controlled: &ModelResult) -> Result<Vec<PathwayEffect>> {
    let mut effects = Vec::with_capacity(4);
    for (category, coefficient) in [
        (ProductCategory::Device, controlled.device()?),
        (ProductCategory::Insurance, controlled.insurance()?),
        (ProductCategory::Accessory, controlled.accessory()?),
    ] {
        effects.push(PathwayEffect {
            category,
            effect: coefficient.estimate,
            p_value: Some(coefficient.p_value),
        });
    }
    effects.push(PathwayEffect {
        category: ProductCategory::Undeclared,
        effect: 0.0,
        p_value: None,
    });
    Ok(effects)
}

/// Decomposition plus pathway effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediationAnalysis {
    pub decomposition: EffectDecomposition,
    pub pathways: Vec<PathwayEffect>,
}

pub fn analyze(raw: &ModelResult, controlled: &ModelResult) -> Result<MediationAnalysis> {
    Ok(MediationAnalysis {
        decomposition: EffectDecomposition::from_models(raw, controlled)?,
        pathways: pathway_effects(controlled)?,
    })
}
