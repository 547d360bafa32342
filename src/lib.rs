//! marginfx - Before/after margin analysis of a sales bonus program
//!
//! Loads a transaction table, fits three nested least-squares models of
//! profit margin (raw, product-mix controlled, store fixed effects),
//! decomposes the bonus-period effect into a direct part and a part mediated
//! by product mix, and runs residual diagnostics and per-store/per-region
//! heterogeneity checks. All results are collected into one immutable
//! [`pipeline::AnalysisReport`] that the text, CSV, JSON and HTML renderers
//! read from.

pub mod cli;
pub mod config;
pub mod csv_output;
pub mod descriptive;
pub mod diagnostics;
pub mod html_output;
pub mod json_output;
pub mod loader;
pub mod mediation;
pub mod model;
pub mod pipeline;
pub mod region;
pub mod summary;
pub mod transaction;
