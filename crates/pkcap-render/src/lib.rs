//! # pkcap-render
//!
//! Rendering backends for pkcap capacity analyses.
//!
//! This crate provides:
//! - Excel workbooks with live formulas (the primary deliverable)
//! - Plain-text reports
//! - JSON output
//!
//! ## Example
//!
//! ```rust,ignore
//! use pkcap_core::{CapacityModel, ModelConfig, Renderer};
//! use pkcap_render::{ExcelRenderer, TextRenderer};
//!
//! let analysis = CapacityModel::new(ModelConfig::default()).analyze()?;
//!
//! // Formula-driven workbook
//! ExcelRenderer::new().save(&analysis, "variance_reduction_analysis.xlsx")?;
//!
//! // Terminal report
//! println!("{}", TextRenderer::new().render(&analysis)?);
//! ```

pub mod excel;
pub mod json;
pub mod text;

pub use excel::ExcelRenderer;
pub use json::JsonRenderer;
pub use text::TextRenderer;

/// Placeholder for values the model leaves undefined
pub const NOT_AVAILABLE: &str = "N/A";

/// Format an optional value with fixed precision, "N/A" when undefined
pub fn format_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => NOT_AVAILABLE.to_string(),
    }
}
