//! # pkcap-core
//!
//! Core domain model for the pkcap variance-reduction capacity model.
//!
//! This crate provides:
//! - Domain types: `BaselineParameters`, `ScenarioResult`, `SummaryRow`, `CapacityAnalysis`
//! - The P-K calculator: `compute_baseline`, `compute_scenarios`, `compute_summary`
//! - Configuration loaded from TOML (`ModelConfig`)
//! - Core traits: `Renderer`
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use pkcap_core::{compute_scenarios, compute_summary, BaselineParameters, Metric};
//!
//! let baseline = BaselineParameters::new(0.5, 12.0, 22.0).unwrap();
//! assert!(baseline.is_stable());
//!
//! let scenarios = compute_scenarios(&baseline, &[0.0, 50.0, 70.0]).unwrap();
//! let summary = compute_summary(&baseline, &scenarios, 70.0).unwrap();
//!
//! let capacity = summary.get(Metric::Capacity).unwrap();
//! assert!((capacity.after.unwrap() - 29.994).abs() < 1e-9);
//! ```

pub mod config;
pub mod model;

pub use config::{ConfigError, ModelConfig};
pub use model::{
    compute_baseline, compute_scenarios, compute_scenarios_with_curve, compute_summary,
    percent_change, pk_wait_time, CapacityModel,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Variance reduction percentages swept by the default scenario table
pub const DEFAULT_VARIANCE_REDUCTIONS: [f64; 10] =
    [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 75.0, 80.0];

/// Scenario used as the "after" column of the summary
pub const DEFAULT_REFERENCE_VR: f64 = 70.0;

/// Default baseline: 15 clients, σ = 12h, TPT = 22h
pub const DEFAULT_CLIENTS: f64 = 15.0;
pub const DEFAULT_SIGMA: f64 = 12.0;
pub const DEFAULT_TPT: f64 = 22.0;

// ============================================================================
// Baseline
// ============================================================================

/// Validated baseline inputs and the queue rates derived from them.
///
/// Fields are private so the derived rates always agree with the inputs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BaselineParameters {
    clients: f64,
    sigma: f64,
    tpt: f64,
    mu: f64,
    lambda: f64,
    rho: f64,
}

impl BaselineParameters {
    /// Validate inputs and derive `mu`, `lambda` and `rho`.
    ///
    /// Does not check queue stability; see [`BaselineParameters::check_stability`]
    /// and [`compute_baseline`] for the strict variant.
    pub fn new(clients: f64, sigma: f64, tpt: f64) -> Result<Self, ModelError> {
        require_finite("clients", clients)?;
        require_finite("sigma", sigma)?;
        require_finite("tpt", tpt)?;
        if tpt <= 0.0 {
            return Err(ModelError::invalid("tpt", format!("must be > 0, got {tpt}")));
        }
        if clients <= 0.0 {
            return Err(ModelError::invalid(
                "clients",
                format!("must be > 0, got {clients}"),
            ));
        }
        if sigma < 0.0 {
            return Err(ModelError::invalid("sigma", format!("must be >= 0, got {sigma}")));
        }

        let mu = 1.0 / tpt;
        let lambda = clients / tpt;
        let rho = lambda / mu;

        Ok(Self {
            clients,
            sigma,
            tpt,
            mu,
            lambda,
            rho,
        })
    }

    /// Initial serviceable clients
    pub fn clients(&self) -> f64 {
        self.clients
    }

    /// Initial standard deviation of service time
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Initial variance of service time (σ²)
    pub fn sigma2(&self) -> f64 {
        self.sigma * self.sigma
    }

    /// Mean time per task
    pub fn tpt(&self) -> f64 {
        self.tpt
    }

    /// Service rate (1/TPT)
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Arrival rate (clients/TPT)
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Utilization (λ/μ)
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// The P-K formula only holds for ρ < 1
    pub fn is_stable(&self) -> bool {
        self.rho < 1.0
    }

    /// Surface an unstable queue as an error
    pub fn check_stability(&self) -> Result<(), ModelError> {
        if self.is_stable() {
            Ok(())
        } else {
            Err(ModelError::UnstableQueue { rho: self.rho })
        }
    }
}

fn require_finite(name: &'static str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::invalid(name, format!("must be finite, got {value}")))
    }
}

// ============================================================================
// Capacity Curve
// ============================================================================

/// Empirical quadratic fit: `capacity(vr) = intercept + coefficient * vr²`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityCurve {
    pub intercept: f64,
    pub coefficient: f64,
}

impl CapacityCurve {
    pub const DEFAULT_INTERCEPT: f64 = 15.0;
    pub const DEFAULT_COEFFICIENT: f64 = 0.00306;

    pub fn new(intercept: f64, coefficient: f64) -> Self {
        Self {
            intercept,
            coefficient,
        }
    }

    /// Capacity in clients at the given variance reduction percentage
    pub fn capacity_at(&self, vr: f64) -> f64 {
        self.intercept + self.coefficient * vr.powi(2)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Both constants must be finite
    pub fn validate(&self) -> Result<(), ModelError> {
        for (label, value) in [("intercept", self.intercept), ("coefficient", self.coefficient)] {
            if !value.is_finite() {
                return Err(ModelError::invalid(
                    "capacity",
                    format!("{label} must be finite, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

impl Default for CapacityCurve {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERCEPT, Self::DEFAULT_COEFFICIENT)
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// One row of the variance-reduction sweep
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Variance reduction percentage, in [0, 100)
    pub vr: f64,
    /// σ after reduction
    pub sigma_reduced: f64,
    /// σ² after reduction
    pub sigma2_reduced: f64,
    /// P-K wait time; `None` when the baseline queue is unstable
    pub wait_time: Option<f64>,
    /// Serviceable clients
    pub capacity: f64,
    /// Capacity relative to the baseline client count
    pub roi_multiplier: f64,
}

// ============================================================================
// Summary
// ============================================================================

/// Metrics compared in the before/after summary
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Sigma,
    Sigma2,
    WaitTime,
    Capacity,
    RoiMultiplier,
}

impl Metric {
    /// Summary rows, in display order
    pub const ALL: [Metric; 5] = [
        Metric::Sigma,
        Metric::Sigma2,
        Metric::WaitTime,
        Metric::Capacity,
        Metric::RoiMultiplier,
    ];

    /// Human-readable label used by renderers
    pub fn label(self) -> &'static str {
        match self {
            Metric::Sigma => "Variance (σ)",
            Metric::Sigma2 => "Variance² (σ²)",
            Metric::WaitTime => "TPT (W)",
            Metric::Capacity => "Capacity",
            Metric::RoiMultiplier => "ROI Multiplier",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Before/after comparison of a single metric
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: Metric,
    pub before: f64,
    /// `None` if the reference scenario has no value (unstable wait time)
    pub after: Option<f64>,
    pub delta: Option<f64>,
    /// `None` when undefined (no "after" value, or `before == 0`)
    pub delta_pct: Option<f64>,
}

/// Before/after summary against one reference scenario
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub reference_vr: f64,
    pub metrics: Vec<MetricDelta>,
}

impl SummaryRow {
    pub fn get(&self, metric: Metric) -> Option<&MetricDelta> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// What to do when the baseline queue is unstable (ρ ≥ 1)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityPolicy {
    /// Abort the analysis with [`ModelError::UnstableQueue`]
    Strict,
    /// Attach a warning and leave wait times undefined
    #[default]
    Warn,
}

/// Non-fatal conditions attached to an analysis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelWarning {
    /// ρ ≥ 1: wait times are not computed
    UnstableQueue { rho: f64 },
    /// The baseline value of a metric is zero, so its change % is undefined
    UndefinedChange { metric: Metric },
}

impl fmt::Display for ModelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelWarning::UnstableQueue { rho } => write!(
                f,
                "unstable queue: utilization ρ = {rho:.4} >= 1, wait times are undefined"
            ),
            ModelWarning::UndefinedChange { metric } => {
                write!(f, "change % of {metric} is undefined: baseline value is 0")
            }
        }
    }
}

/// Complete result handed to renderers
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CapacityAnalysis {
    pub baseline: BaselineParameters,
    pub curve: CapacityCurve,
    pub scenarios: Vec<ScenarioResult>,
    pub summary: SummaryRow,
    pub warnings: Vec<ModelWarning>,
}

impl CapacityAnalysis {
    /// Position of the summary's reference scenario in `scenarios`
    pub fn reference_index(&self) -> Option<usize> {
        model::find_scenario(&self.scenarios, self.summary.reference_vr)
    }

    pub fn reference_scenario(&self) -> Option<&ScenarioResult> {
        self.reference_index().map(|i| &self.scenarios[i])
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Render an analysis to an output format
pub trait Renderer {
    type Output;

    /// Render a capacity analysis to the output format
    fn render(&self, analysis: &CapacityAnalysis) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Calculator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unstable queue: utilization ρ = {rho:.4} (the P-K formula requires ρ < 1)")]
    UnstableQueue { rho: f64 },

    #[error("Reference scenario {reference}% not found among computed scenarios")]
    ReferenceNotFound { reference: f64 },

    #[error("Division by zero: baseline {metric} is 0")]
    DivisionByZero { metric: Metric },
}

impl ModelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

// ============================================================================
// Tests
// ============================================================================
