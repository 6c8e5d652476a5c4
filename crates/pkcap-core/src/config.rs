//! Model configuration
//!
//! A `ModelConfig` is read from TOML. Every section is optional and falls
//! back to the values of the reference workbook:
//!
//! ```toml
//! [baseline]
//! clients = 15.0
//! sigma = 12.0
//! tpt = 22.0
//!
//! [scenarios]
//! variance_reductions = [0, 10, 20, 30, 40, 50, 60, 70, 75, 80]
//! reference = 70.0
//!
//! [capacity]
//! intercept = 15.0
//! coefficient = 0.00306
//!
//! [policy]
//! stability = "warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{
    CapacityCurve, StabilityPolicy, DEFAULT_CLIENTS, DEFAULT_REFERENCE_VR, DEFAULT_SIGMA,
    DEFAULT_TPT, DEFAULT_VARIANCE_REDUCTIONS,
};

/// Full model configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub baseline: BaselineConfig,
    pub scenarios: ScenarioConfig,
    pub capacity: CapacityCurve,
    pub policy: PolicyConfig,
}

/// Raw baseline inputs (validated by `BaselineParameters::new`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub clients: f64,
    pub sigma: f64,
    pub tpt: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            clients: DEFAULT_CLIENTS,
            sigma: DEFAULT_SIGMA,
            tpt: DEFAULT_TPT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Percentages to sweep, strictly increasing, each in [0, 100)
    pub variance_reductions: Vec<f64>,
    /// Percentage used for the before/after summary
    pub reference: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            variance_reductions: DEFAULT_VARIANCE_REDUCTIONS.to_vec(),
            reference: DEFAULT_REFERENCE_VR,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub stability: StabilityPolicy,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ModelConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading model configuration");
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
