//! JSON renderer
//!
//! Serializes the whole analysis (baseline rates, scenarios, summary and
//! warnings). Undefined values serialize as `null`.

use pkcap_core::{CapacityAnalysis, RenderError, Renderer};

/// JSON renderer
#[derive(Clone, Debug)]
pub struct JsonRenderer {
    /// Pretty-print with indentation
    pub pretty: bool,
}

impl Default for JsonRenderer {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-line output
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

impl Renderer for JsonRenderer {
    type Output = String;

    fn render(&self, analysis: &CapacityAnalysis) -> Result<String, RenderError> {
        let result = if self.pretty {
            serde_json::to_string_pretty(analysis)
        } else {
            serde_json::to_string(analysis)
        };
        result.map_err(|e| RenderError::Format(format!("JSON error: {e}")))
    }
}
