//! Plain-text report renderer
//!
//! Fixed-width tables for terminals and logs. Undefined values print as "N/A".

use pkcap_core::{CapacityAnalysis, RenderError, Renderer};

use crate::format_value;

/// Plain-text renderer
#[derive(Clone, Debug)]
pub struct TextRenderer {
    /// Decimal places for numeric columns
    pub precision: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { precision: 2 }
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    fn num(&self, value: Option<f64>) -> String {
        format_value(value, self.precision)
    }
}

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, analysis: &CapacityAnalysis) -> Result<String, RenderError> {
        if analysis.scenarios.is_empty() {
            return Err(RenderError::InvalidData("No scenarios to render".into()));
        }

        let b = &analysis.baseline;
        let mut output = String::new();

        output.push_str("Variance Reduction Analysis - P-K Formula Model\n\n");

        output.push_str("Input Parameters\n");
        // Rates are small; keep extra digits
        let digits = self.precision.max(5);
        let params = [
            ("Initial Clients", b.clients()),
            ("Initial Variance (σ)", b.sigma()),
            ("Initial Variance² (σ²)", b.sigma2()),
            ("Initial TPT", b.tpt()),
            ("Service Rate (μ)", b.mu()),
            ("Arrival Rate (λ)", b.lambda()),
            ("Initial Utilization (ρ)", b.rho()),
        ];
        for (label, value) in params {
            output.push_str(&format!("  {label:<26} {value:>12.digits$}\n"));
        }

        output.push_str("\nVariance Reduction Analysis\n");
        output.push_str(&format!(
            "  {:>6} {:>12} {:>14} {:>12} {:>12} {:>10}\n",
            "VR %", "Variance σ", "Variance² σ²", "TPT (W)", "Capacity", "ROI"
        ));
        for s in &analysis.scenarios {
            output.push_str(&format!(
                "  {:>5}% {:>12} {:>14} {:>12} {:>12} {:>10}\n",
                s.vr,
                self.num(Some(s.sigma_reduced)),
                self.num(Some(s.sigma2_reduced)),
                self.num(s.wait_time),
                self.num(Some(s.capacity)),
                self.num(Some(s.roi_multiplier)),
            ));
        }

        output.push_str(&format!(
            "\nKey Metrics at {}% Variance Reduction\n",
            analysis.summary.reference_vr
        ));
        output.push_str(&format!(
            "  {:<16} {:>10} {:>10} {:>10} {:>10}\n",
            "Metric", "Before", "After", "Change", "Change %"
        ));
        for m in &analysis.summary.metrics {
            output.push_str(&format!(
                "  {:<16} {:>10} {:>10} {:>10} {:>10}\n",
                m.metric.label(),
                self.num(Some(m.before)),
                self.num(m.after),
                self.num(m.delta),
                self.num(m.delta_pct),
            ));
        }

        if analysis.has_warnings() {
            output.push_str("\nWarnings\n");
            for w in &analysis.warnings {
                output.push_str(&format!("  - {w}\n"));
            }
        }

        Ok(output)
    }
}
