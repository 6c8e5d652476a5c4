//! Pollaczek–Khinchine capacity calculator
//!
//! Pure functions over immutable inputs:
//!
//! ```text
//! mu          = 1 / tpt
//! lambda      = clients / tpt
//! rho         = lambda / mu
//! sigma(vr)   = sigma0 * (1 - vr/100)
//! W(vr)       = mu + (lambda * (sigma(vr)² + 1/mu²)) / (2 * (1 - rho))
//! capacity    = 15 + 0.00306 * vr²
//! roi         = capacity / clients0
//! ```
//!
//! The wait-time formula is kept exactly as the workbook defines it, with `mu`
//! as the additive term. It is only evaluated for a stable queue (ρ < 1).

use tracing::{debug, warn};

use crate::{
    BaselineParameters, CapacityAnalysis, CapacityCurve, Metric, MetricDelta, ModelConfig,
    ModelError, ModelWarning, ScenarioResult, StabilityPolicy, SummaryRow,
};

/// Tolerance used when matching a reference percentage to a scenario
const VR_TOLERANCE: f64 = 1e-9;

/// Validate inputs, derive rates, and reject unstable queues.
pub fn compute_baseline(
    clients: f64,
    sigma: f64,
    tpt: f64,
) -> Result<BaselineParameters, ModelError> {
    let baseline = BaselineParameters::new(clients, sigma, tpt)?;
    baseline.check_stability()?;
    Ok(baseline)
}

/// P-K wait time for a given service-time variance.
///
/// Callers must ensure the baseline is stable; with ρ ≥ 1 the denominator is
/// zero or negative.
pub fn pk_wait_time(baseline: &BaselineParameters, sigma2: f64) -> f64 {
    let mu = baseline.mu();
    mu + (baseline.lambda() * (sigma2 + 1.0 / mu.powi(2))) / (2.0 * (1.0 - baseline.rho()))
}

/// Sweep the variance reductions using the default capacity curve.
pub fn compute_scenarios(
    baseline: &BaselineParameters,
    variance_reductions: &[f64],
) -> Result<Vec<ScenarioResult>, ModelError> {
    compute_scenarios_with_curve(baseline, variance_reductions, &CapacityCurve::default())
}

/// Sweep the variance reductions.
///
/// Every percentage must lie in [0, 100) and the sequence must be strictly
/// increasing. Wait times are left undefined for an unstable baseline; the
/// remaining columns do not depend on ρ.
pub fn compute_scenarios_with_curve(
    baseline: &BaselineParameters,
    variance_reductions: &[f64],
    curve: &CapacityCurve,
) -> Result<Vec<ScenarioResult>, ModelError> {
    validate_variance_reductions(variance_reductions)?;
    curve.validate()?;

    let stable = baseline.is_stable();
    let rows = variance_reductions
        .iter()
        .map(|&vr| {
            let sigma_reduced = baseline.sigma() * (1.0 - vr / 100.0);
            let sigma2_reduced = sigma_reduced.powi(2);
            let capacity = curve.capacity_at(vr);
            ScenarioResult {
                vr,
                sigma_reduced,
                sigma2_reduced,
                wait_time: stable.then(|| pk_wait_time(baseline, sigma2_reduced)),
                capacity,
                roi_multiplier: capacity / baseline.clients(),
            }
        })
        .collect::<Vec<_>>();

    debug!(rows = rows.len(), stable, "computed scenario table");
    Ok(rows)
}

fn validate_variance_reductions(variance_reductions: &[f64]) -> Result<(), ModelError> {
    for &vr in variance_reductions {
        if !vr.is_finite() || !(0.0..100.0).contains(&vr) {
            return Err(ModelError::invalid(
                "variance_reductions",
                format!("each percentage must be in [0, 100), got {vr}"),
            ));
        }
    }
    if let Some(pair) = variance_reductions.windows(2).find(|w| w[0] >= w[1]) {
        return Err(ModelError::invalid(
            "variance_reductions",
            format!(
                "percentages must be strictly increasing, got {} then {}",
                pair[0], pair[1]
            ),
        ));
    }
    Ok(())
}

pub(crate) fn find_scenario(scenarios: &[ScenarioResult], vr: f64) -> Option<usize> {
    scenarios
        .iter()
        .position(|s| (s.vr - vr).abs() < VR_TOLERANCE)
}

/// Percent change from `before` to `after`
pub fn percent_change(metric: Metric, before: f64, after: f64) -> Result<f64, ModelError> {
    if before == 0.0 {
        return Err(ModelError::DivisionByZero { metric });
    }
    Ok((after - before) / before * 100.0)
}

/// Compare the baseline with the scenario at `reference_vr`.
///
/// A zero baseline value leaves that metric's `delta_pct` undefined instead of
/// failing the whole summary.
pub fn compute_summary(
    baseline: &BaselineParameters,
    scenarios: &[ScenarioResult],
    reference_vr: f64,
) -> Result<SummaryRow, ModelError> {
    let reference = find_scenario(scenarios, reference_vr)
        .map(|i| &scenarios[i])
        .ok_or(ModelError::ReferenceNotFound {
            reference: reference_vr,
        })?;

    let pairs = [
        (Metric::Sigma, baseline.sigma(), Some(reference.sigma_reduced)),
        (Metric::Sigma2, baseline.sigma2(), Some(reference.sigma2_reduced)),
        (Metric::WaitTime, baseline.tpt(), reference.wait_time),
        (Metric::Capacity, baseline.clients(), Some(reference.capacity)),
        (Metric::RoiMultiplier, 1.0, Some(reference.roi_multiplier)),
    ];

    let metrics = pairs
        .into_iter()
        .map(|(metric, before, after)| {
            let delta_pct = after.and_then(|a| match percent_change(metric, before, a) {
                Ok(pct) => Some(pct),
                Err(e) => {
                    debug!(%e, "change % reported as undefined");
                    None
                }
            });
            MetricDelta {
                metric,
                before,
                after,
                delta: after.map(|a| a - before),
                delta_pct,
            }
        })
        .collect();

    Ok(SummaryRow {
        reference_vr: reference.vr,
        metrics,
    })
}

// ============================================================================
// Capacity Model
// ============================================================================

/// Runs the full calculation for a [`ModelConfig`]
#[derive(Clone, Debug, Default)]
pub struct CapacityModel {
    config: ModelConfig,
}

impl CapacityModel {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Baseline, scenario sweep and summary, with the stability policy applied
    pub fn analyze(&self) -> Result<CapacityAnalysis, ModelError> {
        let cfg = &self.config;
        let baseline = BaselineParameters::new(
            cfg.baseline.clients,
            cfg.baseline.sigma,
            cfg.baseline.tpt,
        )?;

        let mut warnings = Vec::new();
        if let Err(e) = baseline.check_stability() {
            match cfg.policy.stability {
                StabilityPolicy::Strict => return Err(e),
                StabilityPolicy::Warn => {
                    warn!(rho = baseline.rho(), "{e}");
                    warnings.push(ModelWarning::UnstableQueue { rho: baseline.rho() });
                }
            }
        }

        let scenarios = compute_scenarios_with_curve(
            &baseline,
            &cfg.scenarios.variance_reductions,
            &cfg.capacity,
        )?;
        let summary = compute_summary(&baseline, &scenarios, cfg.scenarios.reference)?;

        for m in &summary.metrics {
            if m.after.is_some() && m.delta_pct.is_none() {
                warn!(metric = %m.metric, "change % undefined");
                warnings.push(ModelWarning::UndefinedChange { metric: m.metric });
            }
        }

        debug!(
            scenarios = scenarios.len(),
            reference = summary.reference_vr,
            warnings = warnings.len(),
            "analysis complete"
        );

        Ok(CapacityAnalysis {
            baseline,
            curve: cfg.capacity,
            scenarios,
            summary,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_VARIANCE_REDUCTIONS;
    use pretty_assertions::assert_eq;

    const TOL: f64 = 1e-9;

    fn stable_baseline() -> BaselineParameters {
        BaselineParameters::new(0.5, 12.0, 22.0).unwrap()
    }

    fn default_baseline() -> BaselineParameters {
        BaselineParameters::new(15.0, 12.0, 22.0).unwrap()
    }

    #[test]
    fn compute_baseline_rejects_unstable_queue() {
        let err = compute_baseline(15.0, 12.0, 22.0).unwrap_err();
        match err {
            ModelError::UnstableQueue { rho } => assert!((rho - 15.0).abs() < TOL),
            other => panic!("expected UnstableQueue, got {other:?}"),
        }
    }

    #[test]
    fn compute_baseline_rejects_zero_tpt() {
        let err = compute_baseline(15.0, 12.0, 0.0).unwrap_err();
        assert!(matches!(err, ModelError::InvalidParameter { name: "tpt", .. }));
    }

    #[test]
    fn compute_baseline_accepts_stable_queue() {
        let b = compute_baseline(0.5, 12.0, 22.0).unwrap();
        assert!((b.rho() - 0.5).abs() < TOL);
    }

    #[test]
    fn zero_reduction_keeps_baseline() {
        let rows = compute_scenarios(&default_baseline(), &[0.0]).unwrap();
        assert_eq!(rows[0].sigma_reduced, 12.0);
        assert_eq!(rows[0].sigma2_reduced, 144.0);
        assert_eq!(rows[0].capacity, 15.0);
        assert_eq!(rows[0].roi_multiplier, 1.0);
    }

    #[test]
    fn seventy_percent_capacity() {
        let rows = compute_scenarios(&default_baseline(), &[70.0]).unwrap();
        assert!((rows[0].capacity - 29.994).abs() < TOL);
        assert!((rows[0].roi_multiplier - 29.994 / 15.0).abs() < TOL);
        assert!((rows[0].roi_multiplier - 1.9996).abs() < 1e-4);
        assert!((rows[0].sigma_reduced - 3.6).abs() < TOL);
    }

    #[test]
    fn wait_time_matches_literal_formula() {
        let b = stable_baseline();
        let rows = compute_scenarios(&b, &[0.0, 50.0]).unwrap();

        let mu = 1.0 / 22.0;
        let lambda = 0.5 / 22.0;
        let rho = lambda / mu;
        let expected0 = mu + (lambda * (144.0 + 1.0 / (mu * mu))) / (2.0 * (1.0 - rho));
        let expected50 = mu + (lambda * (36.0 + 1.0 / (mu * mu))) / (2.0 * (1.0 - rho));

        assert!((rows[0].wait_time.unwrap() - expected0).abs() < TOL);
        assert!((rows[1].wait_time.unwrap() - expected50).abs() < TOL);
        assert!(rows[1].wait_time.unwrap() < rows[0].wait_time.unwrap());
    }

    #[test]
    fn unstable_baseline_leaves_wait_time_undefined() {
        let rows = compute_scenarios(&default_baseline(), &DEFAULT_VARIANCE_REDUCTIONS).unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.wait_time.is_none()));
        assert!(rows.iter().all(|r| r.capacity >= 15.0));
    }

    #[test]
    fn scenarios_reject_out_of_range() {
        let b = stable_baseline();
        assert!(compute_scenarios(&b, &[100.0]).is_err());
        assert!(compute_scenarios(&b, &[-5.0]).is_err());
        assert!(compute_scenarios(&b, &[f64::NAN]).is_err());
        assert!(compute_scenarios(&b, &[99.9]).is_ok());
    }

    #[test]
    fn scenarios_reject_unordered_input() {
        let err = compute_scenarios(&stable_baseline(), &[0.0, 20.0, 10.0]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidParameter { name: "variance_reductions", .. }
        ));
        assert!(compute_scenarios(&stable_baseline(), &[10.0, 10.0]).is_err());
    }

    #[test]
    fn empty_sweep_is_empty() {
        let rows = compute_scenarios(&stable_baseline(), &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn custom_curve_changes_capacity_only() {
        let b = stable_baseline();
        let curve = CapacityCurve::new(10.0, 0.001);
        let custom = compute_scenarios_with_curve(&b, &[50.0], &curve).unwrap();
        let default = compute_scenarios(&b, &[50.0]).unwrap();

        assert!((custom[0].capacity - 12.5).abs() < TOL);
        assert!((custom[0].roi_multiplier - 25.0).abs() < TOL);
        assert_eq!(custom[0].sigma_reduced, default[0].sigma_reduced);
        assert_eq!(custom[0].wait_time, default[0].wait_time);
    }

    #[test]
    fn summary_capacity_delta() {
        let b = default_baseline();
        let rows = compute_scenarios(&b, &DEFAULT_VARIANCE_REDUCTIONS).unwrap();
        let summary = compute_summary(&b, &rows, 70.0).unwrap();

        let capacity = summary.get(Metric::Capacity).unwrap();
        assert_eq!(capacity.before, 15.0);
        assert!((capacity.delta.unwrap() - (29.994 - 15.0)).abs() < TOL);
        assert!((capacity.delta_pct.unwrap() - 99.96).abs() < 1e-6);
    }

    #[test]
    fn summary_before_values() {
        let b = default_baseline();
        let rows = compute_scenarios(&b, &DEFAULT_VARIANCE_REDUCTIONS).unwrap();
        let summary = compute_summary(&b, &rows, 70.0).unwrap();

        let befores: Vec<f64> = summary.metrics.iter().map(|m| m.before).collect();
        assert_eq!(befores, vec![12.0, 144.0, 22.0, 15.0, 1.0]);

        let sigma = summary.get(Metric::Sigma).unwrap();
        assert!((sigma.delta_pct.unwrap() + 70.0).abs() < 1e-9);
        let sigma2 = summary.get(Metric::Sigma2).unwrap();
        assert!((sigma2.delta_pct.unwrap() + 91.0).abs() < 1e-9);
    }

    #[test]
    fn summary_wait_time_undefined_when_unstable() {
        let b = default_baseline();
        let rows = compute_scenarios(&b, &DEFAULT_VARIANCE_REDUCTIONS).unwrap();
        let summary = compute_summary(&b, &rows, 70.0).unwrap();

        let wait = summary.get(Metric::WaitTime).unwrap();
        assert_eq!(wait.before, 22.0);
        assert_eq!(wait.after, None);
        assert_eq!(wait.delta, None);
        assert_eq!(wait.delta_pct, None);
    }

    #[test]
    fn summary_missing_reference() {
        let b = default_baseline();
        let rows = compute_scenarios(&b, &DEFAULT_VARIANCE_REDUCTIONS).unwrap();
        let err = compute_summary(&b, &rows, 65.0).unwrap_err();
        assert_eq!(err, ModelError::ReferenceNotFound { reference: 65.0 });
    }

    #[test]
    fn summary_zero_sigma_is_not_fatal() {
        let b = BaselineParameters::new(0.5, 0.0, 22.0).unwrap();
        let rows = compute_scenarios(&b, &[0.0, 70.0]).unwrap();
        let summary = compute_summary(&b, &rows, 70.0).unwrap();

        let sigma = summary.get(Metric::Sigma).unwrap();
        assert_eq!(sigma.delta, Some(0.0));
        assert_eq!(sigma.delta_pct, None);
        assert!(summary.get(Metric::Capacity).unwrap().delta_pct.is_some());
    }

    #[test]
    fn percent_change_division_by_zero() {
        assert_eq!(
            percent_change(Metric::Sigma, 0.0, 1.0),
            Err(ModelError::DivisionByZero { metric: Metric::Sigma })
        );
        assert_eq!(percent_change(Metric::Capacity, 10.0, 15.0), Ok(50.0));
    }

    #[test]
    fn analyze_default_config_warns() {
        let analysis = CapacityModel::default().analyze().unwrap();
        assert_eq!(analysis.scenarios.len(), 10);
        assert_eq!(analysis.reference_index(), Some(7));
        assert_eq!(analysis.warnings.len(), 1);
        assert!(matches!(
            analysis.warnings[0],
            ModelWarning::UnstableQueue { .. }
        ));
    }

    #[test]
    fn analyze_rejects_non_finite_curve() {
        let config = ModelConfig::from_toml_str(
            "[baseline]\nclients = 0.5\n\n[capacity]\nintercept = nan\ncoefficient = -1.0\n",
        )
        .unwrap();
        let err = CapacityModel::new(config).analyze().unwrap_err();
        assert!(matches!(err, ModelError::InvalidParameter { name: "capacity", .. }));
    }

    #[test]
    fn scenarios_reject_infinite_coefficient() {
        let curve = CapacityCurve::new(15.0, f64::INFINITY);
        let err = compute_scenarios_with_curve(&stable_baseline(), &[0.0, 70.0], &curve).unwrap_err();
        assert!(matches!(err, ModelError::InvalidParameter { name: "capacity", .. }));
    }

    #[test]
    fn analyze_strict_policy_fails() {
        let mut config = ModelConfig::default();
        config.policy.stability = StabilityPolicy::Strict;
        let err = CapacityModel::new(config).analyze().unwrap_err();
        assert!(matches!(err, ModelError::UnstableQueue { .. }));
    }

    #[test]
    fn analyze_stable_config_has_no_warnings() {
        let mut config = ModelConfig::default();
        config.baseline.clients = 0.5;
        config.policy.stability = StabilityPolicy::Strict;
        let analysis = CapacityModel::new(config).analyze().unwrap();
        assert!(!analysis.has_warnings());
        assert!(analysis.scenarios.iter().all(|s| s.wait_time.is_some()));
        assert_eq!(analysis.reference_scenario().unwrap().vr, 70.0);
    }

    #[test]
    fn analyze_zero_sigma_reports_undefined_change() {
        let mut config = ModelConfig::default();
        config.baseline.clients = 0.5;
        config.baseline.sigma = 0.0;
        let analysis = CapacityModel::new(config).analyze().unwrap();
        assert_eq!(
            analysis.warnings,
            vec![
                ModelWarning::UndefinedChange { metric: Metric::Sigma },
                ModelWarning::UndefinedChange { metric: Metric::Sigma2 },
            ]
        );
    }
}
