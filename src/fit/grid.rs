//! Shape parameter grid generation.
//!
//! We fit both models using a deterministic grid search over the nonlinear
//! shape parameters (the amplitude is linear and solved exactly per candidate).
//!
//! Why grid search?
//! - It avoids the local-minima and initial-guess issues common in nonlinear
//!   optimization (a logistic fit on early-phase data is notoriously flat).
//! - It is deterministic given the same inputs/flags.
//! - With one or two shape dimensions, a modest grid is fast enough for a
//!   daily batch job.

use crate::domain::{FitConfig, ModelKind};
use crate::error::AppError;

/// A grid of shape-parameter candidates plus the per-dimension spacing.
///
/// The spacing is carried along so the fitter can re-grid locally around the
/// best coarse candidate during refinement.
#[derive(Debug, Clone)]
pub struct ShapeGrid {
    pub tuples: Vec<Vec<f64>>,
    pub steps: Vec<f64>,
}

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::config(format!(
            "Invalid grid range: min={min}, max={max} (must be finite and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::config("Grid steps must be >= 2."));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push(min + step * i as f64);
    }
    Ok(out)
}

/// Build the initial shape grid for a model.
///
/// `last_day` is the day offset of the final windowed observation; the
/// logistic midpoint range extends past it so a not-yet-reached inflection
/// point is still representable.
pub fn shape_grid(model: ModelKind, last_day: f64, config: &FitConfig) -> Result<ShapeGrid, AppError> {
    match model {
        ModelKind::Exponential => {
            let rates = lin_space(config.exp_rate_min, config.exp_rate_max, config.exp_rate_steps)?;
            let step = (config.exp_rate_max - config.exp_rate_min) / (config.exp_rate_steps as f64 - 1.0);
            Ok(ShapeGrid {
                tuples: rates.into_iter().map(|k| vec![k]).collect(),
                steps: vec![step],
            })
        }
        ModelKind::Logistic => {
            let rates = lin_space(
                config.logistic_rate_min,
                config.logistic_rate_max,
                config.logistic_rate_steps,
            )?;
            let midpoint_max = (last_day * config.midpoint_extend).max(1.0);
            let midpoints = lin_space(0.0, midpoint_max, config.midpoint_steps)?;

            let rate_step =
                (config.logistic_rate_max - config.logistic_rate_min) / (config.logistic_rate_steps as f64 - 1.0);
            let midpoint_step = midpoint_max / (config.midpoint_steps as f64 - 1.0);

            let mut tuples = Vec::with_capacity(rates.len() * midpoints.len());
            for &k in &rates {
                for &t0 in &midpoints {
                    tuples.push(vec![k, t0]);
                }
            }
            Ok(ShapeGrid {
                tuples,
                steps: vec![rate_step, midpoint_step],
            })
        }
    }
}
