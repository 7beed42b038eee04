//! Low-level fitting routine for a single model kind on a single series.
//!
//! Given:
//! - day offsets `t_i`
//! - observed counts `y_i`
//! - a grid of candidate shape tuples
//!
//! we solve, for each shape tuple:
//! - a one-column least squares problem for the best amplitude
//! - the resulting SSE
//!
//! keep the best (lowest SSE) candidate, then re-grid locally around it for a
//! bounded number of refinement rounds.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::ModelKind;
use crate::error::AppError;
use crate::fit::grid::{ShapeGrid, lin_space};
use crate::math::solve_least_squares;
use crate::models::{basis, predict};

/// Points per dimension in each refinement round.
const REFINE_POINTS: usize = 9;

/// Best fit for a single model kind on one series.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: ModelKind,
    pub amplitude: f64,
    pub shape: Vec<f64>,
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    shape: Vec<f64>,
    amplitude: f64,
    sse: f64,
}

/// Fit a single model kind over a shape grid with local refinement.
pub fn fit_model(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    grid: &ShapeGrid,
    refine_rounds: usize,
) -> Result<ModelFit, AppError> {
    let n = x.len();
    if n != y.len() {
        return Err(AppError::config("Mismatched x/y lengths."));
    }
    if n < model.param_count() {
        return Err(AppError::missing_data(format!(
            "Insufficient observations: n={n} < {} required by {}.",
            model.param_count(),
            model.display_name()
        )));
    }
    if grid.tuples.is_empty() {
        return Err(AppError::config("Shape grid is empty."));
    }
    if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
        return Err(AppError::missing_data("Non-finite values in fit input."));
    }

    let mut best = fit_once(model, &grid.tuples, x, y)?;

    // Refinement: re-grid locally around the best candidate with halved
    // spacing each round. Iteration count is bounded by `refine_rounds`, so a
    // poorly conditioned series cannot spin forever.
    let mut steps = grid.steps.clone();
    for _ in 0..refine_rounds {
        for s in &mut steps {
            *s /= 2.0;
        }
        let local = local_grid(&best.shape, &steps)?;
        // The coarse best stays valid, so a refinement round that produces no
        // valid candidate just keeps the current best.
        if let Ok(candidate) = fit_once(model, &local, x, y) {
            if candidate.sse <= best.sse {
                best = candidate;
            }
        }
    }

    let rmse = (best.sse / n as f64).sqrt();
    let r_squared = r_squared(y, best.sse);
    Ok(ModelFit {
        model,
        amplitude: best.amplitude,
        shape: best.shape,
        sse: best.sse,
        rmse,
        r_squared,
    })
}

fn fit_once(
    model: ModelKind,
    tuples: &[Vec<f64>],
    x: &[f64],
    y: &[f64],
) -> Result<Candidate, AppError> {
    // Evaluate each shape tuple independently (parallel).
    let candidates: Vec<Candidate> = tuples
        .par_iter()
        .enumerate()
        .filter_map(|(idx, shape)| {
            evaluate_candidate(model, shape, x, y).map(|(amplitude, sse)| Candidate {
                idx,
                shape: shape.clone(),
                amplitude,
                sse,
            })
        })
        .collect();

    if candidates.is_empty() {
        return Err(AppError::fit(format!(
            "No valid fit candidates for model {}.",
            model.display_name()
        )));
    }

    // Deterministic selection: pick the minimum SSE; break ties by original grid index.
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.sse < best.sse || (c.sse == best.sse && c.idx < best.idx) {
            best = c;
        }
    }

    Ok(best.clone())
}

fn evaluate_candidate(model: ModelKind, shape: &[f64], x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();

    // Build the one-column design matrix of basis values. Candidates whose
    // basis overflows (large rate * large day offset) are rejected here.
    let mut design = DMatrix::<f64>::zeros(n, 1);
    for i in 0..n {
        let b = basis(model, x[i], shape);
        if !b.is_finite() {
            return None;
        }
        design[(i, 0)] = b;
    }
    let yv = DVector::from_column_slice(y);

    let beta = solve_least_squares(&design, &yv)?;
    let amplitude = beta[0];
    if !amplitude.is_finite() {
        return None;
    }

    let mut sse = 0.0;
    for i in 0..n {
        let r = y[i] - predict(model, x[i], amplitude, shape);
        sse += r * r;
    }

    if sse.is_finite() { Some((amplitude, sse)) } else { None }
}

/// Build the cartesian product of per-dimension local ranges around `center`.
fn local_grid(center: &[f64], steps: &[f64]) -> Result<Vec<Vec<f64>>, AppError> {
    let mut axes = Vec::with_capacity(center.len());
    for (&c, &s) in center.iter().zip(steps.iter()) {
        axes.push(lin_space(c - s, c + s, REFINE_POINTS)?);
    }

    let mut tuples = vec![Vec::new()];
    for axis in &axes {
        let mut next = Vec::with_capacity(tuples.len() * axis.len());
        for tuple in &tuples {
            for &v in axis {
                let mut t = tuple.clone();
                t.push(v);
                next.push(t);
            }
        }
        tuples = next;
    }
    Ok(tuples)
}

fn r_squared(y: &[f64], sse: f64) -> f64 {
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    let sst: f64 = y.iter().map(|&v| (v - mean) * (v - mean)).sum();
    if sst > 0.0 {
        1.0 - sse / sst
    } else if sse.abs() < 1e-12 {
        // A constant series perfectly "fitted" by a constant curve.
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::grid::{shape_grid, tests::test_config};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn exponential_recovers_known_parameters() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&t| 10.0 * (0.3 * t).exp()).collect();

        let config = test_config();
        let grid = shape_grid(ModelKind::Exponential, 19.0, &config).unwrap();
        let fit = fit_model(ModelKind::Exponential, &x, &y, &grid, config.refine_rounds).unwrap();

        assert!((fit.amplitude - 10.0).abs() < 0.1, "amplitude={}", fit.amplitude);
        assert!((fit.shape[0] - 0.3).abs() < 0.01, "rate={}", fit.shape[0]);
        assert!(fit.r_squared > 0.999);
    }

    #[test]
    fn exponential_recovers_parameters_under_noise() {
        // y = 10 * exp(0.3 t) + noise, small noise: recovery within +-10%.
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 1.0).unwrap();

        let x: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&t| 10.0 * (0.3 * t).exp() + noise.sample(&mut rng))
            .collect();

        let config = test_config();
        let grid = shape_grid(ModelKind::Exponential, 24.0, &config).unwrap();
        let fit = fit_model(ModelKind::Exponential, &x, &y, &grid, config.refine_rounds).unwrap();

        assert!((fit.amplitude - 10.0).abs() / 10.0 < 0.1, "amplitude={}", fit.amplitude);
        assert!((fit.shape[0] - 0.3).abs() / 0.3 < 0.1, "rate={}", fit.shape[0]);
    }

    #[test]
    fn logistic_recovers_known_parameters() {
        let x: Vec<f64> = (0..61).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&t| 1000.0 / (1.0 + (-0.2 * (t - 30.0)).exp()))
            .collect();

        let config = test_config();
        let grid = shape_grid(ModelKind::Logistic, 60.0, &config).unwrap();
        let fit = fit_model(ModelKind::Logistic, &x, &y, &grid, config.refine_rounds).unwrap();

        assert!((fit.amplitude - 1000.0).abs() / 1000.0 < 0.05, "plateau={}", fit.amplitude);
        assert!((fit.shape[0] - 0.2).abs() < 0.05, "rate={}", fit.shape[0]);
        assert!((fit.shape[1] - 30.0).abs() < 2.0, "midpoint={}", fit.shape[1]);
        assert!(fit.r_squared > 0.999);
    }

    #[test]
    fn insufficient_observations_is_an_error_not_a_panic() {
        let config = test_config();
        let grid = shape_grid(ModelKind::Logistic, 1.0, &config).unwrap();
        let err = fit_model(ModelKind::Logistic, &[0.0], &[5.0], &grid, 0).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn all_parameters_are_finite_on_awkward_series() {
        // A flat series still produces a finite fit (rate ~ 0).
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![42.0; 10];

        let config = test_config();
        let grid = shape_grid(ModelKind::Exponential, 9.0, &config).unwrap();
        let fit = fit_model(ModelKind::Exponential, &x, &y, &grid, config.refine_rounds).unwrap();
        assert!(fit.amplitude.is_finite());
        assert!(fit.shape.iter().all(|v| v.is_finite()));
        assert!(fit.r_squared.is_finite());
    }
}
