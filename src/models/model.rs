//! Model evaluation for the exponential and logistic growth curves.
//!
//! The fitter relies on two primitive operations:
//! - evaluate the basis function for a given day and shape parameters
//!   (the amplitude is then solved linearly)
//! - predict y(t) given amplitude and shape parameters (for residuals,
//!   goodness-of-fit, and dashboard overlays)
//!
//! Shape parameter layout:
//! - exponential: `[rate]`
//! - logistic: `[rate, midpoint]`

use std::collections::BTreeMap;

use crate::domain::ModelKind;

/// Evaluate the model basis at day `t` for the given shape parameters.
///
/// `predict(model, t, a, shape) == a * basis(model, t, shape)`.
///
/// # Panics
/// Panics if `shape` does not have length `model.shape_len()`. Callers should
/// size the slice correctly.
pub fn basis(model: ModelKind, t: f64, shape: &[f64]) -> f64 {
    match model {
        ModelKind::Exponential => (shape[0] * t).exp(),
        ModelKind::Logistic => 1.0 / (1.0 + (-shape[0] * (t - shape[1])).exp()),
    }
}

/// Predict `y(t)` for the given model kind.
pub fn predict(model: ModelKind, t: f64, amplitude: f64, shape: &[f64]) -> f64 {
    amplitude * basis(model, t, shape)
}

/// Predict `y(t)` from a named parameter map, as stored in a `FitResult`.
///
/// Returns `None` when a parameter is missing, so a stale or foreign fit file
/// degrades to "no overlay" instead of a panic.
pub fn predict_params(model: ModelKind, t: f64, params: &BTreeMap<String, f64>) -> Option<f64> {
    let get = |name: &str| params.get(name).copied();
    match model {
        ModelKind::Exponential => {
            let amplitude = get("amplitude")?;
            let rate = get("rate")?;
            Some(predict(model, t, amplitude, &[rate]))
        }
        ModelKind::Logistic => {
            let plateau = get("plateau")?;
            let rate = get("rate")?;
            let midpoint = get("midpoint")?;
            Some(predict(model, t, plateau, &[rate, midpoint]))
        }
    }
}
