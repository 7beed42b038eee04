//! Batch fitting across all regions of a normalized dataset.
//!
//! Failures are isolated per (region, subset, model) pair: a series that is
//! too short, all-zero, or that produces no valid grid candidate is recorded
//! in `skipped` and the run continues. Only reading the dataset itself can
//! fail the fit stage.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{CaseRecord, FitConfig, FitResult, FitWindow, SkippedFit, Subset};
use crate::fit::fitter::fit_model;
use crate::fit::grid::shape_grid;
use crate::fit::window::select_window;

/// All fits and skips of one fit-stage run over one dataset.
#[derive(Debug, Clone, Default)]
pub struct FitRun {
    pub results: Vec<FitResult>,
    pub skipped: Vec<SkippedFit>,
}

/// Fit every configured model to every region and subset of the dataset.
pub fn fit_dataset(records: &[CaseRecord], config: &FitConfig) -> FitRun {
    // Group rows per region. BTreeMap gives a deterministic (parent, region)
    // output order; rows within a region stay date-ascending because the
    // dataset is sorted by (date, parent_region, region).
    let mut regions: BTreeMap<(String, String), Vec<&CaseRecord>> = BTreeMap::new();
    for record in records {
        regions
            .entry((record.parent_region.clone(), record.region.clone()))
            .or_default()
            .push(record);
    }

    let mut run = FitRun::default();
    for ((parent_region, region), rows) in &regions {
        debug!(parent_region, region, "fitting region");
        for subset in Subset::ALL {
            let series: Vec<(NaiveDate, f64)> = rows
                .iter()
                .filter_map(|r| r.value(subset).map(|v| (r.date, v)))
                .collect();

            for &model in &config.models {
                match fit_series(&series, model, config) {
                    Ok(Some((params, r_squared, window))) => run.results.push(FitResult {
                        parent_region: parent_region.clone(),
                        region: region.clone(),
                        subset,
                        model,
                        params,
                        r_squared,
                        window,
                    }),
                    Ok(None) => run.skipped.push(SkippedFit {
                        parent_region: parent_region.clone(),
                        region: region.clone(),
                        subset,
                        model,
                        reason: skip_reason(&series, model, config),
                    }),
                    Err(e) => run.skipped.push(SkippedFit {
                        parent_region: parent_region.clone(),
                        region: region.clone(),
                        subset,
                        model,
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }
    run
}

type FitOutcome = (BTreeMap<String, f64>, f64, FitWindow);

/// Fit one model to one region's subset series.
///
/// `Ok(None)` means "skipped by policy" (insufficient data after windowing);
/// `Err` means the optimizer itself found no valid candidate. Both are
/// non-fatal to the batch.
fn fit_series(
    series: &[(NaiveDate, f64)],
    model: crate::domain::ModelKind,
    config: &FitConfig,
) -> Result<Option<FitOutcome>, crate::error::AppError> {
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let window = select_window(&values, config.min_count, config.trailing);
    let windowed = &series[window];

    if windowed.len() < model.param_count() {
        return Ok(None);
    }

    // Day offsets relative to the first windowed observation. Using calendar
    // days (not row indices) keeps the stored parameters reproducible by the
    // dashboard, which only knows the window dates.
    let start_date = windowed[0].0;
    let x: Vec<f64> = windowed
        .iter()
        .map(|(d, _)| (*d - start_date).num_days() as f64)
        .collect();
    let y: Vec<f64> = windowed.iter().map(|(_, v)| *v).collect();

    let grid = shape_grid(model, *x.last().unwrap_or(&1.0), config)?;
    let fit = fit_model(model, &x, &y, &grid, config.refine_rounds)?;

    let mut params = BTreeMap::new();
    for (name, value) in model
        .param_names()
        .iter()
        .zip(std::iter::once(fit.amplitude).chain(fit.shape.iter().copied()))
    {
        if !value.is_finite() {
            return Err(crate::error::AppError::fit("Non-finite fitted parameter."));
        }
        params.insert((*name).to_string(), value);
    }

    let window = FitWindow {
        start_date,
        end_date: windowed[windowed.len() - 1].0,
        n_obs: windowed.len(),
    };
    Ok(Some((params, fit.r_squared, window)))
}

fn skip_reason(
    series: &[(NaiveDate, f64)],
    model: crate::domain::ModelKind,
    config: &FitConfig,
) -> String {
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let window = select_window(&values, config.min_count, config.trailing);
    format!(
        "insufficient observations after windowing (n={}, need {})",
        window.len(),
        model.param_count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::fit::grid::tests::test_config;
    use chrono::NaiveDate;

    fn record(date: NaiveDate, region: &str, confirmed: f64) -> CaseRecord {
        CaseRecord {
            date,
            parent_region: "#Global".to_string(),
            region: region.to_string(),
            confirmed,
            deaths: 0.0,
            recovered: None,
            still_infectious: confirmed,
        }
    }

    fn day(i: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 1).unwrap() + chrono::Days::new(i as u64)
    }

    #[test]
    fn single_observation_region_is_skipped_without_aborting_others() {
        let mut records = vec![record(day(0), "Tinyland", 50.0)];
        for i in 0..30 {
            records.push(record(day(i), "Growland", 10.0 * (0.2 * i as f64).exp()));
        }

        let config = test_config();
        let run = fit_dataset(&records, &config);

        // Growland confirmed gets both model fits.
        assert!(
            run.results
                .iter()
                .any(|r| r.region == "Growland" && r.model == ModelKind::Exponential)
        );

        // Tinyland produces skips, not aborts.
        let tiny_skips: Vec<_> = run.skipped.iter().filter(|s| s.region == "Tinyland").collect();
        assert!(!tiny_skips.is_empty());
        assert!(
            run.results.iter().all(|r| r.region != "Tinyland"),
            "one observation must never produce a fit result"
        );
    }

    #[test]
    fn exponential_fit_on_synthetic_region_recovers_rate() {
        let records: Vec<CaseRecord> = (0..25)
            .map(|i| record(day(i), "Growland", 10.0 * (0.3 * i as f64).exp()))
            .collect();

        let mut config = test_config();
        config.models = vec![ModelKind::Exponential];
        let run = fit_dataset(&records, &config);

        let fit = run
            .results
            .iter()
            .find(|r| r.subset == Subset::Confirmed)
            .expect("confirmed fit");
        let rate = fit.params["rate"];
        let amplitude = fit.params["amplitude"];
        assert!((rate - 0.3).abs() / 0.3 < 0.1, "rate={rate}");
        assert!((amplitude - 10.0).abs() / 10.0 < 0.1, "amplitude={amplitude}");
        assert_eq!(fit.window.n_obs, 25);
    }

    #[test]
    fn leading_zeros_shrink_the_fit_window() {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(record(day(i), "Lateland", 0.0));
        }
        for i in 5..30 {
            records.push(record(day(i), "Lateland", 5.0 * (0.2 * (i - 5) as f64).exp()));
        }

        let mut config = test_config();
        config.models = vec![ModelKind::Exponential];
        let run = fit_dataset(&records, &config);

        let fit = run
            .results
            .iter()
            .find(|r| r.subset == Subset::Confirmed)
            .expect("confirmed fit");
        assert_eq!(fit.window.start_date, day(5));
        assert_eq!(fit.window.n_obs, 25);
    }

    #[test]
    fn missing_recovered_subset_is_recorded_as_skipped() {
        let records: Vec<CaseRecord> = (0..20)
            .map(|i| record(day(i), "Growland", 10.0 * (0.2 * i as f64).exp()))
            .collect();

        let mut config = test_config();
        config.models = vec![ModelKind::Exponential];
        let run = fit_dataset(&records, &config);

        assert!(
            run.skipped
                .iter()
                .any(|s| s.subset == Subset::Recovered && s.region == "Growland")
        );
    }
}
