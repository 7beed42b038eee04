//! The scrape and fit pipelines.
//!
//! Both stages iterate over the configured sources. Scrape failures are
//! isolated per source: a dead upstream must not stop the other sources from
//! refreshing, but the run still exits non-zero so schedulers notice.

use std::collections::BTreeSet;

use tracing::error;

use crate::data;
use crate::domain::{FitConfig, FitFile, ScrapeConfig, Source};
use crate::error::AppError;
use crate::fit::batch::fit_dataset;
use crate::io::dataset::{dataset_path, read_dataset, write_dataset};
use crate::io::fits::{fits_path, write_fit_file};
use crate::report;

/// Fetch, normalize and persist every configured source.
pub fn run_scrape(config: &ScrapeConfig) -> Result<(), AppError> {
    let mut failed = Vec::new();
    for &source in &config.sources {
        match scrape_source(source, config) {
            Ok(summary) => println!("{summary}"),
            Err(e) => {
                error!(source = source.display_name(), %e, "scrape failed");
                failed.push(source);
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        let names: Vec<&str> = failed.iter().map(|s| s.display_name()).collect();
        Err(AppError::network(format!(
            "{} of {} sources failed to scrape: {}.",
            failed.len(),
            config.sources.len(),
            names.join(", ")
        )))
    }
}

fn scrape_source(source: Source, config: &ScrapeConfig) -> Result<String, AppError> {
    let raw = data::fetch_source(source)?;
    let records = data::normalize(raw);

    let path = dataset_path(&config.data_dir, source);
    write_dataset(&path, &records)?;

    let regions: BTreeSet<(&str, &str)> = records
        .iter()
        .map(|r| (r.parent_region.as_str(), r.region.as_str()))
        .collect();
    Ok(report::format_scrape_summary(
        source,
        records.len(),
        regions.len(),
        &path,
    ))
}

/// Fit the configured models to every scraped dataset and persist the results.
///
/// Individual (region, subset, model) failures are recorded inside the fit
/// file; only an unreadable dataset fails the stage.
pub fn run_fit(config: &FitConfig) -> Result<(), AppError> {
    for &source in &config.sources {
        let records = read_dataset(&dataset_path(&config.data_dir, source))?;
        let run = fit_dataset(&records, config);

        let path = fits_path(&config.data_dir, source);
        let fit_file = FitFile {
            tool: "covid".to_string(),
            source,
            results: run.results.clone(),
            skipped: run.skipped.clone(),
        };
        write_fit_file(&path, &fit_file)?;

        println!("{}", report::format_fit_summary(source, &run, &path));
    }
    Ok(())
}
