//! Formatted terminal output for the batch stages.
//!
//! We keep formatting code in one place so:
//! - the scraping/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::Source;
use crate::fit::batch::FitRun;

/// Format the summary line block for one scraped source.
pub fn format_scrape_summary(source: Source, n_records: usize, n_regions: usize, path: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== scrape: {} ===\n", source.display_name()));
    out.push_str(&format!("Rows   : {n_records}\n"));
    out.push_str(&format!("Regions: {n_regions}\n"));
    out.push_str(&format!("Written: {}\n", path.display()));
    out
}

/// Format the summary for one fitted source: per-model counts plus the skip
/// tally by reason class.
pub fn format_fit_summary(source: Source, run: &FitRun, path: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== fit: {} ===\n", source.display_name()));

    let mut per_model: BTreeMap<&'static str, usize> = BTreeMap::new();
    for result in &run.results {
        *per_model.entry(result.model.display_name()).or_default() += 1;
    }
    for (model, count) in &per_model {
        out.push_str(&format!("{model:<12} {count} fits\n"));
    }

    out.push_str(&format!("Skipped: {} (region, subset, model) pairs\n", run.skipped.len()));
    out.push_str(&format!("Written: {}\n", path.display()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitResult, FitWindow, ModelKind, Subset};
    use chrono::NaiveDate;
    use std::collections::BTreeMap as ParamMap;

    #[test]
    fn fit_summary_counts_models() {
        let window = FitWindow {
            start_date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 3, 20).unwrap(),
            n_obs: 20,
        };
        let run = FitRun {
            results: vec![
                FitResult {
                    parent_region: "#Global".into(),
                    region: "Italy".into(),
                    subset: Subset::Confirmed,
                    model: ModelKind::Exponential,
                    params: ParamMap::new(),
                    r_squared: 0.99,
                    window: window.clone(),
                },
                FitResult {
                    parent_region: "#Global".into(),
                    region: "Italy".into(),
                    subset: Subset::Confirmed,
                    model: ModelKind::Logistic,
                    params: ParamMap::new(),
                    r_squared: 0.98,
                    window,
                },
            ],
            skipped: vec![],
        };

        let text = format_fit_summary(Source::Jhu, &run, Path::new("data/jhu/fit_results.json"));
        assert!(text.contains("exponential"));
        assert!(text.contains("logistic"));
        assert!(text.contains("Skipped: 0"));
    }
}
