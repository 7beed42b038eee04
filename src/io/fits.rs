//! Read/write the per-source fit-results JSON.
//!
//! The fit file is the "portable" representation of a fit run:
//! - fitted parameters per (region, subset, model)
//! - goodness-of-fit and the fit window
//! - every skipped pair and why
//!
//! The schema is defined by `domain::FitFile`. Latest run replaces the file;
//! no history is kept.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::domain::{FitFile, Source};
use crate::error::AppError;

const FITS_FILE: &str = "fit_results.json";

/// Path of the fit-results artifact for a source.
pub fn fits_path(data_dir: &Path, source: Source) -> PathBuf {
    data_dir.join(source.dir_name()).join(FITS_FILE)
}

/// Write a fit file, replacing any previous one atomically.
pub fn write_fit_file(path: &Path, fit_file: &FitFile) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", parent.display())))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let file = File::create(&tmp_path)
        .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", tmp_path.display())))?;

    serde_json::to_writer_pretty(file, fit_file)
        .map_err(|e| AppError::config(format!("Failed to write fit JSON: {e}")))?;

    fs::rename(&tmp_path, path)
        .map_err(|e| AppError::config(format!("Failed to replace '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a fit file previously written by `write_fit_file`.
pub fn read_fit_file(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit_file: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::config(format!("Invalid fit JSON: {e}")))?;
    Ok(fit_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitResult, FitWindow, ModelKind, SkippedFit, Subset};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn sample_fit_file() -> FitFile {
        let mut params = BTreeMap::new();
        params.insert("amplitude".to_string(), 9.8);
        params.insert("rate".to_string(), 0.31);

        FitFile {
            tool: "covid".to_string(),
            source: Source::Jhu,
            results: vec![FitResult {
                parent_region: "#Global".to_string(),
                region: "Italy".to_string(),
                subset: Subset::Confirmed,
                model: ModelKind::Exponential,
                params,
                r_squared: 0.997,
                window: FitWindow {
                    start_date: NaiveDate::from_ymd_opt(2020, 2, 21).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(2020, 3, 20).unwrap(),
                    n_obs: 29,
                },
            }],
            skipped: vec![SkippedFit {
                parent_region: "#Global".to_string(),
                region: "Tinyland".to_string(),
                subset: Subset::Deaths,
                model: ModelKind::Logistic,
                reason: "insufficient observations after windowing (n=1, need 3)".to_string(),
            }],
        }
    }

    #[test]
    fn round_trips_fit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = fits_path(dir.path(), Source::Jhu);

        let fit_file = sample_fit_file();
        write_fit_file(&path, &fit_file).unwrap();
        let read_back = read_fit_file(&path).unwrap();

        assert_eq!(read_back.results, fit_file.results);
        assert_eq!(read_back.skipped, fit_file.skipped);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
