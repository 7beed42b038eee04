//! Read/write the normalized per-source dataset CSV.
//!
//! Layout: `<data_dir>/<source>/covid19_infections.csv` with the uniform
//! schema columns. The scraper owns writes; the fit stage and the dashboard
//! only read.
//!
//! Writes go to a temp file in the same directory and are renamed into place,
//! so a failed scrape never leaves a half-written dataset behind.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{CaseRecord, Source};
use crate::error::AppError;

const DATASET_FILE: &str = "covid19_infections.csv";

const COLUMNS: [&str; 7] = [
    "date",
    "parent_region",
    "region",
    "confirmed",
    "deaths",
    "recovered",
    "still_infectious",
];

/// Path of the normalized dataset for a source.
pub fn dataset_path(data_dir: &Path, source: Source) -> PathBuf {
    data_dir.join(source.dir_name()).join(DATASET_FILE)
}

/// Write the full dataset, replacing any previous file atomically.
pub fn write_dataset(path: &Path, records: &[CaseRecord]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", parent.display())))?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    let file = File::create(&tmp_path)
        .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", tmp_path.display())))?;

    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(COLUMNS)
        .map_err(|e| AppError::config(format!("Failed to write dataset header: {e}")))?;

    for record in records {
        writer
            .write_record(&[
                record.date.to_string(),
                record.parent_region.clone(),
                record.region.clone(),
                format_count(record.confirmed),
                format_count(record.deaths),
                record.recovered.map(format_count).unwrap_or_default(),
                format_count(record.still_infectious),
            ])
            .map_err(|e| AppError::config(format!("Failed to write dataset row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::config(format!("Failed to flush dataset: {e}")))?;
    drop(writer);

    fs::rename(&tmp_path, path)
        .map_err(|e| AppError::config(format!("Failed to replace '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a dataset previously written by `write_dataset`.
pub fn read_dataset(path: &Path) -> Result<Vec<CaseRecord>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open dataset '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::config(format!("Failed to read dataset headers: {e}")))?
        .clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();

    let col = |name: &str| -> Result<usize, AppError> {
        columns
            .get(name)
            .copied()
            .ok_or_else(|| AppError::config(format!("Dataset '{}' is missing column '{name}'.", path.display())))
    };

    let date_col = col("date")?;
    let parent_col = col("parent_region")?;
    let region_col = col("region")?;
    let confirmed_col = col("confirmed")?;
    let deaths_col = col("deaths")?;
    let recovered_col = col("recovered")?;
    let infectious_col = col("still_infectious")?;

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::config(format!("Dataset CSV error on line {line}: {e}")))?;

        let date_raw = field(&record, date_col);
        let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
            .map_err(|e| AppError::config(format!("Invalid dataset date '{date_raw}' on line {line}: {e}")))?;

        records.push(CaseRecord {
            date,
            parent_region: field(&record, parent_col).to_string(),
            region: field(&record, region_col).to_string(),
            confirmed: parse_field(&record, confirmed_col, line)?,
            deaths: parse_field(&record, deaths_col, line)?,
            recovered: {
                let raw = field(&record, recovered_col);
                if raw.is_empty() {
                    None
                } else {
                    Some(parse_field(&record, recovered_col, line)?)
                }
            },
            still_infectious: parse_field(&record, infectious_col, line)?,
        });
    }

    Ok(records)
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

fn parse_field(record: &StringRecord, idx: usize, line: usize) -> Result<f64, AppError> {
    let raw = field(record, idx);
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .map_err(|e| AppError::config(format!("Invalid dataset number '{raw}' on line {line}: {e}")))
}

/// Counts are written without a fractional part when integral, so files stay
/// stable across write/read/write cycles.
fn format_count(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
