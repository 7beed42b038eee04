//! Johns Hopkins University (CSSE) global time-series repository.
//!
//! Three wide CSVs (one per metric) with one column per date:
//! `https://github.com/CSSEGISandData/COVID-19`
//!
//! Each wide table is melted into long form, then the three metrics are
//! joined on `(date, parent_region, region)`. Country rows without a
//! `Province/State` become top-level regions under `#Global`, matching the
//! uniform schema.

use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::info;

use crate::domain::{CaseRecord, GLOBAL_PARENT};
use crate::error::AppError;

const BASE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

/// One melted observation from a single metric table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetRow {
    pub date: NaiveDate,
    pub parent_region: String,
    pub region: String,
    pub value: f64,
}

/// Fetch all three metric tables and join them into raw records.
pub fn fetch() -> Result<Vec<CaseRecord>, AppError> {
    let confirmed = fetch_subset("confirmed")?;
    let deaths = fetch_subset("deaths")?;
    let recovered = fetch_subset("recovered")?;
    Ok(merge_subsets(confirmed, deaths, recovered))
}

fn fetch_subset(subset: &str) -> Result<Vec<SubsetRow>, AppError> {
    let url = format!("{BASE_URL}/time_series_covid19_{subset}_global.csv");
    info!(url, "fetching JHU subset");

    let resp = Client::new()
        .get(&url)
        .send()
        .map_err(|e| AppError::network(format!("JHU {subset} request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(AppError::network(format!(
            "JHU {subset} request failed with status {}.",
            resp.status()
        )));
    }

    let body = resp
        .text()
        .map_err(|e| AppError::network(format!("Failed to read JHU {subset} response: {e}")))?;

    parse_subset_csv(&body, subset)
}

/// Melt one wide metric table into long-form rows.
pub fn parse_subset_csv(text: &str, subset: &str) -> Result<Vec<SubsetRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::parse(format!("Failed to read JHU {subset} headers: {e}")))?
        .clone();

    let mut province_col = None;
    let mut country_col = None;
    // (column index, date) pairs for the wide date columns.
    let mut date_cols = Vec::new();
    for (i, header) in headers.iter().enumerate() {
        match header.trim() {
            "Province/State" => province_col = Some(i),
            "Country/Region" => country_col = Some(i),
            "Lat" | "Long" => {}
            other => {
                if let Ok(date) = NaiveDate::parse_from_str(other, "%m/%d/%y") {
                    date_cols.push((i, date));
                }
            }
        }
    }

    let province_col = province_col
        .ok_or_else(|| AppError::parse(format!("JHU {subset}: missing Province/State column.")))?;
    let country_col = country_col
        .ok_or_else(|| AppError::parse(format!("JHU {subset}: missing Country/Region column.")))?;
    if date_cols.is_empty() {
        return Err(AppError::parse(format!("JHU {subset}: no date columns found.")));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::parse(format!("JHU {subset}: CSV error on line {line}: {e}")))?;

        let province = record.get(province_col).unwrap_or("").trim();
        let country = record.get(country_col).unwrap_or("").trim();
        if country.is_empty() {
            continue;
        }

        // Countries without subdivisions are top-level regions.
        let (region, parent_region) = if province.is_empty() {
            (country.to_string(), GLOBAL_PARENT.to_string())
        } else {
            (province.to_string(), country.to_string())
        };

        for &(col, date) in &date_cols {
            // Empty cells mean "not reported yet"; anything else must parse,
            // so an upstream schema change fails the source loudly.
            let raw = record.get(col).unwrap_or("").trim();
            let value = if raw.is_empty() {
                0.0
            } else {
                raw.parse::<f64>().map_err(|e| {
                    AppError::parse(format!(
                        "JHU {subset}: invalid count '{raw}' on line {line} ({date}): {e}"
                    ))
                })?
            };
            rows.push(SubsetRow {
                date,
                parent_region: parent_region.clone(),
                region: region.clone(),
                value,
            });
        }
    }

    if rows.is_empty() {
        return Err(AppError::parse(format!("JHU {subset}: no rows parsed.")));
    }
    Ok(rows)
}

/// Join the three melted metric tables on `(date, parent_region, region)`.
///
/// Confirmed and deaths must both be present for a row to survive (inner
/// join); recovered is attached when available.
pub fn merge_subsets(
    confirmed: Vec<SubsetRow>,
    deaths: Vec<SubsetRow>,
    recovered: Vec<SubsetRow>,
) -> Vec<CaseRecord> {
    type Key = (NaiveDate, String, String);
    let key = |r: &SubsetRow| (r.date, r.parent_region.clone(), r.region.clone());

    let deaths_map: HashMap<Key, f64> = deaths.iter().map(|r| (key(r), r.value)).collect();
    let recovered_map: HashMap<Key, f64> = recovered.iter().map(|r| (key(r), r.value)).collect();

    let mut records = Vec::with_capacity(confirmed.len());
    for row in confirmed {
        let k = (row.date, row.parent_region.clone(), row.region.clone());
        let Some(&death_count) = deaths_map.get(&k) else {
            continue;
        };
        records.push(CaseRecord {
            date: row.date,
            parent_region: row.parent_region,
            region: row.region,
            confirmed: row.value,
            deaths: death_count,
            recovered: recovered_map.get(&k).copied(),
            still_infectious: 0.0,
        });
    }
    records
}
