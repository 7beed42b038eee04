//! Regional aggregator feed (funkeinteraktiv).
//!
//! One long-format CSV covering German county-level data plus global entries:
//! `https://funkeinteraktiv.b-cdn.net/history.v4.csv`
//!
//! We keep the English labels (falling back to the German ones) and drop the
//! provider's bookkeeping columns (ids, coordinates, scrape metadata). Rows
//! without a parent label are top-level entries and get `#Global`.

use std::collections::HashMap;

use chrono::NaiveDate;
use csv::StringRecord;
use reqwest::blocking::Client;
use tracing::info;

use crate::domain::{CaseRecord, GLOBAL_PARENT};
use crate::error::AppError;

const HISTORY_URL: &str = "https://funkeinteraktiv.b-cdn.net/history.v4.csv";

/// Fetch and parse the full history feed.
pub fn fetch() -> Result<Vec<CaseRecord>, AppError> {
    info!(url = HISTORY_URL, "fetching funkeinteraktiv history");
    let resp = Client::new()
        .get(HISTORY_URL)
        .send()
        .map_err(|e| AppError::network(format!("funkeinteraktiv request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(AppError::network(format!(
            "funkeinteraktiv request failed with status {}.",
            resp.status()
        )));
    }

    let body = resp
        .text()
        .map_err(|e| AppError::network(format!("Failed to read funkeinteraktiv response: {e}")))?;

    parse_history_csv(&body)
}

/// Parse the provider CSV into raw records (no normalization).
pub fn parse_history_csv(text: &str) -> Result<Vec<CaseRecord>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::parse(format!("Failed to read funkeinteraktiv headers: {e}")))?
        .clone();
    let columns = build_header_map(&headers);

    let col = |name: &str| -> Result<usize, AppError> {
        columns
            .get(name)
            .copied()
            .ok_or_else(|| AppError::parse(format!("funkeinteraktiv: missing column '{name}'.")))
    };

    let date_col = col("date")?;
    let confirmed_col = col("confirmed")?;
    let deaths_col = col("deaths")?;
    let recovered_col = columns.get("recovered").copied();

    // English labels are preferred; older snapshots only carry the German ones.
    let label_col = columns
        .get("label_en")
        .or_else(|| columns.get("label"))
        .copied()
        .ok_or_else(|| AppError::parse("funkeinteraktiv: missing label column."))?;
    let parent_col = columns
        .get("label_parent_en")
        .or_else(|| columns.get("label_parent"))
        .copied();

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result
            .map_err(|e| AppError::parse(format!("funkeinteraktiv: CSV error on line {line}: {e}")))?;

        let date_raw = field(&record, date_col);
        let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
            .map_err(|e| AppError::parse(format!("funkeinteraktiv: invalid date '{date_raw}' on line {line}: {e}")))?;

        let region = field(&record, label_col).to_string();
        if region.is_empty() {
            continue;
        }
        let parent_region = match parent_col.map(|c| field(&record, c)) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => GLOBAL_PARENT.to_string(),
        };

        let recovered = match recovered_col {
            Some(c) => parse_count(field(&record, c), "recovered", line)?,
            None => None,
        };
        records.push(CaseRecord {
            date,
            parent_region,
            region,
            confirmed: parse_count(field(&record, confirmed_col), "confirmed", line)?.unwrap_or(0.0),
            deaths: parse_count(field(&record, deaths_col), "deaths", line)?.unwrap_or(0.0),
            recovered,
            still_infectious: 0.0,
        });
    }

    if records.is_empty() {
        return Err(AppError::parse("funkeinteraktiv: no rows parsed."));
    }
    Ok(records)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
        .collect()
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

/// An empty cell means "not reported"; anything else must be a finite number.
/// Unparseable cells are a schema error, not a zero.
fn parse_count(raw: &str, name: &str, line: usize) -> Result<Option<f64>, AppError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let v = raw.parse::<f64>().map_err(|e| {
        AppError::parse(format!(
            "funkeinteraktiv: invalid {name} count '{raw}' on line {line}: {e}"
        ))
    })?;
    if v.is_finite() {
        Ok(Some(v))
    } else {
        Err(AppError::parse(format!(
            "funkeinteraktiv: non-finite {name} count '{raw}' on line {line}."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
id,parent,label,label_parent,label_en,label_parent_en,lon,lat,date,confirmed,recovered,deaths
1,,Deutschland,,Germany,,10.0,51.0,2020-03-10,1296,18,2
2,1,Berlin,Deutschland,Berlin,Germany,13.4,52.5,2020-03-10,48,0,0
3,,Italien,,Italy,,12.5,41.9,2020-03-10,10149,724,631
";

    #[test]
    fn parses_english_labels_and_global_parent() {
        let records = parse_history_csv(SAMPLE).unwrap();
        assert_eq!(records.len(), 3);

        let germany = &records[0];
        assert_eq!(germany.region, "Germany");
        assert_eq!(germany.parent_region, GLOBAL_PARENT);
        assert_eq!(germany.confirmed, 1296.0);
        assert_eq!(germany.recovered, Some(18.0));
        assert_eq!(germany.deaths, 2.0);

        let berlin = &records[1];
        assert_eq!(berlin.region, "Berlin");
        assert_eq!(berlin.parent_region, "Germany");
    }

    #[test]
    fn missing_required_column_is_a_schema_error() {
        let err = parse_history_csv("label,label_parent\nGermany,\n").unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn unparseable_count_is_a_schema_error_with_line_number() {
        let text = "date,label_en,label_parent_en,confirmed,deaths\n2020-03-10,Germany,,n/a,0\n";
        let err = parse_history_csv(text).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("line 2"), "{err}");
        assert!(err.to_string().contains("confirmed"), "{err}");
    }

    #[test]
    fn bad_date_reports_line_number() {
        let text = "date,label_en,label_parent_en,confirmed,deaths\nnot-a-date,Germany,,1,0\n";
        let err = parse_history_csv(text).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
