//! Upstream data sources and normalization into the uniform schema.
//!
//! Each source module turns its provider-native payload into `CaseRecord`s;
//! the shared normalization steps here (country totals, derived columns,
//! deterministic ordering) run identically for every source so downstream
//! stages never see provider quirks.

pub mod funke;
pub mod jhu;

use crate::domain::{CaseRecord, GLOBAL_PARENT, Source};
use crate::error::AppError;

/// Fetch and parse one source into raw (pre-normalization) records.
pub fn fetch_source(source: Source) -> Result<Vec<CaseRecord>, AppError> {
    match source {
        Source::Funkeinteraktiv => funke::fetch(),
        Source::Jhu => jhu::fetch(),
    }
}

/// Apply the shared normalization steps, in order:
///
/// 1. append per-country totals for countries only present as subdivisions
/// 2. derive `still_infectious`
/// 3. sort by `(date, parent_region, region)`
///
/// The sort makes repeat scrapes of unchanged upstream data byte-identical
/// when written, which the fit stage and tests rely on.
pub fn normalize(mut records: Vec<CaseRecord>) -> Vec<CaseRecord> {
    append_country_totals(&mut records);
    compute_still_infectious(&mut records);
    sort_records(&mut records);
    records
}

/// For each (parent, date) group below the global level, append a synthetic
/// `"<parent> (total)"` region at the global level holding the group sums.
///
/// This mirrors how countries reported only as subdivisions (e.g. German
/// counties) still get a selectable country-level series.
fn append_country_totals(records: &mut Vec<CaseRecord>) {
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Totals {
        confirmed: f64,
        deaths: f64,
        recovered: Option<f64>,
    }

    let mut totals: BTreeMap<(String, chrono::NaiveDate), Totals> = BTreeMap::new();
    for record in records.iter() {
        if record.parent_region == GLOBAL_PARENT {
            continue;
        }
        let entry = totals
            .entry((record.parent_region.clone(), record.date))
            .or_default();
        entry.confirmed += record.confirmed;
        entry.deaths += record.deaths;
        if let Some(r) = record.recovered {
            *entry.recovered.get_or_insert(0.0) += r;
        }
    }

    for ((parent, date), sum) in totals {
        records.push(CaseRecord {
            date,
            parent_region: GLOBAL_PARENT.to_string(),
            region: format!("{parent} (total)"),
            confirmed: sum.confirmed,
            deaths: sum.deaths,
            recovered: sum.recovered,
            still_infectious: 0.0,
        });
    }
}

/// `still_infectious = confirmed - recovered - deaths` (recovered counts as 0
/// when the source does not report it).
fn compute_still_infectious(records: &mut [CaseRecord]) {
    for record in records {
        record.still_infectious =
            record.confirmed - record.recovered.unwrap_or(0.0) - record.deaths;
    }
}

fn sort_records(records: &mut [CaseRecord]) {
    records.sort_by(|a, b| {
        (a.date, &a.parent_region, &a.region).cmp(&(b.date, &b.parent_region, &b.region))
    });
}
