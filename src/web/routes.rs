//! JSON API and page routes for the dashboard.
//!
//! Every endpoint reads the on-disk artifacts fresh. Missing fit results are
//! omitted from responses rather than erroring, so the chart degrades to
//! observed data only.

use std::collections::BTreeSet;

use actix_web::{HttpResponse, web};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{CaseRecord, FitWindow, GLOBAL_PARENT, ModelKind, Source, Subset};
use crate::io::dataset::{dataset_path, read_dataset};
use crate::io::fits::{fits_path, read_fit_file};
use crate::models::predict_params;
use crate::web::{ApiError, AppState};

const INDEX_HTML: &str = include_str!("index.html");

/// Days of model extrapolation past the last observation when the client does
/// not ask for a specific horizon.
const DEFAULT_HORIZON_DAYS: u64 = 30;

/// Upper bound on the requested horizon. Keeps a hostile or fat-fingered
/// query from allocating unbounded date vectors or overflowing date math.
const MAX_HORIZON_DAYS: u64 = 365;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/api/sources").route(web::get().to(list_sources)))
        .service(web::resource("/api/regions").route(web::get().to(list_regions)))
        .service(web::resource("/api/series").route(web::get().to(series)))
        .service(web::resource("/download_data").route(web::get().to(download_data)));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

#[derive(Serialize)]
struct SourceInfo {
    id: Source,
    label: &'static str,
}

/// Sources that have a scraped dataset on disk.
async fn list_sources(state: web::Data<AppState>) -> web::Json<Vec<SourceInfo>> {
    let sources = Source::ALL
        .into_iter()
        .filter(|s| dataset_path(&state.data_dir, *s).exists())
        .map(|s| SourceInfo {
            id: s,
            label: s.display_name(),
        })
        .collect();
    web::Json(sources)
}

#[derive(Deserialize)]
struct SourceQuery {
    source: Source,
}

#[derive(Serialize, PartialEq, Eq, PartialOrd, Ord)]
struct RegionInfo {
    parent_region: String,
    region: String,
}

/// Sorted unique (parent_region, region) pairs of a source's dataset.
async fn list_regions(
    state: web::Data<AppState>,
    query: web::Query<SourceQuery>,
) -> Result<web::Json<Vec<RegionInfo>>, ApiError> {
    let records = load_dataset(&state, query.source)?;
    let regions: BTreeSet<RegionInfo> = records
        .iter()
        .map(|r| RegionInfo {
            parent_region: r.parent_region.clone(),
            region: r.region.clone(),
        })
        .collect();
    Ok(web::Json(regions.into_iter().collect()))
}

#[derive(Deserialize)]
struct SeriesQuery {
    source: Source,
    region: String,
    parent_region: Option<String>,
    subset: Option<Subset>,
    /// Comma-separated model names; unknown names are ignored.
    models: Option<String>,
    horizon: Option<u64>,
}

#[derive(Serialize)]
struct SeriesResponse {
    source: Source,
    parent_region: String,
    region: String,
    subset: Subset,
    dates: Vec<NaiveDate>,
    observed: Vec<Option<f64>>,
    overlays: Vec<Overlay>,
}

#[derive(Serialize)]
struct Overlay {
    model: ModelKind,
    r_squared: f64,
    window: FitWindow,
    values: Vec<Option<f64>>,
}

/// Observed series for one region plus one overlay per requested model with a
/// stored fit. The date axis extends `horizon` days past the last observation
/// so the overlays show the near-term trend.
async fn series(
    state: web::Data<AppState>,
    query: web::Query<SeriesQuery>,
) -> Result<web::Json<SeriesResponse>, ApiError> {
    let records = load_dataset(&state, query.source)?;
    let subset = query.subset.unwrap_or(Subset::Confirmed);
    let horizon = query
        .horizon
        .unwrap_or(DEFAULT_HORIZON_DAYS)
        .min(MAX_HORIZON_DAYS);
    let models = parse_models(query.models.as_deref());

    let mut rows: Vec<&CaseRecord> = records
        .iter()
        .filter(|r| r.region == query.region)
        .filter(|r| match &query.parent_region {
            Some(parent) => &r.parent_region == parent,
            None => r.parent_region == GLOBAL_PARENT,
        })
        .collect();
    rows.sort_by_key(|r| r.date);
    if rows.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No data for region '{}' in source '{}'.",
            query.region,
            query.source.display_name()
        )));
    }
    let parent_region = rows[0].parent_region.clone();

    let last_date = rows[rows.len() - 1].date;
    let mut dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
    for offset in 1..=horizon {
        dates.push(last_date + Days::new(offset));
    }

    let mut observed: Vec<Option<f64>> = rows.iter().map(|r| r.value(subset)).collect();
    observed.resize(dates.len(), None);

    let overlays = match read_fit_file(&fits_path(&state.data_dir, query.source)) {
        Ok(fit_file) => models
            .iter()
            .filter_map(|&model| {
                let fit = fit_file.results.iter().find(|f| {
                    f.parent_region == parent_region
                        && f.region == query.region
                        && f.subset == subset
                        && f.model == model
                })?;
                let values = dates
                    .iter()
                    .map(|&date| {
                        if date < fit.window.start_date {
                            return None;
                        }
                        let t = (date - fit.window.start_date).num_days() as f64;
                        predict_params(model, t, &fit.params)
                    })
                    .collect();
                Some(Overlay {
                    model,
                    r_squared: fit.r_squared,
                    window: fit.window.clone(),
                    values,
                })
            })
            .collect(),
        // No fit stage run yet for this source: observed data only.
        Err(_) => Vec::new(),
    };

    Ok(web::Json(SeriesResponse {
        source: query.source,
        parent_region,
        region: query.region.clone(),
        subset,
        dates,
        observed,
        overlays,
    }))
}

#[derive(Deserialize)]
struct DownloadQuery {
    source: Source,
    format: Option<String>,
}

/// The normalized dataset of a source as a CSV file download.
async fn download_data(
    state: web::Data<AppState>,
    query: web::Query<DownloadQuery>,
) -> Result<HttpResponse, ApiError> {
    let format = query.format.as_deref().unwrap_or("csv");
    if format != "csv" {
        return Err(ApiError::BadRequest(format!(
            "Unsupported download format '{format}'; only 'csv' is available."
        )));
    }

    let path = dataset_path(&state.data_dir, query.source);
    let bytes = std::fs::read(&path).map_err(|_| {
        ApiError::NotFound(format!(
            "No dataset for source '{}'; run the scrape stage first.",
            query.source.display_name()
        ))
    })?;

    let filename = format!("covid19_infections_{}.csv", query.source.dir_name());
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(bytes))
}

fn load_dataset(state: &AppState, source: Source) -> Result<Vec<CaseRecord>, ApiError> {
    read_dataset(&dataset_path(&state.data_dir, source)).map_err(|_| {
        ApiError::NotFound(format!(
            "No dataset for source '{}'; run the scrape stage first.",
            source.display_name()
        ))
    })
}

/// Parse the `models=` list. An absent or empty parameter means all models;
/// unknown names are dropped, so the client can disable every overlay.
fn parse_models(raw: Option<&str>) -> Vec<ModelKind> {
    match raw {
        None => vec![ModelKind::Exponential, ModelKind::Logistic],
        Some(raw) if raw.trim().is_empty() => vec![ModelKind::Exponential, ModelKind::Logistic],
        Some(raw) => raw
            .split(',')
            .filter_map(|name| match name.trim() {
                "exponential" => Some(ModelKind::Exponential),
                "logistic" => Some(ModelKind::Logistic),
                _ => None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitFile, FitResult};
    use crate::io::dataset::write_dataset;
    use crate::io::fits::write_fit_file;
    use actix_web::App;
    use std::collections::BTreeMap;

    fn day(i: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 1).unwrap() + Days::new(i as u64)
    }

    fn seed_artifacts(data_dir: &std::path::Path) {
        let records: Vec<CaseRecord> = (0..10)
            .map(|i| CaseRecord {
                date: day(i),
                parent_region: GLOBAL_PARENT.to_string(),
                region: "Italy".to_string(),
                confirmed: 10.0 * (0.3 * i as f64).exp(),
                deaths: 1.0,
                recovered: None,
                still_infectious: 9.0,
            })
            .collect();
        write_dataset(&dataset_path(data_dir, Source::Jhu), &records).unwrap();

        let mut params = BTreeMap::new();
        params.insert("amplitude".to_string(), 10.0);
        params.insert("rate".to_string(), 0.3);
        let fit_file = FitFile {
            tool: "covid".to_string(),
            source: Source::Jhu,
            results: vec![FitResult {
                parent_region: GLOBAL_PARENT.to_string(),
                region: "Italy".to_string(),
                subset: Subset::Confirmed,
                model: ModelKind::Exponential,
                params,
                r_squared: 1.0,
                window: FitWindow {
                    start_date: day(0),
                    end_date: day(9),
                    n_obs: 10,
                },
            }],
            skipped: vec![],
        };
        write_fit_file(&fits_path(data_dir, Source::Jhu), &fit_file).unwrap();
    }

    #[actix_web::test]
    async fn regions_endpoint_lists_unique_pairs() {
        let dir = tempfile::tempdir().unwrap();
        seed_artifacts(dir.path());

        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(AppState {
                    data_dir: dir.path().to_path_buf(),
                }))
                .configure(config),
        )
        .await;

        let req = actix_web::test::TestRequest::get()
            .uri("/api/regions?source=jhu")
            .to_request();
        let body: Vec<serde_json::Value> = actix_web::test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["region"], "Italy");
        assert_eq!(body[0]["parent_region"], GLOBAL_PARENT);
    }

    #[actix_web::test]
    async fn series_endpoint_extends_dates_and_overlays() {
        let dir = tempfile::tempdir().unwrap();
        seed_artifacts(dir.path());

        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(AppState {
                    data_dir: dir.path().to_path_buf(),
                }))
                .configure(config),
        )
        .await;

        let req = actix_web::test::TestRequest::get()
            .uri("/api/series?source=jhu&region=Italy&subset=confirmed&horizon=5")
            .to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&app, req).await;

        let dates = body["dates"].as_array().unwrap();
        assert_eq!(dates.len(), 15);
        let observed = body["observed"].as_array().unwrap();
        assert_eq!(observed.len(), 15);
        assert!(observed[14].is_null());

        let overlays = body["overlays"].as_array().unwrap();
        assert_eq!(overlays.len(), 1);
        let values = overlays[0]["values"].as_array().unwrap();
        // Extrapolated day 14 from amplitude=10, rate=0.3.
        let predicted = values[14].as_f64().unwrap();
        assert!((predicted - 10.0 * (0.3 * 14.0_f64).exp()).abs() < 1e-6);
    }

    #[actix_web::test]
    async fn oversized_horizon_is_clamped_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        seed_artifacts(dir.path());

        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(AppState {
                    data_dir: dir.path().to_path_buf(),
                }))
                .configure(config),
        )
        .await;

        let req = actix_web::test::TestRequest::get()
            .uri("/api/series?source=jhu&region=Italy&horizon=100000000")
            .to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&app, req).await;

        // 10 observations plus at most MAX_HORIZON_DAYS of extension.
        let dates = body["dates"].as_array().unwrap();
        assert_eq!(dates.len(), 10 + MAX_HORIZON_DAYS as usize);
    }

    #[actix_web::test]
    async fn missing_dataset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(AppState {
                    data_dir: dir.path().to_path_buf(),
                }))
                .configure(config),
        )
        .await;

        let req = actix_web::test::TestRequest::get()
            .uri("/api/regions?source=jhu")
            .to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn models_parameter_parsing() {
        assert_eq!(parse_models(None).len(), 2);
        assert_eq!(parse_models(Some("logistic")), vec![ModelKind::Logistic]);
        assert!(parse_models(Some("bogus")).is_empty());
        assert_eq!(parse_models(Some("")).len(), 2);
    }
}
