//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to CSV/JSON
//! - reloaded later by the dashboard

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Parent region value for top-level entries (countries and country totals).
pub const GLOBAL_PARENT: &str = "#Global";

/// A configured upstream data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Regional aggregator feed (German county-level plus global entries).
    Funkeinteraktiv,
    /// Johns Hopkins University global time-series repository.
    Jhu,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Funkeinteraktiv, Source::Jhu];

    /// Directory name under the data dir holding this source's artifacts.
    pub fn dir_name(self) -> &'static str {
        match self {
            Source::Funkeinteraktiv => "funkeinteraktiv",
            Source::Jhu => "jhu",
        }
    }

    /// Human-readable label for terminal output and the dashboard.
    pub fn display_name(self) -> &'static str {
        match self {
            Source::Funkeinteraktiv => "funkeinteraktiv",
            Source::Jhu => "JHU",
        }
    }
}

/// Which source(s) a batch run should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSpec {
    All,
    Funkeinteraktiv,
    Jhu,
}

impl SourceSpec {
    pub fn resolve(self) -> Vec<Source> {
        match self {
            SourceSpec::All => Source::ALL.to_vec(),
            SourceSpec::Funkeinteraktiv => vec![Source::Funkeinteraktiv],
            SourceSpec::Jhu => vec![Source::Jhu],
        }
    }
}

/// Which metric of a regional series is being fitted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    Confirmed,
    Deaths,
    Recovered,
}

impl Subset {
    pub const ALL: [Subset; 3] = [Subset::Confirmed, Subset::Deaths, Subset::Recovered];

    pub fn column_name(self) -> &'static str {
        match self {
            Subset::Confirmed => "confirmed",
            Subset::Deaths => "deaths",
            Subset::Recovered => "recovered",
        }
    }
}

/// One daily observation for one region, in the uniform schema shared by all
/// sources.
///
/// `recovered` is optional because not every upstream source reports it;
/// `still_infectious` is derived (confirmed − recovered − deaths) during
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub date: NaiveDate,
    pub parent_region: String,
    pub region: String,
    pub confirmed: f64,
    pub deaths: f64,
    pub recovered: Option<f64>,
    pub still_infectious: f64,
}

impl CaseRecord {
    /// Value of the given subset, if present.
    pub fn value(&self, subset: Subset) -> Option<f64> {
        match subset {
            Subset::Confirmed => Some(self.confirmed),
            Subset::Deaths => Some(self.deaths),
            Subset::Recovered => self.recovered,
        }
    }
}

/// Which growth-curve model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    All,
    Exponential,
    Logistic,
}

impl ModelSpec {
    pub fn resolve(self) -> Vec<ModelKind> {
        match self {
            ModelSpec::All => vec![ModelKind::Exponential, ModelKind::Logistic],
            ModelSpec::Exponential => vec![ModelKind::Exponential],
            ModelSpec::Logistic => vec![ModelKind::Logistic],
        }
    }
}

/// Concrete fitted model kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// `y = amplitude * exp(rate * t)`
    Exponential,
    /// `y = plateau / (1 + exp(-rate * (t - midpoint)))`
    Logistic,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Exponential => "exponential",
            ModelKind::Logistic => "logistic",
        }
    }

    /// Total free parameter count (amplitude + shape parameters).
    ///
    /// Regions with fewer observations than this are skipped, never fitted.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Exponential => 2,
            ModelKind::Logistic => 3,
        }
    }

    /// Number of nonlinear shape parameters searched over the grid.
    pub fn shape_len(self) -> usize {
        self.param_count() - 1
    }

    /// Parameter names in the order `[amplitude, shape...]`.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Exponential => &["amplitude", "rate"],
            ModelKind::Logistic => &["plateau", "rate", "midpoint"],
        }
    }
}

/// The contiguous date range of observations a fit was computed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub n_obs: usize,
}

/// Fitted parameters plus goodness-of-fit for one (region, subset, model).
///
/// `params` maps parameter names (see `ModelKind::param_names`) to values.
/// The free variable `t` of the model is days since `window.start_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub parent_region: String,
    pub region: String,
    pub subset: Subset,
    pub model: ModelKind,
    pub params: BTreeMap<String, f64>,
    pub r_squared: f64,
    pub window: FitWindow,
}

/// A (region, subset, model) pair that produced no fit, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFit {
    pub parent_region: String,
    pub region: String,
    pub subset: Subset,
    pub model: ModelKind,
    pub reason: String,
}

/// The persisted fit-results artifact for one source (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub source: Source,
    pub results: Vec<FitResult>,
    pub skipped: Vec<SkippedFit>,
}

/// Configuration for a scrape run, derived from CLI flags.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub sources: Vec<Source>,
    pub data_dir: PathBuf,
}

/// Configuration for a fit run, derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub sources: Vec<Source>,
    pub data_dir: PathBuf,
    pub models: Vec<ModelKind>,

    /// Leading observations below this count are trimmed before fitting.
    ///
    /// Exponential/logistic curves are degenerate on zero baselines; the
    /// exact cutoff is a heuristic, hence configurable.
    pub min_count: f64,
    /// Optional trailing window: keep only the last N observations.
    pub trailing: Option<usize>,

    /// Exponential growth-rate grid (per day).
    pub exp_rate_min: f64,
    pub exp_rate_max: f64,
    pub exp_rate_steps: usize,

    /// Logistic growth-rate grid (per day).
    pub logistic_rate_min: f64,
    pub logistic_rate_max: f64,
    pub logistic_rate_steps: usize,

    /// Logistic midpoint grid steps; the range is derived from the window
    /// length (0 to `midpoint_extend` times the last observation day).
    pub midpoint_steps: usize,
    pub midpoint_extend: f64,

    /// Local re-grid rounds around the best coarse candidate.
    pub refine_rounds: usize,
}

/// Configuration for the dashboard server.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
}
