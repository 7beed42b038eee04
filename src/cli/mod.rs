//! Command-line parsing for the COVID-19 case-curve toolkit.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the scraping/fitting code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{ModelSpec, SourceSpec};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "covid", version, about = "COVID-19 case scraper, curve fitter and dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch upstream case data and write the normalized per-source datasets.
    Scrape(ScrapeArgs),
    /// Fit growth models to every region of the scraped datasets.
    Fit(FitArgs),
    /// Serve the dashboard over the scraped and fitted artifacts.
    Serve(ServeArgs),
}

/// Options for the scrape stage.
#[derive(Debug, Parser, Clone)]
pub struct ScrapeArgs {
    /// Which source(s) to scrape.
    #[arg(short = 's', long, value_enum, default_value_t = SourceSpec::All)]
    pub source: SourceSpec,

    /// Data directory for artifacts (falls back to COVID_DATA_DIR, then ./data).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Options for the fit stage.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Which source(s) to fit.
    #[arg(short = 's', long, value_enum, default_value_t = SourceSpec::All)]
    pub source: SourceSpec,

    /// Data directory for artifacts (falls back to COVID_DATA_DIR, then ./data).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Which model(s) to fit.
    #[arg(short = 'm', long, value_enum, default_value_t = ModelSpec::All)]
    pub model: ModelSpec,

    /// Trim leading observations below this count before fitting.
    #[arg(long, default_value_t = 1.0)]
    pub min_count: f64,

    /// Fit only the trailing N observations of each series.
    #[arg(long, value_name = "N")]
    pub trailing: Option<usize>,

    /// Minimum exponential growth rate (per day) for the grid search.
    #[arg(long, default_value_t = -1.0)]
    pub exp_rate_min: f64,

    /// Maximum exponential growth rate (per day) for the grid search.
    #[arg(long, default_value_t = 1.0)]
    pub exp_rate_max: f64,

    /// Exponential rate grid steps.
    #[arg(long, default_value_t = 81)]
    pub exp_rate_steps: usize,

    /// Minimum logistic growth rate (per day) for the grid search.
    #[arg(long, default_value_t = 0.01)]
    pub logistic_rate_min: f64,

    /// Maximum logistic growth rate (per day) for the grid search.
    #[arg(long, default_value_t = 1.5)]
    pub logistic_rate_max: f64,

    /// Logistic rate grid steps.
    #[arg(long, default_value_t = 40)]
    pub logistic_rate_steps: usize,

    /// Logistic midpoint grid steps.
    #[arg(long, default_value_t = 40)]
    pub midpoint_steps: usize,

    /// Midpoint grid upper bound as a multiple of the window length.
    #[arg(long, default_value_t = 2.0)]
    pub midpoint_extend: f64,

    /// Local grid-refinement rounds around the best coarse candidate.
    #[arg(long, default_value_t = 3)]
    pub refine_rounds: usize,
}

/// Options for the dashboard server.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// Data directory for artifacts (falls back to COVID_DATA_DIR, then ./data).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Bind address.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8050)]
    pub port: u16,
}
