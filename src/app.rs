//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - resolves the data directory
//! - dispatches to the scrape/fit pipelines or the dashboard server

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, ScrapeArgs, ServeArgs};
use crate::domain::{FitConfig, ScrapeConfig, ServeConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `covid` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Scrape(args) => pipeline::run_scrape(&scrape_config_from_args(&args)),
        Command::Fit(args) => pipeline::run_fit(&fit_config_from_args(&args)),
        Command::Serve(args) => crate::web::run_server(serve_config_from_args(&args)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Data directory precedence: `--data-dir` flag, `COVID_DATA_DIR`, `./data`.
fn resolve_data_dir(flag: Option<&PathBuf>) -> PathBuf {
    flag.cloned()
        .or_else(|| std::env::var_os("COVID_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn scrape_config_from_args(args: &ScrapeArgs) -> ScrapeConfig {
    ScrapeConfig {
        sources: args.source.resolve(),
        data_dir: resolve_data_dir(args.data_dir.as_ref()),
    }
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        sources: args.source.resolve(),
        data_dir: resolve_data_dir(args.data_dir.as_ref()),
        models: args.model.resolve(),
        min_count: args.min_count,
        trailing: args.trailing,
        exp_rate_min: args.exp_rate_min,
        exp_rate_max: args.exp_rate_max,
        exp_rate_steps: args.exp_rate_steps,
        logistic_rate_min: args.logistic_rate_min,
        logistic_rate_max: args.logistic_rate_max,
        logistic_rate_steps: args.logistic_rate_steps,
        midpoint_steps: args.midpoint_steps,
        midpoint_extend: args.midpoint_extend,
        refine_rounds: args.refine_rounds,
    }
}

pub fn serve_config_from_args(args: &ServeArgs) -> ServeConfig {
    ServeConfig {
        data_dir: resolve_data_dir(args.data_dir.as_ref()),
        host: args.host.clone(),
        port: args.port,
    }
}
