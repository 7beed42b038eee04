//! Shared domain types for the scrape → fit → serve pipeline.

mod types;

pub use types::*;
