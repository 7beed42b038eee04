pub mod dataset;
pub mod fits;
