pub mod batch;
pub mod fitter;
pub mod grid;
pub mod window;
