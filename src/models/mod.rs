mod model;

pub use model::{basis, predict, predict_params};
