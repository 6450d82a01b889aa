//! Plain-text board rendering for logs and tests.

mod core;

pub use self::core::{BoardSketch, fit_to_width};
