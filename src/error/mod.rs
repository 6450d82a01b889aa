mod types;

pub use types::{BoardError, Result};
