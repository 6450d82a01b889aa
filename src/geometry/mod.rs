//! Grid geometry orchestrator.
//!
//! Coordinate types and the pixel/cell math used by placement and the
//! gesture adapter. The implementation lives in the private `core` module.

mod core;

pub use self::core::{
    CellSize, DEFAULT_CELL_HEIGHT, DEFAULT_CELL_WIDTH, GridCell, GridGeometry, MAX_SPAN, Point,
    Viewport,
};
