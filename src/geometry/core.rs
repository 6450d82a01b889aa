use serde::{Deserialize, Serialize};

/// Default width of a grid cell in pixels.
pub const DEFAULT_CELL_WIDTH: f64 = 220.0;
/// Default height of a grid cell in pixels.
pub const DEFAULT_CELL_HEIGHT: f64 = 280.0;
/// Upper bound on the column or row count derived from a viewport.
pub const MAX_SPAN: usize = 4096;

/// Discrete grid address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl GridCell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Pixel-space position. Pointer input may be fractional or negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, by: Point) -> Self {
        Self::new(self.x + by.x, self.y + by.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSize {
    pub width: f64,
    pub height: f64,
}

impl CellSize {
    /// Extents below one pixel (or non-finite) are raised to one pixel so the
    /// divisions in [`GridGeometry`] stay finite.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: sanitize_extent(width),
            height: sanitize_extent(height),
        }
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_WIDTH, DEFAULT_CELL_HEIGHT)
    }
}

fn sanitize_extent(value: f64) -> f64 {
    if value.is_finite() && value >= 1.0 {
        value
    } else {
        1.0
    }
}

/// Visible area of the board in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pixel/cell conversion plus the column and row counts of the last viewport.
///
/// Counts start at zero until [`GridGeometry::recompute_counts`] runs; with a
/// zero count every coordinate clamps to cell 0 on that axis.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    cell: CellSize,
    columns: usize,
    rows: usize,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::new(CellSize::default())
    }
}

impl GridGeometry {
    pub fn new(cell: CellSize) -> Self {
        Self {
            cell,
            columns: 0,
            rows: 0,
        }
    }

    pub fn cell_size(&self) -> CellSize {
        self.cell
    }

    /// Column count of the last computed viewport.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Row count of the last computed viewport.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// `cols = ceil(width / cell width)`, `rows = ceil(height / cell height)`,
    /// each capped at [`MAX_SPAN`].
    pub fn recompute_counts(&mut self, viewport: Viewport) -> (usize, usize) {
        self.columns = span_count(viewport.width, self.cell.width);
        self.rows = span_count(viewport.height, self.cell.height);
        (self.columns, self.rows)
    }

    pub fn pixel_to_cell(&self, point: Point) -> GridCell {
        GridCell {
            row: axis_index(point.y, self.cell.height, self.rows),
            col: axis_index(point.x, self.cell.width, self.columns),
        }
    }

    pub fn cell_to_pixel(&self, cell: GridCell) -> Point {
        Point {
            x: cell.col as f64 * self.cell.width,
            y: cell.row as f64 * self.cell.height,
        }
    }

    /// Column slot under `x` without clamping to the visible count; column
    /// drags may target slots scrolled out of view.
    pub fn column_at(&self, x: f64) -> usize {
        if !x.is_finite() || x <= 0.0 {
            return 0;
        }
        (x / self.cell.width).floor() as usize
    }

    pub fn total_columns_width(&self, column_count: usize) -> f64 {
        column_count as f64 * self.cell.width
    }
}

fn span_count(extent: f64, cell: f64) -> usize {
    if !extent.is_finite() || extent <= 0.0 {
        return 0;
    }
    ((extent / cell).ceil() as usize).min(MAX_SPAN)
}

fn axis_index(value: f64, cell: f64, count: usize) -> usize {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let raw = (value / cell).floor() as usize;
    raw.min(count.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(width: f64, height: f64) -> GridGeometry {
        let mut geometry = GridGeometry::default();
        geometry.recompute_counts(Viewport::new(width, height));
        geometry
    }

    #[test]
    fn recompute_counts_rounds_up_partial_cells() {
        let partial = geometry(1000.0, 600.0);
        assert_eq!(partial.columns(), 5);
        assert_eq!(partial.rows(), 3);

        let exact = geometry(440.0, 280.0);
        assert_eq!(exact.columns(), 2);
        assert_eq!(exact.rows(), 1);
    }

    #[test]
    fn huge_viewport_counts_are_capped() {
        let huge = geometry(1e300, f64::MAX);
        assert_eq!(huge.columns(), MAX_SPAN);
        assert_eq!(huge.rows(), MAX_SPAN);

        let mut pixel_cells = GridGeometry::new(CellSize::new(1e-300, 1.0));
        assert_eq!(
            pixel_cells.recompute_counts(Viewport::new(10_000.0, 500.0)),
            (MAX_SPAN, 500)
        );
    }

    #[test]
    fn pixel_to_cell_floors_and_clamps() {
        let geometry = geometry(660.0, 560.0);
        assert_eq!(
            geometry.pixel_to_cell(Point::new(219.9, 279.9)),
            GridCell::new(0, 0)
        );
        assert_eq!(
            geometry.pixel_to_cell(Point::new(220.0, 280.0)),
            GridCell::new(1, 1)
        );
        assert_eq!(
            geometry.pixel_to_cell(Point::new(5000.0, 5000.0)),
            GridCell::new(1, 2)
        );
        assert_eq!(
            geometry.pixel_to_cell(Point::new(-40.0, -1.0)),
            GridCell::new(0, 0)
        );
    }

    #[test]
    fn zero_counts_clamp_to_origin() {
        let geometry = GridGeometry::default();
        assert_eq!(
            geometry.pixel_to_cell(Point::new(900.0, 900.0)),
            GridCell::new(0, 0)
        );
    }

    #[test]
    fn cell_to_pixel_scales_by_cell_size() {
        let geometry = GridGeometry::default();
        assert_eq!(
            geometry.cell_to_pixel(GridCell::new(2, 3)),
            Point::new(660.0, 560.0)
        );
        assert_eq!(geometry.total_columns_width(4), 880.0);
    }

    #[test]
    fn degenerate_cell_size_is_raised_to_one_pixel() {
        assert_eq!(CellSize::new(0.0, f64::NAN), CellSize::new(1.0, 1.0));
    }

    #[test]
    fn column_at_ignores_visible_count() {
        let geometry = geometry(440.0, 280.0);
        assert_eq!(geometry.column_at(1000.0), 4);
        assert_eq!(geometry.column_at(-3.0), 0);
    }
}
