//! Column management: growth, insertion, reordering and renumbering.
//!
//! Every operation leaves `column.index` equal to the column's position and
//! rewrites the `col` of the items a renumbered column holds, so an item's
//! cell keeps naming the column that owns it.

use crate::board::{Board, Column};
use crate::error::{BoardError, Result};
use crate::geometry::{GridGeometry, MAX_SPAN};

/// Columns a board always keeps, whatever the viewport.
pub const MIN_COLUMNS: usize = 3;

/// Append empty columns until the board has `max(min_columns, desired_visible)`,
/// with `desired_visible` capped at [`MAX_SPAN`]. Never removes a column.
/// Returns how many were added.
pub fn ensure_column_count(board: &mut Board, desired_visible: usize, min_columns: usize) -> usize {
    let desired = desired_visible.min(MAX_SPAN).max(min_columns);
    let mut added = 0;
    while board.columns.len() < desired {
        let index = board.columns.len();
        board.columns.push(Column::new(index));
        added += 1;
    }
    added
}

/// Insert an empty column at `at` (clamped to the end) and renumber the
/// columns after it. Returns the position used.
pub fn add_column(board: &mut Board, at: usize, geometry: &GridGeometry) -> usize {
    let at = at.min(board.columns.len());
    board.columns.insert(at, Column::new(at));
    renumber(board, at + 1, geometry);
    at
}

/// Move the column at `from` to `to` with list-splice semantics, then
/// renumber every column. `to` past the end lands last. Returns whether
/// anything moved.
pub fn move_column(
    board: &mut Board,
    from: usize,
    to: usize,
    geometry: &GridGeometry,
) -> Result<bool> {
    let len = board.columns.len();
    if from >= len {
        return Err(BoardError::ColumnOutOfRange { index: from, len });
    }
    let to = to.min(len - 1);
    if from == to {
        return Ok(false);
    }

    let column = board.columns.remove(from);
    board.columns.insert(to, column);
    renumber(board, 0, geometry);
    Ok(true)
}

fn renumber(board: &mut Board, start: usize, geometry: &GridGeometry) {
    for (position, column) in board.columns.iter_mut().enumerate().skip(start) {
        column.index = position;
        for item in &mut column.items {
            if item.grid_position.col != position {
                let mut cell = item.grid_position;
                cell.col = position;
                item.relocate(cell, geometry);
            }
        }
    }
}
