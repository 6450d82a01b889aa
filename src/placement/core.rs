use crate::board::{Board, Column, ItemId};
use crate::geometry::{GridCell, GridGeometry};

/// Why a drop left the board untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// No item with that id sits on the reported source cell.
    SourceMissing,
    /// The drop resolved to the cell the item already occupies.
    SameCell,
    /// The target column does not exist.
    TargetColumnMissing,
    /// The target was contested and no free row exists within the search bound.
    NoFreeSlot,
}

impl NoOpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoOpReason::SourceMissing => "source_missing",
            NoOpReason::SameCell => "same_cell",
            NoOpReason::TargetColumnMissing => "target_column_missing",
            NoOpReason::NoFreeSlot => "no_free_slot",
        }
    }
}

/// Result of resolving a drop gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Moved {
        item_id: ItemId,
        from: GridCell,
        to: GridCell,
        /// The requested cell was contested and `to` came from the free-slot search.
        fallback: bool,
    },
    Swapped {
        item_id: ItemId,
        other_id: ItemId,
        from: GridCell,
        to: GridCell,
    },
    NoOp(NoOpReason),
}

impl DropOutcome {
    /// Move and swap change the board and call for a save.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, DropOutcome::NoOp(_))
    }
}

/// Pick the cell for a new item.
///
/// Uses `preferred` when it names an existing column, otherwise the
/// least-populated of the first `visible_columns` columns (ties go to the
/// lowest index), falling back to all columns when none are visible. Returns
/// `None` only for a board without columns.
pub fn auto_place(
    board: &Board,
    visible_columns: usize,
    preferred: Option<usize>,
) -> Option<GridCell> {
    let col = match preferred.filter(|idx| *idx < board.column_count()) {
        Some(idx) => idx,
        None => {
            let visible = visible_columns.min(board.column_count());
            least_populated(&board.columns[..visible])
                .or_else(|| least_populated(&board.columns))?
        }
    };

    // A column's own items hold distinct rows, so the row below the lowest
    // one is free without consulting occupancy.
    let row = board.columns[col].next_free_row();
    Some(GridCell::new(row, col))
}

fn least_populated(columns: &[Column]) -> Option<usize> {
    columns
        .iter()
        .enumerate()
        .min_by_key(|(idx, column)| (column.items.len(), *idx))
        .map(|(idx, _)| idx)
}

/// Resolve a drop of `item_id` from `from` onto `to` into a move, a swap or a
/// no-op, applying the mutation to `board`.
///
/// Detach and reattach happen within this call; callers never see an item
/// outside every column. `geometry.rows()` bounds the free-slot search.
pub fn resolve_drop(
    board: &mut Board,
    geometry: &GridGeometry,
    item_id: &ItemId,
    from: GridCell,
    to: GridCell,
) -> DropOutcome {
    let source_idx = match board
        .columns
        .get(from.col)
        .and_then(|column| {
            column
                .items
                .iter()
                .position(|item| item.id == *item_id && item.grid_position == from)
        }) {
        Some(idx) => idx,
        None => return DropOutcome::NoOp(NoOpReason::SourceMissing),
    };

    if from == to {
        return DropOutcome::NoOp(NoOpReason::SameCell);
    }
    if to.col >= board.column_count() {
        return DropOutcome::NoOp(NoOpReason::TargetColumnMissing);
    }

    if let Some(target_idx) = board.column_item_at(to.col, to, Some(item_id)) {
        let other_id = board.columns[to.col].items[target_idx].id.clone();
        swap_items(board, geometry, (from.col, source_idx), (to.col, target_idx));
        return DropOutcome::Swapped {
            item_id: item_id.clone(),
            other_id,
            from,
            to,
        };
    }

    let fallback = board.is_occupied(to, Some(item_id));
    let destination = if fallback {
        // Occupied, but not by anything column `to.col` holds.
        match find_free_slot(board, item_id, to, geometry.rows().max(1)) {
            Some(cell) => cell,
            None => return DropOutcome::NoOp(NoOpReason::NoFreeSlot),
        }
    } else {
        to
    };

    if destination == from {
        return DropOutcome::NoOp(NoOpReason::SameCell);
    }

    let mut item = board.columns[from.col].items.remove(source_idx);
    item.relocate(destination, geometry);
    board.columns[destination.col].items.push(item);

    DropOutcome::Moved {
        item_id: item_id.clone(),
        from,
        to: destination,
        fallback,
    }
}

/// Nearest free cell in `target`'s column, trying `row + offset` before
/// `row - offset` for `offset = 1..=bound`.
pub fn find_free_slot(
    board: &Board,
    item_id: &ItemId,
    target: GridCell,
    bound: usize,
) -> Option<GridCell> {
    for offset in 1..=bound {
        let below = GridCell::new(target.row + offset, target.col);
        if !board.is_occupied(below, Some(item_id)) {
            return Some(below);
        }
        if let Some(row) = target.row.checked_sub(offset) {
            let above = GridCell::new(row, target.col);
            if !board.is_occupied(above, Some(item_id)) {
                return Some(above);
            }
        }
    }
    None
}

/// Exchange the cells of two items and hand each to the other's column.
///
/// Both indices are taken before anything is removed. Within one column the
/// higher index goes first so the lower one stays valid.
fn swap_items(
    board: &mut Board,
    geometry: &GridGeometry,
    (source_col, source_idx): (usize, usize),
    (target_col, target_idx): (usize, usize),
) {
    let (mut source, mut target) = if source_col == target_col {
        let items = &mut board.columns[source_col].items;
        if source_idx > target_idx {
            let source = items.remove(source_idx);
            let target = items.remove(target_idx);
            (source, target)
        } else {
            let target = items.remove(target_idx);
            let source = items.remove(source_idx);
            (source, target)
        }
    } else {
        let source = board.columns[source_col].items.remove(source_idx);
        let target = board.columns[target_col].items.remove(target_idx);
        (source, target)
    };

    let source_cell = source.grid_position;
    let target_cell = target.grid_position;
    source.relocate(target_cell, geometry);
    target.relocate(source_cell, geometry);

    board.columns[target_col].items.push(source);
    board.columns[source_col].items.push(target);
}
