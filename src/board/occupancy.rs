//! Occupancy queries, always derived from the current placements.
//!
//! Nothing is cached: every query scans all columns. Boards are small and a
//! derived answer can never go stale after a move or swap.

use crate::geometry::GridCell;

use super::core::{Board, Item, ItemId};

impl Board {
    /// True when some item other than `exclude` sits on `cell`.
    pub fn is_occupied(&self, cell: GridCell, exclude: Option<&ItemId>) -> bool {
        self.item_at(cell, exclude).is_some()
    }

    /// First item on `cell`, searching every column.
    pub fn item_at(&self, cell: GridCell, exclude: Option<&ItemId>) -> Option<&Item> {
        self.items()
            .find(|item| item.grid_position == cell && Some(&item.id) != exclude)
    }

    /// Index of the item on `cell` within column `col` only.
    pub fn column_item_at(
        &self,
        col: usize,
        cell: GridCell,
        exclude: Option<&ItemId>,
    ) -> Option<usize> {
        self.columns.get(col)?.items.iter().position(|item| {
            item.grid_position == cell && Some(&item.id) != exclude
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ItemPayload;
    use crate::geometry::GridGeometry;

    fn board_with(items: &[(&str, usize, GridCell)]) -> Board {
        let geometry = GridGeometry::default();
        let mut board = Board::with_columns(3);
        for (id, column, cell) in items {
            board.columns[*column].items.push(Item::new(
                ItemId::new(*id),
                ItemPayload::new("C", ""),
                *cell,
                &geometry,
            ));
        }
        board
    }

    #[test]
    fn occupied_honours_exclusion() {
        let board = board_with(&[("a", 0, GridCell::new(1, 0))]);
        assert!(board.is_occupied(GridCell::new(1, 0), None));
        assert!(!board.is_occupied(GridCell::new(1, 0), Some(&ItemId::new("a"))));
        assert!(board.is_occupied(GridCell::new(1, 0), Some(&ItemId::new("b"))));
        assert!(!board.is_occupied(GridCell::new(0, 0), None));
    }

    #[test]
    fn occupancy_scans_all_columns() {
        // Held by column 2 but addressed to column 0.
        let board = board_with(&[("stray", 2, GridCell::new(1, 0))]);
        assert!(board.is_occupied(GridCell::new(1, 0), None));
        assert_eq!(board.column_item_at(0, GridCell::new(1, 0), None), None);
        assert_eq!(board.column_item_at(2, GridCell::new(1, 0), None), Some(0));
    }
}
