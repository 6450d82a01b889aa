use std::fmt::Write as _;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::board::Board;
use crate::geometry::GridCell;

const EMPTY_CELL: &str = ".";
const ELLIPSIS: char = '…';

/// Plain-text picture of a board, one text row per grid row.
///
/// ```text
///    | 0     | 1     | 2
///  0 | C     | .     | Am
///  1 | G7    | .     | .
/// ```
#[derive(Debug, Clone)]
pub struct BoardSketch {
    cell_width: usize,
    min_rows: usize,
}

impl Default for BoardSketch {
    fn default() -> Self {
        Self {
            cell_width: 6,
            min_rows: 1,
        }
    }
}

impl BoardSketch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display columns per grid cell; at least one.
    pub fn with_cell_width(mut self, width: usize) -> Self {
        self.cell_width = width.max(1);
        self
    }

    pub fn with_min_rows(mut self, rows: usize) -> Self {
        self.min_rows = rows;
        self
    }

    pub fn render(&self, board: &Board) -> String {
        let rows = board
            .columns
            .iter()
            .map(|column| column.next_free_row())
            .max()
            .unwrap_or(0)
            .max(self.min_rows);
        let gutter = rows.saturating_sub(1).to_string().len().max(1);

        let mut out = String::new();
        let _ = write!(out, "{:>gutter$}", "");
        for col in 0..board.column_count() {
            let _ = write!(out, " | {}", self.fit(&col.to_string()));
        }
        push_line(&mut out);

        for row in 0..rows {
            let _ = write!(out, "{row:>gutter$}");
            for col in 0..board.column_count() {
                let label = board
                    .item_at(GridCell::new(row, col), None)
                    .map(|item| item.payload.label())
                    .unwrap_or_else(|| EMPTY_CELL.to_string());
                let _ = write!(out, " | {}", self.fit(&label));
            }
            push_line(&mut out);
        }
        out
    }

    fn fit(&self, label: &str) -> String {
        fit_to_width(label, self.cell_width)
    }
}

fn push_line(out: &mut String) {
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    out.push('\n');
}

/// Strip escape sequences, then truncate (with an ellipsis) or pad to exactly
/// `width` display columns.
pub fn fit_to_width(text: &str, width: usize) -> String {
    let clean = strip_ansi_escapes::strip_str(text);
    let clean = clean.replace(['\n', '\r', '\t'], " ");
    if width == 0 {
        return String::new();
    }

    let mut fitted = if UnicodeWidthStr::width(clean.as_str()) <= width {
        clean
    } else {
        let mut kept = String::new();
        let mut used = 0;
        for ch in clean.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w > width - 1 {
                break;
            }
            kept.push(ch);
            used += w;
        }
        kept.push(ELLIPSIS);
        kept
    };

    let mut display = UnicodeWidthStr::width(fitted.as_str());
    while display < width {
        fitted.push(' ');
        display += 1;
    }
    fitted
}
