use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::geometry::{GridCell, GridGeometry, Point};
use crate::logging::current_ms;

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// `<prefix>-<ms>-<9 hex chars>`; the suffix hashes a process-wide sequence
/// number so ids minted in the same millisecond still differ.
fn generate_id(prefix: &str) -> String {
    let ms = current_ms();
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(&ms.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    let digest = hasher.finalize();
    let hex = digest.to_hex();
    format!("{prefix}-{ms}-{}", &hex.as_str()[..9])
}

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn generate() -> Self {
                Self(generate_id($prefix))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(ItemId, "item");
string_id!(ColumnId, "col");

/// One selectable rendition of a payload (a fret/finger layout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayloadVariant {
    pub frets: String,
    pub fingers: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barres: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capo: Option<String>,
}

impl PayloadVariant {
    pub fn new(frets: impl Into<String>, fingers: impl Into<String>) -> Self {
        Self {
            frets: frets.into(),
            fingers: fingers.into(),
            barres: None,
            capo: None,
        }
    }
}

/// Data shown on a placed item, as returned by the item provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemPayload {
    pub key: String,
    pub suffix: String,
    #[serde(default)]
    pub variants: Vec<PayloadVariant>,
}

impl ItemPayload {
    pub fn new(key: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            suffix: suffix.into(),
            variants: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: PayloadVariant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn label(&self) -> String {
        format!("{}{}", self.key, self.suffix)
    }
}

/// A placed entity. `position` is always `cell_to_pixel(grid_position)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Item {
    pub id: ItemId,
    pub payload: ItemPayload,
    pub position: Point,
    pub grid_position: GridCell,
    #[serde(default)]
    pub selected_variant: Option<usize>,
}

impl Item {
    pub fn new(id: ItemId, payload: ItemPayload, cell: GridCell, geometry: &GridGeometry) -> Self {
        Self {
            id,
            payload,
            position: geometry.cell_to_pixel(cell),
            grid_position: cell,
            selected_variant: None,
        }
    }

    /// Update the cell and its derived pixel position together.
    pub fn relocate(&mut self, cell: GridCell, geometry: &GridGeometry) {
        self.grid_position = cell;
        self.position = geometry.cell_to_pixel(cell);
    }

    pub fn variant(&self) -> Option<&PayloadVariant> {
        self.selected_variant
            .and_then(|idx| self.payload.variants.get(idx))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Column {
    pub id: ColumnId,
    /// Cached position of the column within the board.
    pub index: usize,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Column {
    pub fn new(index: usize) -> Self {
        Self {
            id: ColumnId::generate(),
            index,
            items: Vec::new(),
        }
    }

    /// Row just below the lowest occupant, or 0 for an empty column.
    pub fn next_free_row(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.grid_position.row + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == *id)
    }
}

/// Root of the pinboard: an ordered sequence of columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub columns: Vec<Column>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(count: usize) -> Self {
        Self {
            columns: (0..count).map(Column::new).collect(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn item_count(&self) -> usize {
        self.columns.iter().map(|column| column.items.len()).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.columns.iter().flat_map(|column| column.items.iter())
    }

    /// `(column position, index within the column)` of an item.
    pub fn locate(&self, id: &ItemId) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(col, column)| column.position_of(id).map(|idx| (col, idx)))
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.locate(id)
            .map(|(col, idx)| &self.columns[col].items[idx])
    }

    pub fn item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        let (col, idx) = self.locate(id)?;
        self.columns.get_mut(col)?.items.get_mut(idx)
    }

    pub fn column_position(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|column| column.id == *id)
    }

    /// Detach an item from whichever column holds it.
    pub fn remove_item(&mut self, id: &ItemId) -> Option<Item> {
        let (col, idx) = self.locate(id)?;
        Some(self.columns[col].items.remove(idx))
    }

    /// Recompute every item's pixel position from its cell.
    pub fn refresh_positions(&mut self, geometry: &GridGeometry) {
        for column in &mut self.columns {
            for item in &mut column.items {
                item.position = geometry.cell_to_pixel(item.grid_position);
            }
        }
    }
}
