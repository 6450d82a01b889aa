//! Board data model: columns, placed items and occupancy queries.

mod core;
mod occupancy;

pub use self::core::{
    Board, Column, ColumnId, Item, ItemId, ItemPayload, PayloadVariant,
};
