//! Versioned board snapshots and the stores that hold them.
//!
//! A snapshot is `{"version": 1, "columns": [...]}`. Snapshots written before
//! versioning were a bare array of columns, either in the current column
//! shape or in the older `chords`/`gridPosition` shape; both are upgraded on
//! load by renumbering columns and item cells. Unknown fields, anything newer
//! than [`SNAPSHOT_VERSION`] and structurally broken boards are rejected.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::board::{Board, Column, ColumnId, Item, ItemId, ItemPayload, PayloadVariant};
use crate::geometry::{GridCell, GridGeometry};

pub const STORAGE_KEY: &str = "pinboard-state";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed snapshot: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("snapshot store poisoned")]
    Poisoned,
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// Durable storage for the board under [`STORAGE_KEY`].
pub trait PersistenceBridge: Send {
    fn save(&self, board: &Board) -> PersistenceResult<()>;

    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> PersistenceResult<Option<Board>>;

    fn clear(&self) -> PersistenceResult<()>;
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    columns: &'a [Column],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Snapshot {
    version: u32,
    columns: Vec<Column>,
}

/// Column layout of unversioned snapshots that predate the `items` shape.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChordColumn {
    id: ColumnId,
    #[serde(default)]
    index: usize,
    chords: Vec<ChordEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChordEntry {
    id: ItemId,
    chord: ChordPayload,
    grid_position: GridCell,
    #[serde(default)]
    selected_fingering: Option<usize>,
}

#[derive(Deserialize)]
struct ChordPayload {
    key: String,
    suffix: String,
    #[serde(default)]
    positions: Vec<ChordPosition>,
}

#[derive(Deserialize)]
struct ChordPosition {
    frets: String,
    fingers: String,
    #[serde(default)]
    barres: Option<Value>,
    #[serde(default)]
    capo: Option<Value>,
}

impl ChordColumn {
    fn into_column(self, geometry: &GridGeometry) -> Column {
        let items = self
            .chords
            .into_iter()
            .map(|entry| {
                let variants: Vec<PayloadVariant> = entry
                    .chord
                    .positions
                    .into_iter()
                    .map(|position| PayloadVariant {
                        frets: position.frets,
                        fingers: position.fingers,
                        barres: position.barres.map(scalar_text),
                        capo: position.capo.map(scalar_text),
                    })
                    .collect();
                // The old shape always stored a selector, even with no variants.
                let selected_variant = entry
                    .selected_fingering
                    .filter(|&idx| idx < variants.len());
                let payload = ItemPayload {
                    key: entry.chord.key,
                    suffix: entry.chord.suffix,
                    variants,
                };
                let mut item = Item::new(entry.id, payload, entry.grid_position, geometry);
                item.selected_variant = selected_variant;
                item
            })
            .collect();
        Column {
            id: self.id,
            index: self.index,
            items,
        }
    }
}

fn scalar_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn decode_legacy_array(value: Value) -> PersistenceResult<Board> {
    let chord_shaped = value
        .as_array()
        .is_some_and(|columns| columns.iter().any(|column| column.get("chords").is_some()));
    let columns = if chord_shaped {
        let geometry = GridGeometry::default();
        let columns: Vec<ChordColumn> = serde_json::from_value(value)?;
        columns
            .into_iter()
            .map(|column| column.into_column(&geometry))
            .collect()
    } else {
        serde_json::from_value::<Vec<Column>>(value)?
    };
    Ok(upgrade_legacy(columns))
}

pub fn encode_snapshot(board: &Board) -> PersistenceResult<String> {
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        columns: &board.columns,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

pub fn decode_snapshot(raw: &str) -> PersistenceResult<Board> {
    let value: Value = serde_json::from_str(raw)?;
    let board = if value.is_array() {
        decode_legacy_array(value)?
    } else {
        let found = value
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| PersistenceError::InvalidSnapshot("missing version".to_string()))?;
        let found = u32::try_from(found).unwrap_or(u32::MAX);
        if found > SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found,
                supported: SNAPSHOT_VERSION,
            });
        }
        let snapshot: Snapshot = serde_json::from_value(value)?;
        if snapshot.version < SNAPSHOT_VERSION {
            upgrade_legacy(snapshot.columns)
        } else {
            Board {
                columns: snapshot.columns,
            }
        }
    };
    validate_board(&board)?;
    Ok(board)
}

/// Unversioned snapshots may carry stale indices; trust list order instead.
fn upgrade_legacy(mut columns: Vec<Column>) -> Board {
    for (position, column) in columns.iter_mut().enumerate() {
        column.index = position;
        for item in &mut column.items {
            item.grid_position.col = position;
        }
    }
    Board { columns }
}

/// Check the structural rules every stored board must satisfy.
pub fn validate_board(board: &Board) -> PersistenceResult<()> {
    let mut cells = HashSet::new();
    let mut ids = HashSet::new();
    for (position, column) in board.columns.iter().enumerate() {
        if column.index != position {
            return Err(PersistenceError::InvalidSnapshot(format!(
                "column `{}` has index {} at position {position}",
                column.id, column.index
            )));
        }
        for item in &column.items {
            if item.grid_position.col != position {
                return Err(PersistenceError::InvalidSnapshot(format!(
                    "item `{}` claims column {} but sits in column {position}",
                    item.id, item.grid_position.col
                )));
            }
            if !cells.insert(item.grid_position) {
                return Err(PersistenceError::InvalidSnapshot(format!(
                    "cell ({}, {}) holds more than one item",
                    item.grid_position.row, item.grid_position.col
                )));
            }
            if !ids.insert(item.id.clone()) {
                return Err(PersistenceError::InvalidSnapshot(format!(
                    "item id `{}` appears twice",
                    item.id
                )));
            }
            if let Some(variant) = item.selected_variant {
                if variant >= item.payload.variants.len() {
                    return Err(PersistenceError::InvalidSnapshot(format!(
                        "item `{}` selects missing variant {variant}",
                        item.id
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Stores the snapshot as `<dir>/pinboard-state.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceBridge for FileStore {
    fn save(&self, board: &Board) -> PersistenceResult<()> {
        let encoded = encode_snapshot(board)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves a half-written snapshot.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn load(&self) -> PersistenceResult<Option<Board>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode_snapshot(&raw).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self) -> PersistenceResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MemorySlot {
    raw: Option<String>,
    saves: usize,
    failing: bool,
}

/// In-memory store; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<MemorySlot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw snapshot text.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.slot.lock() {
            slot.raw = Some(raw.into());
        }
        store
    }

    /// Make subsequent saves fail with an I/O error.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.failing = failing;
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.raw.clone())
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.slot.lock().map(|slot| slot.saves).unwrap_or(0)
    }
}

impl PersistenceBridge for MemoryStore {
    fn save(&self, board: &Board) -> PersistenceResult<()> {
        let encoded = encode_snapshot(board)?;
        let mut slot = self.slot.lock().map_err(|_| PersistenceError::Poisoned)?;
        if slot.failing {
            return Err(io::Error::other("store unavailable").into());
        }
        slot.raw = Some(encoded);
        slot.saves += 1;
        Ok(())
    }

    fn load(&self) -> PersistenceResult<Option<Board>> {
        let slot = self.slot.lock().map_err(|_| PersistenceError::Poisoned)?;
        slot.raw.as_deref().map(decode_snapshot).transpose()
    }

    fn clear(&self) -> PersistenceResult<()> {
        let mut slot = self.slot.lock().map_err(|_| PersistenceError::Poisoned)?;
        slot.raw = None;
        Ok(())
    }
}
