use thiserror::Error;

use crate::channel::ChannelError;
use crate::logging::LoggingError;
use crate::persistence::PersistenceError;
use crate::provider::LookupError;

/// Unified result type for the pinboard crate.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Errors surfaced by the board coordinator and its collaborators.
///
/// Malformed drops are not errors: placement resolves them to a no-op.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board has no columns")]
    NoColumns,
    #[error("column {index} out of range (board has {len} columns)")]
    ColumnOutOfRange { index: usize, len: usize },
    #[error("cell ({row}, {col}) is already occupied")]
    CellOccupied { row: usize, col: usize },
    #[error("item `{0}` not found")]
    ItemNotFound(String),
    #[error("item `{0}` is already on the board")]
    DuplicateItem(String),
    #[error("item `{item}` has no variant {variant}")]
    VariantOutOfRange { item: String, variant: usize },
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("event channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
}
