//! Grid placement and drag/drop conflict resolution for a column pinboard.
//!
//! Items sit on a grid of fixed-size cells split into vertical columns. The
//! [`Pinboard`] coordinator owns the board and applies [`BoardCommand`]s one
//! at a time: auto-placement, drops that resolve into a move, a swap or a
//! no-op, and column growth and reordering. Plugins react to the resulting
//! [`BoardEvent`]s; persistence is one of them.

pub mod board;
pub mod channel;
pub mod columns;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod placement;
pub mod provider;
pub mod render;
pub mod runtime;
pub mod search;

pub use board::{Board, Column, ColumnId, Item, ItemId, ItemPayload, PayloadVariant};
pub use channel::{ChannelError, EventChannel, Subscription};
pub use columns::{MIN_COLUMNS, add_column, ensure_column_count, move_column};
pub use error::{BoardError, Result};
pub use geometry::{CellSize, GridCell, GridGeometry, Point, Viewport};
pub use gesture::{
    DragKey, DragRegistry, GestureTracker, HoverTarget, Panner, PointerButton, PointerEvent,
    PointerKind, TerminalScale,
};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink, NullSink,
};
pub use metrics::{BoardMetrics, MetricSnapshot};
pub use persistence::{
    FileStore, MemoryStore, PersistenceBridge, PersistenceError, SNAPSHOT_VERSION, STORAGE_KEY,
};
pub use placement::{DropOutcome, NoOpReason, auto_place, find_free_slot, resolve_drop};
pub use provider::{CatalogProvider, ItemProvider, LookupError, is_fingering_pattern};
pub use render::BoardSketch;
pub use runtime::diagnostics::{BoardLoggerPlugin, MetricsSnapshotPlugin};
pub use runtime::persistence::{PersistencePlugin, PersistenceStatus, SharedPersistenceStatus};
pub use runtime::{
    BoardCommand, BoardConfig, BoardContext, BoardEvent, BoardPlugin, EventFlow, Pinboard,
};
pub use search::{KeyOutcome, RequestTicket, SearchSession};
