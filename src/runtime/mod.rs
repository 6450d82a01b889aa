use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::board::{Board, Item, ItemId, ItemPayload};
use crate::channel::{EventChannel, Subscription};
use crate::columns::{MIN_COLUMNS, add_column, ensure_column_count, move_column};
use crate::geometry::{CellSize, GridCell, GridGeometry, Point, Viewport};
use crate::logging::{event_with_fields, json_kv, json_str};
use crate::persistence::PersistenceBridge;
use crate::placement::{DropOutcome, NoOpReason, auto_place, resolve_drop};
use crate::provider::{ItemProvider, LookupError, is_fingering_pattern};
use crate::search::{DEFAULT_DEBOUNCE, DEFAULT_SUGGESTION_LIMIT, SearchSession};
use crate::{BoardError, BoardMetrics, LogLevel, Logger, Result};

pub mod diagnostics;
pub mod persistence;

use self::persistence::{PersistencePlugin, SharedPersistenceStatus};

/// Configuration knobs for the board coordinator.
#[derive(Clone)]
pub struct BoardConfig {
    /// Pixel size of one grid cell.
    pub cell: CellSize,
    /// Columns the board always keeps.
    pub min_columns: usize,
    /// Accumulated tick time between autosaves.
    pub autosave_interval: Duration,
    /// Quiet period before a suggestion query fires.
    pub search_debounce: Duration,
    /// Most suggestions kept per response.
    pub suggestion_limit: usize,
    /// Optional structured logger used by the coordinator and its plugins.
    pub logger: Option<Logger>,
    /// Metrics accumulator shared with plugins.
    pub metrics: Option<Arc<Mutex<BoardMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            cell: CellSize::default(),
            min_columns: MIN_COLUMNS,
            autosave_interval: Duration::from_secs(5),
            search_debounce: DEFAULT_DEBOUNCE,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "pinboard::metrics".to_string(),
        }
    }
}

impl BoardConfig {
    pub fn with_cell_size(mut self, width: f64, height: f64) -> Self {
        self.cell = CellSize::new(width, height);
        self
    }

    pub fn with_min_columns(mut self, min_columns: usize) -> Self {
        self.min_columns = min_columns;
        self
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    pub fn with_search(mut self, debounce: Duration, suggestion_limit: usize) -> Self {
        self.search_debounce = debounce;
        self.suggestion_limit = suggestion_limit;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(BoardMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<BoardMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Mutation requests and lifecycle signals sent to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardCommand {
    Resize {
        width: f64,
        height: f64,
    },
    PlaceItem {
        item_id: ItemId,
        payload: ItemPayload,
        column: Option<usize>,
    },
    PlaceItemAt {
        item_id: ItemId,
        payload: ItemPayload,
        cell: GridCell,
    },
    DropItem {
        item_id: ItemId,
        from: GridCell,
        to: GridCell,
    },
    DropItemAtPixel {
        item_id: ItemId,
        from: GridCell,
        point: Point,
    },
    MoveColumn {
        from: usize,
        to: usize,
    },
    AddColumn {
        at: usize,
    },
    EnsureColumns {
        visible: usize,
    },
    RemoveItem {
        item_id: ItemId,
    },
    SelectVariant {
        item_id: ItemId,
        variant: Option<usize>,
    },
    Save,
    Tick {
        elapsed: Duration,
    },
    Load,
    Clear,
    /// Replace the whole board with a loaded one.
    Restore(Box<Board>),
}

impl BoardCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BoardCommand::Resize { .. } => "resize",
            BoardCommand::PlaceItem { .. } => "place_item",
            BoardCommand::PlaceItemAt { .. } => "place_item_at",
            BoardCommand::DropItem { .. } => "drop_item",
            BoardCommand::DropItemAtPixel { .. } => "drop_item_at_pixel",
            BoardCommand::MoveColumn { .. } => "move_column",
            BoardCommand::AddColumn { .. } => "add_column",
            BoardCommand::EnsureColumns { .. } => "ensure_columns",
            BoardCommand::RemoveItem { .. } => "remove_item",
            BoardCommand::SelectVariant { .. } => "select_variant",
            BoardCommand::Save => "save",
            BoardCommand::Tick { .. } => "tick",
            BoardCommand::Load => "load",
            BoardCommand::Clear => "clear",
            BoardCommand::Restore(_) => "restore",
        }
    }
}

/// Notifications published after a command has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    ItemPlaced {
        item_id: ItemId,
        cell: GridCell,
    },
    ItemMoved {
        item_id: ItemId,
        from: GridCell,
        to: GridCell,
        fallback: bool,
    },
    ItemsSwapped {
        item_id: ItemId,
        other_id: ItemId,
        from: GridCell,
        to: GridCell,
    },
    DropIgnored {
        item_id: ItemId,
        reason: NoOpReason,
    },
    ItemRemoved {
        item_id: ItemId,
        cell: GridCell,
    },
    VariantSelected {
        item_id: ItemId,
        variant: Option<usize>,
    },
    ColumnAdded {
        at: usize,
    },
    ColumnMoved {
        from: usize,
        to: usize,
    },
    ColumnsGrown {
        added: usize,
        total: usize,
    },
    Resized {
        columns: usize,
        rows: usize,
    },
    /// The board changed in a way that should reach durable storage.
    SaveIntent,
    Tick {
        elapsed: Duration,
    },
    LoadRequested,
    BoardLoaded {
        columns: usize,
        items: usize,
    },
    BoardCleared,
}

impl BoardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::ItemPlaced { .. } => "item_placed",
            BoardEvent::ItemMoved { .. } => "item_moved",
            BoardEvent::ItemsSwapped { .. } => "items_swapped",
            BoardEvent::DropIgnored { .. } => "drop_ignored",
            BoardEvent::ItemRemoved { .. } => "item_removed",
            BoardEvent::VariantSelected { .. } => "variant_selected",
            BoardEvent::ColumnAdded { .. } => "column_added",
            BoardEvent::ColumnMoved { .. } => "column_moved",
            BoardEvent::ColumnsGrown { .. } => "columns_grown",
            BoardEvent::Resized { .. } => "resized",
            BoardEvent::SaveIntent => "save_intent",
            BoardEvent::Tick { .. } => "tick",
            BoardEvent::LoadRequested => "load_requested",
            BoardEvent::BoardLoaded { .. } => "board_loaded",
            BoardEvent::BoardCleared => "board_cleared",
        }
    }

    /// True for events that reflect a change to the board's placements.
    pub fn changes_layout(&self) -> bool {
        matches!(
            self,
            BoardEvent::ItemPlaced { .. }
                | BoardEvent::ItemMoved { .. }
                | BoardEvent::ItemsSwapped { .. }
                | BoardEvent::ItemRemoved { .. }
                | BoardEvent::ColumnAdded { .. }
                | BoardEvent::ColumnMoved { .. }
                | BoardEvent::ColumnsGrown { .. }
                | BoardEvent::BoardLoaded { .. }
                | BoardEvent::BoardCleared
        )
    }
}

/// Control the propagation of an event across plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Consumed,
}

/// Context passed to plugins: read access to the board plus a queue for
/// follow-up commands. Queued commands run after the current one finishes.
pub struct BoardContext<'a> {
    board: &'a Board,
    geometry: &'a GridGeometry,
    queued: Vec<BoardCommand>,
}

impl<'a> BoardContext<'a> {
    fn new(board: &'a Board, geometry: &'a GridGeometry) -> Self {
        Self {
            board,
            geometry,
            queued: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        self.board
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.geometry
    }

    pub fn queue(&mut self, command: BoardCommand) {
        self.queued.push(command);
    }

    fn into_queued(self) -> Vec<BoardCommand> {
        self.queued
    }
}

/// Behaviour injection point for the coordinator.
pub trait BoardPlugin: Send {
    fn name(&self) -> &str {
        "board_plugin"
    }

    fn init(&mut self, _ctx: &mut BoardContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_event(&mut self, _ctx: &mut BoardContext<'_>, _event: &BoardEvent) -> Result<EventFlow> {
        Ok(EventFlow::Continue)
    }
}

/// Owns the board and applies commands one at a time.
///
/// Each command runs to completion, including every plugin's reaction to its
/// events, before the next queued command starts. Plugins see events in
/// registration order; outside observers subscribe to [`Pinboard::events`]
/// and see them after the plugins.
pub struct Pinboard {
    board: Board,
    geometry: GridGeometry,
    config: BoardConfig,
    plugins: Vec<Box<dyn BoardPlugin>>,
    initialized: usize,
    events: EventChannel<BoardEvent>,
    queue: VecDeque<BoardCommand>,
    last_error: Option<String>,
    started_at: Instant,
}

impl Pinboard {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            board: Board::with_columns(config.min_columns),
            geometry: GridGeometry::new(config.cell),
            config,
            plugins: Vec::new(),
            initialized: 0,
            events: EventChannel::new("board_events"),
            queue: VecDeque::new(),
            last_error: None,
            started_at: Instant::now(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BoardConfig {
        &mut self.config
    }

    pub fn events(&self) -> &EventChannel<BoardEvent> {
        &self.events
    }

    pub fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: FnMut(&BoardEvent) + Send + 'static,
    {
        Ok(self.events.subscribe(handler)?)
    }

    /// User-facing message of the last failed lookup, cleared on success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn register_plugin<P>(&mut self, plugin: P)
    where
        P: BoardPlugin + 'static,
    {
        self.plugins.push(Box::new(plugin));
    }

    /// Register a persistence plugin over `bridge`, configured from this
    /// board's config. Returns the shared save status.
    pub fn attach_persistence<B>(
        &mut self,
        bridge: B,
        load_on_start: bool,
    ) -> SharedPersistenceStatus
    where
        B: PersistenceBridge + 'static,
    {
        let mut plugin = PersistencePlugin::new(bridge)
            .with_autosave_interval(self.config.autosave_interval)
            .load_on_init(load_on_start);
        if let Some(logger) = self.config.logger.clone() {
            plugin = plugin.with_logger(logger);
        }
        if let Some(metrics) = self.config.metrics_handle() {
            plugin = plugin.with_metrics(metrics);
        }
        let status = plugin.status();
        self.register_plugin(plugin);
        status
    }

    /// A search session using the configured debounce and result limit.
    pub fn search_session(&self) -> SearchSession {
        SearchSession::new(self.config.search_debounce, self.config.suggestion_limit)
    }

    /// Initialize plugins registered since the last call and run whatever
    /// they queued.
    pub fn start(&mut self) -> Result<()> {
        if self.initialized == self.plugins.len() {
            return Ok(());
        }
        while self.initialized < self.plugins.len() {
            let idx = self.initialized;
            let queued = {
                let plugin = &mut self.plugins[idx];
                let plugin_name = plugin.name().to_string();
                let mut ctx = BoardContext::new(&self.board, &self.geometry);
                plugin.init(&mut ctx)?;
                self.log_board_event(
                    LogLevel::Debug,
                    "plugin_initialized",
                    [json_kv("plugin", json!(plugin_name))],
                );
                ctx.into_queued()
            };
            self.initialized += 1;
            self.queue.extend(queued);
        }
        self.drain()
    }

    /// Queue a command and process the queue until it is empty.
    ///
    /// Commands queued by plugins run after the one that caused them. If any
    /// command fails the rest still run and the first error is returned.
    pub fn dispatch(&mut self, command: BoardCommand) -> Result<()> {
        self.queue.push_back(command);
        self.start()?;
        self.drain()
    }

    /// Look up an item by name and auto-place it.
    pub fn add_by_name(&mut self, provider: &dyn ItemProvider, text: &str) -> Result<ItemId> {
        let name = text.trim();
        let lookup = if name.is_empty() {
            Err(LookupError::Validation("Please enter a name".to_string()))
        } else {
            provider.fetch_by_name(name)
        };
        self.place_lookup(lookup, None)
    }

    /// Look up an item by fingering pattern, auto-place it and select the
    /// variant that matched.
    pub fn add_by_fingering(
        &mut self,
        provider: &dyn ItemProvider,
        pattern: &str,
    ) -> Result<ItemId> {
        let pattern = pattern.trim();
        let lookup = if is_fingering_pattern(pattern) {
            provider.fetch_by_fingering(pattern)
        } else {
            Err(LookupError::Validation(
                "Fingering must be six digits or lowercase letters".to_string(),
            ))
        };
        self.place_lookup(lookup, Some(pattern))
    }

    fn place_lookup(
        &mut self,
        lookup: std::result::Result<ItemPayload, LookupError>,
        frets: Option<&str>,
    ) -> Result<ItemId> {
        let payload = match lookup {
            Ok(payload) => payload,
            Err(err) => {
                self.last_error = Some(err.user_message());
                self.log_board_event(
                    LogLevel::Warn,
                    "lookup_failed",
                    [json_str("error", err.to_string())],
                );
                return Err(err.into());
            }
        };
        self.last_error = None;

        let variant = frets.and_then(|frets| {
            payload
                .variants
                .iter()
                .position(|variant| variant.frets == frets)
        });
        let item_id = ItemId::generate();
        self.dispatch(BoardCommand::PlaceItem {
            item_id: item_id.clone(),
            payload,
            column: None,
        })?;
        if variant.is_some() {
            self.dispatch(BoardCommand::SelectVariant {
                item_id: item_id.clone(),
                variant,
            })?;
        }
        Ok(item_id)
    }

    fn drain(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(command) = self.queue.pop_front() {
            let name = command.name();
            if let Err(err) = self.run_command(command) {
                self.log_board_event(
                    LogLevel::Warn,
                    "command_failed",
                    [json_str("command", name), json_str("error", err.to_string())],
                );
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run_command(&mut self, command: BoardCommand) -> Result<()> {
        let name = command.name();
        self.with_metrics(|metrics| metrics.record_command());
        let events = self.apply(command)?;
        self.log_board_event(
            LogLevel::Trace,
            "command_applied",
            [json_str("command", name), json_kv("events", json!(events.len()))],
        );
        for event in events {
            self.publish(event)?;
        }
        Ok(())
    }

    fn apply(&mut self, command: BoardCommand) -> Result<Vec<BoardEvent>> {
        match command {
            BoardCommand::Resize { width, height } => {
                let (columns, rows) = self.geometry.recompute_counts(Viewport::new(width, height));
                let mut events = self.grow_columns(columns);
                events.push(BoardEvent::Resized { columns, rows });
                Ok(events)
            }
            BoardCommand::PlaceItem {
                item_id,
                payload,
                column,
            } => {
                self.ensure_new_item(&item_id)?;
                let cell = auto_place(&self.board, self.geometry.columns(), column)
                    .ok_or(BoardError::NoColumns)?;
                self.insert_item(item_id, payload, cell)
            }
            BoardCommand::PlaceItemAt {
                item_id,
                payload,
                cell,
            } => {
                self.ensure_new_item(&item_id)?;
                let len = self.board.column_count();
                if cell.col >= len {
                    return Err(BoardError::ColumnOutOfRange {
                        index: cell.col,
                        len,
                    });
                }
                if self.board.is_occupied(cell, None) {
                    return Err(BoardError::CellOccupied {
                        row: cell.row,
                        col: cell.col,
                    });
                }
                self.insert_item(item_id, payload, cell)
            }
            BoardCommand::DropItem { item_id, from, to } => Ok(self.drop_item(item_id, from, to)),
            BoardCommand::DropItemAtPixel {
                item_id,
                from,
                point,
            } => {
                let to = self.geometry.pixel_to_cell(point);
                Ok(self.drop_item(item_id, from, to))
            }
            BoardCommand::MoveColumn { from, to } => {
                let target = to.min(self.board.column_count().saturating_sub(1));
                if !move_column(&mut self.board, from, to, &self.geometry)? {
                    return Ok(Vec::new());
                }
                self.with_metrics(|metrics| metrics.record_column_move());
                self.log_board_event(
                    LogLevel::Debug,
                    "column_moved",
                    [json_kv("from", json!(from)), json_kv("to", json!(target))],
                );
                Ok(vec![
                    BoardEvent::ColumnMoved { from, to: target },
                    BoardEvent::SaveIntent,
                ])
            }
            BoardCommand::AddColumn { at } => {
                let at = add_column(&mut self.board, at, &self.geometry);
                Ok(vec![BoardEvent::ColumnAdded { at }])
            }
            BoardCommand::EnsureColumns { visible } => Ok(self.grow_columns(visible)),
            BoardCommand::RemoveItem { item_id } => {
                let item = self
                    .board
                    .remove_item(&item_id)
                    .ok_or_else(|| BoardError::ItemNotFound(item_id.to_string()))?;
                Ok(vec![
                    BoardEvent::ItemRemoved {
                        item_id,
                        cell: item.grid_position,
                    },
                    BoardEvent::SaveIntent,
                ])
            }
            BoardCommand::SelectVariant { item_id, variant } => {
                let item = self
                    .board
                    .item_mut(&item_id)
                    .ok_or_else(|| BoardError::ItemNotFound(item_id.to_string()))?;
                if let Some(idx) = variant {
                    if idx >= item.payload.variants.len() {
                        return Err(BoardError::VariantOutOfRange {
                            item: item_id.to_string(),
                            variant: idx,
                        });
                    }
                }
                item.selected_variant = variant;
                Ok(vec![
                    BoardEvent::VariantSelected { item_id, variant },
                    BoardEvent::SaveIntent,
                ])
            }
            BoardCommand::Save => Ok(vec![BoardEvent::SaveIntent]),
            BoardCommand::Tick { elapsed } => Ok(vec![BoardEvent::Tick { elapsed }]),
            BoardCommand::Load => Ok(vec![BoardEvent::LoadRequested]),
            BoardCommand::Clear => {
                let mut board = Board::with_columns(self.config.min_columns);
                ensure_column_count(&mut board, self.geometry.columns(), self.config.min_columns);
                self.board = board;
                Ok(vec![BoardEvent::BoardCleared])
            }
            BoardCommand::Restore(board) => {
                let mut board = *board;
                board.refresh_positions(&self.geometry);
                ensure_column_count(&mut board, self.geometry.columns(), self.config.min_columns);
                self.board = board;
                self.log_board_event(
                    LogLevel::Info,
                    "board_restored",
                    [
                        json_kv("columns", json!(self.board.column_count())),
                        json_kv("items", json!(self.board.item_count())),
                    ],
                );
                Ok(vec![BoardEvent::BoardLoaded {
                    columns: self.board.column_count(),
                    items: self.board.item_count(),
                }])
            }
        }
    }

    fn ensure_new_item(&self, item_id: &ItemId) -> Result<()> {
        match self.board.locate(item_id) {
            Some(_) => Err(BoardError::DuplicateItem(item_id.to_string())),
            None => Ok(()),
        }
    }

    fn insert_item(
        &mut self,
        item_id: ItemId,
        payload: ItemPayload,
        cell: GridCell,
    ) -> Result<Vec<BoardEvent>> {
        let len = self.board.column_count();
        let item = Item::new(item_id.clone(), payload, cell, &self.geometry);
        self.board
            .columns
            .get_mut(cell.col)
            .ok_or(BoardError::ColumnOutOfRange {
                index: cell.col,
                len,
            })?
            .items
            .push(item);
        self.with_metrics(|metrics| metrics.record_placement());
        Ok(vec![
            BoardEvent::ItemPlaced { item_id, cell },
            BoardEvent::SaveIntent,
        ])
    }

    fn drop_item(&mut self, item_id: ItemId, from: GridCell, to: GridCell) -> Vec<BoardEvent> {
        match resolve_drop(&mut self.board, &self.geometry, &item_id, from, to) {
            DropOutcome::Moved {
                item_id,
                from,
                to,
                fallback,
            } => {
                self.with_metrics(|metrics| metrics.record_move(fallback));
                vec![
                    BoardEvent::ItemMoved {
                        item_id,
                        from,
                        to,
                        fallback,
                    },
                    BoardEvent::SaveIntent,
                ]
            }
            DropOutcome::Swapped {
                item_id,
                other_id,
                from,
                to,
            } => {
                self.with_metrics(|metrics| metrics.record_swap());
                vec![
                    BoardEvent::ItemsSwapped {
                        item_id,
                        other_id,
                        from,
                        to,
                    },
                    BoardEvent::SaveIntent,
                ]
            }
            DropOutcome::NoOp(reason) => {
                self.with_metrics(|metrics| metrics.record_ignored_drop());
                self.log_board_event(
                    LogLevel::Debug,
                    "drop_ignored",
                    [
                        json_str("item", item_id.as_str()),
                        json_str("reason", reason.as_str()),
                    ],
                );
                vec![BoardEvent::DropIgnored { item_id, reason }]
            }
        }
    }

    fn grow_columns(&mut self, visible: usize) -> Vec<BoardEvent> {
        let added = ensure_column_count(&mut self.board, visible, self.config.min_columns);
        if added == 0 {
            return Vec::new();
        }
        vec![BoardEvent::ColumnsGrown {
            added,
            total: self.board.column_count(),
        }]
    }

    fn publish(&mut self, event: BoardEvent) -> Result<()> {
        for idx in 0..self.plugins.len() {
            let (flow, queued) = {
                let plugin = &mut self.plugins[idx];
                let mut ctx = BoardContext::new(&self.board, &self.geometry);
                let flow = plugin.on_event(&mut ctx, &event)?;
                (flow, ctx.into_queued())
            };
            self.queue.extend(queued);
            if flow == EventFlow::Consumed {
                break;
            }
        }
        self.events.emit(&event)?;
        Ok(())
    }

    fn with_metrics(&self, record: impl FnOnce(&mut BoardMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut *guard);
            }
        }
    }

    fn log_board_event<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, "pinboard::board", message, fields);
            let _ = logger.log_event(event);
        }
    }
}

impl Default for Pinboard {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PayloadVariant;
    use crate::logging::MemorySink;
    use crate::provider::CatalogProvider;

    /// Records every event it sees and optionally queues a command once.
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
        follow_up: Option<BoardCommand>,
        consume: bool,
    }

    impl Recorder {
        fn new(seen: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                seen,
                follow_up: None,
                consume: false,
            }
        }
    }

    impl BoardPlugin for Recorder {
        fn name(&self) -> &str {
            "test.recorder"
        }

        fn on_event(
            &mut self,
            ctx: &mut BoardContext<'_>,
            event: &BoardEvent,
        ) -> Result<EventFlow> {
            self.seen.lock().unwrap().push(event.name().to_string());
            if let Some(command) = self.follow_up.take() {
                ctx.queue(command);
            }
            Ok(if self.consume {
                EventFlow::Consumed
            } else {
                EventFlow::Continue
            })
        }
    }

    fn payload(key: &str) -> ItemPayload {
        ItemPayload::new(key, "")
    }

    fn place_at(board: &mut Pinboard, id: &str, cell: GridCell) {
        board
            .dispatch(BoardCommand::PlaceItemAt {
                item_id: ItemId::new(id),
                payload: payload(id),
                cell,
            })
            .unwrap();
    }

    fn recorded(board: &mut Pinboard) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        board.register_plugin(Recorder::new(Arc::clone(&seen)));
        seen
    }

    #[test]
    fn new_board_has_minimum_columns() {
        let board = Pinboard::default();
        assert_eq!(board.board().column_count(), 3);
        assert_eq!(board.board().item_count(), 0);
    }

    #[test]
    fn resize_grows_columns_and_reports_counts() {
        let mut board = Pinboard::default();
        let seen = recorded(&mut board);
        board
            .dispatch(BoardCommand::Resize {
                width: 1000.0,
                height: 600.0,
            })
            .unwrap();

        assert_eq!(board.board().column_count(), 5);
        assert_eq!(board.geometry().rows(), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["columns_grown", "resized"]);
    }

    #[test]
    fn absurd_viewport_is_capped() {
        let mut board = Pinboard::default();
        board
            .dispatch(BoardCommand::Resize {
                width: 1e300,
                height: 600.0,
            })
            .unwrap();

        assert_eq!(board.geometry().columns(), crate::geometry::MAX_SPAN);
        assert_eq!(board.board().column_count(), crate::geometry::MAX_SPAN);
    }

    #[test]
    fn place_item_uses_fewest_items_column_and_requests_save() {
        let mut board = Pinboard::default();
        let seen = recorded(&mut board);
        place_at(&mut board, "a", GridCell::new(0, 0));
        board
            .dispatch(BoardCommand::PlaceItem {
                item_id: ItemId::new("b"),
                payload: payload("B"),
                column: None,
            })
            .unwrap();

        let placed = board.board().item(&ItemId::new("b")).unwrap();
        assert_eq!(placed.grid_position, GridCell::new(0, 1));
        assert_eq!(placed.position, Point::new(220.0, 0.0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["item_placed", "save_intent", "item_placed", "save_intent"]
        );
    }

    #[test]
    fn place_item_at_rejects_occupied_and_duplicate() {
        let mut board = Pinboard::default();
        place_at(&mut board, "a", GridCell::new(1, 1));

        let occupied = board.dispatch(BoardCommand::PlaceItemAt {
            item_id: ItemId::new("b"),
            payload: payload("B"),
            cell: GridCell::new(1, 1),
        });
        assert!(matches!(
            occupied,
            Err(BoardError::CellOccupied { row: 1, col: 1 })
        ));

        let duplicate = board.dispatch(BoardCommand::PlaceItem {
            item_id: ItemId::new("a"),
            payload: payload("A"),
            column: None,
        });
        assert!(matches!(duplicate, Err(BoardError::DuplicateItem(_))));
        assert_eq!(board.board().item_count(), 1);
    }

    #[test]
    fn drop_swaps_and_moves_through_commands() {
        let mut board = Pinboard::default();
        place_at(&mut board, "a", GridCell::new(0, 0));
        place_at(&mut board, "b", GridCell::new(0, 1));
        let seen = recorded(&mut board);

        board
            .dispatch(BoardCommand::DropItem {
                item_id: ItemId::new("a"),
                from: GridCell::new(0, 0),
                to: GridCell::new(0, 1),
            })
            .unwrap();
        assert_eq!(
            board.board().item(&ItemId::new("a")).unwrap().grid_position,
            GridCell::new(0, 1)
        );
        assert_eq!(
            board.board().item(&ItemId::new("b")).unwrap().grid_position,
            GridCell::new(0, 0)
        );

        board
            .dispatch(BoardCommand::DropItemAtPixel {
                item_id: ItemId::new("b"),
                from: GridCell::new(0, 0),
                point: Point::new(500.0, 10.0),
            })
            .unwrap();
        // No viewport yet: pixel lookups clamp to cell 0 on both axes.
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["items_swapped", "save_intent", "drop_ignored"]
        );
    }

    #[test]
    fn stale_drop_is_ignored_without_save() {
        let mut board = Pinboard::default();
        place_at(&mut board, "a", GridCell::new(0, 0));
        let seen = recorded(&mut board);

        board
            .dispatch(BoardCommand::DropItem {
                item_id: ItemId::new("a"),
                from: GridCell::new(3, 0),
                to: GridCell::new(0, 2),
            })
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["drop_ignored"]);
    }

    #[test]
    fn move_column_emits_save_and_keeps_cells_consistent() {
        let mut board = Pinboard::default();
        place_at(&mut board, "a", GridCell::new(2, 0));
        let seen = recorded(&mut board);

        board
            .dispatch(BoardCommand::MoveColumn { from: 0, to: 9 })
            .unwrap();
        assert_eq!(
            board.board().item(&ItemId::new("a")).unwrap().grid_position,
            GridCell::new(2, 2)
        );
        assert_eq!(*seen.lock().unwrap(), vec!["column_moved", "save_intent"]);

        board
            .dispatch(BoardCommand::MoveColumn { from: 1, to: 1 })
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);

        assert!(matches!(
            board.dispatch(BoardCommand::MoveColumn { from: 7, to: 0 }),
            Err(BoardError::ColumnOutOfRange { index: 7, len: 3 })
        ));
    }

    #[test]
    fn add_column_does_not_request_save() {
        let mut board = Pinboard::default();
        let seen = recorded(&mut board);
        board.dispatch(BoardCommand::AddColumn { at: 1 }).unwrap();
        board.dispatch(BoardCommand::EnsureColumns { visible: 6 }).unwrap();
        assert_eq!(board.board().column_count(), 6);
        assert_eq!(*seen.lock().unwrap(), vec!["column_added", "columns_grown"]);
    }

    #[test]
    fn remove_and_select_variant() {
        let mut board = Pinboard::default();
        board
            .dispatch(BoardCommand::PlaceItemAt {
                item_id: ItemId::new("a"),
                payload: payload("A").with_variant(PayloadVariant::new("x02220", "001230")),
                cell: GridCell::new(0, 0),
            })
            .unwrap();

        board
            .dispatch(BoardCommand::SelectVariant {
                item_id: ItemId::new("a"),
                variant: Some(0),
            })
            .unwrap();
        assert!(board.board().item(&ItemId::new("a")).unwrap().variant().is_some());
        assert!(matches!(
            board.dispatch(BoardCommand::SelectVariant {
                item_id: ItemId::new("a"),
                variant: Some(3),
            }),
            Err(BoardError::VariantOutOfRange { variant: 3, .. })
        ));

        board
            .dispatch(BoardCommand::RemoveItem {
                item_id: ItemId::new("a"),
            })
            .unwrap();
        assert_eq!(board.board().item_count(), 0);
        assert!(matches!(
            board.dispatch(BoardCommand::RemoveItem {
                item_id: ItemId::new("a"),
            }),
            Err(BoardError::ItemNotFound(_))
        ));
    }

    #[test]
    fn plugin_follow_ups_run_after_current_command() {
        let mut board = Pinboard::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut first = Recorder::new(Arc::clone(&seen));
        first.follow_up = Some(BoardCommand::Save);
        board.register_plugin(first);

        place_at(&mut board, "a", GridCell::new(0, 0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["item_placed", "save_intent", "save_intent"]
        );
    }

    #[test]
    fn consumed_event_stops_later_plugins_but_reaches_observers() {
        let mut board = Pinboard::default();
        let first_seen = Arc::new(Mutex::new(Vec::new()));
        let mut first = Recorder::new(Arc::clone(&first_seen));
        first.consume = true;
        board.register_plugin(first);
        let second_seen = recorded(&mut board);

        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        let _sub = board
            .subscribe(move |event| sink.lock().unwrap().push(event.name()))
            .unwrap();

        board.dispatch(BoardCommand::Save).unwrap();
        assert_eq!(*first_seen.lock().unwrap(), vec!["save_intent"]);
        assert!(second_seen.lock().unwrap().is_empty());
        assert_eq!(*observed.lock().unwrap(), vec!["save_intent"]);
    }

    #[test]
    fn add_by_name_places_or_records_error() {
        let provider = CatalogProvider::new(vec![payload("G")]);
        let mut board = Pinboard::default();

        let id = board.add_by_name(&provider, " g ").unwrap();
        assert!(board.board().item(&id).is_some());
        assert_eq!(board.last_error(), None);

        assert!(board.add_by_name(&provider, "   ").is_err());
        assert_eq!(board.last_error(), Some("Please enter a name"));

        let err = board.add_by_name(&provider, "H").unwrap_err();
        assert!(matches!(err, BoardError::Lookup(LookupError::NotFound(_))));
        assert_eq!(board.last_error(), Some("\"H\" not found"));
        assert_eq!(board.board().item_count(), 1);
    }

    #[test]
    fn add_by_fingering_selects_matching_variant() {
        let provider = CatalogProvider::new(vec![
            ItemPayload::new("D", "")
                .with_variant(PayloadVariant::new("xx0232", "000132"))
                .with_variant(PayloadVariant::new("x54232", "043121")),
        ]);
        let mut board = Pinboard::default();

        let id = board.add_by_fingering(&provider, "x54232").unwrap();
        let item = board.board().item(&id).unwrap();
        assert_eq!(item.selected_variant, Some(1));

        assert!(matches!(
            board.add_by_fingering(&provider, "x5423"),
            Err(BoardError::Lookup(LookupError::Validation(_)))
        ));
        let down = provider.with_outage("timeout");
        assert!(board.add_by_fingering(&down, "x54232").is_err());
        assert_eq!(board.last_error(), Some("Lookup failed, please try again"));
    }

    #[test]
    fn commands_are_logged_and_counted() {
        let sink = MemorySink::new();
        let mut config = BoardConfig::default().with_logger(Logger::new(sink.clone()));
        config.enable_metrics();
        let metrics = config.metrics_handle().unwrap();
        let mut board = Pinboard::new(config);

        place_at(&mut board, "a", GridCell::new(0, 0));
        board
            .dispatch(BoardCommand::DropItem {
                item_id: ItemId::new("a"),
                from: GridCell::new(0, 0),
                to: GridCell::new(0, 0),
            })
            .unwrap();

        let snapshot = metrics.lock().unwrap().snapshot(Duration::ZERO);
        assert_eq!(snapshot.commands, 2);
        assert_eq!(snapshot.placements, 1);
        assert_eq!(snapshot.ignored_drops, 1);

        let ignored = sink
            .events()
            .into_iter()
            .find(|event| event.message == "drop_ignored")
            .unwrap();
        assert_eq!(ignored.target, "pinboard::board");
        assert_eq!(ignored.field("reason"), Some(&json!("same_cell")));
    }

    #[test]
    fn clear_resets_to_visible_columns() {
        let mut board = Pinboard::default();
        board
            .dispatch(BoardCommand::Resize {
                width: 900.0,
                height: 600.0,
            })
            .unwrap();
        board.dispatch(BoardCommand::AddColumn { at: 0 }).unwrap();
        place_at(&mut board, "a", GridCell::new(0, 0));

        board.dispatch(BoardCommand::Clear).unwrap();
        assert_eq!(board.board().column_count(), 5);
        assert_eq!(board.board().item_count(), 0);
    }
}
