use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use crate::Result;
use crate::board::Board;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::metrics::BoardMetrics;
use crate::persistence::{PersistenceBridge, PersistenceError};

use super::{BoardCommand, BoardContext, BoardEvent, BoardPlugin, EventFlow};

/// Outcome counters of the persistence plugin, readable from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceStatus {
    pub saves: u64,
    /// Saves written by the interval timer rather than a save intent.
    pub autosaves: u64,
    pub failures: u64,
    pub loads: u64,
    /// Message of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
}

impl PersistenceStatus {
    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }
}

pub type SharedPersistenceStatus = Arc<Mutex<PersistenceStatus>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveTrigger {
    Intent,
    Autosave,
}

impl SaveTrigger {
    fn as_str(self) -> &'static str {
        match self {
            SaveTrigger::Intent => "intent",
            SaveTrigger::Autosave => "autosave",
        }
    }
}

/// Writes the board through a [`PersistenceBridge`].
///
/// Saves on every save intent and, as a backstop, whenever `autosave_interval`
/// of tick time has accumulated since the last save. The interval save is
/// unconditional so a store emptied or overwritten elsewhere gets rewritten.
/// Failures are recorded and logged; the in-memory board is never rolled
/// back and nothing is retried.
pub struct PersistencePlugin<B> {
    bridge: B,
    status: SharedPersistenceStatus,
    autosave_interval: Duration,
    since_save: Duration,
    load_on_init: bool,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<BoardMetrics>>>,
}

impl<B: PersistenceBridge> PersistencePlugin<B> {
    pub fn new(bridge: B) -> Self {
        Self {
            bridge,
            status: Arc::new(Mutex::new(PersistenceStatus::default())),
            autosave_interval: Duration::from_secs(5),
            since_save: Duration::ZERO,
            load_on_init: false,
            logger: None,
            metrics: None,
        }
    }

    /// Zero disables autosave.
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    /// Queue a load when the plugin is initialized.
    pub fn load_on_init(mut self, enabled: bool) -> Self {
        self.load_on_init = enabled;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<BoardMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn status(&self) -> SharedPersistenceStatus {
        Arc::clone(&self.status)
    }

    fn save(&mut self, board: &Board, trigger: SaveTrigger) {
        match self.bridge.save(board) {
            Ok(()) => {
                self.since_save = Duration::ZERO;
                self.update_status(|status| {
                    status.saves += 1;
                    if trigger == SaveTrigger::Autosave {
                        status.autosaves += 1;
                    }
                    status.last_error = None;
                });
                self.record_save_metric(true);
                self.log(
                    LogLevel::Debug,
                    "board_saved",
                    [
                        json_str("trigger", trigger.as_str()),
                        json_kv("items", json!(board.item_count())),
                    ],
                );
            }
            Err(err) => {
                self.record_save_metric(false);
                self.record_failure("save", &err);
            }
        }
    }

    fn load(&mut self, ctx: &mut BoardContext<'_>) {
        match self.bridge.load() {
            Ok(Some(board)) => {
                self.update_status(|status| {
                    status.loads += 1;
                    status.last_error = None;
                });
                ctx.queue(BoardCommand::Restore(Box::new(board)));
            }
            Ok(None) => {
                self.log(LogLevel::Info, "no_saved_board", std::iter::empty());
            }
            Err(err) => self.record_failure("load", &err),
        }
    }

    fn clear(&mut self) {
        match self.bridge.clear() {
            Ok(()) => {
                self.update_status(|status| status.last_error = None);
            }
            Err(err) => self.record_failure("clear", &err),
        }
    }

    fn record_failure(&self, operation: &str, err: &PersistenceError) {
        let message = format!("{operation} failed: {err}");
        self.log(
            LogLevel::Warn,
            "persistence_failed",
            [json_str("operation", operation), json_str("error", err.to_string())],
        );
        self.update_status(|status| {
            status.failures += 1;
            status.last_error = Some(message);
        });
    }

    fn update_status(&self, apply: impl FnOnce(&mut PersistenceStatus)) {
        if let Ok(mut guard) = self.status.lock() {
            apply(&mut *guard);
        }
    }

    fn record_save_metric(&self, ok: bool) {
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_save(ok);
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(level, "pinboard::persistence", message, fields);
            let _ = logger.log_event(event);
        }
    }
}

impl<B: PersistenceBridge> BoardPlugin for PersistencePlugin<B> {
    fn name(&self) -> &str {
        "persistence"
    }

    fn init(&mut self, ctx: &mut BoardContext<'_>) -> Result<()> {
        self.since_save = Duration::ZERO;
        if self.load_on_init {
            ctx.queue(BoardCommand::Load);
        }
        Ok(())
    }

    fn on_event(&mut self, ctx: &mut BoardContext<'_>, event: &BoardEvent) -> Result<EventFlow> {
        match event {
            BoardEvent::SaveIntent => self.save(ctx.board(), SaveTrigger::Intent),
            BoardEvent::Tick { elapsed } => {
                self.since_save += *elapsed;
                if !self.autosave_interval.is_zero() && self.since_save >= self.autosave_interval {
                    self.since_save = Duration::ZERO;
                    self.save(ctx.board(), SaveTrigger::Autosave);
                }
            }
            BoardEvent::LoadRequested => self.load(ctx),
            BoardEvent::BoardLoaded { .. } => self.since_save = Duration::ZERO,
            BoardEvent::BoardCleared => self.clear(),
            _ => {}
        }
        Ok(EventFlow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{ItemId, ItemPayload};
    use crate::geometry::{GridCell, GridGeometry};
    use crate::logging::MemorySink;
    use crate::persistence::{MemoryStore, decode_snapshot, encode_snapshot};
    use crate::runtime::{BoardConfig, Pinboard};

    fn place(board: &mut Pinboard, id: &str, cell: GridCell) {
        board
            .dispatch(BoardCommand::PlaceItemAt {
                item_id: ItemId::new(id),
                payload: ItemPayload::new(id, ""),
                cell,
            })
            .unwrap();
    }

    fn tick(board: &mut Pinboard, secs: u64) {
        board
            .dispatch(BoardCommand::Tick {
                elapsed: Duration::from_secs(secs),
            })
            .unwrap();
    }

    #[test]
    fn save_intent_writes_snapshot() {
        let store = MemoryStore::new();
        let mut board = Pinboard::default();
        let status = board.attach_persistence(store.clone(), false);

        place(&mut board, "a", GridCell::new(1, 2));
        assert_eq!(store.save_count(), 1);
        assert_eq!(status.lock().unwrap().saves, 1);

        let saved = decode_snapshot(&store.raw().unwrap()).unwrap();
        assert_eq!(
            saved.item(&ItemId::new("a")).unwrap().grid_position,
            GridCell::new(1, 2)
        );
    }

    #[test]
    fn autosave_runs_on_interval() {
        let store = MemoryStore::new();
        let mut board = Pinboard::default();
        let status = board.attach_persistence(store.clone(), false);

        place(&mut board, "a", GridCell::new(0, 0));
        tick(&mut board, 3);
        assert_eq!(store.save_count(), 1);
        tick(&mut board, 3);
        assert_eq!(store.save_count(), 2);
        assert_eq!(status.lock().unwrap().autosaves, 1);

        // Column growth does not request a save; the autosave catches it.
        board.dispatch(BoardCommand::AddColumn { at: 3 }).unwrap();
        tick(&mut board, 5);
        assert_eq!(store.save_count(), 3);
        assert_eq!(decode_snapshot(&store.raw().unwrap()).unwrap().column_count(), 4);
    }

    #[test]
    fn autosave_rewrites_a_store_emptied_elsewhere() {
        let store = MemoryStore::new();
        let mut board = Pinboard::default();
        board.attach_persistence(store.clone(), false);

        place(&mut board, "a", GridCell::new(0, 2));
        store.clear().unwrap();
        assert!(store.raw().is_none());

        tick(&mut board, 5);
        let restored = decode_snapshot(&store.raw().unwrap()).unwrap();
        assert_eq!(
            restored.item(&ItemId::new("a")).unwrap().grid_position,
            GridCell::new(0, 2)
        );
    }

    #[test]
    fn save_failure_is_recorded_without_rollback() {
        let store = MemoryStore::new();
        let sink = MemorySink::new();
        let mut config = BoardConfig::default().with_logger(Logger::new(sink.clone()));
        config.enable_metrics();
        let metrics = config.metrics_handle().unwrap();
        let mut board = Pinboard::new(config);
        let status = board.attach_persistence(store.clone(), false);

        store.set_failing(true);
        place(&mut board, "a", GridCell::new(0, 0));
        assert!(board.board().item(&ItemId::new("a")).is_some());
        {
            let status = status.lock().unwrap();
            assert_eq!(status.failures, 1);
            assert!(!status.is_healthy());
        }
        assert_eq!(metrics.lock().unwrap().snapshot(Duration::ZERO).save_failures, 1);
        assert!(sink.messages().contains(&"persistence_failed".to_string()));

        store.set_failing(false);
        board.dispatch(BoardCommand::Save).unwrap();
        assert!(status.lock().unwrap().is_healthy());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn load_on_start_restores_saved_board() {
        let geometry = GridGeometry::default();
        let mut saved = Board::with_columns(4);
        saved.columns[3].items.push(crate::board::Item::new(
            ItemId::new("kept"),
            ItemPayload::new("E", "m"),
            GridCell::new(2, 3),
            &geometry,
        ));
        let store = MemoryStore::with_raw(encode_snapshot(&saved).unwrap());

        let mut board = Pinboard::default();
        let status = board.attach_persistence(store.clone(), true);
        board.start().unwrap();

        assert_eq!(board.board().column_count(), 4);
        assert_eq!(
            board.board().item(&ItemId::new("kept")).unwrap().grid_position,
            GridCell::new(2, 3)
        );
        assert_eq!(status.lock().unwrap().loads, 1);

        // Restoring is not a change, so nothing is written until the timer.
        assert_eq!(store.save_count(), 0);
        tick(&mut board, 5);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn newer_snapshot_leaves_board_untouched() {
        let store = MemoryStore::with_raw(r#"{"version": 9, "columns": []}"#);
        let mut board = Pinboard::default();
        let status = board.attach_persistence(store, false);

        board.dispatch(BoardCommand::Load).unwrap();
        assert_eq!(board.board().column_count(), 3);
        let status = status.lock().unwrap();
        assert!(status.last_error.as_deref().unwrap().contains("version 9"));
    }

    #[test]
    fn clear_removes_stored_snapshot() {
        let store = MemoryStore::new();
        let mut board = Pinboard::default();
        board.attach_persistence(store.clone(), false);

        place(&mut board, "a", GridCell::new(0, 0));
        assert!(store.raw().is_some());
        board.dispatch(BoardCommand::Clear).unwrap();
        assert!(store.raw().is_none());
        assert_eq!(board.board().item_count(), 0);
    }
}
