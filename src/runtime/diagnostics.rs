use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::Result;
use crate::geometry::GridCell;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::metrics::BoardMetrics;
use crate::render::BoardSketch;

use super::{BoardContext, BoardEvent, BoardPlugin, EventFlow};

/// Logs board events for observability/debugging.
pub struct BoardLoggerPlugin {
    logger: Logger,
    level: LogLevel,
    log_ticks: bool,
    sketch: Option<BoardSketch>,
}

impl BoardLoggerPlugin {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LogLevel::Debug,
            log_ticks: false,
            sketch: None,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn log_ticks(mut self, enabled: bool) -> Self {
        self.log_ticks = enabled;
        self
    }

    /// Also log a text sketch of the board after every layout change.
    pub fn with_sketch(mut self, sketch: BoardSketch) -> Self {
        self.sketch = Some(sketch);
        self
    }

    fn emit(&self, message: &str, fields: impl IntoIterator<Item = (String, Value)>) {
        let event = event_with_fields(self.level, "pinboard::events", message, fields);
        let _ = self.logger.log_event(event);
    }
}

fn cell_fields(prefix: &str, cell: GridCell) -> [(String, Value); 2] {
    [
        json_kv(&format!("{prefix}row"), json!(cell.row)),
        json_kv(&format!("{prefix}col"), json!(cell.col)),
    ]
}

fn event_fields(event: &BoardEvent) -> Vec<(String, Value)> {
    let mut fields = Vec::new();
    match event {
        BoardEvent::ItemPlaced { item_id, cell } | BoardEvent::ItemRemoved { item_id, cell } => {
            fields.push(json_str("item", item_id.as_str()));
            fields.extend(cell_fields("", *cell));
        }
        BoardEvent::ItemMoved {
            item_id,
            from,
            to,
            fallback,
        } => {
            fields.push(json_str("item", item_id.as_str()));
            fields.extend(cell_fields("from_", *from));
            fields.extend(cell_fields("to_", *to));
            fields.push(json_kv("fallback", json!(fallback)));
        }
        BoardEvent::ItemsSwapped {
            item_id,
            other_id,
            from,
            to,
        } => {
            fields.push(json_str("item", item_id.as_str()));
            fields.push(json_str("other", other_id.as_str()));
            fields.extend(cell_fields("from_", *from));
            fields.extend(cell_fields("to_", *to));
        }
        BoardEvent::DropIgnored { item_id, reason } => {
            fields.push(json_str("item", item_id.as_str()));
            fields.push(json_str("reason", reason.as_str()));
        }
        BoardEvent::VariantSelected { item_id, variant } => {
            fields.push(json_str("item", item_id.as_str()));
            fields.push(json_kv("variant", json!(variant)));
        }
        BoardEvent::ColumnAdded { at } => fields.push(json_kv("at", json!(at))),
        BoardEvent::ColumnMoved { from, to } => {
            fields.push(json_kv("from", json!(from)));
            fields.push(json_kv("to", json!(to)));
        }
        BoardEvent::ColumnsGrown { added, total } => {
            fields.push(json_kv("added", json!(added)));
            fields.push(json_kv("total", json!(total)));
        }
        BoardEvent::Resized { columns, rows } => {
            fields.push(json_kv("columns", json!(columns)));
            fields.push(json_kv("rows", json!(rows)));
        }
        BoardEvent::Tick { elapsed } => {
            fields.push(json_kv("elapsed_ms", json!(elapsed.as_millis() as u64)));
        }
        BoardEvent::BoardLoaded { columns, items } => {
            fields.push(json_kv("columns", json!(columns)));
            fields.push(json_kv("items", json!(items)));
        }
        BoardEvent::SaveIntent | BoardEvent::LoadRequested | BoardEvent::BoardCleared => {}
    }
    fields
}

impl BoardPlugin for BoardLoggerPlugin {
    fn name(&self) -> &str {
        "diagnostics.board_logger"
    }

    fn init(&mut self, ctx: &mut BoardContext<'_>) -> Result<()> {
        self.emit(
            "plugin_initialized",
            [
                json_kv("logger_level", json!(format!("{:?}", self.level))),
                json_kv("columns", json!(ctx.board().column_count())),
            ],
        );
        Ok(())
    }

    fn on_event(&mut self, ctx: &mut BoardContext<'_>, event: &BoardEvent) -> Result<EventFlow> {
        if matches!(event, BoardEvent::Tick { .. }) && !self.log_ticks {
            return Ok(EventFlow::Continue);
        }
        self.emit(&format!("event.{}", event.name()), event_fields(event));

        if let Some(sketch) = self.sketch.as_ref() {
            if event.changes_layout() {
                let text = sketch.render(ctx.board());
                self.emit("board_sketch", [json_str("sketch", text)]);
            }
        }
        Ok(EventFlow::Continue)
    }
}

/// Emits board metrics snapshots once enough tick time has passed.
pub struct MetricsSnapshotPlugin {
    logger: Logger,
    metrics: Arc<Mutex<BoardMetrics>>,
    target: String,
    interval: Duration,
    since_emit: Duration,
    started_at: Instant,
}

impl MetricsSnapshotPlugin {
    pub fn new(logger: Logger, metrics: Arc<Mutex<BoardMetrics>>) -> Self {
        Self {
            logger,
            metrics,
            target: "pinboard::metrics".to_string(),
            interval: Duration::from_secs(5),
            since_emit: Duration::ZERO,
            started_at: Instant::now(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    fn on_tick(&mut self, elapsed: Duration) {
        if self.interval.is_zero() {
            return;
        }
        self.since_emit += elapsed;
        if self.since_emit < self.interval {
            return;
        }
        self.since_emit = Duration::ZERO;

        if let Ok(guard) = self.metrics.lock() {
            let event = guard
                .snapshot(self.started_at.elapsed())
                .to_log_event(&self.target);
            let _ = self.logger.log_event(event);
        }
    }
}

impl BoardPlugin for MetricsSnapshotPlugin {
    fn name(&self) -> &str {
        "diagnostics.metrics_snapshot"
    }

    fn init(&mut self, _ctx: &mut BoardContext<'_>) -> Result<()> {
        self.started_at = Instant::now();
        self.since_emit = Duration::ZERO;
        Ok(())
    }

    fn on_event(&mut self, _ctx: &mut BoardContext<'_>, event: &BoardEvent) -> Result<EventFlow> {
        if let BoardEvent::Tick { elapsed } = event {
            self.on_tick(*elapsed);
        }
        Ok(EventFlow::Continue)
    }
}
