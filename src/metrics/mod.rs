use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Running counters for board activity.
#[derive(Debug, Default, Clone)]
pub struct BoardMetrics {
    commands: u64,
    placements: u64,
    moves: u64,
    swaps: u64,
    fallbacks: u64,
    ignored_drops: u64,
    column_moves: u64,
    saves: u64,
    save_failures: u64,
}

impl BoardMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_command(&mut self) {
        self.commands = self.commands.saturating_add(1);
    }

    pub fn record_placement(&mut self) {
        self.placements = self.placements.saturating_add(1);
    }

    pub fn record_move(&mut self, fallback: bool) {
        self.moves = self.moves.saturating_add(1);
        if fallback {
            self.fallbacks = self.fallbacks.saturating_add(1);
        }
    }

    pub fn record_swap(&mut self) {
        self.swaps = self.swaps.saturating_add(1);
    }

    pub fn record_ignored_drop(&mut self) {
        self.ignored_drops = self.ignored_drops.saturating_add(1);
    }

    pub fn record_column_move(&mut self) {
        self.column_moves = self.column_moves.saturating_add(1);
    }

    pub fn record_save(&mut self, ok: bool) {
        if ok {
            self.saves = self.saves.saturating_add(1);
        } else {
            self.save_failures = self.save_failures.saturating_add(1);
        }
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            commands: self.commands,
            placements: self.placements,
            moves: self.moves,
            swaps: self.swaps,
            fallbacks: self.fallbacks,
            ignored_drops: self.ignored_drops,
            column_moves: self.column_moves,
            saves: self.saves,
            save_failures: self.save_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub commands: u64,
    pub placements: u64,
    pub moves: u64,
    pub swaps: u64,
    pub fallbacks: u64,
    pub ignored_drops: u64,
    pub column_moves: u64,
    pub saves: u64,
    pub save_failures: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "board_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("commands".to_string(), json!(self.commands));
        map.insert("placements".to_string(), json!(self.placements));
        map.insert("moves".to_string(), json!(self.moves));
        map.insert("swaps".to_string(), json!(self.swaps));
        map.insert("fallbacks".to_string(), json!(self.fallbacks));
        map.insert("ignored_drops".to_string(), json!(self.ignored_drops));
        map.insert("column_moves".to_string(), json!(self.column_moves));
        map.insert("saves".to_string(), json!(self.saves));
        map.insert("save_failures".to_string(), json!(self.save_failures));
        map
    }
}
