use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pinboard::runtime::diagnostics::{BoardLoggerPlugin, MetricsSnapshotPlugin};
use pinboard::{
    Board, BoardCommand, BoardConfig, GridCell, GridGeometry, ItemId, ItemPayload, Logger,
    MemoryStore, NullSink, Pinboard, Viewport, auto_place, resolve_drop,
};

fn build_board() -> Pinboard {
    let logger = Logger::new(NullSink);
    let mut config = BoardConfig::default().with_logger(logger.clone());
    config.metrics_interval = Duration::from_millis(0);
    config.enable_metrics();
    let metrics = config.metrics_handle().expect("metrics handle");

    let mut board = Pinboard::new(config);
    board.register_plugin(BoardLoggerPlugin::new(logger.clone()));
    board.register_plugin(MetricsSnapshotPlugin::new(logger, metrics));
    board.attach_persistence(MemoryStore::new(), false);
    board
}

fn scripted_commands() -> Vec<BoardCommand> {
    let mut script = vec![BoardCommand::Resize {
        width: 1320.0,
        height: 1120.0,
    }];
    for idx in 0..24 {
        script.push(BoardCommand::PlaceItem {
            item_id: ItemId::new(format!("item-{idx}")),
            payload: ItemPayload::new("C", format!("{idx}")),
            column: None,
        });
    }
    for idx in 0..24 {
        let row = idx / 6;
        let col = idx % 6;
        script.push(BoardCommand::DropItem {
            item_id: ItemId::new(format!("item-{idx}")),
            from: GridCell::new(row, col),
            to: GridCell::new((row + 1) % 4, (col + 2) % 6),
        });
    }
    for idx in 0..6 {
        script.push(BoardCommand::MoveColumn {
            from: idx,
            to: 5 - idx,
        });
    }
    script.push(BoardCommand::Tick {
        elapsed: Duration::from_secs(5),
    });
    script
}

fn coordinator_script(c: &mut Criterion) {
    let script = scripted_commands();
    c.bench_function("coordinator_script", |b| {
        b.iter(|| {
            let mut board = build_board();
            for command in black_box(script.clone()) {
                // Scripted drops may target stale cells; those resolve to no-ops.
                let _ = board.dispatch(command);
            }
            black_box(board.board().item_count());
        });
    });
}

fn crowded_board(geometry: &GridGeometry) -> Board {
    let mut board = Board::with_columns(8);
    for col in 0..8 {
        for row in 0..30 {
            let cell = GridCell::new(row, col);
            board.columns[col].items.push(pinboard::Item::new(
                ItemId::new(format!("{row}-{col}")),
                ItemPayload::new("G", ""),
                cell,
                geometry,
            ));
        }
    }
    board
}

fn placement_engine(c: &mut Criterion) {
    let mut geometry = GridGeometry::default();
    geometry.recompute_counts(Viewport::new(1760.0, 8400.0));
    let board = crowded_board(&geometry);

    c.bench_function("auto_place_crowded", |b| {
        b.iter(|| black_box(auto_place(black_box(&board), 8, None)));
    });

    c.bench_function("swap_same_column", |b| {
        b.iter(|| {
            let mut scratch = board.clone();
            black_box(resolve_drop(
                &mut scratch,
                &geometry,
                &ItemId::new("3-2"),
                GridCell::new(3, 2),
                GridCell::new(20, 2),
            ));
        });
    });
}

criterion_group!(board_benches, coordinator_script, placement_engine);
criterion_main!(board_benches);
