//! Pointer gestures: drag sessions, the drag registry and panning.
//!
//! The tracker turns pointer input into at most one board command per
//! gesture. Hover during a drag only reads geometry; the drop is the only
//! step that produces a mutation.

use std::collections::HashSet;

use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

use crate::board::{Board, ColumnId, ItemId};
use crate::geometry::{GridCell, GridGeometry, Point};
use crate::runtime::BoardCommand;

/// Identity of something that can be dragged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DragKey {
    Item(ItemId),
    Column(ColumnId),
}

/// Set of elements that have drag handling attached. Wiring is idempotent.
#[derive(Debug, Clone, Default)]
pub struct DragRegistry {
    wired: HashSet<DragKey>,
}

impl DragRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the key was already wired.
    pub fn wire(&mut self, key: DragKey) -> bool {
        self.wired.insert(key)
    }

    pub fn unwire(&mut self, key: &DragKey) -> bool {
        self.wired.remove(key)
    }

    pub fn is_wired(&self, key: &DragKey) -> bool {
        self.wired.contains(key)
    }

    pub fn len(&self) -> usize {
        self.wired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wired.is_empty()
    }

    /// Wire every column and item on the board and forget keys whose element
    /// is gone. Returns how many keys were newly wired.
    pub fn sync_board(&mut self, board: &Board) -> usize {
        self.retain_board(board);
        let mut added = 0;
        for column in &board.columns {
            if self.wire(DragKey::Column(column.id.clone())) {
                added += 1;
            }
            for item in &column.items {
                if self.wire(DragKey::Item(item.id.clone())) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Drop keys that no longer name anything on the board.
    pub fn retain_board(&mut self, board: &Board) {
        self.wired.retain(|key| match key {
            DragKey::Item(id) => board.locate(id).is_some(),
            DragKey::Column(id) => board.column_position(id).is_some(),
        });
    }

    pub fn clear(&mut self) {
        self.wired.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

impl From<MouseButton> for PointerButton {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => PointerButton::Primary,
            MouseButton::Middle => PointerButton::Middle,
            MouseButton::Right => PointerButton::Secondary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerKind {
    Down(PointerButton),
    Drag(PointerButton),
    Up(PointerButton),
    Moved,
    Leave,
}

/// Pointer input in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub point: Point,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, point: Point) -> Self {
        Self { kind, point }
    }

    /// Convert a terminal mouse event. Scroll events have no pointer meaning
    /// here and map to `None`.
    pub fn from_mouse(event: MouseEvent, scale: TerminalScale) -> Option<Self> {
        let kind = match event.kind {
            MouseEventKind::Down(button) => PointerKind::Down(button.into()),
            MouseEventKind::Drag(button) => PointerKind::Drag(button.into()),
            MouseEventKind::Up(button) => PointerKind::Up(button.into()),
            MouseEventKind::Moved => PointerKind::Moved,
            _ => return None,
        };
        Some(Self::new(kind, scale.to_pixels(event.column, event.row)))
    }
}

/// Pixels covered by one terminal cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalScale {
    pub px_per_column: f64,
    pub px_per_row: f64,
}

impl TerminalScale {
    pub fn new(px_per_column: f64, px_per_row: f64) -> Self {
        Self {
            px_per_column,
            px_per_row,
        }
    }

    /// Centre of the terminal cell, so a click lands inside the board cell it
    /// visually covers.
    pub fn to_pixels(&self, column: u16, row: u16) -> Point {
        Point::new(
            (f64::from(column) + 0.5) * self.px_per_column,
            (f64::from(row) + 0.5) * self.px_per_row,
        )
    }
}

impl Default for TerminalScale {
    fn default() -> Self {
        Self::new(10.0, 20.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DragSession {
    key: DragKey,
    origin: GridCell,
    current: Point,
}

/// What the pointer is over during a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverTarget {
    pub cell: GridCell,
    pub column: usize,
}

/// Middle-button panning. The scroll offset moves opposite to the pointer
/// and never goes negative.
#[derive(Debug, Clone, Default)]
pub struct Panner {
    active: bool,
    anchor: Point,
    origin_scroll: Point,
    scroll: Point,
}

impl Panner {
    pub fn start(&mut self, at: Point) {
        self.active = true;
        self.anchor = at;
        self.origin_scroll = self.scroll;
    }

    pub fn update(&mut self, at: Point) -> Option<Point> {
        if !self.active {
            return None;
        }
        self.scroll = Point::new(
            (self.origin_scroll.x - (at.x - self.anchor.x)).max(0.0),
            (self.origin_scroll.y - (at.y - self.anchor.y)).max(0.0),
        );
        Some(self.scroll)
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_panning(&self) -> bool {
        self.active
    }

    pub fn scroll(&self) -> Point {
        self.scroll
    }
}

/// Tracks one drag gesture at a time.
#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    registry: DragRegistry,
    session: Option<DragSession>,
    panner: Panner,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &DragRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DragRegistry {
        &mut self.registry
    }

    pub fn panner(&self) -> &Panner {
        &self.panner
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn dragging(&self) -> Option<&DragKey> {
        self.session.as_ref().map(|session| &session.key)
    }

    /// Start dragging a wired element. Unwired or vanished elements are
    /// ignored.
    pub fn begin(&mut self, key: DragKey, board: &Board, at: Point) -> bool {
        if !self.registry.is_wired(&key) {
            return false;
        }
        let origin = match &key {
            DragKey::Item(id) => match board.item(id) {
                Some(item) => item.grid_position,
                None => return false,
            },
            DragKey::Column(id) => match board.column_position(id) {
                Some(position) => GridCell::new(0, position),
                None => return false,
            },
        };
        self.session = Some(DragSession {
            key,
            origin,
            current: at,
        });
        true
    }

    /// Start dragging whatever item sits under `at` (board pixels).
    pub fn begin_at(
        &mut self,
        at: Point,
        board: &Board,
        geometry: &GridGeometry,
    ) -> Option<DragKey> {
        let cell = geometry.pixel_to_cell(at);
        let key = DragKey::Item(board.item_at(cell, None)?.id.clone());
        self.begin(key.clone(), board, at).then_some(key)
    }

    /// Read-only lookup of the cell and column under the pointer.
    pub fn hover(&mut self, at: Point, geometry: &GridGeometry) -> Option<HoverTarget> {
        let session = self.session.as_mut()?;
        session.current = at;
        Some(HoverTarget {
            cell: geometry.pixel_to_cell(at),
            column: geometry.column_at(at.x),
        })
    }

    /// End the gesture and produce its drop command, if any.
    pub fn finish(
        &mut self,
        at: Point,
        board: &Board,
        geometry: &GridGeometry,
    ) -> Option<BoardCommand> {
        let session = self.session.take()?;
        match session.key {
            DragKey::Item(item_id) => Some(BoardCommand::DropItem {
                item_id,
                from: session.origin,
                to: geometry.pixel_to_cell(at),
            }),
            DragKey::Column(column_id) => {
                let from = board.column_position(&column_id)?;
                let to = geometry.column_at(at.x);
                (from != to).then_some(BoardCommand::MoveColumn { from, to })
            }
        }
    }

    pub fn cancel(&mut self) {
        self.session = None;
    }

    /// Feed one pointer event. Viewport points are shifted by the pan offset
    /// before any board lookup.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        board: &Board,
        geometry: &GridGeometry,
    ) -> Option<BoardCommand> {
        let board_point = event.point.offset(self.panner.scroll());
        match event.kind {
            PointerKind::Down(PointerButton::Primary) => {
                self.begin_at(board_point, board, geometry);
                None
            }
            PointerKind::Drag(PointerButton::Primary) | PointerKind::Moved => {
                self.hover(board_point, geometry);
                None
            }
            PointerKind::Up(PointerButton::Primary) => self.finish(board_point, board, geometry),
            PointerKind::Down(PointerButton::Middle) => {
                self.panner.start(event.point);
                None
            }
            PointerKind::Drag(PointerButton::Middle) => {
                self.panner.update(event.point);
                None
            }
            PointerKind::Up(PointerButton::Middle) => {
                self.panner.stop();
                None
            }
            PointerKind::Leave => {
                self.panner.stop();
                self.cancel();
                None
            }
            _ => None,
        }
    }
}
