//! Cell-level notifications.

use crate::cell_ref::CellRef;
use crate::value::Value;

/// Which attribute of a cell changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Selected,
    Editing,
    Formula,
    Value,
}

/// Emitted by a cell every time one of its attributes is set, then forwarded
/// by the owning grid to its subscribers. Each variant carries the new state.
#[derive(Clone, Debug, PartialEq)]
pub enum CellEvent {
    Selected { cell: CellRef, selected: bool },
    Editing { cell: CellRef, editing: bool },
    Formula { cell: CellRef, formula: Option<String> },
    Value { cell: CellRef, value: Option<Value> },
}

impl CellEvent {
    pub fn cell(&self) -> CellRef {
        match self {
            CellEvent::Selected { cell, .. }
            | CellEvent::Editing { cell, .. }
            | CellEvent::Formula { cell, .. }
            | CellEvent::Value { cell, .. } => *cell,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            CellEvent::Selected { .. } => EventKind::Selected,
            CellEvent::Editing { .. } => EventKind::Editing,
            CellEvent::Formula { .. } => EventKind::Formula,
            CellEvent::Value { .. } => EventKind::Value,
        }
    }
}
