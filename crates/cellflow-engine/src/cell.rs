//! The atomic unit of grid state.
//!
//! A [`Cell`] knows its position, its presentation flags, its formula text, its
//! current value and which other cells depend on it. Setters never recompute
//! anything: they return the [`CellEvent`] describing the change, and the owning
//! [`crate::Grid`] decides what to recalculate.

use std::collections::BTreeSet;

use crate::cell_ref::CellRef;
use crate::event::CellEvent;
use crate::value::Value;

#[derive(Clone, Debug)]
pub struct Cell {
    index: usize,
    position: CellRef,
    selected: bool,
    editing: bool,
    formula: Option<String>,
    value: Option<Value>,
    /// Row-major indices of cells whose formula read this cell.
    dependents: BTreeSet<usize>,
    /// Row-major indices of cells this cell's formula read during its last evaluation.
    precedents: BTreeSet<usize>,
}

impl Cell {
    pub(crate) fn new(index: usize, position: CellRef) -> Cell {
        Cell {
            index,
            position,
            selected: false,
            editing: false,
            formula: None,
            value: None,
            dependents: BTreeSet::new(),
            precedents: BTreeSet::new(),
        }
    }

    pub fn row(&self) -> usize {
        self.position.row
    }

    pub fn column(&self) -> usize {
        self.position.col
    }

    pub fn position(&self) -> CellRef {
        self.position
    }

    /// Row-major index of this cell inside its grid.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn editing(&self) -> bool {
        self.editing
    }

    /// Raw formula text, including the leading `=`.
    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn dependents(&self) -> impl Iterator<Item = usize> + '_ {
        self.dependents.iter().copied()
    }

    pub fn has_dependent(&self, index: usize) -> bool {
        self.dependents.contains(&index)
    }

    pub(crate) fn set_selected(&mut self, selected: bool) -> CellEvent {
        self.selected = selected;
        CellEvent::Selected {
            cell: self.position,
            selected,
        }
    }

    pub(crate) fn set_editing(&mut self, editing: bool) -> CellEvent {
        self.editing = editing;
        CellEvent::Editing {
            cell: self.position,
            editing,
        }
    }

    pub(crate) fn set_formula(&mut self, formula: Option<String>) -> CellEvent {
        self.formula = formula.clone();
        CellEvent::Formula {
            cell: self.position,
            formula,
        }
    }

    pub(crate) fn set_value(&mut self, value: Option<Value>) -> CellEvent {
        self.value = value.clone();
        CellEvent::Value {
            cell: self.position,
            value,
        }
    }

    /// Record that `index` depends on this cell. Self and duplicates are ignored.
    pub(crate) fn add_dependent(&mut self, index: usize) -> bool {
        if index == self.index {
            return false;
        }
        self.dependents.insert(index)
    }

    pub(crate) fn remove_dependent(&mut self, index: usize) -> bool {
        self.dependents.remove(&index)
    }

    pub(crate) fn dependents_snapshot(&self) -> Vec<usize> {
        self.dependents.iter().copied().collect()
    }

    pub(crate) fn add_precedent(&mut self, index: usize) {
        if index != self.index {
            self.precedents.insert(index);
        }
    }

    pub(crate) fn take_precedents(&mut self) -> BTreeSet<usize> {
        std::mem::take(&mut self.precedents)
    }
}
