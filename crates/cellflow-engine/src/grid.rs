//! Fixed-size grid of cells and the recalculation protocol.
//!
//! The grid owns every [`Cell`]. All mutation goes through it: a cell setter
//! produces a [`CellEvent`], the grid interprets it (formula set -> evaluate the
//! cell, value set -> re-evaluate the cell's dependents) and then forwards it to
//! its own subscribers.
//!
//! Recalculation runs on an explicit depth-first work-list instead of the call
//! stack, so long dependency chains cannot overflow it. An event is queued
//! underneath the work it schedules and is forwarded once that work has
//! drained. Each scheduled evaluation carries its distance from the mutation
//! that caused it; once that distance exceeds [`EngineConfig::max_recalc_depth`]
//! the runaway cell and everything downstream of it are marked `#RECURSION`
//! and the rest of the pass carries on.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use log::{trace, warn};
use rhai::Engine;

use crate::cell::Cell;
use crate::cell_ref::CellRef;
use crate::channel::{Channel, Listener};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::evaluate::create_engine;
use crate::event::CellEvent;
use crate::value::{CellError, Value};

#[derive(Debug)]
enum Work {
    Evaluate { index: usize, depth: usize },
    Publish { index: usize, event: CellEvent },
}

impl Work {
    /// Whether poisoning `cells` makes this entry obsolete.
    fn poisoned_by(&self, cells: &BTreeSet<usize>) -> bool {
        match self {
            Work::Evaluate { index, .. } => cells.contains(index),
            Work::Publish { index, event } => {
                matches!(event, CellEvent::Value { .. }) && cells.contains(index)
            }
        }
    }
}

pub struct Grid {
    rows: usize,
    columns: usize,
    /// Dense row-major storage.
    pub(crate) cells: Vec<Cell>,
    events: Channel<CellEvent>,
    pub(crate) engine: Engine,
    config: EngineConfig,
    pending: Vec<Work>,
    draining: bool,
}

impl Grid {
    /// Create a `rows` x `columns` grid of blank cells with default limits.
    pub fn new(rows: usize, columns: usize) -> Result<Grid> {
        Self::with_config(rows, columns, EngineConfig::default())
    }

    pub fn with_config(rows: usize, columns: usize, config: EngineConfig) -> Result<Grid> {
        let total = rows.checked_mul(columns);
        if rows == 0 || columns == 0 || total.is_none() {
            return Err(EngineError::InvalidDimensions { rows, columns });
        }

        let mut cells = Vec::with_capacity(total.unwrap_or_default());
        for row in 0..rows {
            for col in 0..columns {
                cells.push(Cell::new(row * columns + col, CellRef::new(row, col)));
            }
        }

        Ok(Grid {
            rows,
            columns,
            cells,
            events: Channel::new(),
            engine: create_engine(&config),
            config,
            pending: Vec::new(),
            draining: false,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bounds-checked lookup.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.index_of(row, column).map(|i| &self.cells[i])
    }

    pub fn cell_at(&self, pos: CellRef) -> Option<&Cell> {
        self.cell(pos.row, pos.col)
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Register a listener for every cell event. See [`Channel::subscribe`].
    pub fn subscribe(&self, listener: Listener<CellEvent>) -> bool {
        self.events.subscribe(listener)
    }

    /// Cells inside the inclusive rectangle spanned by two corners, row-major.
    pub fn range(&self, a: CellRef, b: CellRef) -> Result<Vec<&Cell>> {
        let a = self.index_at(a)?;
        let b = self.index_at(b)?;
        Ok(self
            .rectangle(a, b)
            .into_iter()
            .map(|i| &self.cells[i])
            .collect())
    }

    /// Positions of the cells that will be re-evaluated when `pos` changes.
    pub fn dependents(&self, pos: CellRef) -> Result<Vec<CellRef>> {
        let index = self.index_at(pos)?;
        Ok(self.cells[index]
            .dependents()
            .map(|i| self.cells[i].position())
            .collect())
    }

    /// Clear the selection, then select `pos`.
    pub fn select(&mut self, pos: CellRef) -> Result<()> {
        let index = self.index_at(pos)?;
        self.clear_selection();
        self.update(index, 0, |cell| cell.set_selected(true));
        Ok(())
    }

    /// Select exactly the rectangle with `a` and `b` as opposite corners.
    pub fn select_range(&mut self, a: CellRef, b: CellRef) -> Result<()> {
        let a = self.index_at(a)?;
        let b = self.index_at(b)?;
        let inside: BTreeSet<usize> = self.rectangle(a, b).into_iter().collect();
        for index in 0..self.cells.len() {
            let selected = inside.contains(&index);
            self.update(index, 0, |cell| cell.set_selected(selected));
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        for index in self.selected_indices() {
            self.update(index, 0, |cell| cell.set_selected(false));
        }
    }

    pub fn selection(&self) -> Vec<CellRef> {
        self.cells
            .iter()
            .filter(|cell| cell.selected())
            .map(Cell::position)
            .collect()
    }

    /// Apply a formula (or clear it) on every selected cell.
    pub fn set_selection_formula(&mut self, formula: Option<&str>) {
        for index in self.selected_indices() {
            let formula = formula.map(str::to_string);
            self.update(index, 0, |cell| cell.set_formula(formula));
        }
    }

    /// Assign a literal (or clear it) on every selected cell.
    pub fn set_selection_value(&mut self, value: Option<Value>) {
        for index in self.selected_indices() {
            let value = value.clone();
            self.update(index, 0, |cell| cell.set_value(value));
        }
    }

    pub fn set_selected(&mut self, pos: CellRef, selected: bool) -> Result<()> {
        let index = self.index_at(pos)?;
        self.update(index, 0, |cell| cell.set_selected(selected));
        Ok(())
    }

    pub fn set_editing(&mut self, pos: CellRef, editing: bool) -> Result<()> {
        let index = self.index_at(pos)?;
        self.update(index, 0, |cell| cell.set_editing(editing));
        Ok(())
    }

    /// Set the formula text (including its leading `=`) and evaluate it.
    ///
    /// Clearing the formula leaves the current value in place.
    pub fn set_formula(&mut self, pos: CellRef, formula: Option<&str>) -> Result<()> {
        let index = self.index_at(pos)?;
        let formula = formula.map(str::to_string);
        self.update(index, 0, |cell| cell.set_formula(formula));
        Ok(())
    }

    /// Assign a value and recalculate everything that depends on the cell.
    pub fn set_value(&mut self, pos: CellRef, value: Option<Value>) -> Result<()> {
        let index = self.index_at(pos)?;
        self.update(index, 0, |cell| cell.set_value(value));
        Ok(())
    }

    pub(crate) fn index_of(&self, row: usize, column: usize) -> Option<usize> {
        if row < self.rows && column < self.columns {
            Some(row * self.columns + column)
        } else {
            None
        }
    }

    fn index_at(&self, pos: CellRef) -> Result<usize> {
        self.index_of(pos.row, pos.col)
            .ok_or(EngineError::OutOfBounds(pos))
    }

    fn selected_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .filter(|cell| cell.selected())
            .map(Cell::index)
            .collect()
    }

    /// Row-major indices of the inclusive rectangle with `a` and `b` as corners.
    pub(crate) fn rectangle(&self, a: usize, b: usize) -> Vec<usize> {
        let a = self.cells[a].position();
        let b = self.cells[b].position();
        let (row_from, row_to) = (a.row.min(b.row), a.row.max(b.row));
        let (col_from, col_to) = (a.col.min(b.col), a.col.max(b.col));

        let mut range = Vec::with_capacity((row_to - row_from + 1) * (col_to - col_from + 1));
        for row in row_from..=row_to {
            for col in col_from..=col_to {
                range.push(row * self.columns + col);
            }
        }
        range
    }

    /// Record that `dependent` must be recomputed when `source` changes.
    pub(crate) fn link(&mut self, source: usize, dependent: usize) {
        if self.cells[source].add_dependent(dependent) {
            trace!(
                "{} now depends on {}",
                self.cells[dependent].position(),
                self.cells[source].position()
            );
        }
        self.cells[dependent].add_precedent(source);
    }

    /// Drop every edge that makes `index` a dependent of another cell.
    pub(crate) fn unlink(&mut self, index: usize) {
        for source in self.cells[index].take_precedents() {
            self.cells[source].remove_dependent(index);
        }
    }

    /// Mutate one cell and route the event it emits.
    pub(crate) fn update<F>(&mut self, index: usize, depth: usize, mutate: F)
    where
        F: FnOnce(&mut Cell) -> CellEvent,
    {
        let event = mutate(&mut self.cells[index]);
        self.dispatch(index, event, depth);
    }

    fn dispatch(&mut self, index: usize, event: CellEvent, depth: usize) {
        trace!("{:?} at depth {}", event, depth);
        let scheduled: Vec<Work> = match &event {
            CellEvent::Formula {
                formula: Some(_), ..
            } => vec![Work::Evaluate { index, depth }],
            CellEvent::Formula { formula: None, .. } => {
                self.unlink(index);
                Vec::new()
            }
            // Reversed so the first dependent is evaluated first.
            CellEvent::Value { .. } => self.cells[index]
                .dependents_snapshot()
                .into_iter()
                .rev()
                .map(|dependent| Work::Evaluate {
                    index: dependent,
                    depth: depth + 1,
                })
                .collect(),
            CellEvent::Selected { .. } | CellEvent::Editing { .. } => Vec::new(),
        };

        self.pending.push(Work::Publish { index, event });
        self.pending.extend(scheduled);
        if !self.draining {
            self.drain();
        }
    }

    fn drain(&mut self) {
        self.draining = true;
        while let Some(work) = self.pending.pop() {
            match work {
                Work::Publish { event, .. } => self.events.publish(&event),
                Work::Evaluate { index, depth } if depth > self.config.max_recalc_depth => {
                    warn!(
                        "Recalculation of {} exceeded depth {}; marking dependents {}",
                        self.cells[index].position(),
                        self.config.max_recalc_depth,
                        CellError::Recursion
                    );
                    let poisoned = self.poison(index);
                    self.pending.retain(|work| !work.poisoned_by(&poisoned));
                }
                Work::Evaluate { index, depth } => self.evaluate(index, depth),
            }
        }
        self.draining = false;
    }

    /// Mark `start` and everything downstream of it as `#RECURSION` without
    /// evaluating anything. Returns the marked cells.
    fn poison(&mut self, start: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(index) = queue.pop_front() {
            let event = self.cells[index].set_value(Some(Value::Error(CellError::Recursion)));
            self.events.publish(&event);
            for dependent in self.cells[index].dependents() {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        seen
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("config", &self.config)
            .field("listeners", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn at(name: &str) -> CellRef {
        CellRef::from_str(name).unwrap()
    }

    fn record(grid: &Grid) -> Rc<RefCell<Vec<CellEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        grid.subscribe(Rc::new(move |e: &CellEvent| sink.borrow_mut().push(e.clone())));
        events
    }

    #[test]
    fn test_new_rejects_empty_dimensions() {
        assert_eq!(
            Grid::new(0, 3).unwrap_err(),
            EngineError::InvalidDimensions { rows: 0, columns: 3 }
        );
        assert!(Grid::new(3, 0).is_err());
        assert!(Grid::new(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_cell_lookup_in_and_out_of_bounds() {
        let grid = Grid::new(3, 4).unwrap();
        assert_eq!(grid.cells().count(), 12);
        for row in 0..3 {
            for col in 0..4 {
                let cell = grid.cell(row, col).unwrap();
                assert_eq!((cell.row(), cell.column()), (row, col));
                assert_eq!(cell.index(), row * 4 + col);
            }
        }
        assert!(grid.cell(3, 0).is_none());
        assert!(grid.cell(0, 4).is_none());
        assert!(grid.cell(usize::MAX, usize::MAX).is_none());
    }

    #[test]
    fn test_new_cells_are_blank() {
        let grid = Grid::new(2, 2).unwrap();
        assert!(grid.cells().all(|c| {
            c.formula().is_none() && c.value().is_none() && !c.selected() && !c.editing()
        }));
    }

    #[test]
    fn test_rectangle_is_row_major_for_any_corner_order() {
        let grid = Grid::new(4, 4).unwrap();
        let b2 = grid.index_of(1, 1).unwrap();
        let c3 = grid.index_of(2, 2).unwrap();
        let expected = vec![5, 6, 9, 10];
        assert_eq!(grid.rectangle(b2, c3), expected);
        assert_eq!(grid.rectangle(c3, b2), expected);

        let b3 = grid.index_of(2, 1).unwrap();
        let c2 = grid.index_of(1, 2).unwrap();
        assert_eq!(grid.rectangle(b3, c2), expected);
    }

    #[test]
    fn test_select_range_marks_exactly_the_rectangle() {
        let mut grid = Grid::new(4, 4).unwrap();
        grid.select(at("D4")).unwrap();
        grid.select_range(at("C3"), at("B1")).unwrap();
        assert_eq!(
            grid.selection(),
            vec![at("B1"), at("C1"), at("B2"), at("C2"), at("B3"), at("C3")]
        );
        grid.select_range(at("B1"), at("C3")).unwrap();
        assert_eq!(grid.selection().len(), 6);
    }

    #[test]
    fn test_select_single_clears_previous_selection() {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.select_range(at("A1"), at("C3")).unwrap();
        grid.select(at("B2")).unwrap();
        assert_eq!(grid.selection(), vec![at("B2")]);
    }

    #[test]
    fn test_clear_selection_is_idempotent() {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.select_range(at("A1"), at("B2")).unwrap();
        grid.clear_selection();
        assert!(grid.selection().is_empty());
        grid.clear_selection();
        assert!(grid.selection().is_empty());
    }

    #[test]
    fn test_out_of_bounds_mutations_are_reported() {
        let mut grid = Grid::new(2, 2).unwrap();
        assert_eq!(
            grid.set_value(at("C1"), Some(Value::Number(1.0))),
            Err(EngineError::OutOfBounds(at("C1")))
        );
        assert!(grid.select(at("A3")).is_err());
        assert!(grid.select_range(at("A1"), at("Z9")).is_err());
        assert!(grid.range(at("A1"), at("A9")).is_err());
    }

    #[test]
    fn test_selection_value_and_formula_apply_to_selected_cells() {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.select_range(at("A1"), at("A2")).unwrap();
        grid.set_selection_value(Some(Value::Number(4.0)));
        assert_eq!(grid.cell_at(at("A1")).unwrap().value(), Some(&Value::Number(4.0)));
        assert_eq!(grid.cell_at(at("A2")).unwrap().value(), Some(&Value::Number(4.0)));
        assert_eq!(grid.cell_at(at("A3")).unwrap().value(), None);

        grid.select(at("B1")).unwrap();
        grid.set_selection_formula(Some("=SUM(A1:A2)"));
        assert_eq!(grid.cell_at(at("B1")).unwrap().value(), Some(&Value::Number(8.0)));
    }

    #[test]
    fn test_events_are_forwarded_to_subscribers() {
        let mut grid = Grid::new(2, 2).unwrap();
        let events = record(&grid);

        grid.set_editing(at("A1"), true).unwrap();
        grid.set_selected(at("B2"), true).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![
                CellEvent::Editing { cell: at("A1"), editing: true },
                CellEvent::Selected { cell: at("B2"), selected: true },
            ]
        );
    }

    #[test]
    fn test_dependents_are_recalculated_before_source_event_is_forwarded() {
        let mut grid = Grid::new(2, 2).unwrap();
        grid.set_value(at("A1"), Some(Value::Number(1.0))).unwrap();
        grid.set_formula(at("B1"), Some("=A1*2")).unwrap();
        let events = record(&grid);

        grid.set_value(at("A1"), Some(Value::Number(3.0))).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![
                CellEvent::Value { cell: at("B1"), value: Some(Value::Number(6.0)) },
                CellEvent::Value { cell: at("A1"), value: Some(Value::Number(3.0)) },
            ]
        );
    }

    #[test]
    fn test_clearing_formula_keeps_value_and_prunes_edges() {
        let mut grid = Grid::new(2, 2).unwrap();
        grid.set_value(at("A1"), Some(Value::Number(2.0))).unwrap();
        grid.set_formula(at("B1"), Some("=A1+1")).unwrap();
        assert_eq!(grid.dependents(at("A1")).unwrap(), vec![at("B1")]);

        grid.set_formula(at("B1"), None).unwrap();
        assert_eq!(grid.cell_at(at("B1")).unwrap().value(), Some(&Value::Number(3.0)));
        assert!(grid.dependents(at("A1")).unwrap().is_empty());

        grid.set_value(at("A1"), Some(Value::Number(10.0))).unwrap();
        assert_eq!(grid.cell_at(at("B1")).unwrap().value(), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_replacing_formula_drops_stale_edges() {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.set_formula(at("C1"), Some("=A1")).unwrap();
        grid.set_formula(at("C1"), Some("=B1")).unwrap();
        assert!(grid.dependents(at("A1")).unwrap().is_empty());
        assert_eq!(grid.dependents(at("B1")).unwrap(), vec![at("C1")]);
    }

    #[test]
    fn test_cycle_is_marked_as_recursion() {
        let config = EngineConfig {
            max_recalc_depth: 32,
            ..EngineConfig::default()
        };
        let mut grid = Grid::with_config(3, 3, config).unwrap();
        grid.set_formula(at("A1"), Some("=B1+1")).unwrap();
        grid.set_formula(at("B1"), Some("=A1+1")).unwrap();
        grid.set_formula(at("C1"), Some("=A1")).unwrap();

        let recursion = Some(&Value::Error(CellError::Recursion));
        assert_eq!(grid.cell_at(at("A1")).unwrap().value(), recursion);
        assert_eq!(grid.cell_at(at("B1")).unwrap().value(), recursion);

        // Touching a cycle member again stays bounded.
        grid.set_value(at("A1"), Some(Value::Number(1.0))).unwrap();
        assert_eq!(grid.cell_at(at("B1")).unwrap().value(), recursion);
        assert_eq!(grid.cell_at(at("C1")).unwrap().value(), recursion);
    }

    #[test]
    fn test_cycle_does_not_starve_sibling_dependents() {
        let config = EngineConfig {
            max_recalc_depth: 32,
            ..EngineConfig::default()
        };
        let mut grid = Grid::with_config(2, 4, config).unwrap();
        grid.set_value(at("A1"), Some(Value::Number(1.0))).unwrap();
        grid.set_formula(at("D1"), Some("=A1*2")).unwrap();
        grid.set_formula(at("B1"), Some("=A1+C1")).unwrap();
        grid.set_formula(at("C1"), Some("=B1")).unwrap();
        assert_eq!(grid.cell_at(at("D1")).unwrap().value(), Some(&Value::Number(2.0)));

        grid.set_value(at("A1"), Some(Value::Number(5.0))).unwrap();
        let recursion = Some(&Value::Error(CellError::Recursion));
        assert_eq!(grid.cell_at(at("B1")).unwrap().value(), recursion);
        assert_eq!(grid.cell_at(at("C1")).unwrap().value(), recursion);
        assert_eq!(grid.cell_at(at("D1")).unwrap().value(), Some(&Value::Number(10.0)));
    }

    #[test]
    fn test_poisoned_cells_do_not_report_stale_values_afterwards() {
        let config = EngineConfig {
            max_recalc_depth: 16,
            ..EngineConfig::default()
        };
        let mut grid = Grid::with_config(1, 2, config).unwrap();
        grid.set_formula(at("A1"), Some("=B1")).unwrap();
        let events = record(&grid);
        grid.set_formula(at("B1"), Some("=A1")).unwrap();

        let last_value = |name: &str| {
            events
                .borrow()
                .iter()
                .rev()
                .find_map(|e| match e {
                    CellEvent::Value { cell, value } if *cell == at(name) => Some(value.clone()),
                    _ => None,
                })
                .flatten()
        };
        let recursion = Some(Value::Error(CellError::Recursion));
        assert_eq!(last_value("A1"), recursion);
        assert_eq!(last_value("B1"), recursion);
        assert_eq!(
            events.borrow().last(),
            Some(&CellEvent::Formula { cell: at("B1"), formula: Some("=A1".to_string()) })
        );
    }

    #[test]
    fn test_events_are_forwarded_after_their_subtree() {
        let mut grid = Grid::new(1, 3).unwrap();
        grid.set_formula(at("B1"), Some("=A1+1")).unwrap();
        grid.set_formula(at("C1"), Some("=B1+1")).unwrap();
        let events = record(&grid);

        grid.set_value(at("A1"), Some(Value::Number(1.0))).unwrap();
        let order: Vec<CellRef> = events.borrow().iter().map(CellEvent::cell).collect();
        assert_eq!(order, vec![at("C1"), at("B1"), at("A1")]);
    }

    #[test]
    fn test_long_chain_does_not_exhaust_the_stack() {
        let rows = 2_000;
        let mut grid = Grid::new(rows, 1).unwrap();
        for row in 1..rows {
            let formula = format!("=A{}+1", row);
            grid.set_formula(CellRef::new(row, 0), Some(&formula)).unwrap();
        }
        grid.set_value(CellRef::new(0, 0), Some(Value::Number(1.0))).unwrap();
        assert_eq!(
            grid.cell(rows - 1, 0).unwrap().value(),
            Some(&Value::Number(rows as f64))
        );
    }
}
