use super::Document;
use crate::error::{CellflowError, Result};
use cellflow_engine::{CellRef, EngineError, Value, format_value};

impl Document {
    /// Apply raw user input to a cell.
    ///
    /// Input starting with `=` becomes the cell's formula. Anything else clears
    /// the formula and is stored as a literal (empty input clears the cell).
    pub fn set_cell_from_input(&mut self, cell: CellRef, input: &str) -> Result<()> {
        if input.starts_with('=') {
            self.grid.set_formula(cell, Some(input))?;
        } else {
            self.grid.set_formula(cell, None)?;
            self.grid.set_value(cell, Value::from_input(input))?;
        }
        self.modified = true;
        Ok(())
    }

    /// Text to put in the editor for `cell`: the formula if there is one,
    /// otherwise the displayed value.
    pub fn cell_input(&self, cell: CellRef) -> Result<String> {
        let found = self.lookup(cell)?;
        Ok(match found.formula() {
            Some(formula) => formula.to_string(),
            None => format_value(found.value()),
        })
    }

    /// Rendered value of `cell`.
    pub fn display(&self, cell: CellRef) -> Result<String> {
        Ok(format_value(self.lookup(cell)?.value()))
    }

    /// Clear the formula and then the value of every selected cell.
    pub fn clear_selected(&mut self) {
        if self.grid.selection().is_empty() {
            return;
        }
        self.grid.set_selection_formula(None);
        self.grid.set_selection_value(None);
        self.modified = true;
    }

    pub fn begin_edit(&mut self, cell: CellRef) -> Result<()> {
        self.grid.set_editing(cell, true)?;
        Ok(())
    }

    /// Store `input` in `cell` and leave editing mode.
    pub fn commit_edit(&mut self, cell: CellRef, input: &str) -> Result<()> {
        self.set_cell_from_input(cell, input)?;
        self.grid.set_editing(cell, false)?;
        Ok(())
    }

    pub fn cancel_edit(&mut self, cell: CellRef) -> Result<()> {
        self.grid.set_editing(cell, false)?;
        Ok(())
    }

    /// Move the cursor from `from` by the given offsets, clamped to the grid,
    /// and select the cell it lands on.
    pub fn move_selection(&mut self, from: CellRef, d_row: isize, d_col: isize) -> Result<CellRef> {
        let last_row = self.grid.rows() - 1;
        let last_col = self.grid.columns() - 1;
        let target = CellRef::new(
            from.row.saturating_add_signed(d_row).min(last_row),
            from.col.saturating_add_signed(d_col).min(last_col),
        );
        self.grid.select(target)?;
        Ok(target)
    }

    /// Select the rectangle between `anchor` and `to`.
    pub fn extend_selection(&mut self, anchor: CellRef, to: CellRef) -> Result<()> {
        self.grid.select_range(anchor, to)?;
        Ok(())
    }

    fn lookup(&self, cell: CellRef) -> Result<&cellflow_engine::Cell> {
        self.grid
            .cell_at(cell)
            .ok_or(CellflowError::Engine(EngineError::OutOfBounds(cell)))
    }
}
