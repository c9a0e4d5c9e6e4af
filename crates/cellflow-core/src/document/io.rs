use super::Document;
use crate::error::{CellflowError, Result};
use crate::storage::{GrdEntry, parse_grd, parse_grd_content, write_csv, write_grd};
use cellflow_engine::{CellRef, EngineConfig};
use log::debug;
use std::path::{Path, PathBuf};

impl Document {
    /// Load a .grd file. The grid is at least `rows` x `columns` and grows to
    /// fit every stored cell.
    pub fn open(path: &Path, rows: usize, columns: usize, config: EngineConfig) -> Result<Self> {
        let entries = parse_grd(path)?;
        let mut doc = Self::from_entries(entries, rows, columns, config)?;
        doc.file_path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Build a document from .grd text; see [`Document::open`].
    pub fn from_grd_content(
        content: &str,
        rows: usize,
        columns: usize,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::from_entries(parse_grd_content(content)?, rows, columns, config)
    }

    fn from_entries(
        entries: Vec<(CellRef, GrdEntry)>,
        rows: usize,
        columns: usize,
        config: EngineConfig,
    ) -> Result<Self> {
        let rows = entries.iter().map(|(c, _)| c.row + 1).fold(rows, usize::max);
        let columns = entries.iter().map(|(c, _)| c.col + 1).fold(columns, usize::max);
        debug!("Loading {} cells into a {}x{} grid", entries.len(), rows, columns);

        let mut doc = Self::with_config(rows, columns, config)?;
        // Formulas read blank precedents as 0 and are re-evaluated when a later
        // entry fills them in, so file order does not matter.
        for (cell, entry) in entries {
            match entry {
                GrdEntry::Formula(formula) => doc.grid.set_formula(cell, Some(&formula))?,
                GrdEntry::Literal(value) => doc.grid.set_value(cell, Some(value))?,
            }
        }
        doc.modified = false;
        Ok(doc)
    }

    /// Save to the current file path.
    /// Returns the path saved to.
    pub fn save_file(&mut self) -> Result<PathBuf> {
        let Some(path) = self.file_path.clone() else {
            return Err(CellflowError::NoFilePath);
        };
        write_grd(&path, &self.grid)?;
        self.modified = false;
        Ok(path)
    }

    /// Save to `path` and make it the current file path.
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        self.file_path = Some(path.to_path_buf());
        self.save_file()?;
        Ok(())
    }

    /// Export displayed values as CSV. Does not change the file path.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        write_csv(path, &self.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(name: &str) -> CellRef {
        CellRef::from_str(name).unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cellflow-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_load_evaluates_formulas_regardless_of_order() {
        let content = "B1: =A1*2\nC1: =B1+1\nA1: 5\n";
        let doc = Document::from_grd_content(content, 1, 1, EngineConfig::default()).unwrap();
        assert_eq!(doc.display(at("B1")).unwrap(), "10");
        assert_eq!(doc.display(at("C1")).unwrap(), "11");
        assert!(!doc.modified);
    }

    #[test]
    fn test_load_grows_grid_to_fit() {
        let doc = Document::from_grd_content("D7: 1", 2, 2, EngineConfig::default()).unwrap();
        assert_eq!(doc.grid().rows(), 7);
        assert_eq!(doc.grid().columns(), 4);
    }

    #[test]
    fn test_save_without_path_fails() {
        let mut doc = Document::new(2, 2).unwrap();
        assert!(matches!(doc.save_file(), Err(CellflowError::NoFilePath)));
    }

    #[test]
    fn test_save_and_reopen() {
        let path = temp_path("reopen.grd");
        let mut doc = Document::new(3, 3).unwrap();
        doc.set_cell_from_input(at("A1"), "3").unwrap();
        doc.set_cell_from_input(at("A2"), "label").unwrap();
        doc.set_cell_from_input(at("B1"), "=AVG(A1:A1)*2").unwrap();
        doc.save_as(&path).unwrap();
        assert!(!doc.modified);

        let reopened = Document::open(&path, 3, 3, EngineConfig::default()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(reopened.file_path.as_deref(), Some(path.as_path()));
        assert_eq!(reopened.cell_input(at("B1")).unwrap(), "=AVG(A1:A1)*2");
        assert_eq!(reopened.display(at("B1")).unwrap(), "6");
        assert_eq!(reopened.display(at("A2")).unwrap(), "label");
    }

    #[test]
    fn test_export_csv_writes_values() {
        let path = temp_path("export.csv");
        let mut doc = Document::new(2, 2).unwrap();
        doc.set_cell_from_input(at("A1"), "2").unwrap();
        doc.set_cell_from_input(at("B1"), "=A1+A1").unwrap();
        doc.export_csv(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(written, "2,4\n");
    }
}
