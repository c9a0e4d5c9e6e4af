use crate::error::Result;
use cellflow_engine::{EngineConfig, Grid};
use std::path::PathBuf;

/// UI-agnostic document state: a grid plus where it came from.
pub struct Document {
    pub(crate) grid: Grid,
    /// Current file path
    pub file_path: Option<PathBuf>,
    /// Whether cell contents changed since the last load or save
    pub modified: bool,
}

impl Document {
    /// Create an empty document with default engine limits.
    ///
    /// This constructor is side-effect free: it does not touch the filesystem.
    pub fn new(rows: usize, columns: usize) -> Result<Self> {
        Self::with_config(rows, columns, EngineConfig::default())
    }

    pub fn with_config(rows: usize, columns: usize, config: EngineConfig) -> Result<Self> {
        Ok(Document {
            grid: Grid::with_config(rows, columns, config)?,
            file_path: None,
            modified: false,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Direct access for callers that drive the grid themselves (selection,
    /// subscriptions). Changes made here do not set `modified`.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CellflowError;

    #[test]
    fn test_new_document_is_clean() {
        let doc = Document::new(3, 2).unwrap();
        assert_eq!(doc.grid().rows(), 3);
        assert_eq!(doc.grid().columns(), 2);
        assert!(doc.file_path.is_none());
        assert!(!doc.modified);
    }

    #[test]
    fn test_invalid_dimensions_are_reported() {
        assert!(matches!(
            Document::new(0, 5),
            Err(CellflowError::Engine(_))
        ));
    }

    #[test]
    fn test_config_reaches_the_grid() {
        let config = EngineConfig {
            max_recalc_depth: 8,
            ..EngineConfig::default()
        };
        let doc = Document::with_config(2, 2, config).unwrap();
        assert_eq!(doc.grid().config().max_recalc_depth, 8);
    }
}
