//! Error types for the cellflow engine.

use thiserror::Error;

use crate::cell_ref::CellRef;

/// Errors returned by grid operations.
///
/// Formula failures never show up here: they are stored in the cell as a
/// [`crate::CellError`] marker instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Grid dimensions must be positive, got {rows}x{columns}")]
    InvalidDimensions { rows: usize, columns: usize },

    #[error("Cell {0} is outside the grid")]
    OutOfBounds(CellRef),
}

pub type Result<T> = std::result::Result<T, EngineError>;
