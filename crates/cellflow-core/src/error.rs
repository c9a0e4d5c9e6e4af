//! Error types for cellflow core.

use cellflow_engine::EngineError;
use thiserror::Error;

/// Errors that can occur while loading, editing or saving a document
#[derive(Error, Debug)]
pub enum CellflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Grid error: {0}")]
    Engine(#[from] EngineError),

    #[error("No file path set")]
    NoFilePath,
}

pub type Result<T> = std::result::Result<T, CellflowError>;
