//! cellflow-core - UI-agnostic document model + storage.

pub mod document;
pub mod error;
pub mod storage;

pub use document::Document;
pub use error::{CellflowError, Result};

pub use cellflow_engine::CellRef;
