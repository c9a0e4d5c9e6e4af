//! cellflow_engine - reactive cell grid + Rhai-backed formulas.
//!
//! - [`Grid`], [`Cell`] - fixed-size grid that owns its cells and keeps derived values current
//! - [`CellRef`], [`encode_column`], [`decode_column`] - A1 notation <-> row/column indices
//! - [`Channel`], [`CellEvent`] - change notifications for presentation layers
//! - [`Value`], [`CellError`], [`format_value`] - cell contents and display
//! - [`EngineConfig`] - recursion and evaluator limits

mod cell;
mod cell_ref;
mod channel;
mod config;
mod error;
mod evaluate;
mod event;
mod grid;
mod value;

pub use cell::Cell;
pub use cell_ref::{CellRef, decode_column, encode_column};
pub use channel::{Channel, Listener};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use event::{CellEvent, EventKind};
pub use grid::Grid;
pub use value::{CellError, Value, format_number, format_value};
