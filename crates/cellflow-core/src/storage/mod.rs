//! Storage backends for cellflow documents.

pub mod csv;
pub mod parser;
pub mod writer;

pub use csv::{write_csv, write_csv_content};
pub use parser::{GrdEntry, parse_grd, parse_grd_content};
pub use writer::{write_grd, write_grd_content};
