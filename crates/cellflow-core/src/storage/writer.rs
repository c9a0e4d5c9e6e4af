//! Writer for .grd file format

use crate::error::Result;
use cellflow_engine::{Grid, Value};
use std::fs;
use std::path::Path;

/// Write a Grid to a .grd file
pub fn write_grd(path: &Path, grid: &Grid) -> Result<()> {
    let content = write_grd_content(grid);
    fs::write(path, content)?;
    Ok(())
}

/// Write a Grid to a .grd format string.
///
/// Formula cells are stored as their formula; everything else as its literal.
/// Blank cells and stray error values are skipped.
pub fn write_grd_content(grid: &Grid) -> String {
    let mut lines = vec!["# cellflow sheet".to_string()];

    // Cells iterate row-major, so output order is stable.
    for cell in grid.cells() {
        let value_str = match (cell.formula(), cell.value()) {
            (Some(formula), _) => formula.to_string(),
            (None, Some(Value::Number(n))) => n.to_string(),
            (None, Some(Value::Text(s))) => format!("\"{}\"", escape_grd_text(s)),
            (None, Some(Value::Bool(b))) => b.to_string(),
            (None, Some(Value::Error(_))) | (None, None) => continue,
        };

        lines.push(format!("{}: {}", cell.position(), value_str));
    }

    lines.join("\n") + "\n"
}

fn escape_grd_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}
