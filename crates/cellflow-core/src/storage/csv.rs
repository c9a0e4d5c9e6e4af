//! CSV export of evaluated values

use crate::error::Result;
use cellflow_engine::{Grid, Value, format_value};
use std::path::Path;

/// Export the grid's displayed values to a CSV file.
pub fn write_csv(path: &Path, grid: &Grid) -> Result<()> {
    std::fs::write(path, write_csv_content(grid))?;
    Ok(())
}

/// Render displayed values as CSV, covering the bounding box of non-empty cells.
/// An empty grid renders as an empty string.
pub fn write_csv_content(grid: &Grid) -> String {
    let filled = grid.cells().filter(|cell| cell.value().is_some());
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for cell in filled {
        let (row, col) = (cell.row(), cell.column());
        bounds = Some(match bounds {
            None => (row, col, row, col),
            Some((r0, c0, r1, c1)) => (r0.min(row), c0.min(col), r1.max(row), c1.max(col)),
        });
    }
    let Some((min_row, min_col, max_row, max_col)) = bounds else {
        return String::new();
    };

    let mut out = String::new();
    for row in min_row..=max_row {
        let fields: Vec<String> = (min_col..=max_col)
            .map(|col| {
                let value = grid.cell(row, col).and_then(|cell| cell.value());
                escape_csv_field(&format_value(value), matches!(value, Some(Value::Text(_))))
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str, is_text: bool) -> String {
    // Guard against CSV formula injection in spreadsheet apps. Numbers are
    // rendered by us, so only text can smuggle a leading operator.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if is_text && matches!(first_non_space, Some('=' | '+' | '-' | '@')) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}
