//! Parser for .grd file format

use crate::error::{CellflowError, Result};
use cellflow_engine::{CellRef, Value};
use std::fs;
use std::path::Path;

/// One stored cell: either a formula (with its leading `=`) or a literal.
#[derive(Clone, Debug, PartialEq)]
pub enum GrdEntry {
    Formula(String),
    Literal(Value),
}

/// Parse a .grd file into its cell entries, in file order
pub fn parse_grd(path: &Path) -> Result<Vec<(CellRef, GrdEntry)>> {
    let content = fs::read_to_string(path)?;
    parse_grd_content(&content)
}

/// Parse .grd content from a string
pub fn parse_grd_content(content: &str) -> Result<Vec<(CellRef, GrdEntry)>> {
    let mut entries = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Parse "CELLREF: VALUE" format
        let Some((cell_ref_str, value_str)) = line.split_once(':') else {
            return Err(CellflowError::Parse {
                line: line_num + 1,
                message: "Expected 'CELLREF: VALUE' format".to_string(),
            });
        };

        let cell_ref_str = cell_ref_str.trim();
        let cell_ref = CellRef::from_str(cell_ref_str).ok_or_else(|| CellflowError::Parse {
            line: line_num + 1,
            message: format!("Invalid cell reference: {}", cell_ref_str),
        })?;

        if let Some(entry) = parse_entry(value_str.trim(), line_num + 1)? {
            entries.push((cell_ref, entry));
        }
    }

    Ok(entries)
}

/// Parse the part after the colon. An empty value means "blank cell".
fn parse_entry(value: &str, line_num: usize) -> Result<Option<GrdEntry>> {
    if value.is_empty() {
        return Ok(None);
    }

    if value.starts_with('=') {
        return Ok(Some(GrdEntry::Formula(value.to_string())));
    }

    // Quoted string: starts and ends with '"'
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let text = unescape_grd_text(&value[1..value.len() - 1]);
        return Ok(Some(GrdEntry::Literal(Value::Text(text))));
    }

    match value {
        "true" => return Ok(Some(GrdEntry::Literal(Value::Bool(true)))),
        "false" => return Ok(Some(GrdEntry::Literal(Value::Bool(false)))),
        _ => {}
    }

    if let Ok(n) = value.parse::<f64>() {
        return Ok(Some(GrdEntry::Literal(Value::Number(n))));
    }

    Err(CellflowError::Parse {
        line: line_num,
        message: format!("Invalid value: {}. Use quotes for text.", value),
    })
}

fn unescape_grd_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single(content: &str) -> GrdEntry {
        let mut entries = parse_grd_content(content).unwrap();
        assert_eq!(entries.len(), 1);
        entries.remove(0).1
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(single("A1: 42"), GrdEntry::Literal(Value::Number(42.0)));
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(single(r#"A1: "Hello""#), GrdEntry::Literal(Value::from("Hello")));
    }

    #[test]
    fn test_parse_text_escapes() {
        assert_eq!(
            single(r#"A1: "He said \"hi\"\nbye""#),
            GrdEntry::Literal(Value::from("He said \"hi\"\nbye"))
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(single("C2: true"), GrdEntry::Literal(Value::Bool(true)));
    }

    #[test]
    fn test_parse_formula_keeps_marker() {
        assert_eq!(
            single("B3: =SUM(A1:A2)"),
            GrdEntry::Formula("=SUM(A1:A2)".to_string())
        );
    }

    #[test]
    fn test_parse_multiple_cells_in_order() {
        let content = r#"
# Test sheet
A1: 100
A2: 200
A3: "Total"
B3: =A1 + A2
"#;
        let refs: Vec<String> = parse_grd_content(content)
            .unwrap()
            .into_iter()
            .map(|(cell, _)| cell.to_string())
            .collect();
        assert_eq!(refs, vec!["A1", "A2", "A3", "B3"]);
    }

    #[test]
    fn test_blank_value_is_skipped() {
        assert!(parse_grd_content("A1:").unwrap().is_empty());
    }

    #[test]
    fn test_errors_report_line_numbers() {
        let err = parse_grd_content("A1: 1\n\nnot a cell").unwrap_err();
        assert!(matches!(err, CellflowError::Parse { line: 3, .. }));

        let err = parse_grd_content("A1: hello").unwrap_err();
        assert!(matches!(err, CellflowError::Parse { line: 1, .. }));

        let err = parse_grd_content("1A: 2").unwrap_err();
        assert!(err.to_string().contains("Invalid cell reference"));
    }
}
