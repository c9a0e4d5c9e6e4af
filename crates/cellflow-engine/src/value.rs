//! Cell values and their display formatting.

use rhai::Dynamic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure marker stored in a cell whose formula could not be evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellError {
    /// The substituted formula text was rejected by the expression evaluator.
    Expression,
    /// Recalculation exceeded the configured depth (almost always a cycle).
    Recursion,
}

impl CellError {
    pub fn marker(&self) -> &'static str {
        match self {
            CellError::Expression => "#EXPRESSION",
            CellError::Recursion => "#RECURSION",
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// The content of a cell: a literal assigned by a collaborator or the result of a formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(CellError),
}

impl Value {
    /// Parse literal user input.
    /// - Empty string -> absent
    /// - Valid number -> Number
    /// - Otherwise -> Text (kept verbatim)
    pub fn from_input(input: &str) -> Option<Value> {
        if input.is_empty() {
            return None;
        }
        match parse_number(input) {
            Some(n) => Some(Value::Number(n)),
            None => Some(Value::Text(input.to_string())),
        }
    }

    /// Numeric reading of the value. Text counts when it parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_number(s),
            Value::Bool(_) | Value::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Convert an evaluator result. Unit becomes an absent value.
    pub(crate) fn from_dynamic(value: Dynamic) -> Option<Value> {
        if value.is_unit() {
            None
        } else if let Ok(n) = value.as_float() {
            Some(Value::Number(n))
        } else if let Ok(n) = value.as_int() {
            Some(Value::Number(n as f64))
        } else if let Ok(b) = value.as_bool() {
            Some(Value::Bool(b))
        } else if let Ok(c) = value.as_char() {
            Some(Value::Text(c.to_string()))
        } else if value.is_string() {
            Some(Value::Text(value.into_string().unwrap_or_default()))
        } else {
            Some(Value::Text(value.to_string()))
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Rust accepts "inf"/"NaN" spellings; a cell saying "nan" is text.
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Format an optional cell value for display (absent -> empty string).
pub fn format_value(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}

/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NAN!".to_string()
    } else if n.is_infinite() {
        "#INF!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}
