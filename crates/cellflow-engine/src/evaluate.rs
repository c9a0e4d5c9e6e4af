//! Formula evaluation.
//!
//! A formula is evaluated by rewriting it into a plain Rhai expression over
//! literals and handing that to a sandboxed Rhai engine:
//!
//! 1. `AVG(A1:B5)` becomes the average of the range, as a number literal.
//! 2. `SUM(A1:B5)` becomes the sum of the range.
//! 3. Bare references like `B3` become the referenced cell's value (text is
//!    quoted and escaped).
//!
//! Every reference that resolves registers the evaluating cell as a dependent
//! of the referenced cell, even if the expression later fails. Tokens that
//! point outside the grid or at the evaluating cell itself are left verbatim
//! and usually make Rhai reject the expression, which stores `#EXPRESSION`.
//! Text inside double-quoted string literals is never rewritten.

use std::sync::OnceLock;

use log::debug;
use regex::{Captures, Regex};
use rhai::{Dynamic, Engine, ImmutableString};

use crate::cell_ref::{decode_column, parse_row};
use crate::config::EngineConfig;
use crate::grid::Grid;
use crate::value::{CellError, Value, format_number};

/// Substituted for non-finite numbers; not valid Rhai, so dependents fail.
const NON_FINITE_MARKER: &str = "#NUM!";

/// A stretch of a formula segment during substitution. Unresolved range
/// tokens are `Shielded` and pass through the remaining passes untouched.
#[derive(Debug, PartialEq)]
enum Piece {
    Open(String),
    Shielded(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RangeFn {
    Avg,
    Sum,
}

impl RangeFn {
    /// Regex matching `NAME(<col><row>:<col><row>)`.
    ///
    /// Captures: 1 = start column, 2 = start row, 3 = end column, 4 = end row.
    fn pattern(self) -> &'static Regex {
        static AVG: OnceLock<Regex> = OnceLock::new();
        static SUM: OnceLock<Regex> = OnceLock::new();
        match self {
            RangeFn::Avg => AVG.get_or_init(|| {
                Regex::new(r"AVG\(([A-Z]+)(\d+):([A-Z]+)(\d+)\)").expect("AVG regex must compile")
            }),
            RangeFn::Sum => SUM.get_or_init(|| {
                Regex::new(r"SUM\(([A-Z]+)(\d+):([A-Z]+)(\d+)\)").expect("SUM regex must compile")
            }),
        }
    }
}

/// Regex matching a bare cell reference. Captures: 1 = column, 2 = row.
fn cell_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z]+)(\d+)\b").expect("cell reference regex must compile"))
}

/// Build the Rhai engine used for the final expression.
///
/// Only expressions are evaluated (no statements, loops or function
/// definitions); output hooks are silenced and `eval` is unavailable.
pub(crate) fn create_engine(config: &EngineConfig) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(config.max_operations);
    engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
    engine.set_max_string_size(config.max_string_size);
    engine.disable_symbol("eval");
    engine.on_print(|_| {});
    engine.on_debug(|_, _, _| {});

    // Integer division yields a fraction, as a spreadsheet user expects.
    engine.set_fast_operators(false);
    engine.register_fn("/", |a: i64, b: i64| -> f64 { a as f64 / b as f64 });
    // References substitute as float literals; concatenation shows them the
    // way the cell displays them ("5 items", not "5.0 items").
    engine.register_fn("+", |a: f64, b: ImmutableString| -> String {
        format!("{}{}", format_number(a), b)
    });
    engine.register_fn("+", |a: ImmutableString, b: f64| -> String {
        format!("{}{}", a, format_number(b))
    });
    engine
}

impl Grid {
    /// Re-evaluate the formula of the cell at `index` and store the result.
    pub(crate) fn evaluate(&mut self, index: usize, depth: usize) {
        let Some(formula) = self.cells[index].formula().map(str::to_string) else {
            return;
        };

        // Edges are rebuilt from scratch by the substitution below.
        self.unlink(index);
        let value = self.compute(index, &formula);
        self.update(index, depth, |cell| cell.set_value(value));
    }

    fn compute(&mut self, target: usize, formula: &str) -> Option<Value> {
        // Drop the leading marker character.
        let mut chars = formula.chars();
        chars.next();
        let body = chars.as_str();
        if body.trim().is_empty() {
            return None;
        }

        let expression = map_outside_strings(body, |segment| self.substitute(target, segment));
        debug!(
            "{}: `{}` -> `{}`",
            self.cells[target].position(),
            formula,
            expression
        );

        match self.engine.eval_expression::<Dynamic>(&expression) {
            Ok(result) => Value::from_dynamic(result),
            Err(err) => {
                debug!(
                    "{}: `{}` failed: {}",
                    self.cells[target].position(),
                    expression,
                    err
                );
                Some(Value::Error(CellError::Expression))
            }
        }
    }

    /// Run all three rewriting passes over a segment that holds no string literal.
    fn substitute(&mut self, target: usize, segment: &str) -> String {
        let mut pieces = vec![Piece::Open(segment.to_string())];
        for function in [RangeFn::Avg, RangeFn::Sum] {
            let mut next = Vec::with_capacity(pieces.len());
            for piece in pieces {
                match piece {
                    Piece::Open(text) => {
                        next.extend(self.substitute_ranges(target, &text, function))
                    }
                    shielded => next.push(shielded),
                }
            }
            pieces = next;
        }

        let mut out = String::with_capacity(segment.len());
        for piece in pieces {
            match piece {
                Piece::Open(text) => out.push_str(&self.substitute_refs(target, &text)),
                Piece::Shielded(text) => out.push_str(&text),
            }
        }
        out
    }

    /// Replace resolvable `function` tokens in `text`. Tokens that do not
    /// resolve are split out as shielded pieces so the reference pass cannot
    /// rewrite their corners.
    fn substitute_ranges(&mut self, target: usize, text: &str, function: RangeFn) -> Vec<Piece> {
        let mut pieces = Vec::new();
        let mut open = String::with_capacity(text.len());
        let mut last = 0;
        for caps in function.pattern().captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            open.push_str(&text[last..whole.start()]);
            last = whole.end();

            let start = self.resolve(&caps[1], &caps[2]);
            let end = self.resolve(&caps[3], &caps[4]);
            match (start, end) {
                (Some(start), Some(end)) if start != target && end != target => {
                    open.push_str(&self.aggregate(target, start, end, function));
                }
                _ => {
                    debug!(
                        "{}: leaving unresolved range `{}`",
                        self.cells[target].position(),
                        whole.as_str()
                    );
                    if !open.is_empty() {
                        pieces.push(Piece::Open(std::mem::take(&mut open)));
                    }
                    pieces.push(Piece::Shielded(whole.as_str().to_string()));
                }
            }
        }
        open.push_str(&text[last..]);
        if !open.is_empty() {
            pieces.push(Piece::Open(open));
        }
        pieces
    }

    /// Sum or average a range, linking `target` to every cell in it.
    fn aggregate(&mut self, target: usize, start: usize, end: usize, function: RangeFn) -> String {
        let range = self.rectangle(start, end);
        let mut total = 0.0;
        let mut failed = None;
        for &index in &range {
            match self.cells[index].value() {
                Some(Value::Error(err)) => failed = Some(*err),
                Some(value) => total += value.as_number().unwrap_or(0.0),
                None => {}
            }
            self.link(index, target);
        }

        if let Some(err) = failed {
            return err.marker().to_string();
        }
        match function {
            RangeFn::Sum => number_literal(total),
            RangeFn::Avg => number_literal(total / range.len() as f64),
        }
    }

    fn substitute_refs(&mut self, target: usize, text: &str) -> String {
        cell_ref_re()
            .replace_all(text, |caps: &Captures| match self.resolve(&caps[1], &caps[2]) {
                Some(index) if index != target => {
                    let literal = value_literal(self.cells[index].value());
                    self.link(index, target);
                    literal
                }
                _ => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Resolve a column/row token pair to a cell index, if it is inside the grid.
    fn resolve(&self, column: &str, row: &str) -> Option<usize> {
        self.index_of(parse_row(row)?, decode_column(column)?)
    }
}

/// Render a cell value as a Rhai literal.
fn value_literal(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "0".to_string();
    };
    if let Some(n) = value.as_number() {
        return number_literal(n);
    }
    match value {
        Value::Text(s) => string_literal(s),
        Value::Bool(b) => b.to_string(),
        Value::Error(err) => err.marker().to_string(),
        Value::Number(n) => number_literal(*n),
    }
}

/// Render a number as a Rhai float literal. Negative numbers are parenthesised
/// so they can follow any operator.
fn number_literal(n: f64) -> String {
    if !n.is_finite() {
        return NON_FINITE_MARKER.to_string();
    }
    let mut literal = format!("{:?}", n);
    if !literal.contains('.') {
        match literal.find('e') {
            Some(pos) => literal.insert_str(pos, ".0"),
            None => literal.push_str(".0"),
        }
    }
    if n.is_sign_negative() {
        format!("({})", literal)
    } else {
        literal
    }
}

fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Apply `rewrite` to every part of `script` outside double-quoted string
/// literals; literals (with their escapes) are copied unchanged.
fn map_outside_strings<F>(script: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> String,
{
    let bytes = script.as_bytes();
    let mut out = String::with_capacity(script.len());
    let mut seg_start = 0;
    let mut in_string = false;
    let mut backslashes = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                backslashes += 1;
                i += 1;
                continue;
            }
            if b == b'"' && backslashes.is_multiple_of(2) {
                out.push_str(&script[seg_start..=i]);
                in_string = false;
                seg_start = i + 1;
            }
            backslashes = 0;
            i += 1;
            continue;
        }

        if b == b'"' {
            out.push_str(&rewrite(&script[seg_start..i]));
            in_string = true;
            seg_start = i;
            backslashes = 0;
        }
        i += 1;
    }

    if seg_start < script.len() {
        if in_string {
            out.push_str(&script[seg_start..]);
        } else {
            out.push_str(&rewrite(&script[seg_start..]));
        }
    }

    out
}
