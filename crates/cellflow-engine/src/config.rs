//! Engine limits.

use serde::{Deserialize, Serialize};

/// Limits applied to recalculation and to the Rhai expression evaluator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Longest dependency chain followed in one recalculation before the
    /// affected cells are marked `#RECURSION`.
    pub max_recalc_depth: usize,
    /// Rhai operation budget per formula.
    pub max_operations: u64,
    /// Rhai expression nesting limit.
    pub max_expr_depth: usize,
    /// Longest string a formula may produce.
    pub max_string_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_recalc_depth: 4096,
            max_operations: 100_000,
            max_expr_depth: 64,
            max_string_size: 65_536,
        }
    }
}
