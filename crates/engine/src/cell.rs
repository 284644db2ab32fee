use serde::{Deserialize, Serialize};

use crate::formula::Formula;

/// One grid position's state.
///
/// `value` holds the last successfully computed result and is retained even
/// while `error` is set ("poisoned"), so correcting an upstream cell makes
/// recovery visible without re-entering a literal. `formula` is `None` iff
/// the cell holds a plain literal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: i32,
    pub formula: Option<Formula>,
    pub error: bool,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the outbound view of this cell.
    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            value: self.value,
            error: self.error,
            formula: self.formula.as_ref().map(|f| f.to_string()),
        }
    }
}

/// Read-only view handed to renderers: the computed value, whether it can
/// be trusted, and the canonical formula text if the cell has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub value: i32,
    pub error: bool,
    pub formula: Option<String>,
}
