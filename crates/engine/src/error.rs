//! Engine error taxonomy.
//!
//! Two tiers exist at the command surface:
//!
//! - **Hard rejects** are returned as `Err` from a command and guarantee the
//!   grid, graph and target cell are untouched: `OutOfBounds` (target),
//!   `InvalidReference`/`InvalidRange` (operands), `InvalidArgumentCount`,
//!   `UnknownFunction`, `CycleDetected`.
//! - **Soft failures** commit the target with its error flag set and its
//!   prior value retained, then still propagate: `DivisionByZero`,
//!   `EmptyRange`, `NonPositiveDelay`. They surface in the
//!   [`RecalcReport`](crate::recalc::RecalcReport), not as `Err`.

use calcgrid_core::{CellRef, RefError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("empty range")]
    EmptyRange,

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid argument: {0}")]
    InvalidArgumentCount(&'static str),

    #[error("DELAY requires a positive duration, got {0}")]
    NonPositiveDelay(i32),

    #[error("circular reference at {0}")]
    CycleDetected(CellRef),

    #[error("out of bounds: row {row}, col {col} on a {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

impl From<RefError> for EngineError {
    fn from(err: RefError) -> Self {
        match err {
            RefError::InvalidReference(text) => EngineError::InvalidReference(text),
            RefError::InvalidRange(text) => EngineError::InvalidRange(text),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
