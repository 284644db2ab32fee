// Formula evaluator - computes one formula against current grid state.
//
// Evaluation is pure with respect to the dependency graph: edge maintenance
// is entirely the caller's job. The only side effect is DELAY, which blocks
// the calling thread.

use std::thread;
use std::time::Duration;

use calcgrid_core::CellRef;

use super::{ArithOp, Formula, FuncArg, FuncKind, Operand};
use crate::error::EngineError;

/// Read access the evaluator needs: the `(value, error)` pair of a cell.
///
/// Implemented by [`Grid`](crate::grid::Grid); tests substitute stubs.
pub trait CellLookup {
    fn load(&self, cell: CellRef) -> (i32, bool);
}

/// Why an evaluation produced no trustworthy value.
///
/// Both variants commit the target with its error flag set and its prior
/// value retained; they differ only in what gets reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A cell this formula reads is itself errored; nothing was computed.
    PoisonedInput(CellRef),
    /// The evaluation failed in its own right (division by zero, bad delay).
    Failed(EngineError),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::PoisonedInput(cell) => write!(f, "errored input {cell}"),
            EvalError::Failed(err) => write!(f, "{err}"),
        }
    }
}

impl From<EngineError> for EvalError {
    fn from(err: EngineError) -> Self {
        EvalError::Failed(err)
    }
}

/// Evaluate one formula against the current grid state.
pub fn evaluate(formula: &Formula, lookup: &impl CellLookup) -> Result<i32, EvalError> {
    match formula {
        Formula::Reference(r) => load_clean(*r, lookup),
        Formula::Arithmetic { left, op, right } => {
            let lhs = operand(*left, lookup)?;
            let rhs = operand(*right, lookup)?;
            arithmetic(lhs, *op, rhs)
        }
        Formula::Function { kind, arg } => function(*kind, *arg, lookup),
    }
}

/// Read a cell, failing if it carries the error flag.
fn load_clean(cell: CellRef, lookup: &impl CellLookup) -> Result<i32, EvalError> {
    let (value, error) = lookup.load(cell);
    if error {
        Err(EvalError::PoisonedInput(cell))
    } else {
        Ok(value)
    }
}

fn operand(op: Operand, lookup: &impl CellLookup) -> Result<i32, EvalError> {
    match op {
        Operand::Literal(n) => Ok(n),
        Operand::Ref(r) => load_clean(r, lookup),
    }
}

/// Apply a binary operator. Overflow wraps two's-complement (including
/// `i32::MIN / -1`); only division by zero is trapped.
fn arithmetic(lhs: i32, op: ArithOp, rhs: i32) -> Result<i32, EvalError> {
    match op {
        ArithOp::Add => Ok(lhs.wrapping_add(rhs)),
        ArithOp::Sub => Ok(lhs.wrapping_sub(rhs)),
        ArithOp::Mul => Ok(lhs.wrapping_mul(rhs)),
        ArithOp::Div => {
            if rhs == 0 {
                Err(EngineError::DivisionByZero.into())
            } else {
                Ok(lhs.wrapping_div(rhs))
            }
        }
    }
}

fn function(kind: FuncKind, arg: FuncArg, lookup: &impl CellLookup) -> Result<i32, EvalError> {
    if kind == FuncKind::Delay {
        return delay(arg, lookup);
    }

    // The range reducers take a cell (1x1 rectangle) or a range.
    let range = match arg {
        FuncArg::Range(range) => range,
        FuncArg::Ref(r) => calcgrid_core::RangeRef::single(r),
        FuncArg::Literal(_) => {
            return Err(EngineError::InvalidArgumentCount(
                "range function requires a cell or range argument",
            )
            .into())
        }
    };

    // Any errored cell in the rectangle poisons the result before any
    // computation happens.
    let mut values = Vec::with_capacity(range.len());
    for cell in range.cells() {
        values.push(load_clean(cell, lookup)?);
    }
    if values.is_empty() {
        // Unreachable through RangeRef, which always covers a cell.
        return Err(EngineError::EmptyRange.into());
    }

    let result = match kind {
        FuncKind::Min => values.iter().copied().fold(values[0], i32::min),
        FuncKind::Max => values.iter().copied().fold(values[0], i32::max),
        FuncKind::Sum => wrapping_sum(&values),
        // Wrapped integer sum over native integer division: truncates
        // toward zero, no rounding.
        FuncKind::Avg => wrapping_sum(&values) / values.len() as i32,
        FuncKind::Stdev => stdev(&values),
        FuncKind::Delay => unreachable!("handled above"),
    };
    Ok(result)
}

fn wrapping_sum(values: &[i32]) -> i32 {
    values.iter().fold(0i32, |acc, v| acc.wrapping_add(*v))
}

/// Sample standard deviation, truncated toward zero. Defined as 0 for
/// fewer than two samples.
fn stdev(values: &[i32]) -> i32 {
    let count = values.len();
    if count <= 1 {
        return 0;
    }
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / count as f64;
    let sum_sq_diff = values
        .iter()
        .map(|v| {
            let diff = *v as f64 - mean;
            diff * diff
        })
        .sum::<f64>();
    (sum_sq_diff / (count - 1) as f64).sqrt() as i32
}

/// DELAY(x): x is a literal or a single cell, never a range. Blocks the
/// calling thread for the resolved number of seconds, then yields it.
/// There is no early return: the wait is not cancellable and has no
/// timeout.
fn delay(arg: FuncArg, lookup: &impl CellLookup) -> Result<i32, EvalError> {
    let n = match arg {
        FuncArg::Literal(n) => n,
        FuncArg::Ref(r) => load_clean(r, lookup)?,
        FuncArg::Range(_) => {
            return Err(EngineError::InvalidArgumentCount(
                "DELAY takes a single value, not a range",
            )
            .into())
        }
    };
    if n <= 0 {
        return Err(EngineError::NonPositiveDelay(n).into());
    }
    thread::sleep(Duration::from_secs(n as u64));
    Ok(n)
}
