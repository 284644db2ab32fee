// Formula vocabulary and evaluation

pub mod eval;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use calcgrid_core::{CellRef, RangeRef};

use crate::error::EngineError;

/// A scalar operand: a literal integer or a cell reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Literal(i32),
    Ref(CellRef),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Literal(n) => write!(f, "{n}"),
            Operand::Ref(r) => write!(f, "{r}"),
        }
    }
}

/// Binary arithmetic operator. All four wrap on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(self) -> char {
        match self {
            ArithOp::Add => '+',
            ArithOp::Sub => '-',
            ArithOp::Mul => '*',
            ArithOp::Div => '/',
        }
    }
}

/// Range-reducing function kinds, plus DELAY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncKind {
    Min,
    Max,
    Avg,
    Sum,
    Stdev,
    Delay,
}

impl FuncKind {
    /// Resolve an upper-case function name. Matching is exact, as the
    /// command language defines the names.
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name {
            "MIN" => Ok(FuncKind::Min),
            "MAX" => Ok(FuncKind::Max),
            "AVG" => Ok(FuncKind::Avg),
            "SUM" => Ok(FuncKind::Sum),
            "STDEV" => Ok(FuncKind::Stdev),
            "DELAY" => Ok(FuncKind::Delay),
            _ => Err(EngineError::UnknownFunction(name.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FuncKind::Min => "MIN",
            FuncKind::Max => "MAX",
            FuncKind::Avg => "AVG",
            FuncKind::Sum => "SUM",
            FuncKind::Stdev => "STDEV",
            FuncKind::Delay => "DELAY",
        }
    }
}

/// Argument to a function: the range reducers take a cell or a rectangle,
/// DELAY takes a literal or a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncArg {
    Literal(i32),
    Ref(CellRef),
    Range(RangeRef),
}

impl std::fmt::Display for FuncArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuncArg::Literal(n) => write!(f, "{n}"),
            FuncArg::Ref(r) => write!(f, "{r}"),
            FuncArg::Range(r) => write!(f, "{r}"),
        }
    }
}

/// A cell's structured defining expression.
///
/// `Display` renders the canonical text stored alongside the cell and shown
/// to renderers: `B1`, `A1+3`, `SUM(A1:B2)`, `DELAY(5)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formula {
    /// Copy of another cell.
    Reference(CellRef),
    Arithmetic {
        left: Operand,
        op: ArithOp,
        right: Operand,
    },
    Function {
        kind: FuncKind,
        arg: FuncArg,
    },
}

impl Formula {
    /// The deduplicated set of cells this formula reads, as a sorted list.
    ///
    /// Range arguments expand to every covered cell.
    pub fn refs(&self) -> Vec<CellRef> {
        let mut set = FxHashSet::default();
        self.collect_refs(&mut set);
        let mut refs: Vec<CellRef> = set.into_iter().collect();
        refs.sort();
        refs
    }

    fn collect_refs(&self, refs: &mut FxHashSet<CellRef>) {
        match self {
            Formula::Reference(r) => {
                refs.insert(*r);
            }
            Formula::Arithmetic { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Ref(r) = operand {
                        refs.insert(*r);
                    }
                }
            }
            Formula::Function { arg, .. } => match arg {
                FuncArg::Literal(_) => {}
                FuncArg::Ref(r) => {
                    refs.insert(*r);
                }
                FuncArg::Range(range) => {
                    refs.extend(range.cells());
                }
            },
        }
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Formula::Reference(r) => write!(f, "{r}"),
            Formula::Arithmetic { left, op, right } => {
                write!(f, "{left}{}{right}", op.symbol())
            }
            Formula::Function { kind, arg } => write!(f, "{}({arg})", kind.name()),
        }
    }
}
