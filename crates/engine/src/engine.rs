//! The engine: command validation, cycle gate, commit, ordered propagation.
//!
//! One `Engine` owns the grid and the dependency graph and is the only way
//! to mutate either. Commands are applied strictly sequentially: a command
//! is fully committed and propagated before the next one is accepted.

use std::time::Instant;

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use calcgrid_core::CellRef;

use crate::cell::CellSnapshot;
use crate::dep_graph::DepGraph;
use crate::error::{EngineError, Result};
use crate::formula::eval;
use crate::formula::{ArithOp, Formula, FuncArg, FuncKind, Operand};
use crate::grid::Grid;
use crate::recalc::{RecalcError, RecalcReport};

/// Cap on per-pass error entries, matching the report's contract.
const MAX_REPORTED_ERRORS: usize = 100;

/// An already-parsed mutating command, as handed over by an external
/// command parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    SetConstant {
        target: CellRef,
        source: Operand,
    },
    SetArithmetic {
        target: CellRef,
        left: Operand,
        op: ArithOp,
        right: Operand,
    },
    SetFunction {
        target: CellRef,
        kind: FuncKind,
        arg: FuncArg,
    },
}

/// The dataflow engine. Owns all cells; relations between cells are
/// coordinate sets in the dependency graph, so no edge can outlive the
/// grid it points into.
#[derive(Debug)]
pub struct Engine {
    grid: Grid,
    deps: DepGraph,
}

impl Engine {
    /// Create an engine over a `rows x cols` grid. Both dimensions must be
    /// positive; the size is fixed for the engine's lifetime.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(EngineError::OutOfBounds { row: 0, col: 0, rows, cols });
        }
        Ok(Self {
            grid: Grid::new(rows, cols),
            deps: DepGraph::new(),
        })
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    /// Read-only access to the cell store.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Outbound renderer surface: the `(value, error, formula)` view of any
    /// in-bounds coordinate.
    pub fn snapshot(&self, row: usize, col: usize) -> Result<CellSnapshot> {
        self.grid.get(CellRef::new(row, col)).map(|c| c.snapshot())
    }

    /// The cells `cell`'s formula reads, ascending.
    pub fn depends_on(&self, cell: CellRef) -> Vec<CellRef> {
        let mut refs: Vec<CellRef> = self.deps.depends_on(cell).collect();
        refs.sort();
        refs
    }

    /// The cells reading `cell`, ascending.
    pub fn dependents(&self, cell: CellRef) -> Vec<CellRef> {
        let mut refs: Vec<CellRef> = self.deps.dependents(cell).collect();
        refs.sort();
        refs
    }

    /// Apply one command. `Err` means a hard reject: no cell, value or
    /// edge changed. `Ok` carries the propagation report; evaluation
    /// failures inside it have poisoned cells rather than failing the
    /// command.
    pub fn apply(&mut self, command: Command) -> Result<RecalcReport> {
        match command {
            Command::SetConstant { target, source } => self.set_constant(target, source),
            Command::SetArithmetic { target, left, op, right } => {
                self.set_arithmetic(target, left, op, right)
            }
            Command::SetFunction { target, kind, arg } => self.set_function(target, kind, arg),
        }
    }

    /// `target = literal` or `target = REF`.
    pub fn set_constant(&mut self, target: CellRef, source: Operand) -> Result<RecalcReport> {
        self.check_target(target)?;
        match source {
            Operand::Literal(value) => self.commit_literal(target, value),
            Operand::Ref(source) => {
                self.check_ref(source)?;
                self.commit_formula(target, Formula::Reference(source))
            }
        }
    }

    /// `target = left <op> right`.
    pub fn set_arithmetic(
        &mut self,
        target: CellRef,
        left: Operand,
        op: ArithOp,
        right: Operand,
    ) -> Result<RecalcReport> {
        self.check_target(target)?;
        self.check_operand(left)?;
        self.check_operand(right)?;
        self.commit_formula(target, Formula::Arithmetic { left, op, right })
    }

    /// `target = FUNC(arg)`.
    pub fn set_function(
        &mut self,
        target: CellRef,
        kind: FuncKind,
        arg: FuncArg,
    ) -> Result<RecalcReport> {
        self.check_target(target)?;
        match (kind, arg) {
            (FuncKind::Delay, FuncArg::Range(_)) => {
                return Err(EngineError::InvalidArgumentCount(
                    "DELAY takes a single value, not a range",
                ))
            }
            (FuncKind::Delay, FuncArg::Literal(_)) => {}
            (_, FuncArg::Literal(_)) => {
                return Err(EngineError::InvalidArgumentCount(
                    "range function requires a cell or range argument",
                ))
            }
            (_, FuncArg::Ref(r)) => self.check_ref(r)?,
            (_, FuncArg::Range(range)) => {
                // The rectangle is valid by construction; both corners in
                // bounds covers every cell between them.
                self.check_ref(range.start)?;
                self.check_ref(range.end)?;
            }
        }
        self.commit_formula(target, Formula::Function { kind, arg })
    }

    fn check_target(&self, target: CellRef) -> Result<()> {
        if !self.grid.contains(target) {
            return Err(EngineError::OutOfBounds {
                row: target.row,
                col: target.col,
                rows: self.grid.rows(),
                cols: self.grid.cols(),
            });
        }
        Ok(())
    }

    /// An operand or range corner pointing off the grid rejects the whole
    /// command before anything is touched.
    fn check_ref(&self, r: CellRef) -> Result<()> {
        if !self.grid.contains(r) {
            return Err(EngineError::InvalidReference(r.to_string()));
        }
        Ok(())
    }

    fn check_operand(&self, operand: Operand) -> Result<()> {
        match operand {
            Operand::Literal(_) => Ok(()),
            Operand::Ref(r) => self.check_ref(r),
        }
    }

    /// Commit a plain literal: edges cleared, error cleared, dependents
    /// recomputed.
    fn commit_literal(&mut self, target: CellRef, value: i32) -> Result<RecalcReport> {
        let start = Instant::now();
        self.deps.clear_cell(target);

        let cell = self.grid.get_mut(target)?;
        cell.value = value;
        cell.formula = None;
        cell.error = false;

        let mut report = RecalcReport::new();
        self.propagate(target, &mut report);
        report.duration_ms = start.elapsed().as_millis() as u64;
        debug!("set {target} = {value}: {}", report.log_line());
        Ok(report)
    }

    /// Cycle-gate, install edges, evaluate, commit, propagate.
    fn commit_formula(&mut self, target: CellRef, formula: Formula) -> Result<RecalcReport> {
        let start = Instant::now();

        let new_deps: FxHashSet<CellRef> = formula.refs().into_iter().collect();
        if !new_deps.is_empty() && self.deps.would_create_cycle(target, &new_deps) {
            // Hard reject: no edges installed, no recompute triggered.
            return Err(EngineError::CycleDetected(target));
        }
        self.deps.replace_edges(target, new_deps);

        let mut report = RecalcReport::new();
        let outcome = eval::evaluate(&formula, &self.grid);
        let cell = self.grid.get_mut(target)?;
        match outcome {
            Ok(value) => {
                cell.value = value;
                cell.error = false;
            }
            Err(err) => {
                // Soft failure: poisoned, prior value retained. The stored
                // formula keeps the cell re-evaluable once inputs heal.
                cell.error = true;
                report.errors.push(RecalcError::new(target, err.to_string()));
            }
        }
        cell.formula = Some(formula);

        self.propagate(target, &mut report);
        report.duration_ms = start.elapsed().as_millis() as u64;
        debug!("set {target}: {}", report.log_line());
        Ok(report)
    }

    /// Recompute everything downstream of `origin` in dependency order.
    fn propagate(&mut self, origin: CellRef, report: &mut RecalcReport) {
        let order = self.deps.dirty_order(origin);
        if order.is_empty() {
            return;
        }

        // depth(origin) = 0; a dependent sits one past its deepest
        // recomputed input.
        let mut depths: FxHashMap<CellRef, usize> = FxHashMap::default();
        depths.insert(origin, 0);

        for cell_ref in order {
            let depth = 1 + self
                .deps
                .depends_on(cell_ref)
                .filter_map(|p| depths.get(&p).copied())
                .max()
                .unwrap_or(0);
            depths.insert(cell_ref, depth);
            report.max_depth = report.max_depth.max(depth);

            self.recompute_cell(cell_ref, report);
            report.cells_recomputed += 1;
        }
    }

    /// Recompute one dependent cell in a propagation pass.
    fn recompute_cell(&mut self, cell_ref: CellRef, report: &mut RecalcReport) {
        // Poison check first: an errored input spreads without re-running
        // the evaluator, so no bogus value is ever derived from it.
        let poisoned_by = self
            .deps
            .depends_on(cell_ref)
            .find(|&p| self.grid.get(p).map_or(false, |c| c.error));
        if let Some(input) = poisoned_by {
            if let Ok(cell) = self.grid.get_mut(cell_ref) {
                cell.error = true;
            }
            self.report_error(report, cell_ref, format!("errored input {input}"));
            return;
        }

        let Ok(current) = self.grid.get(cell_ref) else {
            return;
        };
        // Cells in the affected set carry incoming edges, which only
        // formula commits install.
        let Some(formula) = current.formula.clone() else {
            return;
        };

        let outcome = eval::evaluate(&formula, &self.grid);
        let Ok(cell) = self.grid.get_mut(cell_ref) else {
            return;
        };
        match outcome {
            Ok(value) => {
                cell.value = value;
                cell.error = false;
            }
            Err(err) => {
                cell.error = true;
                self.report_error(report, cell_ref, err.to_string());
            }
        }
    }

    fn report_error(&self, report: &mut RecalcReport, cell: CellRef, error: String) {
        if report.errors.len() < MAX_REPORTED_ERRORS {
            report.errors.push(RecalcError::new(cell, error));
        }
    }

    #[cfg(test)]
    pub(crate) fn deps(&self) -> &DepGraph {
        &self.deps
    }
}
