//! Recomputation reporting.
//!
//! Every mutating command returns a [`RecalcReport`] describing the
//! propagation pass it triggered.

use calcgrid_core::CellRef;

/// Report from one propagation pass.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Number of dependent cells that were recomputed (the mutated target
    /// itself is not counted).
    pub cells_recomputed: usize,

    /// Maximum dependency depth encountered. The mutated cell has depth 0;
    /// a dependent's depth is max over its recomputed inputs plus one.
    pub max_depth: usize,

    /// Wall time for the whole command, including propagation.
    pub duration_ms: u64,

    /// Cells that ended the pass errored, with the reason
    /// (truncated to the first 100).
    pub errors: Vec<RecalcError>,
}

impl RecalcReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as a concise one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{} cells in {}ms, depth={}, errors={}",
            self.cells_recomputed,
            self.duration_ms,
            self.max_depth,
            self.errors.len()
        )
    }

    /// Format as a one-line log entry.
    ///
    /// Format: `[recalc]   14ms  628 cells  depth=7  errors=0`
    pub fn log_line(&self) -> String {
        format!(
            "[recalc] {:>4}ms  {} cells  depth={}  errors={}",
            self.duration_ms,
            self.cells_recomputed,
            self.max_depth,
            self.errors.len()
        )
    }
}

/// A cell left errored by a propagation pass, and why.
#[derive(Debug, Clone)]
pub struct RecalcError {
    pub cell: CellRef,
    pub error: String,
}

impl RecalcError {
    pub fn new(cell: CellRef, error: impl Into<String>) -> Self {
        Self {
            cell,
            error: error.into(),
        }
    }
}
