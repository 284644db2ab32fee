//! Fixed-size 2D cell store.
//!
//! The grid owns every cell for its whole lifetime: all `rows x cols`
//! cells exist from construction (value 0, no formula, no error) and are
//! destroyed together. There is no resize.

use calcgrid_core::CellRef;

use crate::cell::Cell;
use crate::error::EngineError;
use crate::formula::eval::CellLookup;

/// Dense row-major store of cells.
///
/// Mutable access is crate-private: external callers go through the
/// engine's command surface so dependency bookkeeping can never be
/// bypassed.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a `rows x cols` grid of default cells. Dimensions must be
    /// positive; the engine constructor enforces this.
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::new(); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    fn out_of_bounds(&self, cell: CellRef) -> EngineError {
        EngineError::OutOfBounds {
            row: cell.row,
            col: cell.col,
            rows: self.rows,
            cols: self.cols,
        }
    }

    pub fn get(&self, cell: CellRef) -> Result<&Cell, EngineError> {
        if !self.contains(cell) {
            return Err(self.out_of_bounds(cell));
        }
        Ok(&self.cells[cell.row * self.cols + cell.col])
    }

    pub(crate) fn get_mut(&mut self, cell: CellRef) -> Result<&mut Cell, EngineError> {
        if !self.contains(cell) {
            return Err(self.out_of_bounds(cell));
        }
        Ok(&mut self.cells[cell.row * self.cols + cell.col])
    }

    /// Iterate all positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = CellRef> + '_ {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| CellRef::new(row, col)))
    }
}

impl CellLookup for Grid {
    fn load(&self, cell: CellRef) -> (i32, bool) {
        // Commands validate every reference before evaluation and the grid
        // never shrinks, so this stays in bounds; an out-of-bounds read
        // surfaces as an errored zero rather than a panic.
        match self.get(cell) {
            Ok(c) => (c.value, c.error),
            Err(_) => (0, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: usize, col: usize) -> CellRef {
        CellRef::new(row, col)
    }

    #[test]
    fn test_all_cells_default_at_construction() {
        let grid = Grid::new(3, 4);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 4);
        for pos in grid.positions() {
            let c = grid.get(pos).unwrap();
            assert_eq!(c.value, 0);
            assert!(c.formula.is_none());
            assert!(!c.error);
        }
        assert_eq!(grid.positions().count(), 12);
    }

    #[test]
    fn test_out_of_bounds() {
        let grid = Grid::new(2, 2);
        assert!(grid.get(cell(1, 1)).is_ok());
        assert_eq!(
            grid.get(cell(2, 0)),
            Err(EngineError::OutOfBounds { row: 2, col: 0, rows: 2, cols: 2 })
        );
        assert!(grid.get(cell(0, 2)).is_err());
    }

    #[test]
    fn test_lookup_reads_value_and_error() {
        let mut grid = Grid::new(2, 2);
        {
            let c = grid.get_mut(cell(0, 1)).unwrap();
            c.value = 5;
            c.error = true;
        }
        assert_eq!(grid.load(cell(0, 1)), (5, true));
        assert_eq!(grid.load(cell(1, 0)), (0, false));
        // Out-of-bounds reads as errored zero
        assert_eq!(grid.load(cell(9, 9)), (0, true));
    }
}
