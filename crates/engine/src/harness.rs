//! Test harness: a from-scratch evaluation oracle.
//!
//! `assert_matches_scratch` discards the incremental machinery and
//! re-derives every formula cell by evaluating the whole grid in a
//! topological order computed here, independently of the engine's
//! dependency graph. The engine's results must agree: error flags match
//! everywhere, values match wherever the flag says they can be trusted.
//!
//! Keep DELAY formulas out of oracle-checked sequences; re-evaluating them
//! re-blocks.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use calcgrid_core::CellRef;

use crate::engine::Engine;
use crate::formula::eval::{self, CellLookup};
use crate::formula::Formula;

/// Scratch state: literal cells seed their committed values, formula cells
/// start from the default zero.
struct Scratch {
    cells: FxHashMap<CellRef, (i32, bool)>,
}

impl CellLookup for Scratch {
    fn load(&self, cell: CellRef) -> (i32, bool) {
        self.cells.get(&cell).copied().unwrap_or((0, false))
    }
}

/// Re-evaluate every formula cell from scratch and compare with the
/// engine's incremental state. Panics on any mismatch.
pub fn assert_matches_scratch(engine: &Engine) {
    let grid = engine.grid();

    let mut formulas: FxHashMap<CellRef, Formula> = FxHashMap::default();
    let mut scratch = Scratch { cells: FxHashMap::default() };
    for pos in grid.positions() {
        let cell = grid.get(pos).expect("position iterator stays in bounds");
        match &cell.formula {
            Some(formula) => {
                formulas.insert(pos, formula.clone());
                scratch.cells.insert(pos, (0, false));
            }
            None => {
                scratch.cells.insert(pos, (cell.value, cell.error));
            }
        }
    }

    // Kahn's over the formula cells, constrained only by edges between
    // formula cells, smallest-ready-first. Any valid topological order
    // must reproduce the engine's results.
    let mut in_degree: FxHashMap<CellRef, usize> = FxHashMap::default();
    for (pos, formula) in &formulas {
        let degree = formula
            .refs()
            .iter()
            .filter(|r| formulas.contains_key(r))
            .count();
        in_degree.insert(*pos, degree);
    }
    let mut ready: BinaryHeap<Reverse<CellRef>> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&pos, _)| Reverse(pos))
        .collect();

    let mut evaluated = 0usize;
    while let Some(Reverse(pos)) = ready.pop() {
        let formula = &formulas[&pos];
        match eval::evaluate(formula, &scratch) {
            Ok(value) => {
                scratch.cells.insert(pos, (value, false));
            }
            Err(_) => {
                // Untrusted value; only the flag matters below.
                let value = scratch.cells.get(&pos).map_or(0, |(v, _)| *v);
                scratch.cells.insert(pos, (value, true));
            }
        }
        evaluated += 1;

        for (other, other_formula) in &formulas {
            if other_formula.refs().contains(&pos) {
                if let Some(deg) = in_degree.get_mut(other) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(*other));
                    }
                }
            }
        }
    }
    assert_eq!(
        evaluated,
        formulas.len(),
        "formula graph should be acyclic: the engine rejects cycles"
    );

    for pos in grid.positions() {
        let actual = grid.get(pos).expect("position iterator stays in bounds");
        let (value, error) = scratch.load(pos);
        assert_eq!(
            actual.error, error,
            "error flag mismatch at {pos}: engine={}, scratch={}",
            actual.error, error
        );
        if !error {
            assert_eq!(
                actual.value, value,
                "value mismatch at {pos}: engine={}, scratch={}",
                actual.value, value
            );
        }
    }
}
