//! An incremental dataflow engine over a fixed grid of integer cells.
//!
//! Cells hold literals or formulas (references, binary arithmetic, range
//! functions). Mutations go through [`engine::Engine`], which rejects
//! circular definitions and recomputes every affected dependent in
//! dependency order, propagating error state instead of stale values.

pub mod cell;
pub mod dep_graph;
pub mod engine;
pub mod error;
pub mod formula;
pub mod grid;
pub mod recalc;

#[cfg(test)]
pub mod harness;
