//! Core addressing types shared by the calcgrid engine and its hosts.
//!
//! Hosts (CLIs, renderers) can depend on this crate alone to parse and
//! display cell references without pulling in the engine.

pub mod refs;

pub use refs::{CellRef, RangeRef, RefError};
