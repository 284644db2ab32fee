//! Cell and range references.
//!
//! Textual addresses use the familiar spreadsheet format: a run of
//! upper-case letters names the column (base-26, 1-indexed: `A`..`Z`,
//! `AA`..), followed by a run of digits naming the 1-indexed row.
//! Internally everything is 0-based `(row, col)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reference and range text handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),
}

/// A grid coordinate.
///
/// Ordering is row-major `(row, col)`; the engine relies on this for
/// deterministic tie-breaking during recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl CellRef {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse a textual reference like `B12`, bounds-checked against a
    /// `rows x cols` grid.
    ///
    /// Fails if the letter/digit split is malformed (no letters, no digits,
    /// digits before letters, stray characters) or if either resulting
    /// index falls outside `[0,rows) x [0,cols)`.
    pub fn parse(text: &str, rows: usize, cols: usize) -> Result<Self, RefError> {
        let invalid = || RefError::InvalidReference(text.to_string());

        let letters_len = text.chars().take_while(|c| c.is_ascii_uppercase()).count();
        if letters_len == 0 {
            return Err(invalid());
        }
        let (letters, digits) = text.split_at(letters_len);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let col = letters_to_col(letters).ok_or_else(|| invalid())?;
        let row1: usize = digits.parse().map_err(|_| invalid())?;
        if row1 == 0 {
            return Err(invalid());
        }
        let row = row1 - 1;

        if row >= rows || col >= cols {
            return Err(invalid());
        }
        Ok(Self { row, col })
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Convert a 0-based column index to its letter run: 0=A, 25=Z, 26=AA.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert a letter run back to a 0-based column index.
///
/// Returns `None` on an empty run, a non-uppercase character, or overflow.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut col: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add((c as u8 - b'A') as usize + 1)?;
    }
    Some(col - 1)
}

/// A rectangular inclusive span between two cell references.
///
/// Construction enforces `end.row >= start.row && end.col >= start.col`,
/// so every `RangeRef` covers at least one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeRef {
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    pub fn new(start: CellRef, end: CellRef) -> Result<Self, RefError> {
        if end.row < start.row || end.col < start.col {
            return Err(RefError::InvalidRange(format!("{start}:{end}")));
        }
        Ok(Self { start, end })
    }

    /// A degenerate 1x1 range covering a single cell.
    pub fn single(cell: CellRef) -> Self {
        Self { start: cell, end: cell }
    }

    /// Parse `"REF"` (1x1) or `"REF1:REF2"`, bounds-checked like
    /// [`CellRef::parse`].
    pub fn parse(text: &str, rows: usize, cols: usize) -> Result<Self, RefError> {
        match text.split_once(':') {
            None => Ok(Self::single(CellRef::parse(text, rows, cols)?)),
            Some((a, b)) => {
                let start = CellRef::parse(a, rows, cols)?;
                let end = CellRef::parse(b, rows, cols)?;
                Self::new(start, end)
            }
        }
    }

    /// Number of cells covered.
    pub fn len(&self) -> usize {
        (self.end.row - self.start.row + 1) * (self.end.col - self.start.col + 1)
    }

    pub fn is_empty(&self) -> bool {
        // A constructed range always covers at least one cell.
        false
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// Row-major iterator over every covered cell.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        let cols = self.start.col..=self.end.col;
        (self.start.row..=self.end.row)
            .flat_map(move |row| cols.clone().map(move |col| CellRef::new(row, col)))
    }
}

impl std::fmt::Display for RangeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}
