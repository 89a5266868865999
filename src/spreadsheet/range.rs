use crate::error::ChunkerError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::row_to_index;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors related to A1-style range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),

    #[error("Range '{0}' is not bounded on every side")]
    UnboundedError(String),
}

/// An A1-style cell range with optional boundaries ("B2:C5", "A:C", "1:10").
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Range {
    /// Lower row bound (0-based index), None for unbounded
    pub(crate) row_lower_bound: Option<usize>,
    /// Upper row bound (0-based index), None for unbounded
    pub(crate) row_upper_bound: Option<usize>,
    /// Lower column bound (0-based index), None for unbounded
    pub(crate) col_lower_bound: Option<usize>,
    /// Upper column bound (0-based index), None for unbounded
    pub(crate) col_upper_bound: Option<usize>,
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$?([A-Z]*)\$?(\d*)(:\$?([A-Z]*)\$?(\d*))?$").expect("Hardcode regex pattern"))
}

impl TryFrom<&str> for Range {
    type Error = ChunkerError;

    /// Parses single cells ("C3"), full ranges ("A1:C3") and partial ranges ("A:C", "1:10").
    /// A single cell yields equal lower and upper bounds.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim().to_ascii_uppercase();
        let captures = range_pattern()
            .captures(value.as_str())
            .ok_or_else(|| RangeError::FormatError(value.to_owned()))?;
        let col_lower_bound = captures.get(1).map(|matcher| matcher.as_str()).and_then(col_to_index);
        let row_lower_bound = captures.get(2).map(|matcher| matcher.as_str()).and_then(row_to_index);
        let (col_upper_bound, row_upper_bound) = if captures.get(3).is_some() {
            (
                captures.get(4).map(|matcher| matcher.as_str()).and_then(col_to_index),
                captures.get(5).map(|matcher| matcher.as_str()).and_then(row_to_index),
            )
        } else {
            (col_lower_bound, row_lower_bound)
        };
        Ok(Range {
            row_lower_bound,
            row_upper_bound,
            col_lower_bound,
            col_upper_bound,
        })
    }
}

impl Range {
    /// Returns (min_row, min_col, max_row, max_col) when every side is bounded,
    /// normalizing reversed corners such as "C3:A1".
    pub(crate) fn bounds(&self, source: &str) -> Result<(usize, usize, usize, usize), RangeError> {
        match (self.row_lower_bound, self.col_lower_bound, self.row_upper_bound, self.col_upper_bound) {
            (Some(row_a), Some(col_a), Some(row_b), Some(col_b)) => Ok((
                row_a.min(row_b),
                col_a.min(col_b),
                row_a.max(row_b),
                col_a.max(col_b),
            )),
            _ => Err(RangeError::UnboundedError(source.to_owned())),
        }
    }
}
