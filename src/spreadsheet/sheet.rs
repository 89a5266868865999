use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use std::collections::HashMap;

/// Rows a workbook can address
pub(crate) const MAX_ROWS: usize = 1_048_576;
/// Columns a workbook can address
pub(crate) const MAX_COLS: usize = 16_384;

/// Shape of a merge region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpanType {
    /// Spans several columns of one row (a group label)
    Horizontal,
    /// Spans several rows of one column
    Vertical,
    /// Spans several rows and several columns
    Area,
}

/// A rectangle of cells displayed as one. Only the top-left anchor stores a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MergeRegion {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl MergeRegion {
    /// Builds a region from two corners in any order
    pub fn new(row_a: usize, col_a: usize, row_b: usize, col_b: usize) -> Self {
        MergeRegion {
            min_row: row_a.min(row_b),
            min_col: col_a.min(col_b),
            max_row: row_a.max(row_b),
            max_col: col_a.max(col_b),
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.min_row <= row && row <= self.max_row && self.min_col <= col && col <= self.max_col
    }

    pub fn is_anchor(&self, row: usize, col: usize) -> bool {
        row == self.min_row && col == self.min_col
    }

    /// True if the region covers exactly one row
    pub fn is_single_row(&self) -> bool {
        self.min_row == self.max_row
    }

    pub fn span_type(&self) -> SpanType {
        match (self.min_row == self.max_row, self.min_col == self.max_col) {
            (true, _) => SpanType::Horizontal,
            (false, true) => SpanType::Vertical,
            (false, false) => SpanType::Area,
        }
    }

    fn is_single_cell(&self) -> bool {
        self.min_row == self.max_row && self.min_col == self.max_col
    }
}

/// An opened sheet: sparse cell values plus merge regions, addressed by 0-based (row, col).
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// Whether the source format carries merge metadata at all (false for delimited text)
    pub(crate) has_merge_metadata: bool,
    /// Non-empty stored values
    values: HashMap<(usize, usize), CellValue>,
    /// Merge regions in file order
    merges: Vec<MergeRegion>,
    /// Row index -> indexes into `merges` of the regions touching that row
    merge_rows: HashMap<usize, Vec<usize>>,
    /// Number of rows, last used row + 1
    row_count: usize,
    /// Number of columns, last used column + 1
    col_count: usize,
}

impl Sheet {
    /// Creates an empty sheet of a format that supports merged cells
    pub fn new(file_name: &str, name: &str) -> Self {
        Sheet {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            has_merge_metadata: true,
            ..Default::default()
        }
    }

    /// Creates an empty sheet of a flat table format (no merge metadata)
    pub fn flat(file_name: &str, name: &str) -> Self {
        Sheet {
            has_merge_metadata: false,
            ..Sheet::new(file_name, name)
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn col_count(&self) -> usize {
        self.col_count
    }

    /// True if the sheet has zero rows or zero columns
    pub fn is_empty(&self) -> bool {
        self.row_count == 0 || self.col_count == 0
    }

    pub fn merges(&self) -> &[MergeRegion] {
        &self.merges
    }

    pub fn has_merge_metadata(&self) -> bool {
        self.has_merge_metadata
    }

    /// Adds a raw cell read from a workbook. Blank cells are not stored.
    pub(crate) fn push(&mut self, cell: Cell) -> Result<(), SpreadsheetError> {
        check_limits(cell.row, cell.col)?;
        if cell.kind != CellType::Empty {
            let value = cell.to_value();
            self.insert(cell.row, cell.col, value);
        }
        Ok(())
    }

    /// Adds a merge region read from a workbook
    pub(crate) fn push_merge(&mut self, region: MergeRegion) -> Result<(), SpreadsheetError> {
        check_limits(region.max_row, region.max_col)?;
        self.add_merge(region);
        Ok(())
    }

    /// Stores a value, growing the sheet dimensions as needed
    pub fn insert(&mut self, row: usize, col: usize, value: CellValue) {
        if value == CellValue::Empty {
            return;
        }
        self.update_bound(row, col);
        self.values.insert((row, col), value);
    }

    /// Registers a merge region. Single-cell regions carry no merge semantics and are dropped.
    pub fn add_merge(&mut self, region: MergeRegion) {
        if region.is_single_cell() {
            return;
        }
        self.update_bound(region.max_row, region.max_col);
        let index = self.merges.len();
        for row in region.min_row..=region.max_row {
            self.merge_rows.entry(row).or_default().push(index);
        }
        self.merges.push(region);
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        self.row_count = self.row_count.max(row + 1);
        self.col_count = self.col_count.max(col + 1);
    }

    fn check_position(&self, row: usize, col: usize) -> Result<(), SpreadsheetError> {
        if row < self.row_count && col < self.col_count {
            Ok(())
        } else {
            Err(SpreadsheetError::InvalidPosition(index_to_reference(row, col), self.row_count, self.col_count))
        }
    }

    /// Raw stored value. Cells covered by a merge region other than its anchor read as empty.
    pub fn value_at(&self, row: usize, col: usize) -> Result<CellValue, SpreadsheetError> {
        self.check_position(row, col)?;
        if let Some(region) = self.find_merge(row, col) {
            if !region.is_anchor(row, col) {
                return Ok(CellValue::Empty);
            }
        }
        Ok(self.values.get(&(row, col)).cloned().unwrap_or_default())
    }

    /// The anchor's value if (row, col) lies in a merge region, otherwise `value_at`.
    pub fn effective_value_at(&self, row: usize, col: usize) -> Result<CellValue, SpreadsheetError> {
        self.check_position(row, col)?;
        Ok(self.effective_value(row, col))
    }

    /// The merge rectangle covering (row, col), if any
    pub fn merge_region_containing(&self, row: usize, col: usize) -> Result<Option<&MergeRegion>, SpreadsheetError> {
        self.check_position(row, col)?;
        Ok(self.find_merge(row, col))
    }

    /// `effective_value_at` without the bounds check; outside the sheet reads as empty.
    pub(crate) fn effective_value(&self, row: usize, col: usize) -> CellValue {
        let (row, col) = self.find_merge(row, col)
            .map(|region| (region.min_row, region.min_col))
            .unwrap_or((row, col));
        self.values.get(&(row, col)).cloned().unwrap_or_default()
    }

    /// Merge lookup without the bounds check
    pub(crate) fn find_merge(&self, row: usize, col: usize) -> Option<&MergeRegion> {
        self.merge_rows
            .get(&row)?
            .iter()
            .map(|index| &self.merges[*index])
            .find(|region| region.contains(row, col))
    }

    /// True if any merge region touches one of the given rows
    pub(crate) fn has_merges_within(&self, rows: std::ops::Range<usize>) -> bool {
        rows.into_iter().any(|row| self.merge_rows.contains_key(&row))
    }
}

/// Rejects 0-based positions a workbook cannot address
pub(crate) fn check_limits(row: usize, col: usize) -> Result<(), SpreadsheetError> {
    if row < MAX_ROWS && col < MAX_COLS {
        Ok(())
    } else {
        Err(SpreadsheetError::PositionOutOfLimits(row, col))
    }
}
