//! Header Row Classifier: finds the rows that name the columns
use crate::spreadsheet::sheet::Sheet;
use serde::Serialize;
use std::ops::RangeInclusive;

/// A header row is mostly text: its numeric ratio stays below this
pub const HEADER_NUMERIC_MAX: f64 = 0.3;
/// A header row of a stacked block is mostly filled: its non-empty ratio exceeds this
pub const HEADER_NON_EMPTY_MIN: f64 = 0.3;
/// A data row is mostly numbers: its numeric ratio exceeds this
pub const DATA_NUMERIC_MIN: f64 = 0.5;
/// Deepest header block ever reconstructed
pub const MAX_HEADER_LEVELS: usize = 3;

/// Shape of one scanned row.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct RowFeature {
    /// Fraction of columns with a non-empty value
    pub non_empty_ratio: f64,
    /// Fraction of non-empty cells that are numeric (0 when the row is blank)
    pub numeric_ratio: f64,
}

impl RowFeature {
    /// Computes the feature of `row` over every column, reading merged cells through their anchor
    pub fn of_row(sheet: &Sheet, row: usize) -> Self {
        let col_count = sheet.col_count();
        if col_count == 0 {
            return RowFeature::default();
        }
        let (non_empty, numeric) = (0..col_count)
            .map(|col| sheet.effective_value(row, col))
            .filter(|value| !value.is_empty())
            .fold((0usize, 0usize), |(non_empty, numeric), value| {
                (non_empty + 1, numeric + value.is_numeric() as usize)
            });
        RowFeature {
            non_empty_ratio: non_empty as f64 / col_count as f64,
            numeric_ratio: if non_empty == 0 { 0.0 } else { numeric as f64 / non_empty as f64 },
        }
    }

    pub fn is_blank(&self) -> bool {
        self.non_empty_ratio == 0.0
    }

    /// Filled and non-numeric enough to be one level of a stacked header
    fn is_header_level(&self) -> bool {
        self.non_empty_ratio > HEADER_NON_EMPTY_MIN && self.numeric_ratio < HEADER_NUMERIC_MAX
    }

    fn is_data(&self) -> bool {
        self.numeric_ratio > DATA_NUMERIC_MIN
    }
}

/// Which detection path produced a header block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// First row taken as the header without inspection
    Flat,
    /// Text row followed by a numeric row
    SingleRow,
    /// Stacked header of up to three levels
    MultiLevel,
}

/// The rows of a sheet that hold column names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HeaderBlock {
    pub start_row: usize,
    /// Last header row, inclusive
    pub end_row: usize,
    pub level_count: usize,
    pub heuristic: Heuristic,
    /// Set when no candidate validated and a default window was assumed
    pub low_confidence: bool,
}

impl HeaderBlock {
    fn new(start_row: usize, level_count: usize, heuristic: Heuristic, low_confidence: bool) -> Self {
        let level_count = level_count.max(1);
        HeaderBlock {
            start_row,
            end_row: start_row + level_count - 1,
            level_count,
            heuristic,
            low_confidence,
        }
    }

    pub fn rows(&self) -> RangeInclusive<usize> {
        self.start_row..=self.end_row
    }
}

/// Features of the first `max_rows` rows (all rows if fewer)
pub fn row_features(sheet: &Sheet, max_rows: usize) -> Vec<RowFeature> {
    (0..sheet.row_count().min(max_rows))
        .map(|row| RowFeature::of_row(sheet, row))
        .collect()
}

/// Row 0 as a single-level header.
pub fn classify_flat(sheet: &Sheet) -> HeaderBlock {
    HeaderBlock::new(0, 1, Heuristic::Flat, sheet.row_count() < 2)
}

/// Single-row heuristic: the first non-blank row `i` with a low numeric ratio
/// whose successor looks like data. Defaults to row 0 when no transition exists.
pub fn classify_single_row(sheet: &Sheet, max_rows: usize) -> HeaderBlock {
    let features = row_features(sheet, max_rows);
    let header = features
        .windows(2)
        .position(|pair| !pair[0].is_blank() && pair[0].numeric_ratio < HEADER_NUMERIC_MAX && pair[1].is_data());
    match header {
        Some(row) => HeaderBlock::new(row, 1, Heuristic::SingleRow, false),
        None => HeaderBlock::new(0, 1, Heuristic::SingleRow, true),
    }
}

/// Multi-level heuristic: at the first start position where a window of up to
/// three header-like rows is followed by a data row, the longest such window wins.
/// Falls back to the first `fallback_levels` rows when nothing validates.
pub fn classify_multi_level(sheet: &Sheet, max_rows: usize, fallback_levels: usize) -> HeaderBlock {
    let features = row_features(sheet, max_rows);
    for start in 0..features.len() {
        for levels in (1..=MAX_HEADER_LEVELS).rev() {
            let next = start + levels;
            if next >= features.len() {
                continue;
            }
            let window = &features[start..next];
            if window.iter().all(RowFeature::is_header_level) && features[next].is_data() {
                return HeaderBlock::new(start, levels, Heuristic::MultiLevel, false);
            }
        }
    }

    let levels = fallback_levels.clamp(1, MAX_HEADER_LEVELS).min(features.len().max(1));
    HeaderBlock::new(0, levels, Heuristic::MultiLevel, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;
    use crate::spreadsheet::sheet::MergeRegion;

    /// Builds a sheet from rows where "#" marks a number and "" a blank
    fn grid(rows: &[&[&str]]) -> Sheet {
        let mut sheet = Sheet::new("test.xlsx", "Sheet1");
        for (row, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                match *cell {
                    "" => (),
                    "#" => sheet.insert(row, col, CellValue::Integer((row * 10 + col) as i64)),
                    text => sheet.insert(row, col, CellValue::Text(text.to_owned())),
                }
            }
        }
        sheet
    }

    #[test]
    fn test_row_feature() {
        let sheet = grid(&[&["a", "#", "", "#"], &["", "", "", ""]]);
        let feature = RowFeature::of_row(&sheet, 0);
        assert_eq!(feature.non_empty_ratio, 0.75);
        assert!((feature.numeric_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(RowFeature::of_row(&sheet, 1), RowFeature::default());
    }

    #[test]
    fn test_row_feature_reads_merged_anchor() {
        let mut sheet = grid(&[&["Group", "", "", "x"]]);
        sheet.add_merge(MergeRegion::new(0, 0, 0, 2));
        assert_eq!(RowFeature::of_row(&sheet, 0).non_empty_ratio, 1.0);
    }

    #[test]
    fn test_three_level_header() {
        // Ten columns: nine filled cells with one number in each header row
        let header: &[&str] = &["a", "b", "c", "d", "e", "f", "g", "h", "#", ""];
        let data: &[&str] = &["x", "#", "#", "#", "#", "#", "#", "#", "#", "#"];
        let sheet = grid(&[header, header, header, data, data]);
        let features = row_features(&sheet, 20);
        assert_eq!(features[0].non_empty_ratio, 0.9);
        assert!(features[0].numeric_ratio < 0.3);
        assert!(features[3].numeric_ratio > 0.8);

        let block = classify_multi_level(&sheet, 20, 3);
        assert_eq!(block, HeaderBlock {
            start_row: 0,
            end_row: 2,
            level_count: 3,
            heuristic: Heuristic::MultiLevel,
            low_confidence: false,
        });
    }

    #[test]
    fn test_prefers_two_levels_when_third_row_is_data() {
        let sheet = grid(&[
            &["Title", "", "", ""],
            &["Name", "Sales", "Sales", "Note"],
            &["", "Q1", "Q2", ""],
            &["a", "#", "#", "#"],
            &["b", "#", "#", "#"],
        ]);
        let block = classify_multi_level(&sheet, 20, 3);
        assert_eq!((block.start_row, block.end_row, block.level_count), (1, 2, 2));
        assert!(!block.low_confidence);
    }

    #[test]
    fn test_fourth_level_is_ignored() {
        let text: &[&str] = &["a", "b"];
        let data: &[&str] = &["#", "#"];
        let sheet = grid(&[text, text, text, text, data]);
        let block = classify_multi_level(&sheet, 20, 3);
        assert_eq!((block.start_row, block.end_row), (1, 3));
    }

    #[test]
    fn test_multi_level_fallback() {
        let text: &[&str] = &["a", "b"];
        let sheet = grid(&[text, text, text, text, text]);
        let block = classify_multi_level(&sheet, 20, 2);
        assert_eq!((block.start_row, block.end_row, block.level_count), (0, 1, 2));
        assert!(block.low_confidence);

        // Fewer rows than levels
        let sheet = grid(&[text, text]);
        let block = classify_multi_level(&sheet, 20, 3);
        assert_eq!(block.level_count, 2);
        assert!(block.low_confidence);

        let block = classify_multi_level(&Sheet::new("", ""), 20, 3);
        assert_eq!(block.level_count, 1);
        assert!(block.low_confidence);
    }

    #[test]
    fn test_scan_window_bound() {
        let text: &[&str] = &["a", "b"];
        let data: &[&str] = &["#", "#"];
        let mut rows = vec![text; 6];
        rows.push(data);
        let sheet = grid(&rows);
        assert!(classify_multi_level(&sheet, 5, 3).low_confidence);
        assert!(!classify_multi_level(&sheet, 7, 3).low_confidence);
    }

    #[test]
    fn test_single_row_header() {
        let sheet = grid(&[
            &["Quarterly report", "", ""],
            &["", "", ""],
            &["Region", "Units", "Revenue"],
            &["North", "#", "#"],
        ]);
        let block = classify_single_row(&sheet, 20);
        assert_eq!((block.start_row, block.end_row, block.level_count), (2, 2, 1));
        assert_eq!(block.heuristic, Heuristic::SingleRow);
        assert!(!block.low_confidence);
    }

    #[test]
    fn test_single_row_default() {
        let sheet = grid(&[&["a", "b"], &["c", "d"]]);
        let block = classify_single_row(&sheet, 20);
        assert_eq!(block.rows(), 0..=0);
        assert!(block.low_confidence);
    }

    #[test]
    fn test_flat() {
        let sheet = grid(&[&["#", "#"], &["#", "#"]]);
        let block = classify_flat(&sheet);
        assert_eq!((block.start_row, block.level_count, block.heuristic), (0, 1, Heuristic::Flat));
        assert!(!block.low_confidence);
    }
}
