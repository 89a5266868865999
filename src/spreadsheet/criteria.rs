use crate::error::ChunkerError;
use glob::Pattern;

/// Options that select sheets and tune header detection.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Sheet name patterns for filtering which sheets to process.
    pub sheet_name_patterns: Option<Vec<Pattern>>,

    /// Maximum number of sheets to read (default: the first sheet only).
    pub sheet_limit: Option<usize>,

    /// Rows inspected by the header classifier.
    pub max_header_scan_rows: usize,

    /// Header rows assumed when no window validates (clamped to 1..=3).
    pub fallback_header_levels: usize,

    /// Skip data rows where all columns are empty; `None` keeps the strategy's policy.
    pub skip_empty_rows: Option<bool>,

    /// Read error cells ("#DIV/0!") as empty instead of their error text.
    pub error_as_null: bool,

    /// Field delimiter for delimited text; `None` picks by extension.
    pub delimiter: Option<u8>,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            sheet_name_patterns: None,
            sheet_limit: Some(1),
            max_header_scan_rows: 20,
            fallback_header_levels: 3,
            skip_empty_rows: None,
            error_as_null: false,
            delimiter: None,
        }
    }
}

impl Criteria {
    /// Compiles glob patterns for sheet selection and lifts the sheet limit.
    pub fn with_sheet_names(mut self, patterns: &[&str]) -> Result<Self, ChunkerError> {
        let patterns = patterns
            .iter()
            .map(|pattern| Pattern::new(pattern))
            .collect::<Result<Vec<Pattern>, _>>()?;
        self.sheet_name_patterns = Some(patterns);
        self.sheet_limit = None;
        Ok(self)
    }

    /// Checks if a sheet name matches the criteria patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        if let Some(patterns) = &self.sheet_name_patterns {
            patterns.iter().any(|pattern| pattern.matches(sheet_name))
        } else {
            true
        }
    }

    /// True once `count` sheets have been read and the limit is reached
    pub(crate) fn is_sheet_limit_reached(&self, count: usize) -> bool {
        self.sheet_limit.map(|limit| count >= limit).unwrap_or(false)
    }

    pub(crate) fn fallback_levels(&self) -> usize {
        self.fallback_header_levels.clamp(1, 3)
    }
}
