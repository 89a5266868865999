//! # Chunking Engine
//!
//! Turns one [`Sheet`] into records: the classifier finds the header block,
//! the resolver builds one name per column, names are made unique and every
//! row below the header becomes a [`Record`].
//!
//! Strategies form a closed set. They share the same three steps
//! (`classify`, `resolve_columns`, `materialize`) and differ only in how the
//! header block is detected and whether blank rows are emitted.
pub mod classifier;
pub mod dedupe;
pub mod record;
pub mod resolver;

use crate::chunking::classifier::HeaderBlock;
use crate::chunking::classifier::Heuristic;
use crate::chunking::record::Record;
use crate::chunking::record::Rows;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Errors related to strategy selection.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Unknown chunking strategy '{0}'")]
    UnknownStrategy(String),
}

/// Static description of a strategy.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct StrategyInfo {
    /// Canonical name
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Other names accepted when parsing
    pub aliases: &'static [&'static str],
    /// File extensions the strategy reads
    pub extensions: &'static [&'static str],
}

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xltx", "xltm", "xlam", "ods", "csv", "tsv", "txt"];

const FLAT_INFO: StrategyInfo = StrategyInfo {
    name: "flat",
    display_name: "Flat table",
    description: "First row holds the column names; every following row is a record, blank rows included.",
    aliases: &["excel_normal", "excel_dict"],
    extensions: SPREADSHEET_EXTENSIONS,
};

const SINGLE_HEADER_INFO: StrategyInfo = StrategyInfo {
    name: "single_header",
    display_name: "Single header row",
    description: "Detects one header row as the last text row before numeric data.",
    aliases: &["excel_knowhead", "excel_know_head"],
    extensions: SPREADSHEET_EXTENSIONS,
};

const MULTI_LEVEL_INFO: StrategyInfo = StrategyInfo {
    name: "multi_level",
    display_name: "Multi-level header",
    description: "Detects up to three stacked header rows and joins merged header cells into one name per column.",
    aliases: &["excel_many_head", "excel_three_level_head", "excel_3head"],
    extensions: SPREADSHEET_EXTENSIONS,
};

const AUTO_INFO: StrategyInfo = StrategyInfo {
    name: "auto",
    display_name: "Automatic",
    description: "Multi-level detection when merged cells reach the header area, single header row otherwise.",
    aliases: &["smart"],
    extensions: SPREADSHEET_EXTENSIONS,
};

/// Spreadsheet chunking strategies.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Flat,
    SingleHeader,
    MultiLevel,
    #[default]
    Auto,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [Strategy::Flat, Strategy::SingleHeader, Strategy::MultiLevel, Strategy::Auto];

    pub const fn info(&self) -> &'static StrategyInfo {
        match self {
            Strategy::Flat => &FLAT_INFO,
            Strategy::SingleHeader => &SINGLE_HEADER_INFO,
            Strategy::MultiLevel => &MULTI_LEVEL_INFO,
            Strategy::Auto => &AUTO_INFO,
        }
    }

    /// Whether rows without any value are dropped unless the criteria say otherwise
    pub const fn skips_empty_rows(&self) -> bool {
        !matches!(self, Strategy::Flat)
    }

    /// Finds the header block of a sheet.
    /// Sheets without merge metadata always use the single-row path, except for `Flat`.
    pub fn classify(&self, sheet: &Sheet, criteria: &Criteria) -> HeaderBlock {
        let max_rows = criteria.max_header_scan_rows;
        let multi_level = match self {
            Strategy::Flat => return classifier::classify_flat(sheet),
            Strategy::SingleHeader => false,
            Strategy::MultiLevel => sheet.has_merge_metadata(),
            Strategy::Auto => sheet.has_merge_metadata() && sheet.has_merges_within(0..max_rows),
        };
        if multi_level {
            classifier::classify_multi_level(sheet, max_rows, criteria.fallback_levels())
        } else {
            classifier::classify_single_row(sheet, max_rows)
        }
    }

    /// Resolves and deduplicates one name per column.
    pub fn resolve_columns(&self, sheet: &Sheet, header: &HeaderBlock) -> Vec<String> {
        let names = match header.heuristic {
            Heuristic::MultiLevel => (0..sheet.col_count())
                .map(|col| resolver::resolve_column_name(sheet, header, col))
                .collect(),
            Heuristic::Flat | Heuristic::SingleRow => resolver::header_row_names(sheet, header),
        };
        dedupe::dedupe(&names)
    }

    /// Lazily reads the records below the header block.
    pub fn materialize<'a>(&self, sheet: &'a Sheet, header: &HeaderBlock, columns: Vec<String>, criteria: &Criteria) -> Rows<'a> {
        let skip_empty_rows = criteria.skip_empty_rows.unwrap_or_else(|| self.skips_empty_rows());
        Rows::new(sheet, header.clone(), columns, skip_empty_rows)
    }

    /// Runs the three steps over one sheet. An empty sheet yields no records.
    pub fn chunk_sheet(&self, sheet: &Sheet, criteria: &Criteria) -> Vec<Record> {
        if sheet.is_empty() {
            tracing::info!(file = sheet.file_name(), sheet = sheet.name(), "Empty sheet, no records");
            return Vec::new();
        }

        let header = self.classify(sheet, criteria);
        if header.low_confidence {
            tracing::warn!(
                file = sheet.file_name(),
                sheet = sheet.name(),
                start_row = header.start_row,
                end_row = header.end_row,
                "No header candidate validated, assuming default header rows"
            );
        }
        let columns = self.resolve_columns(sheet, &header);
        tracing::info!(
            file = sheet.file_name(),
            sheet = sheet.name(),
            strategy = self.info().name,
            heuristic = ?header.heuristic,
            start_row = header.start_row,
            end_row = header.end_row,
            columns = columns.len(),
            "Detected header block"
        );

        let records: Vec<Record> = self.materialize(sheet, &header, columns, criteria).collect();
        tracing::info!(file = sheet.file_name(), sheet = sheet.name(), records = records.len(), "Materialized records");
        records
    }
}

impl FromStr for Strategy {
    type Err = StrategyError;

    /// Parses a canonical name or alias, ignoring case and surrounding spaces.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim().to_ascii_lowercase();
        Strategy::ALL
            .into_iter()
            .find(|strategy| {
                let info = strategy.info();
                info.name == name || info.aliases.contains(&name.as_str())
            })
            .ok_or(StrategyError::UnknownStrategy(name))
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info().name)
    }
}
