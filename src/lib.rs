//! # Sheet Chunker
//!
//! Turns spreadsheets into one structured record per data row, rebuilding
//! flat column names from header blocks of up to three stacked, merged rows.
//!
//! ## Features
//!
//! - **Formats**: Office Open XML (`.xlsx`, `.xlsm`, `.xltx`, `.xltm`, `.xlam`),
//!   OpenDocument (`.ods`) and delimited text (`.csv`, `.tsv`, `.txt`)
//! - **Header detection**: single header rows and multi-level headers found from
//!   row shape (how filled and how numeric each row is)
//! - **Merged cells**: whole-block merges, group labels spanning sub-columns and
//!   partially merged levels all resolve to one name per column
//! - **Unique names**: repeated names get `.1`, `.2`, ... suffixes
//! - **Records**: insertion-ordered JSON content with row and header metadata
//! - **Pipeline**: explicit job states over a pluggable record store
//!
//! ## Example
//!
//! ```no_run
//! use sheet_chunker::{chunk_file, Criteria, Strategy};
//!
//! let records = chunk_file("report.xlsx", Strategy::Auto, &Criteria::default())?;
//! for record in &records {
//!     println!("{}", record.content_text()?);
//! }
//! # Ok::<(), sheet_chunker::ChunkerError>(())
//! ```
pub mod chunking;
mod error;
mod helpers;
pub mod pipeline;
mod spreadsheet;

pub use crate::chunking::classifier::HeaderBlock;
pub use crate::chunking::classifier::Heuristic;
pub use crate::chunking::classifier::RowFeature;
pub use crate::chunking::record::Record;
pub use crate::chunking::record::RecordMeta;
pub use crate::chunking::record::Rows;
pub use crate::chunking::Strategy;
pub use crate::chunking::StrategyError;
pub use crate::chunking::StrategyInfo;
pub use crate::error::ChunkerError;
pub use crate::helpers::xml::XmlError;
pub use crate::pipeline::JobRecord;
pub use crate::pipeline::JobStatus;
pub use crate::pipeline::MemoryStore;
pub use crate::pipeline::Pipeline;
pub use crate::pipeline::PipelineError;
pub use crate::pipeline::RecordStore;
pub use crate::spreadsheet::cell::CellValue;
pub use crate::spreadsheet::criteria::Criteria;
pub use crate::spreadsheet::range::RangeError;
pub use crate::spreadsheet::sheet::MergeRegion;
pub use crate::spreadsheet::sheet::Sheet;
pub use crate::spreadsheet::sheet::SpanType;
pub use crate::spreadsheet::SpreadsheetError;

use crate::error::ResultMessage;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::open_spreadsheet;
use std::path::Path;

/// Opens a spreadsheet file and reads the sheets selected by the criteria.
///
/// Any failure to open or parse the file is reported as [`ChunkerError::UnreadableFile`].
pub fn read_sheets<P: AsRef<Path>>(path: P, criteria: &Criteria) -> Result<Vec<Sheet>, ChunkerError> {
    let path = path.as_ref();
    let file_name = display_name(path);
    let reader = UnifiedReader::open(&path.to_string_lossy()).or_unreadable(&file_name)?;
    read_from(&file_name, reader, criteria)
}

/// Reads the selected sheets of uploaded content; `file_name` picks the format.
pub fn read_sheets_from_bytes(file_name: &str, bytes: Vec<u8>, criteria: &Criteria) -> Result<Vec<Sheet>, ChunkerError> {
    read_from(file_name, UnifiedReader::from_bytes(bytes), criteria)
}

/// Chunks every selected sheet of a spreadsheet file into records.
///
/// Empty sheets produce no records. Header detection problems never fail the
/// call; they are recorded in each record's header metadata.
pub fn chunk_file<P: AsRef<Path>>(path: P, strategy: Strategy, criteria: &Criteria) -> Result<Vec<Record>, ChunkerError> {
    let sheets = read_sheets(path, criteria)?;
    Ok(chunk_sheets(&sheets, strategy, criteria))
}

/// Chunks uploaded content without a temporary file.
pub fn chunk_bytes(file_name: &str, bytes: Vec<u8>, strategy: Strategy, criteria: &Criteria) -> Result<Vec<Record>, ChunkerError> {
    let sheets = read_sheets_from_bytes(file_name, bytes, criteria)?;
    Ok(chunk_sheets(&sheets, strategy, criteria))
}

fn chunk_sheets(sheets: &[Sheet], strategy: Strategy, criteria: &Criteria) -> Vec<Record> {
    sheets
        .iter()
        .flat_map(|sheet| strategy.chunk_sheet(sheet, criteria))
        .collect()
}

fn read_from(file_name: &str, reader: UnifiedReader, criteria: &Criteria) -> Result<Vec<Sheet>, ChunkerError> {
    let sheets = open_spreadsheet(file_name, reader, criteria)
        .and_then(|mut spreadsheet| spreadsheet.read_sheets(criteria).with_prefix(&spreadsheet.name()))
        .or_unreadable(file_name)?;
    if sheets.is_empty() && criteria.sheet_name_patterns.is_some() {
        Err(SpreadsheetError::SheetNotFound(file_name.to_owned()))?;
    }
    tracing::debug!(file = file_name, sheets = sheets.len(), "Read spreadsheet");
    Ok(sheets)
}

/// File name component used in record metadata
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
