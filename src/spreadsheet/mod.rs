//! # Spreadsheet Input
//!
//! Format readers that turn a workbook into [`Sheet`] grids: Office Open XML
//! (.xlsx and its macro/template variants), OpenDocument (.ods) and delimited
//! text (.csv, .tsv, .txt). Each reader keeps merge regions next to the cell
//! values so the chunking engine can reason about stacked headers.
pub(crate) mod cell;
pub(crate) mod criteria;
pub(crate) mod csv;
pub(crate) mod excel;
pub(crate) mod ods;
pub(crate) mod range;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

use crate::error::ChunkerError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use std::path::Path;
use thiserror::Error;

/// Errors raised while opening or addressing a spreadsheet.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Unsupported or unrecognized file extension
    #[error("Cannot detect file format for '{0}'")]
    InvalidFileFormat(String),

    /// Encrypted package that cannot be read without a password
    #[error("Spreadsheet '{0}' is password protected")]
    PasswordProtected(String),

    /// A mandatory part of the package is missing
    #[error("Missing '{0}' in spreadsheet package")]
    FileError(String),

    /// The package does not carry the expected MIME type
    #[error("Invalid MIME type in '{0}'")]
    MimeTypeError(String),

    /// The workbook declares no sheet at all
    #[error("Spreadsheet '{0}' contains no sheet")]
    EmptyWorkbook(String),

    /// No sheet matches the requested sheet name patterns
    #[error("No sheet in '{0}' matches the requested names")]
    SheetNotFound(String),

    /// A grid position outside the sheet dimensions
    #[error("Position {0} is outside the sheet ({1} rows, {2} columns)")]
    InvalidPosition(String, usize, usize),

    /// A cell or merge region beyond the worksheet limits, as 0-based (row, col)
    #[error("Cell at row {0}, column {1} is beyond the worksheet limits")]
    PositionOutOfLimits(usize, usize),

    /// Worksheet cell refers to a shared string that does not exist
    #[error("Shared string index {0} is out of range")]
    SharedStringIndexError(usize),
}

/// Common surface of every format reader.
pub(crate) trait Spreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String;

    /// Reads the sheets selected by the criteria, in workbook order
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, ChunkerError>;
}

/// Supported input formats, detected by file extension
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SpreadsheetFormat {
    Xlsx,
    Ods,
    Delimited,
}

impl SpreadsheetFormat {
    pub(crate) fn detect(file_name: &str) -> Result<Self, SpreadsheetError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase());
        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xltx") | Some("xltm") | Some("xlam") => Ok(Self::Xlsx),
            Some("ods") => Ok(Self::Ods),
            Some("csv") | Some("tsv") | Some("txt") => Ok(Self::Delimited),
            _ => Err(SpreadsheetError::InvalidFileFormat(file_name.to_owned())),
        }
    }
}

/// Opens a spreadsheet from a reader, picking the format by the file name's extension.
pub(crate) fn open_spreadsheet(file_name: &str, reader: UnifiedReader, criteria: &Criteria) -> Result<Box<dyn Spreadsheet>, ChunkerError> {
    let spreadsheet: Box<dyn Spreadsheet> = match SpreadsheetFormat::detect(file_name)? {
        SpreadsheetFormat::Xlsx => Box::new(xlsx::XlsxSpreadsheet::open(file_name, reader)?),
        SpreadsheetFormat::Ods => Box::new(ods::OdsSpreadsheet::open(file_name, reader)?),
        SpreadsheetFormat::Delimited => Box::new(csv::CsvSpreadsheet::open(file_name, reader, criteria.delimiter)?),
    };
    Ok(spreadsheet)
}
