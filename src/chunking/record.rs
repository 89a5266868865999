//! Records and the Row Materializer
use crate::chunking::classifier::HeaderBlock;
use crate::error::ChunkerError;
use crate::spreadsheet::sheet::Sheet;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Positional metadata of one record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordMeta {
    /// 0-based grid row the record was read from
    pub row_index: usize,
    pub file_name: String,
    pub sheet_name: String,
    /// Number of resolved columns
    pub columns: usize,
    /// Header block the column names came from
    pub header: HeaderBlock,
}

/// One data row keyed by resolved column names, in column order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub content: Map<String, Value>,
    pub meta: RecordMeta,
}

impl Record {
    /// Content as pretty JSON, the text payload handed to storage
    pub fn content_text(&self) -> Result<String, ChunkerError> {
        Ok(serde_json::to_string_pretty(&self.content)?)
    }

    /// Content and metadata together as one JSON document
    pub fn to_json(&self) -> Result<String, ChunkerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Lazy sequence of records for the rows below a header block.
/// Calling `materialize` again yields the same records.
pub struct Rows<'a> {
    sheet: &'a Sheet,
    header: HeaderBlock,
    columns: Vec<String>,
    skip_empty_rows: bool,
    row: usize,
}

impl<'a> Rows<'a> {
    pub(crate) fn new(sheet: &'a Sheet, header: HeaderBlock, columns: Vec<String>, skip_empty_rows: bool) -> Self {
        Rows {
            sheet,
            row: header.end_row + 1,
            header,
            columns,
            skip_empty_rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn header(&self) -> &HeaderBlock {
        &self.header
    }

    /// Builds the record of one row; `None` when the row is blank and blanks are skipped
    fn read_row(&self, row: usize) -> Option<Record> {
        let mut content = Map::with_capacity(self.columns.len());
        let mut width = 0usize;
        for (col, name) in self.columns.iter().enumerate() {
            let value = self.sheet.effective_value(row, col);
            if !value.is_empty() {
                width = col + 1;
            }
            content.insert(name.to_owned(), value.to_json());
        }

        if width == 0 && self.skip_empty_rows {
            return None;
        }
        if width > 0 && width < self.columns.len() {
            tracing::debug!(row, width, columns = self.columns.len(), "Padded short row");
        }
        Some(Record {
            content,
            meta: RecordMeta {
                row_index: row,
                file_name: self.sheet.file_name().to_owned(),
                sheet_name: self.sheet.name().to_owned(),
                columns: self.columns.len(),
                header: self.header.clone(),
            },
        })
    }
}

impl Iterator for Rows<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        while self.row < self.sheet.row_count() {
            let row = self.row;
            self.row += 1;
            if let Some(record) = self.read_row(row) {
                return Some(record);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.sheet.row_count().saturating_sub(self.row)))
    }
}
