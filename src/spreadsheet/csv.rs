use crate::error::ChunkerError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use csv::ReaderBuilder;
use std::path::Path;

/// A delimited text table (.csv, .tsv, .txt): a single sheet without merge metadata
pub(crate) struct CsvSpreadsheet {
    /// File name of the table
    pub(crate) name: String,
    /// Field delimiter
    delimiter: u8,
    reader: Option<UnifiedReader>,
}

impl CsvSpreadsheet {
    /// Prepares the table; `delimiter` overrides the one implied by the extension
    pub(crate) fn open(file_name: &str, reader: UnifiedReader, delimiter: Option<u8>) -> Result<Self, ChunkerError> {
        let delimiter = delimiter.unwrap_or_else(|| default_delimiter(file_name));
        Ok(CsvSpreadsheet {
            name: file_name.to_owned(),
            delimiter,
            reader: Some(reader),
        })
    }

    /// Sheet name reported in record metadata: the file stem
    fn sheet_name(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.to_owned())
    }
}

fn default_delimiter(file_name: &str) -> u8 {
    let is_tsv = Path::new(file_name)
        .extension()
        .map(|extension| extension.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false);
    if is_tsv { b'\t' } else { b',' }
}

impl Spreadsheet for CsvSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    /// Reads the single table. Sheet name patterns do not apply to delimited text.
    fn read_sheets(&mut self, _criteria: &Criteria) -> Result<Vec<Sheet>, ChunkerError> {
        let mut sheet = Sheet::flat(&self.name, &self.sheet_name());
        let Some(reader) = self.reader.take() else {
            return Ok(vec![sheet]);
        };
        let mut table = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(reader);
        for (row, result) in table.records().enumerate() {
            let record = result?;
            for (col, field) in record.iter().enumerate() {
                let field = if row == 0 && col == 0 {
                    field.trim_start_matches('\u{feff}')
                } else {
                    field
                };
                if field.trim().is_empty() {
                    continue;
                }
                let value = CellValue::parse_number(field).unwrap_or_else(|| CellValue::Text(field.to_owned()));
                sheet.insert(row, col, value);
            }
        }
        Ok(vec![sheet])
    }
}
