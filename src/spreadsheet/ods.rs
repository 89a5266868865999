use crate::error::ChunkerError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::append_text;
use crate::helpers::xml::AttributeLookup;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::MergeRegion;
use crate::spreadsheet::sheet::check_limits;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
/// XML element name for spreadsheet root
const SPREADSHEET: QName = QName(b"office:spreadsheet");
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (hidden by a merge)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for string (space) text
const STRING: QName = QName(b"text:s");
/// XML element name for tab text
const TAB: QName = QName(b"text:tab");

/// An OpenDocument spreadsheet
pub(crate) struct OdsSpreadsheet {
    /// Name of the ODS file
    pub(crate) name: String,
    /// ZIP archive containing the ODS file contents
    zip: ZipArchive<UnifiedReader>,
}

impl OdsSpreadsheet {
    /// Opens an ODS package, validating its MIME type and rejecting encrypted content
    pub(crate) fn open(file_name: &str, reader: UnifiedReader) -> Result<Self, ChunkerError> {
        let mut zip = ZipArchive::new(reader)?;
        check_mime(file_name, &mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtected(file_name.to_owned()))?;
        }
        Ok(OdsSpreadsheet {
            name: file_name.to_owned(),
            zip,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    /// Reads cell values and spanned (merged) cells of the selected tables
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, ChunkerError> {
        let mut sheets = Vec::<Sheet>::new();
        let mut table_count = 0usize;
        let mut sheet_name = String::new();
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;
        'sheets: loop {
            if criteria.is_sheet_limit_reached(sheets.len()) {
                break;
            }
            let mut found = false;
            match_xml_events!(reader => {
                Event::End(event) if event.name() == SPREADSHEET => break 'sheets,
                Event::Start(event) if event.name() == TABLE => {
                    table_count += 1;
                    sheet_name.clear();
                    match event.attribute("table:name")? {
                        Some(name) => sheet_name.push_str(&name),
                        None => sheet_name.push_str(&format!("Sheet{table_count}")),
                    }
                    if criteria.accept(&sheet_name) {
                        found = true;
                        break;
                    }
                }
            });
            if !found {
                break;
            }

            let mut sheet = Sheet::new(&self.name, &sheet_name);
            let mut row = 0usize;
            let mut col = 0usize;
            let mut row_count = 1usize;
            let mut col_count = 1usize;
            let mut kind = CellType::default();
            let mut value = String::new();
            let mut element_context = false; // reading paragraphs of a string cell
            let mut comment_context = false; // inside an annotation
            match_xml_events!(reader => {
                Event::End(event) if event.name() == TABLE => break,
                Event::Start(event) if event.name() == TABLE_ROW => {
                    row_count = event.attribute_as("table:number-rows-repeated")?.unwrap_or(1);
                    col = 0;
                }
                Event::End(event) if event.name() == TABLE_ROW => {
                    row = row.saturating_add(row_count);
                }
                Event::Start(event) if event.name() == TABLE_COVERED_CELL => {
                    kind = CellType::Empty;
                    col_count = event.attribute_as("table:number-columns-repeated")?.unwrap_or(1);
                }
                Event::Start(event) if event.name() == TABLE_CELL => {
                    value.clear();
                    col_count = event.attribute_as("table:number-columns-repeated")?.unwrap_or(1);

                    let col_span = event.attribute_as::<usize>("table:number-columns-spanned")?.unwrap_or(1).max(1);
                    let row_span = event.attribute_as::<usize>("table:number-rows-spanned")?.unwrap_or(1).max(1);
                    if col_span > 1 || row_span > 1 {
                        let max_row = row.saturating_add(row_span - 1);
                        let max_col = col.saturating_add(col_span - 1);
                        sheet.push_merge(MergeRegion::new(row, col, max_row, max_col))?;
                    }

                    let value_type = event.attribute("office:value-type")?;
                    kind = match value_type.as_deref() {
                        Some("boolean") => CellType::Boolean,
                        Some("date") => CellType::IsoDateTime,
                        Some("time") => CellType::IsoDuration,
                        Some("string") => {
                            let is_error = event.attribute("calcext:value-type")?
                                .map(|cow| cow == "error")
                                .unwrap_or(false);
                            match (is_error, criteria.error_as_null) {
                                (true, true) => CellType::Empty,
                                (true, false) => CellType::Error,
                                (false, _) => CellType::InlineString,
                            }
                        }
                        Some(_) => CellType::Number,
                        None => CellType::Empty,
                    };

                    match value_type.as_deref() {
                        Some("string") => element_context = kind != CellType::Empty,
                        Some("boolean") => {
                            let flag = event.attribute_flag("office:boolean-value")?;
                            value.push(if flag { '1' } else { '0' });
                        }
                        Some("date") => if let Some(data) = event.attribute("office:date-value")? {
                            value.push_str(&data);
                        },
                        Some("time") => if let Some(data) = event.attribute("office:time-value")? {
                            value.push_str(&data);
                        },
                        Some(_) => if let Some(data) = event.attribute("office:value")? {
                            value.push_str(&data);
                        },
                        None => (),
                    }
                }
                Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                    if kind != CellType::Empty && !value.is_empty() {
                        // Repeats end inside the worksheet
                        check_limits(
                            row.saturating_add(row_count.saturating_sub(1)),
                            col.saturating_add(col_count.saturating_sub(1)),
                        )?;
                        for row_offset in 0..row_count {
                            for col_offset in 0..col_count {
                                sheet.push(Cell {
                                    row: row + row_offset,
                                    col: col + col_offset,
                                    kind,
                                    value: value.to_owned(),
                                })?;
                            }
                        }
                    }
                    col = col.saturating_add(col_count);
                    kind = CellType::Empty;
                    element_context = false;
                    comment_context = false;
                }
                Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
                Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
                Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                }
                Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                    let count = event.attribute_as("text:c")?.unwrap_or(1);
                    for _ in 0..count {
                        value.push(' ');
                    }
                }
                Event::Start(event) if element_context && !comment_context && event.name() == TAB => value.push('\t'),
                event @ (Event::Text(_) | Event::GeneralRef(_)) if element_context && !comment_context => {
                    append_text(&mut value, &event)?;
                }
            });
            tracing::debug!(
                sheet = sheet.name(),
                rows = sheet.row_count(),
                cols = sheet.col_count(),
                merges = sheet.merges().len(),
                "Loaded table"
            );
            sheets.push(sheet);
        }

        Ok(sheets)
    }
}

/// Validates the `mimetype` entry when the package has one
fn check_mime(file_name: &str, zip: &mut ZipArchive<UnifiedReader>) -> Result<(), ChunkerError> {
    if let Some(mut file) = zip.file("mimetype")? {
        let mut mime = String::new();
        file.read_to_string(&mut mime)?;
        if mime.trim() != MIME_TYPE {
            Err(SpreadsheetError::MimeTypeError(file_name.to_owned()))?;
        }
    }
    Ok(())
}

/// An entry of the manifest carrying `encryption-data` means the content is encrypted
fn is_password_protected(zip: &mut ZipArchive<UnifiedReader>) -> Result<bool, ChunkerError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const CONTENT: &str = r#"<office:document-content>
    <office:body><office:spreadsheet>
        <table:table table:name="Budget">
            <table:table-row>
                <table:table-cell table:number-columns-spanned="2" office:value-type="string"><text:p>Cost &amp; Fees</text:p></table:table-cell>
                <table:covered-table-cell/>
                <table:table-cell table:number-rows-spanned="2" office:value-type="string"><text:p>Total</text:p><office:annotation><text:p>note</text:p></office:annotation></table:table-cell>
            </table:table-row>
            <table:table-row>
                <table:table-cell office:value-type="string"><text:p>Net<text:s text:c="2"/>value</text:p></table:table-cell>
                <table:table-cell office:value-type="string"><text:p>Tax</text:p><text:p>rate</text:p></table:table-cell>
                <table:covered-table-cell/>
            </table:table-row>
            <table:table-row table:number-rows-repeated="2">
                <table:table-cell office:value-type="float" office:value="10"/>
                <table:table-cell table:number-columns-repeated="2" office:value-type="percentage" office:value="0.25"/>
            </table:table-row>
            <table:table-row>
                <table:table-cell office:value-type="date" office:date-value="2024-03-05"/>
                <table:table-cell office:value-type="boolean" office:boolean-value="true"/>
                <table:table-cell office:value-type="string" calcext:value-type="error"><text:p>#N/A</text:p></table:table-cell>
            </table:table-row>
            <table:table-row table:number-rows-repeated="1048570"><table:table-cell table:number-columns-repeated="1024"/></table:table-row>
        </table:table>
        <table:table table:name="Second">
            <table:table-row><table:table-cell office:value-type="time" office:time-value="PT01H30M00S"/></table:table-row>
        </table:table>
    </office:spreadsheet></office:body>
    </office:document-content>"#;

    fn package(manifest: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in [
            ("mimetype", MIME_TYPE),
            ("META-INF/manifest.xml", manifest),
            ("content.xml", CONTENT),
        ] {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const MANIFEST: &str = r#"<manifest:manifest><manifest:file-entry manifest:full-path="content.xml"/></manifest:manifest>"#;

    fn read(criteria: &Criteria) -> Vec<Sheet> {
        let mut ods = OdsSpreadsheet::open("budget.ods", UnifiedReader::from_bytes(package(MANIFEST))).unwrap();
        ods.read_sheets(criteria).unwrap()
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_owned())
    }

    #[test]
    fn test_read_values() {
        let sheets = read(&Criteria::default());
        assert_eq!(sheets.len(), 1);
        let sheet = &sheets[0];
        assert_eq!(sheet.name(), "Budget");
        assert_eq!(sheet.row_count(), 5);
        assert_eq!(sheet.col_count(), 3);
        assert_eq!(sheet.value_at(0, 0).unwrap(), text("Cost & Fees"));
        assert_eq!(sheet.value_at(1, 0).unwrap(), text("Net  value"));
        assert_eq!(sheet.value_at(1, 1).unwrap(), text("Tax\nrate"));
        assert_eq!(sheet.value_at(2, 0).unwrap(), CellValue::Integer(10));
        assert_eq!(sheet.value_at(3, 2).unwrap(), CellValue::Float(0.25));
        assert_eq!(sheet.value_at(4, 0).unwrap(), CellValue::Date("2024-03-05".to_owned()));
        assert_eq!(sheet.value_at(4, 1).unwrap(), CellValue::Boolean(true));
        assert_eq!(sheet.value_at(4, 2).unwrap(), text("#N/A"));
    }

    #[test]
    fn test_spanned_cells_become_merges() {
        let sheets = read(&Criteria::default());
        let sheet = &sheets[0];
        assert_eq!(sheet.merges(), &[MergeRegion::new(0, 0, 0, 1), MergeRegion::new(0, 2, 1, 2)]);
        assert_eq!(sheet.effective_value_at(0, 1).unwrap(), text("Cost & Fees"));
        // Annotation text is not part of the value
        assert_eq!(sheet.effective_value_at(1, 2).unwrap(), text("Total"));
    }

    #[test]
    fn test_select_second_table() {
        let criteria = Criteria::default().with_sheet_names(&["Second"]).unwrap();
        let sheets = read(&criteria);
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].value_at(0, 0).unwrap(), CellValue::Date("01:30:00".to_owned()));
    }

    #[test]
    fn test_encrypted_package_rejected() {
        let manifest = r#"<manifest:manifest><manifest:file-entry manifest:full-path="content.xml"><manifest:encryption-data/></manifest:file-entry></manifest:manifest>"#;
        let result = OdsSpreadsheet::open("secret.ods", UnifiedReader::from_bytes(package(manifest)));
        assert!(matches!(
            result,
            Err(ChunkerError::SpreadsheetError(SpreadsheetError::PasswordProtected(_)))
        ));
    }
}
