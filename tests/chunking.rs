use serde_json::json;
use serde_json::Value;
use sheet_chunker::chunk_bytes;
use sheet_chunker::chunk_file;
use sheet_chunker::read_sheets_from_bytes;
use sheet_chunker::ChunkerError;
use sheet_chunker::Criteria;
use sheet_chunker::Heuristic;
use sheet_chunker::Record;
use sheet_chunker::SpreadsheetError;
use sheet_chunker::Strategy;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const WORKSHEET_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

fn zip_package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Workbook with the given (sheet name, sheetData and mergeCells xml) pairs
fn workbook(sheets: &[(&str, &str)]) -> Vec<u8> {
    let mut names = String::new();
    let mut relationships = String::new();
    let mut paths = Vec::new();
    for (index, (name, _)) in sheets.iter().enumerate() {
        let id = index + 1;
        names.push_str(&format!(r#"<sheet name="{name}" sheetId="{id}" r:id="rId{id}"/>"#));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{id}" Type="{WORKSHEET_TYPE}" Target="worksheets/sheet{id}.xml"/>"#
        ));
        paths.push(format!("xl/worksheets/sheet{id}.xml"));
    }
    let workbook = format!(
        r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{names}</sheets></workbook>"#
    );
    let relationships = format!("<Relationships>{relationships}</Relationships>");
    let worksheets: Vec<String> = sheets
        .iter()
        .map(|(_, body)| format!("<worksheet>{body}</worksheet>"))
        .collect();

    let mut entries = vec![
        ("xl/workbook.xml", workbook.as_str()),
        ("xl/_rels/workbook.xml.rels", relationships.as_str()),
    ];
    for (path, worksheet) in paths.iter().zip(&worksheets) {
        entries.push((path.as_str(), worksheet.as_str()));
    }
    zip_package(&entries)
}

fn text(reference: &str, value: &str) -> String {
    format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#)
}

fn number(reference: &str, value: &str) -> String {
    format!(r#"<c r="{reference}"><v>{value}</v></c>"#)
}

fn row(index: usize, cells: &[String]) -> String {
    format!(r#"<row r="{index}">{}</row>"#, cells.concat())
}

/// Three stacked header rows over eight columns:
///
/// ```text
/// | Name | Price      | Amount   | Total | Notes |   | Name |
/// |      | Unit | Bulk |          |       |       |   |      |
/// |      |      |      | Subtotal |       |       |   |      |
/// ```
fn orders_sheet() -> String {
    let rows = [
        row(1, &[text("A1", "Name"), text("B1", "Price"), text("D1", "Amount"), text("E1", "Total"), text("F1", "Notes"), text("H1", "Name")]),
        row(2, &[text("B2", "Unit"), text("C2", "Bulk")]),
        row(3, &[text("D3", "Subtotal")]),
        row(4, &[text("A4", "Widget"), number("B4", "2.5"), number("C4", "2"), number("D4", "10"), number("E4", "25"), text("F4", "ok"), number("G4", "1"), number("H4", "7")]),
        row(5, &[text("A5", "Gadget"), number("B5", "4"), number("C5", "3.5"), number("D5", "8"), number("E5", "32"), number("G5", "2"), number("H5", "9")]),
        row(7, &[text("A7", "Gizmo"), number("B7", "1")]),
    ];
    let merges = ["A1:A3", "B1:C1", "D1:D2", "E1:E3", "B2:B3", "C2:C3"]
        .iter()
        .map(|reference| format!(r#"<mergeCell ref="{reference}"/>"#))
        .collect::<String>();
    format!("<sheetData>{}</sheetData><mergeCells>{merges}</mergeCells>", rows.concat())
}

fn orders_workbook() -> Vec<u8> {
    let simple = format!(
        "<sheetData>{}{}</sheetData>",
        row(1, &[text("A1", "City"), text("B1", "Population")]),
        row(2, &[text("A2", "Oslo"), number("B2", "709000")]),
    );
    workbook(&[("Orders", &orders_sheet()), ("Cities", &simple), ("Blank", "<sheetData/>")])
}

fn ods_package(content: &str) -> Vec<u8> {
    zip_package(&[
        ("mimetype", "application/vnd.oasis.opendocument.spreadsheet"),
        ("META-INF/manifest.xml", r#"<manifest:manifest><manifest:file-entry manifest:full-path="content.xml"/></manifest:manifest>"#),
        ("content.xml", content),
    ])
}

fn columns(records: &[Record]) -> Vec<String> {
    records[0].content.keys().cloned().collect()
}

#[test]
fn test_multi_level_header_names() {
    let records = chunk_bytes("orders.xlsx", orders_workbook(), Strategy::Auto, &Criteria::default()).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(
        columns(&records),
        vec!["Name", "Price-Unit", "Price-Bulk", "Amount-Subtotal", "Total", "Notes", "column7", "Name.1"]
    );

    let header = &records[0].meta.header;
    assert_eq!(header.heuristic, Heuristic::MultiLevel);
    assert_eq!((header.start_row, header.end_row, header.level_count), (0, 2, 3));
    assert!(!header.low_confidence);

    assert_eq!(
        Value::Object(records[0].content.clone()),
        json!({
            "Name": "Widget",
            "Price-Unit": 2.5,
            "Price-Bulk": 2,
            "Amount-Subtotal": 10,
            "Total": 25,
            "Notes": "ok",
            "column7": 1,
            "Name.1": 7
        })
    );
    assert_eq!(records[1].content["Notes"], json!(""));
    assert_eq!(records[0].meta.file_name, "orders.xlsx");
    assert_eq!(records[0].meta.sheet_name, "Orders");
}

#[test]
fn test_record_invariants() {
    let criteria = Criteria::default();
    let records = chunk_bytes("orders.xlsx", orders_workbook(), Strategy::Auto, &criteria).unwrap();
    let rows: Vec<usize> = records.iter().map(|record| record.meta.row_index).collect();
    assert_eq!(rows, vec![3, 4, 6]);
    for record in &records {
        assert!(record.meta.row_index > record.meta.header.end_row);
        assert_eq!(record.content.len(), record.meta.columns);
    }

    let again = chunk_bytes("orders.xlsx", orders_workbook(), Strategy::Auto, &criteria).unwrap();
    assert_eq!(records, again);
}

#[test]
fn test_single_header_strategy() {
    let records = chunk_bytes("orders.xlsx", orders_workbook(), Strategy::SingleHeader, &Criteria::default()).unwrap();
    assert_eq!(
        columns(&records),
        vec!["Name", "Unit", "Bulk", "Subtotal", "Total", "column6", "column7", "column8"]
    );
    assert_eq!(records[0].meta.header.heuristic, Heuristic::SingleRow);
    assert_eq!(records[0].meta.row_index, 3);
}

#[test]
fn test_flat_strategy_keeps_blank_rows() {
    let records = chunk_bytes("orders.xlsx", orders_workbook(), Strategy::Flat, &Criteria::default()).unwrap();
    assert_eq!(records.len(), 6);
    assert_eq!(
        columns(&records),
        vec!["Name", "Price", "Price.1", "Amount", "Total", "Notes", "column7", "Name.1"]
    );
    // Row 2 sits inside the vertical merges of the header
    assert_eq!(records[0].content["Name"], json!("Name"));
    assert!(records[4].content.values().all(|value| value == &json!("")));
}

#[test]
fn test_sheet_selection() {
    let criteria = Criteria::default().with_sheet_names(&["Cit*"]).unwrap();
    let records = chunk_bytes("orders.xlsx", orders_workbook(), Strategy::Auto, &criteria).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].meta.sheet_name, "Cities");
    assert_eq!(Value::Object(records[0].content.clone()), json!({"City": "Oslo", "Population": 709000}));

    let criteria = Criteria {
        sheet_limit: None,
        ..Criteria::default()
    };
    let sheets = read_sheets_from_bytes("orders.xlsx", orders_workbook(), &criteria).unwrap();
    let names: Vec<&str> = sheets.iter().map(|sheet| sheet.name()).collect();
    assert_eq!(names, vec!["Orders", "Cities", "Blank"]);
    assert_eq!(chunk_bytes("orders.xlsx", orders_workbook(), Strategy::Auto, &criteria).unwrap().len(), 4);
}

#[test]
fn test_empty_sheet_has_no_records() {
    let criteria = Criteria::default().with_sheet_names(&["Blank"]).unwrap();
    for strategy in Strategy::ALL {
        assert!(chunk_bytes("orders.xlsx", orders_workbook(), strategy, &criteria).unwrap().is_empty());
    }
}

#[test]
fn test_sheet_not_found() {
    let criteria = Criteria::default().with_sheet_names(&["Missing"]).unwrap();
    let result = chunk_bytes("orders.xlsx", orders_workbook(), Strategy::Auto, &criteria);
    assert!(matches!(result, Err(ChunkerError::SpreadsheetError(SpreadsheetError::SheetNotFound(_)))));
}

#[test]
fn test_ods_spanned_headers() {
    let content = r#"<office:document-content><office:body><office:spreadsheet>
        <table:table table:name="Budget">
            <table:table-row>
                <table:table-cell table:number-columns-spanned="2" office:value-type="string"><text:p>Cost</text:p></table:table-cell>
                <table:covered-table-cell/>
                <table:table-cell table:number-rows-spanned="2" office:value-type="string"><text:p>Total</text:p></table:table-cell>
            </table:table-row>
            <table:table-row>
                <table:table-cell office:value-type="string"><text:p>Net</text:p></table:table-cell>
                <table:table-cell office:value-type="string"><text:p>Tax</text:p></table:table-cell>
                <table:covered-table-cell/>
            </table:table-row>
            <table:table-row table:number-rows-repeated="2">
                <table:table-cell office:value-type="float" office:value="10"/>
                <table:table-cell office:value-type="float" office:value="2"/>
                <table:table-cell office:value-type="float" office:value="12"/>
            </table:table-row>
        </table:table>
    </office:spreadsheet></office:body></office:document-content>"#;
    let records = chunk_bytes("budget.ods", ods_package(content), Strategy::MultiLevel, &Criteria::default()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(columns(&records), vec!["Cost-Net", "Cost-Tax", "Total"]);
    assert_eq!(records[1].meta.row_index, 3);
    assert_eq!(records[0].meta.header.level_count, 2);
}

#[test]
fn test_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    std::fs::write(&path, "Name,Score,Name\nAnn,91,A\n,,\nBen,78,B\n").unwrap();

    let records = chunk_file(&path, Strategy::Auto, &Criteria::default()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(columns(&records), vec!["Name", "Score", "Name.1"]);
    assert_eq!(records[1].content["Score"], json!(78));
    assert_eq!(records[1].meta.row_index, 3);
    assert_eq!(records[0].meta.file_name, "scores.csv");
    assert_eq!(records[0].meta.sheet_name, "scores");

    let records = chunk_file(&path, Strategy::Flat, &Criteria::default()).unwrap();
    assert_eq!(records.len(), 3);
}

#[test]
fn test_unreadable_files() {
    let result = chunk_bytes("broken.xlsx", b"not a zip archive".to_vec(), Strategy::Auto, &Criteria::default());
    assert!(matches!(result, Err(ChunkerError::UnreadableFile(ref name, _)) if name == "broken.xlsx"));

    let result = chunk_bytes("slides.pdf", b"%PDF-1.7".to_vec(), Strategy::Auto, &Criteria::default());
    assert!(matches!(result, Err(ChunkerError::UnreadableFile(..))));

    let dir = tempfile::tempdir().unwrap();
    let result = chunk_file(dir.path().join("missing.xlsx"), Strategy::Auto, &Criteria::default());
    assert!(matches!(result, Err(ChunkerError::UnreadableFile(ref name, _)) if name == "missing.xlsx"));
}

#[test]
fn test_positions_beyond_worksheet_limits() {
    let oversized_span = r#"<office:document-content><office:body><office:spreadsheet>
        <table:table table:name="Broken">
            <table:table-row><table:table-cell office:value-type="string"><text:p>Name</text:p></table:table-cell></table:table-row>
            <table:table-row>
                <table:table-cell table:number-rows-spanned="18446744073709551615" office:value-type="string"><text:p>x</text:p></table:table-cell>
            </table:table-row>
        </table:table>
    </office:spreadsheet></office:body></office:document-content>"#;
    let result = chunk_bytes("broken.ods", ods_package(oversized_span), Strategy::Auto, &Criteria::default());
    assert!(matches!(result, Err(ChunkerError::UnreadableFile(ref name, ref message)) if name == "broken.ods" && message.contains("worksheet limits")));

    let repeated = r#"<office:document-content><office:body><office:spreadsheet>
        <table:table table:name="Broken">
            <table:table-row table:number-rows-repeated="4000000000">
                <table:table-cell office:value-type="float" office:value="1"/>
            </table:table-row>
        </table:table>
    </office:spreadsheet></office:body></office:document-content>"#;
    let result = chunk_bytes("repeated.ods", ods_package(repeated), Strategy::Auto, &Criteria::default());
    assert!(matches!(result, Err(ChunkerError::UnreadableFile(..))));

    let far_row = format!("<sheetData>{}</sheetData>", row(4_000_000_000, &[text("A4000000000", "far")]));
    let result = chunk_bytes("far.xlsx", workbook(&[("Sheet1", &far_row)]), Strategy::Auto, &Criteria::default());
    assert!(matches!(result, Err(ChunkerError::UnreadableFile(..))));

    let wide_merge = format!(
        r#"<sheetData>{}</sheetData><mergeCells><mergeCell ref="A1:A2000000"/></mergeCells>"#,
        row(1, &[text("A1", "Name")])
    );
    let result = chunk_bytes("wide.xlsx", workbook(&[("Sheet1", &wide_merge)]), Strategy::Auto, &Criteria::default());
    assert!(matches!(result, Err(ChunkerError::UnreadableFile(..))));

    // The last addressable row is still accepted
    let last_row = format!(
        "<sheetData>{}{}</sheetData>",
        row(1, &[text("A1", "Name")]),
        row(1_048_576, &[text("A1048576", "last")])
    );
    let sheets = read_sheets_from_bytes("last.xlsx", workbook(&[("Sheet1", &last_row)]), &Criteria::default()).unwrap();
    assert_eq!(sheets[0].row_count(), 1_048_576);
}
