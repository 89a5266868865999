//! Header Name Resolver: one flat name per column from a stacked header block
use crate::chunking::classifier::HeaderBlock;
use crate::spreadsheet::sheet::MergeRegion;
use crate::spreadsheet::sheet::Sheet;

/// Joins the fragments of a stacked column name
pub const SEPARATOR: &str = "-";

/// Positional name of a column without any header text (1-based)
pub fn placeholder(col: usize) -> String {
    format!("column{}", col + 1)
}

/// How a column's header cells are merged across the block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MergePattern {
    /// One region covers every header row: its value is the name
    WholeBlock,
    /// No header row is merged with another header row
    Independent,
    /// Three rows where exactly one adjacent pair is merged
    PartialPair,
    /// Anything else
    Mixed,
}

/// Fragments collected for one column and the pattern that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnHeader {
    pub col: usize,
    pub pattern: MergePattern,
    pub fragments: Vec<String>,
}

impl ColumnHeader {
    /// Raw name: fragments joined with the separator, or the positional placeholder
    pub fn name(&self) -> String {
        if self.fragments.is_empty() {
            placeholder(self.col)
        } else {
            self.fragments.join(SEPARATOR)
        }
    }
}

/// Rows of `region` that fall inside the header block, as an inclusive pair
fn span_within(region: &MergeRegion, header: &HeaderBlock) -> (usize, usize) {
    (region.min_row.max(header.start_row), region.max_row.min(header.end_row))
}

/// True if the region merges the row with no other row of the block
fn is_independent(region: Option<&MergeRegion>, header: &HeaderBlock) -> bool {
    region
        .map(|region| {
            let (top, bottom) = span_within(region, header);
            top == bottom
        })
        .unwrap_or(true)
}

/// True if `region` covers exactly rows `top..=bottom` of the block
fn covers_exactly(region: Option<&MergeRegion>, header: &HeaderBlock, top: usize, bottom: usize) -> bool {
    region
        .map(|region| span_within(region, header) == (top, bottom))
        .unwrap_or(false)
}

/// Appends a non-empty fragment unless it repeats the previous one
fn push_fragment(fragments: &mut Vec<String>, fragment: String) {
    if !fragment.is_empty() && fragments.last() != Some(&fragment) {
        fragments.push(fragment);
    }
}

/// Resolves the header fragments of one column.
///
/// Horizontal spans are read through their anchor, so a group label above
/// several sub-columns contributes a fragment to each of them. The checks run
/// in priority order: whole-block merge, independent rows, partial pair, mixed.
pub fn resolve_column(sheet: &Sheet, header: &HeaderBlock, col: usize) -> ColumnHeader {
    let rows: Vec<usize> = header.rows().collect();
    let regions: Vec<Option<&MergeRegion>> = rows.iter().map(|row| sheet.find_merge(*row, col)).collect();
    let text = |row: usize| sheet.effective_value(row, col).to_text();

    let whole_block = regions[0].filter(|first| {
        regions.iter().all(|region| *region == Some(*first))
            && first.min_row <= header.start_row
            && first.max_row >= header.end_row
    });
    if let Some(region) = whole_block {
        let mut fragments = Vec::new();
        push_fragment(&mut fragments, text(region.min_row.max(header.start_row)));
        return ColumnHeader { col, pattern: MergePattern::WholeBlock, fragments };
    }

    if regions.iter().all(|region| is_independent(*region, header)) {
        let mut fragments = Vec::new();
        for row in &rows {
            push_fragment(&mut fragments, text(*row));
        }
        return ColumnHeader { col, pattern: MergePattern::Independent, fragments };
    }

    if rows.len() == 3 {
        let (first, second, third) = (rows[0], rows[1], rows[2]);
        let top_pair = covers_exactly(regions[0], header, first, second)
            && regions[0] == regions[1]
            && is_independent(regions[2], header);
        let bottom_pair = is_independent(regions[0], header)
            && covers_exactly(regions[1], header, second, third)
            && regions[1] == regions[2];
        if top_pair || bottom_pair {
            let ordered = if top_pair { [first, third] } else { [first, second] };
            let mut fragments = Vec::new();
            for row in ordered {
                push_fragment(&mut fragments, text(row));
            }
            return ColumnHeader { col, pattern: MergePattern::PartialPair, fragments };
        }
    }

    let mut fragments = Vec::<String>::new();
    for row in &rows {
        let fragment = text(*row);
        if !fragment.is_empty() && !fragments.contains(&fragment) {
            fragments.push(fragment);
        }
    }
    ColumnHeader { col, pattern: MergePattern::Mixed, fragments }
}

/// Raw name of one column under the stacked-header rules
pub fn resolve_column_name(sheet: &Sheet, header: &HeaderBlock, col: usize) -> String {
    let column = resolve_column(sheet, header, col);
    tracing::debug!(col, pattern = ?column.pattern, name = %column.name(), "Resolved column name");
    column.name()
}

/// Raw names taken verbatim from the first header row (flat tables and single-row headers)
pub fn header_row_names(sheet: &Sheet, header: &HeaderBlock) -> Vec<String> {
    (0..sheet.col_count())
        .map(|col| {
            let text = sheet.effective_value(header.start_row, col).to_text();
            if text.is_empty() { placeholder(col) } else { text }
        })
        .collect()
}
