//! R-file parsing.
//!
//! An R-file is the SEC's rendering of one XBRL report, either as HTML (`R2.htm`) or, in
//! older filings, as XML (`R2.xml`). Both are first read into a [`RawTable`] of header and
//! body rows, then [`RawTable::into_matrix`] normalizes the grid into a
//! [`StatementMatrix`] with the fixed metadata layout:
//!
//! | row | label             | value per column                          |
//! |-----|-------------------|-------------------------------------------|
//! | 0   | `accessionNumber` | accession number of the filing            |
//! | 1   | `form`            | `10-K` or `10-Q`                          |
//! | 2   | `reportDate`      | `YYYYMMDD` from the header, else filing's |
//! | 3   | `denomination`    | `Thousands`, `Millions`, `Billions` or "" |
//! | 4   | `reportPeriod`    | months covered                            |
//! | 5   | `reportDuration`  | heading such as `3 Months Ended`          |
//! | 6   | `separator`       |                                           |

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use filings_core::matrix::SEPARATOR_LABEL;
use filings_core::rules::normalize;
use filings_core::{
    ConsistencyError, FilingError, FilingMetadata, MetadataField, Result, StatementMatrix,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+months?\s+ended").expect("valid period regex"));
static DENOMINATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bin\s+(thousands|millions|billions)\b").expect("valid denomination regex")
});
static FOOTNOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[\d+\]").expect("valid footnote regex"));

static REPORT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.report").expect("valid report selector"));
static TR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid tr selector"));

/// Date formats used in R-file column headers.
const HEADER_DATE_FORMATS: [&str; 5] =
    ["%b. %d, %Y", "%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

/// Largest colspan or rowspan honoured, matching the HTML limit on `colspan`.
pub const MAX_SPAN: usize = 1000;

/// One table cell before span expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawCell {
    /// Cell text with whitespace collapsed.
    pub text: String,
    /// Number of columns the cell covers (1 to `MAX_SPAN`).
    pub colspan: usize,
    /// Number of rows the cell covers (1 to `MAX_SPAN`).
    pub rowspan: usize,
}

impl RawCell {
    /// A cell covering one row and one column.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self::spanning(text, 1, 1)
    }

    /// A cell covering several rows or columns, with spans clamped to `1..=MAX_SPAN`.
    #[must_use]
    pub fn spanning(text: impl Into<String>, colspan: usize, rowspan: usize) -> Self {
        Self {
            text: text.into(),
            colspan: colspan.clamp(1, MAX_SPAN),
            rowspan: rowspan.clamp(1, MAX_SPAN),
        }
    }
}

/// A statement table as read from an R-file.
///
/// Header rows describe the reporting columns (period headings, dates); body rows are line
/// items with the label in the first cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Header rows, top to bottom.
    pub header: Vec<Vec<RawCell>>,
    /// Body rows, top to bottom.
    pub body: Vec<Vec<RawCell>>,
}

impl RawTable {
    /// Normalizes the table into a statement matrix for one filing.
    ///
    /// Colspans are expanded and rowspans shift the cells below them; all-empty rows are
    /// dropped; footnote markers such as `[1]` are stripped; amounts lose `$` and
    /// thousands separators, parenthesized amounts become negative; columns empty
    /// everywhere are dropped; the first header row is filled forward over the columns a
    /// colspan covered. Metadata rows are then derived per column.
    ///
    /// # Errors
    /// Returns [`FilingError::Consistency`] if no valid matrix remains (for example no
    /// line items or no reporting columns).
    pub fn into_matrix(self, filing: &FilingMetadata) -> Result<StatementMatrix> {
        let mut header = clean_rows(expand_spans(&self.header));
        let mut body = clean_rows(expand_spans(&self.body));

        let width = header
            .iter()
            .chain(&body)
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        for row in header.iter_mut().chain(body.iter_mut()) {
            row.resize(width, String::new());
        }
        for row in &mut body {
            for cell in row.iter_mut().skip(1) {
                *cell = clean_amount(cell);
            }
        }

        let keep: Vec<usize> = (0..width)
            .filter(|&j| j == 0 || header.iter().chain(&body).any(|row| !row[j].is_empty()))
            .collect();
        if keep.len() < width {
            debug!("Dropping {} empty columns", width - keep.len());
            for row in header.iter_mut().chain(body.iter_mut()) {
                let kept: Vec<String> = keep.iter().map(|&j| std::mem::take(&mut row[j])).collect();
                *row = kept;
            }
        }

        if let Some(first) = header.first_mut() {
            for j in 2..first.len() {
                if first[j].is_empty() {
                    first[j] = first[j - 1].clone();
                }
            }
        }

        let width = keep.len();
        if width == 0 {
            return Err(ConsistencyError::EmptyMatrix.into());
        }
        let title: Vec<&str> = header.iter().map(|row| row[0].as_str()).collect();
        let denomination = title
            .iter()
            .find_map(|text| DENOMINATION_RE.captures(text))
            .map(|caps| capitalize(&caps[1]))
            .unwrap_or_default();
        let fallback_date = filing
            .report_date
            .map(|date| date.format("%Y%m%d").to_string())
            .unwrap_or_default();

        let mut rows: Vec<Vec<String>> = MetadataField::ALL
            .into_iter()
            .map(|field| {
                let mut row = Vec::with_capacity(width);
                row.push(field.label().to_string());
                for j in 1..width {
                    let headings = || header.iter().map(|row| row[j].as_str());
                    let value = match field {
                        MetadataField::AccessionNumber => filing.accession_number.clone(),
                        MetadataField::Form => filing.form.to_string(),
                        MetadataField::ReportDate => headings()
                            .find_map(parse_header_date)
                            .map(|date| date.format("%Y%m%d").to_string())
                            .unwrap_or_else(|| fallback_date.clone()),
                        MetadataField::Denomination => denomination.clone(),
                        MetadataField::ReportPeriod => headings()
                            .find_map(|text| PERIOD_RE.captures(text))
                            .map(|caps| caps[1].to_string())
                            .unwrap_or_else(|| filing.form.default_period_months().to_string()),
                        MetadataField::ReportDuration => headings()
                            .find(|text| PERIOD_RE.is_match(text))
                            .unwrap_or_default()
                            .to_string(),
                    };
                    row.push(value);
                }
                row
            })
            .collect();

        let mut separator = vec![String::new(); width];
        separator[0] = SEPARATOR_LABEL.to_string();
        rows.push(separator);
        rows.extend(body);

        Ok(StatementMatrix::new(rows)?)
    }
}

/// Expands colspans and rowspans into a grid of plain strings.
fn expand_spans(rows: &[Vec<RawCell>]) -> Vec<Vec<String>> {
    // Positions covered by a rowspan from a row above.
    let mut covered: HashSet<(usize, usize)> = HashSet::new();
    let mut grid = Vec::with_capacity(rows.len());

    for (r, row) in rows.iter().enumerate() {
        let mut cells: Vec<String> = Vec::new();
        for cell in row {
            while covered.contains(&(r, cells.len())) {
                cells.push(String::new());
            }
            let start = cells.len();
            cells.push(cell.text.clone());
            cells.extend(std::iter::repeat_n(String::new(), cell.colspan - 1));
            for below in r + 1..r + cell.rowspan {
                covered.extend((start..cells.len()).map(|column| (below, column)));
            }
        }
        while covered.contains(&(r, cells.len())) {
            cells.push(String::new());
        }
        grid.push(cells);
    }
    grid
}

/// Strips footnote markers and drops rows with no text left.
fn clean_rows(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| FOOTNOTE_RE.replace_all(&cell, "").trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect()
}

/// Cleans an amount cell: `$ (1,234)` becomes `-1234`.
///
/// Text that is not an amount once the symbols are gone, such as `(see Note 4)`, is kept as
/// written.
fn clean_amount(text: &str) -> String {
    let negative = text.contains('(') && text.contains(')');
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '(' | ')'))
        .collect();
    let digits = digits.trim();
    if digits.is_empty() {
        String::new()
    } else if !digits.bytes().any(|b| b.is_ascii_digit()) || digits.parse::<f64>().is_err() {
        text.trim().to_string()
    } else if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    }
}

fn parse_header_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    HEADER_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses an R-file by extension (`.htm`, `.html` or `.xml`) and normalizes it.
///
/// # Errors
/// Returns [`FilingError::InvalidParameter`] for other extensions, [`FilingError::Parse`]
/// if the document cannot be read and [`FilingError::Consistency`] if the table does not
/// normalize into a valid matrix.
pub fn parse_report(
    name: &str,
    document: &[u8],
    filing: &FilingMetadata,
) -> Result<StatementMatrix> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let table = match extension.as_deref() {
        Some("htm" | "html") => parse_html_report(&String::from_utf8_lossy(document))?,
        Some("xml") => parse_xml_report(document)?,
        _ => {
            return Err(FilingError::InvalidParameter(format!(
                "Unsupported R-file type: {}",
                name
            )));
        }
    };
    debug!(
        "Parsed {} with {} header and {} body rows",
        name,
        table.header.len(),
        table.body.len()
    );
    table.into_matrix(filing)
}

// ===== HTML R-files =====

/// Reads the `table.report` of an HTML R-file.
///
/// Rows containing a `th` cell are header rows. Rows of nested tables are ignored.
///
/// # Errors
/// Returns [`FilingError::Parse`] if the document has no report table.
pub fn parse_html_report(html: &str) -> Result<RawTable> {
    let document = Html::parse_document(html);
    let table = document
        .select(&REPORT_SELECTOR)
        .next()
        .ok_or_else(|| FilingError::Parse("No report table in R-file".to_string()))?;

    let mut raw = RawTable::default();
    for tr in table.select(&TR_SELECTOR) {
        let owner = tr
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|element| element.value().name() == "table");
        if owner.is_none_or(|owner| owner.id() != table.id()) {
            continue;
        }

        let cells: Vec<ElementRef<'_>> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "td" | "th"))
            .collect();
        let is_header = cells.iter().any(|cell| cell.value().name() == "th");
        let row: Vec<RawCell> = cells
            .into_iter()
            .map(|cell| {
                let span = |name: &str| {
                    cell.value()
                        .attr(name)
                        .and_then(|value| value.trim().parse().ok())
                        .unwrap_or(1)
                };
                let text = collapse_whitespace(&cell.text().collect::<String>());
                RawCell::spanning(text, span("colspan"), span("rowspan"))
            })
            .collect();

        if is_header {
            raw.header.push(row);
        } else {
            raw.body.push(row);
        }
    }
    Ok(raw)
}

// ===== XML R-files =====

#[derive(Debug, Default)]
struct XmlRow {
    label: String,
    is_abstract: bool,
    amounts: Vec<String>,
}

/// Reads an XML R-file (`<Report>` with `Columns` and `Rows`).
///
/// Column headings come from the `Label` attributes of each column's `Labels`; amounts
/// from `Cells/Cell/NumericAmount`. Abstract rows become headings with no values, and a
/// first row repeating the report name is dropped.
///
/// # Errors
/// Returns [`FilingError::Parse`] if the document is not well-formed XML.
pub fn parse_xml_report(xml: &[u8]) -> Result<RawTable> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut report_name = String::new();
    let mut long_name = String::new();
    let mut rounding = String::new();
    let mut columns: Vec<Vec<String>> = Vec::new();
    let mut rows: Vec<XmlRow> = Vec::new();

    let parse_error =
        |e: &dyn std::fmt::Display| FilingError::Parse(format!("Invalid XML R-file: {}", e));

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let parent = path.last().map(Vec::as_slice);
                match (parent, e.name().as_ref()) {
                    (Some(b"Columns"), b"Column") => columns.push(Vec::new()),
                    (Some(b"Rows"), b"Row") => rows.push(XmlRow::default()),
                    (Some(b"Cells"), b"Cell") => {
                        if let Some(row) = rows.last_mut() {
                            row.amounts.push(String::new());
                        }
                    }
                    (Some(b"Labels"), b"Label") => {
                        push_column_label(&e, &mut columns).map_err(|e| parse_error(&e))?;
                    }
                    _ => {}
                }
                path.push(e.name().as_ref().to_vec());
            }
            Ok(Event::Empty(e)) => {
                if matches!(tail(&path), (Some(b"Labels"), _)) && e.name().as_ref() == b"Label" {
                    push_column_label(&e, &mut columns).map_err(|e| parse_error(&e))?;
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| parse_error(&e))?;
                match tail(&path) {
                    (Some(b"ReportName"), Some(b"Report")) => report_name.push_str(&text),
                    (Some(b"ReportLongName"), Some(b"Report")) => long_name.push_str(&text),
                    (Some(b"RoundingOption"), Some(b"Report")) => rounding.push_str(&text),
                    (Some(b"Label"), Some(b"Row")) => {
                        if let Some(row) = rows.last_mut() {
                            row.label.push_str(&text);
                        }
                    }
                    (Some(b"IsAbstract"), Some(b"Row")) => {
                        if let Some(row) = rows.last_mut() {
                            row.is_abstract = text.trim() == "true";
                        }
                    }
                    (Some(b"NumericAmount"), Some(b"Cell")) => {
                        let amount = rows.last_mut().and_then(|row| row.amounts.last_mut());
                        if let Some(amount) = amount {
                            amount.push_str(&text);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(parse_error(&e)),
        }
        buf.clear();
    }

    let name = if report_name.trim().is_empty() { long_name } else { report_name };
    let title = collapse_whitespace(&format!("{} {}", name, rounding));

    let depth = columns.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let header = (0..depth)
        .map(|r| {
            let first = if r == 0 { title.clone() } else { String::new() };
            std::iter::once(RawCell::new(first))
                .chain(
                    columns
                        .iter()
                        .map(|labels| RawCell::new(labels.get(r).cloned().unwrap_or_default())),
                )
                .collect()
        })
        .collect();

    let repeats_title = |row: &XmlRow| {
        !row.label.trim().is_empty() && normalize(&title).contains(&normalize(&row.label))
    };
    if rows.first().is_some_and(repeats_title) {
        rows.remove(0);
    }

    let body = rows
        .into_iter()
        .map(|row| {
            let mut cells = vec![RawCell::new(collapse_whitespace(&row.label))];
            for j in 0..columns.len() {
                let amount = if row.is_abstract {
                    String::new()
                } else {
                    row.amounts
                        .get(j)
                        .map(|amount| amount.trim().to_string())
                        .unwrap_or_default()
                };
                cells.push(RawCell::new(amount));
            }
            cells
        })
        .collect();

    Ok(RawTable { header, body })
}

/// Last element name and its parent.
fn tail(path: &[Vec<u8>]) -> (Option<&[u8]>, Option<&[u8]>) {
    let last = path.last().map(Vec::as_slice);
    let parent = path.len().checked_sub(2).map(|i| path[i].as_slice());
    (last, parent)
}

fn push_column_label(
    element: &BytesStart<'_>,
    columns: &mut [Vec<String>],
) -> std::result::Result<(), quick_xml::Error> {
    if let (Some(labels), Some(attr)) = (columns.last_mut(), element.try_get_attribute("Label")?) {
        labels.push(collapse_whitespace(&attr.unescape_value()?));
    }
    Ok(())
}
