//! Cell lookup by line item and column key.

use std::sync::LazyLock;

use regex::Regex;

use crate::matrix::{ColumnKey, StatementMatrix};

static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").expect("valid numeric prefix pattern")
});

/// Trims a cell and keeps only its leading number when it starts with one.
///
/// `-228us-gaap_Foo` becomes `-228`; text that does not start with a number is only
/// trimmed.
#[must_use]
pub fn clean_numeric(cell: &str) -> String {
    NUMERIC_PREFIX
        .captures(cell)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| cell.trim().to_string(), |number| number.as_str().to_string())
}

/// Finds the value of `line_item` in the column identified by `key`.
///
/// Uses the first data row whose label equals `line_item` exactly. Returns `None` when
/// either the row or the column is missing; an empty cell resolves to `Some("")`.
#[must_use]
pub fn lookup(matrix: &StatementMatrix, line_item: &str, key: &ColumnKey) -> Option<String> {
    lookup_in_rows(matrix, matrix.data_rows(), line_item, key)
}

/// Like [`lookup`], restricted to `rows`.
///
/// Lets callers resolve a label inside one section when the same label appears in
/// several.
#[must_use]
pub fn lookup_in_rows(
    matrix: &StatementMatrix,
    rows: impl IntoIterator<Item = usize>,
    line_item: &str,
    key: &ColumnKey,
) -> Option<String> {
    let row = rows
        .into_iter()
        .filter(|&row| row > matrix.separator() && row < matrix.height())
        .find(|&row| matrix.label(row) == line_item)?;
    let column = matrix.find_column(key)?;
    matrix.cell(row, column).map(clean_numeric)
}

/// The value of data row `row` in the column identified by `key`.
///
/// Returns `None` when `row` is not a data row or the column is missing.
#[must_use]
pub fn lookup_at(matrix: &StatementMatrix, row: usize, key: &ColumnKey) -> Option<String> {
    if !matrix.data_rows().contains(&row) {
        return None;
    }
    let column = matrix.find_column(key)?;
    matrix.cell(row, column).map(clean_numeric)
}
