//! The statement matrix.
//!
//! A [`StatementMatrix`] is a rectangular grid of text cells. Column 0 holds field names
//! (metadata rows) or line-item labels (data rows); every other column is one reporting
//! column of one filing. Metadata rows come first, then a row labelled `separator`, then
//! the data rows.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ConsistencyError;

/// Label of the row dividing metadata from line items.
pub const SEPARATOR_LABEL: &str = "separator";

/// A recognized metadata row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetadataField {
    /// Accession number of the filing the column came from.
    AccessionNumber,
    /// Form type (`10-K` or `10-Q`).
    Form,
    /// Report date as `YYYYMMDD`.
    ReportDate,
    /// Unit scale of the figures (e.g. `Millions`).
    Denomination,
    /// Months covered by the column.
    ReportPeriod,
    /// Period heading as printed in the filing (e.g. `3 Months Ended`).
    ReportDuration,
}

impl MetadataField {
    /// All fields in the order the parser writes them.
    pub const ALL: [Self; 6] = [
        Self::AccessionNumber,
        Self::Form,
        Self::ReportDate,
        Self::Denomination,
        Self::ReportPeriod,
        Self::ReportDuration,
    ];

    /// Returns the row label used in column 0.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AccessionNumber => "accessionNumber",
            Self::Form => "form",
            Self::ReportDate => "reportDate",
            Self::Denomination => "denomination",
            Self::ReportPeriod => "reportPeriod",
            Self::ReportDuration => "reportDuration",
        }
    }

    /// Parses a column-0 label into a field.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = clean_label(label);
        Self::ALL.into_iter().find(|field| field.label() == label)
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Join key identifying one reporting column across matrices.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    /// Accession number of the source filing.
    pub accession_number: String,
    /// Report date as `YYYYMMDD`.
    pub report_date: String,
    /// Months covered by the column.
    pub report_period: String,
}

impl ColumnKey {
    /// Creates a column key.
    #[must_use]
    pub fn new(
        accession_number: impl Into<String>,
        report_date: impl Into<String>,
        report_period: impl Into<String>,
    ) -> Self {
        Self {
            accession_number: accession_number.into(),
            report_date: report_date.into(),
            report_period: report_period.into(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}m",
            self.accession_number, self.report_date, self.report_period
        )
    }
}

/// Trims whitespace and a leading byte order mark from a column-0 label.
fn clean_label(label: &str) -> &str {
    label.trim().trim_start_matches('\u{feff}').trim()
}

/// Normalized tabular rendering of one balance sheet (or a merge of several).
///
/// Construction validates that the grid is rectangular, has at least one reporting
/// column, contains a separator row and has data rows below it. Values are immutable
/// once built; every transformation in this crate returns a new matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatementMatrix {
    rows: Vec<Vec<String>>,
    separator: usize,
}

impl StatementMatrix {
    /// Builds a matrix from raw rows.
    ///
    /// # Errors
    /// Returns a [`ConsistencyError`] if the rows do not form a valid statement matrix.
    pub fn new(rows: Vec<Vec<String>>) -> Result<Self, ConsistencyError> {
        let width = rows.first().ok_or(ConsistencyError::EmptyMatrix)?.len();
        if width < 2 {
            return Err(ConsistencyError::NoReportingColumns);
        }

        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != width)
        {
            return Err(ConsistencyError::RaggedRow {
                row,
                expected: width,
                found: cells.len(),
            });
        }

        let separator = rows
            .iter()
            .position(|cells| clean_label(&cells[0]) == SEPARATOR_LABEL)
            .ok_or(ConsistencyError::MissingSeparator)?;

        if separator + 1 >= rows.len() {
            return Err(ConsistencyError::NoDataRows);
        }

        Ok(Self { rows, separator })
    }

    /// Builds a matrix from metadata rows and data rows, inserting the separator row.
    ///
    /// # Errors
    /// Returns a [`ConsistencyError`] if the combined rows are not a valid matrix.
    pub fn from_parts(
        metadata: Vec<Vec<String>>,
        data: Vec<Vec<String>>,
    ) -> Result<Self, ConsistencyError> {
        let width = metadata
            .first()
            .or_else(|| data.first())
            .map_or(0, Vec::len);
        let mut separator = vec![String::new(); width.max(1)];
        separator[0] = SEPARATOR_LABEL.to_string();

        let mut rows = metadata;
        rows.push(separator);
        rows.extend(data);
        Self::new(rows)
    }

    /// Returns all rows, metadata included.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Consumes the matrix and returns its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// Number of rows, metadata included.
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns, label column included.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    /// Indices of the reporting columns (`1..width`).
    #[must_use]
    pub fn reporting_columns(&self) -> Range<usize> {
        1..self.width()
    }

    /// Index of the separator row.
    #[must_use]
    pub const fn separator(&self) -> usize {
        self.separator
    }

    /// Indices of the metadata rows.
    #[must_use]
    pub const fn metadata_rows(&self) -> Range<usize> {
        0..self.separator
    }

    /// Indices of the data rows.
    #[must_use]
    pub fn data_rows(&self) -> Range<usize> {
        self.separator + 1..self.rows.len()
    }

    /// Column-0 text of a row, exactly as stored.
    ///
    /// # Panics
    /// Panics if `row` is out of bounds.
    #[must_use]
    pub fn label(&self, row: usize) -> &str {
        &self.rows[row][0]
    }

    /// Cell text, or `None` when out of bounds.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Returns true if the row has a label and at least one non-empty value.
    ///
    /// Metadata rows and the separator are never data-bearing.
    #[must_use]
    pub fn is_data_bearing(&self, row: usize) -> bool {
        if row <= self.separator {
            return false;
        }
        let Some(cells) = self.rows.get(row) else {
            return false;
        };
        !cells[0].trim().is_empty() && cells[1..].iter().any(|cell| !cell.trim().is_empty())
    }

    /// Row index of a metadata field, if present.
    #[must_use]
    pub fn metadata_row(&self, field: MetadataField) -> Option<usize> {
        self.metadata_rows()
            .find(|&row| MetadataField::from_label(&self.rows[row][0]) == Some(field))
    }

    /// Trimmed metadata value for one column.
    #[must_use]
    pub fn metadata(&self, field: MetadataField, column: usize) -> Option<&str> {
        let row = self.metadata_row(field)?;
        self.cell(row, column).map(str::trim)
    }

    /// Accession number of the first reporting column.
    #[must_use]
    pub fn accession_number(&self) -> Option<&str> {
        self.metadata(MetadataField::AccessionNumber, 1)
            .filter(|accession| !accession.is_empty())
    }

    /// Join key of one reporting column.
    ///
    /// # Errors
    /// Returns [`ConsistencyError::MissingMetadata`] when a key row is absent.
    pub fn column_key(&self, column: usize) -> Result<ColumnKey, ConsistencyError> {
        let value = |field| {
            self.metadata(field, column)
                .map(str::to_string)
                .ok_or(ConsistencyError::MissingMetadata(field))
        };
        Ok(ColumnKey {
            accession_number: value(MetadataField::AccessionNumber)?,
            report_date: value(MetadataField::ReportDate)?,
            report_period: value(MetadataField::ReportPeriod)?,
        })
    }

    /// Join keys of all reporting columns, in column order.
    ///
    /// # Errors
    /// Returns [`ConsistencyError::MissingMetadata`] when a key row is absent.
    pub fn column_keys(&self) -> Result<Vec<ColumnKey>, ConsistencyError> {
        self.reporting_columns()
            .map(|column| self.column_key(column))
            .collect()
    }

    /// First reporting column whose key equals `key`.
    #[must_use]
    pub fn find_column(&self, key: &ColumnKey) -> Option<usize> {
        let accession = self.metadata_row(MetadataField::AccessionNumber)?;
        let date = self.metadata_row(MetadataField::ReportDate)?;
        let period = self.metadata_row(MetadataField::ReportPeriod)?;
        self.reporting_columns().find(|&column| {
            self.rows[accession][column].trim() == key.accession_number
                && self.rows[date][column].trim() == key.report_date
                && self.rows[period][column].trim() == key.report_period
        })
    }

    /// Returns a copy with the label column followed by `columns` in the given order.
    pub(crate) fn select_columns(&self, columns: &[usize]) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|cells| {
                std::iter::once(cells[0].clone())
                    .chain(columns.iter().map(|&column| cells[column].clone()))
                    .collect()
            })
            .collect();
        Self {
            rows,
            separator: self.separator,
        }
    }

    /// Returns a copy keeping only the data rows for which `keep` is true.
    ///
    /// `keep` is indexed by data row offset (`row - separator - 1`).
    pub(crate) fn retain_data_rows(&self, keep: &[bool]) -> Self {
        let mut rows = self.rows[..=self.separator].to_vec();
        rows.extend(
            self.rows[self.separator + 1..]
                .iter()
                .zip(keep)
                .filter(|(_, keep)| **keep)
                .map(|(cells, _)| cells.clone()),
        );
        Self {
            rows,
            separator: self.separator,
        }
    }

    /// Returns a copy with new labels on the given rows.
    pub(crate) fn relabelled(&self, labels: &[(usize, &str)]) -> Self {
        let mut copy = self.clone();
        for &(row, label) in labels {
            copy.rows[row][0] = label.to_string();
        }
        copy
    }
}
