//! Column reconciliation.
//!
//! Reporting columns are ordered by `(reportPeriod, reportDate)` so that columns
//! describing the same period end up next to each other. The post-merge "level two"
//! pass then collapses those neighbours and drops line items without any values.
//!
//! Every pass decides what to keep first and builds a new matrix afterwards; nothing is
//! removed while it is being scanned.

use tracing::debug;

use crate::{
    classify::SectionMarker,
    combine::{NON_CURRENT_ASSETS, NON_CURRENT_LIABILITIES, OTHER_EQUITIES},
    error::ConsistencyError,
    matrix::{MetadataField, StatementMatrix},
    rules::normalize,
};

/// Headings emitted by the merge skeleton that carry no values.
pub const STRUCTURAL_HEADINGS: [&str; 3] =
    [NON_CURRENT_ASSETS, NON_CURRENT_LIABILITIES, OTHER_EQUITIES];

/// An ordering of the reporting columns of one matrix.
///
/// Holds original column indices (`1..width`) in their new order; column 0 is implicit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnPermutation(Vec<usize>);

impl ColumnPermutation {
    /// Original column indices in their new order.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Returns true if no column moves.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(at, &column)| column == at + 1)
    }

    /// Builds a new matrix with the columns rearranged.
    #[must_use]
    pub fn apply(&self, matrix: &StatementMatrix) -> StatementMatrix {
        matrix.select_columns(&self.0)
    }
}

/// Parses a metadata cell as an integer; anything non-numeric counts as 0.
fn numeric_key(cell: Option<&str>) -> i64 {
    cell.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}

/// Orders reporting columns ascending by `(reportPeriod, reportDate)`.
///
/// The sort is stable, so columns with equal keys keep their relative order.
#[must_use]
pub fn reorder(
    matrix: &StatementMatrix,
    report_period_row: usize,
    report_date_row: usize,
) -> ColumnPermutation {
    let mut columns: Vec<usize> = matrix.reporting_columns().collect();
    columns.sort_by_key(|&column| {
        (
            numeric_key(matrix.cell(report_period_row, column)),
            numeric_key(matrix.cell(report_date_row, column)),
        )
    });
    ColumnPermutation(columns)
}

fn key_rows(matrix: &StatementMatrix) -> Result<(usize, usize), ConsistencyError> {
    let period = matrix
        .metadata_row(MetadataField::ReportPeriod)
        .ok_or(ConsistencyError::MissingMetadata(MetadataField::ReportPeriod))?;
    let date = matrix
        .metadata_row(MetadataField::ReportDate)
        .ok_or(ConsistencyError::MissingMetadata(MetadataField::ReportDate))?;
    Ok((period, date))
}

/// Sorts the columns of a matrix using its own metadata rows.
///
/// # Errors
/// Returns [`ConsistencyError::MissingMetadata`] without `reportPeriod` or `reportDate`.
pub fn reconcile(matrix: &StatementMatrix) -> Result<StatementMatrix, ConsistencyError> {
    let (period, date) = key_rows(matrix)?;
    Ok(reorder(matrix, period, date).apply(matrix))
}

/// Collapses adjacent columns that share a `reportPeriod`.
///
/// Within each run of equal periods only the column with the latest `reportDate`
/// survives; on a tie the leftmost wins. Expects columns already [`reconcile`]d.
///
/// # Errors
/// Returns [`ConsistencyError::MissingMetadata`] without `reportPeriod` or `reportDate`.
pub fn collapse_duplicate_periods(
    matrix: &StatementMatrix,
) -> Result<StatementMatrix, ConsistencyError> {
    let (period_row, date_row) = key_rows(matrix)?;
    let period = |column| matrix.cell(period_row, column).map(str::trim);
    let date = |column| numeric_key(matrix.cell(date_row, column));

    let mut survivors: Vec<usize> = Vec::new();
    for column in matrix.reporting_columns() {
        match survivors.last_mut() {
            Some(kept) if period(*kept) == period(column) => {
                if date(column) > date(*kept) {
                    *kept = column;
                }
            }
            _ => survivors.push(column),
        }
    }

    let dropped = matrix.reporting_columns().len() - survivors.len();
    if dropped > 0 {
        debug!(dropped, "Collapsed duplicate period columns");
    }
    Ok(matrix.select_columns(&survivors))
}

fn is_heading(label: &str) -> bool {
    let label = normalize(label);
    SectionMarker::ALL
        .iter()
        .map(|marker| marker.canonical_label())
        .chain(STRUCTURAL_HEADINGS)
        .any(|heading| normalize(heading) == label)
}

/// Drops data rows that carry no values, keeping canonical section headings.
#[must_use]
pub fn prune_empty_rows(matrix: &StatementMatrix) -> StatementMatrix {
    let keep: Vec<bool> = matrix
        .data_rows()
        .map(|row| matrix.is_data_bearing(row) || is_heading(matrix.label(row)))
        .collect();
    matrix.retain_data_rows(&keep)
}

/// Duplicate-period collapse followed by empty-row pruning.
///
/// # Errors
/// Returns [`ConsistencyError::MissingMetadata`] without `reportPeriod` or `reportDate`.
pub fn level_two(matrix: &StatementMatrix) -> Result<StatementMatrix, ConsistencyError> {
    let collapsed = collapse_duplicate_periods(matrix)?;
    Ok(prune_empty_rows(&collapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::fixtures::matrix;

    fn dates(m: &StatementMatrix) -> Vec<(&str, &str)> {
        m.reporting_columns()
            .map(|column| {
                (
                    m.metadata(MetadataField::ReportPeriod, column).unwrap(),
                    m.metadata(MetadataField::ReportDate, column).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_reorder_by_period_then_date() {
        let m = matrix(&[
            &["reportPeriod", "12", "3", "3"],
            &["reportDate", "20230101", "20230101", "20221001"],
            &["separator", "", "", ""],
            &["Cash", "a", "b", "c"],
        ]);
        let permutation = reorder(&m, 0, 1);
        assert_eq!(permutation.as_slice(), &[3, 2, 1]);

        let sorted = permutation.apply(&m);
        assert_eq!(
            dates(&sorted),
            vec![("3", "20221001"), ("3", "20230101"), ("12", "20230101")]
        );
        assert_eq!(sorted.rows()[3], vec!["Cash", "c", "b", "a"]);
    }

    #[test]
    fn test_reorder_is_stable_for_equal_keys() {
        let m = matrix(&[
            &["accessionNumber", "first", "second", "third"],
            &["reportPeriod", "3", "3", "3"],
            &["reportDate", "20230101", "20230101", "20220101"],
            &["separator", "", "", ""],
            &["Cash", "1", "2", "3"],
        ]);
        let permutation = reorder(&m, 1, 2);
        assert_eq!(permutation.as_slice(), &[3, 1, 2]);
        assert!(!permutation.is_identity());
    }

    #[test]
    fn test_non_numeric_keys_sort_as_zero() {
        let m = matrix(&[
            &["reportPeriod", "3", "n/a"],
            &["reportDate", "20230101", "20230101"],
            &["separator", "", ""],
            &["Cash", "1", "2"],
        ]);
        assert_eq!(reorder(&m, 0, 1).as_slice(), &[2, 1]);
    }

    #[test]
    fn test_reconcile_requires_key_rows() {
        let m = matrix(&[&["reportPeriod", "3"], &["separator", ""], &["Cash", "1"]]);
        assert_eq!(
            reconcile(&m),
            Err(ConsistencyError::MissingMetadata(MetadataField::ReportDate))
        );
    }

    #[test]
    fn test_collapse_keeps_latest_date() {
        let m = matrix(&[
            &["reportPeriod", "3", "3", "12"],
            &["reportDate", "20230101", "20230201", "20230201"],
            &["separator", "", "", ""],
            &["Cash", "old", "new", "annual"],
        ]);
        let collapsed = collapse_duplicate_periods(&m).unwrap();
        assert_eq!(dates(&collapsed), vec![("3", "20230201"), ("12", "20230201")]);
        assert_eq!(collapsed.rows()[3], vec!["Cash", "new", "annual"]);
    }

    #[test]
    fn test_collapse_tie_keeps_left_column() {
        let m = matrix(&[
            &["accessionNumber", "left", "right"],
            &["reportPeriod", "3", "3"],
            &["reportDate", "20230201", "20230201"],
            &["separator", "", ""],
            &["Cash", "1", "2"],
        ]);
        let collapsed = collapse_duplicate_periods(&m).unwrap();
        assert_eq!(collapsed.width(), 2);
        assert_eq!(collapsed.accession_number(), Some("left"));
    }

    #[test]
    fn test_collapse_runs_of_three() {
        let m = matrix(&[
            &["reportPeriod", "6", "6", "6"],
            &["reportDate", "20230630", "20231231", "20230930"],
            &["separator", "", "", ""],
            &["Cash", "a", "b", "c"],
        ]);
        let collapsed = collapse_duplicate_periods(&m).unwrap();
        assert_eq!(dates(&collapsed), vec![("6", "20231231")]);
    }

    #[test]
    fn test_prune_keeps_headings() {
        let m = matrix(&[
            &["reportPeriod", "3"],
            &["reportDate", "20230101"],
            &["separator", ""],
            &["Current Assets", ""],
            &["Cash", "10"],
            &["Restricted cash", ""],
            &["Non Current Assets", ""],
            &["Total Assets", "10"],
        ]);
        let pruned = prune_empty_rows(&m);
        let labels: Vec<&str> = pruned.data_rows().map(|row| pruned.label(row)).collect();
        assert_eq!(
            labels,
            vec!["Current Assets", "Cash", "Non Current Assets", "Total Assets"]
        );
    }

    #[test]
    fn test_level_two() {
        let m = matrix(&[
            &["reportPeriod", "3", "3"],
            &["reportDate", "20230331", "20230630"],
            &["separator", "", ""],
            &["Cash", "1", ""],
            &["Goodwill", "", "4"],
        ]);
        let out = level_two(&m).unwrap();
        assert_eq!(out.width(), 2);
        let labels: Vec<&str> = out.data_rows().map(|row| out.label(row)).collect();
        assert_eq!(labels, vec!["Goodwill"]);
    }
}
