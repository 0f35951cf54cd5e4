//! Line-item union.
//!
//! Merging never reorders: the first matrix contributes its labels in row order, the
//! second only appends labels the first has not produced. Labels compare exactly.

use std::collections::HashSet;
use std::ops::Range;

use crate::matrix::StatementMatrix;

/// Ordered set of labels.
#[derive(Debug, Default)]
struct LabelUnion {
    labels: Vec<String>,
    seen: HashSet<String>,
}

impl LabelUnion {
    fn extend(&mut self, matrix: &StatementMatrix, rows: impl IntoIterator<Item = usize>) {
        for row in rows {
            if !matrix.is_data_bearing(row) {
                continue;
            }
            let label = matrix.label(row);
            if self.seen.insert(label.to_string()) {
                self.labels.push(label.to_string());
            }
        }
    }

    fn into_labels(self) -> Vec<String> {
        self.labels
    }
}

/// Labels of the data-bearing rows of `first[first_rows]`, followed by the labels of
/// `second[second_rows]` not seen yet.
///
/// The ranges exclude the section's heading and total rows.
#[must_use]
pub fn merge_section(
    first: &StatementMatrix,
    first_rows: Range<usize>,
    second: &StatementMatrix,
    second_rows: Range<usize>,
) -> Vec<String> {
    let mut union = LabelUnion::default();
    union.extend(first, first_rows);
    union.extend(second, second_rows);
    union.into_labels()
}

/// Like [`merge_section`] for explicit row lists, such as other-equity rows.
#[must_use]
pub fn merge_rows(
    first: &StatementMatrix,
    first_rows: &[usize],
    second: &StatementMatrix,
    second_rows: &[usize],
) -> Vec<String> {
    let mut union = LabelUnion::default();
    union.extend(first, first_rows.iter().copied());
    union.extend(second, second_rows.iter().copied());
    union.into_labels()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::fixtures::matrix;

    fn first() -> StatementMatrix {
        matrix(&[
            &["separator", ""],
            &["Cash", "1"],
            &["Receivables", "2"],
            &["Prepaid", ""],
            &["Inventory", "3"],
        ])
    }

    fn second() -> StatementMatrix {
        matrix(&[
            &["separator", ""],
            &["Inventory", "4"],
            &["Cash", "5"],
            &["Marketable securities", "6"],
        ])
    }

    #[test]
    fn test_first_order_then_novel_items() {
        let labels = merge_section(&first(), 1..5, &second(), 1..4);
        assert_eq!(
            labels,
            vec!["Cash", "Receivables", "Inventory", "Marketable securities"]
        );
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let labels = merge_section(&first(), 3..4, &second(), 1..1);
        assert!(labels.is_empty());
    }

    #[test]
    fn test_duplicates_within_one_matrix_collapse() {
        let m = matrix(&[&["separator", ""], &["Other", "1"], &["Other", "2"]]);
        assert_eq!(merge_section(&m, 1..3, &m, 1..3), vec!["Other"]);
    }

    #[test]
    fn test_merge_rows_uses_index_lists() {
        let labels = merge_rows(&first(), &[4, 1], &second(), &[3]);
        assert_eq!(labels, vec!["Inventory", "Cash", "Marketable securities"]);
    }

    #[test]
    fn test_labels_compare_exactly() {
        let other = matrix(&[&["separator", ""], &["cash", "9"]]);
        let labels = merge_section(&first(), 1..2, &other, 1..2);
        assert_eq!(labels, vec!["Cash", "cash"]);
    }
}
