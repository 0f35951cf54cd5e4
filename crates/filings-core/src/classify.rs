//! Section classification.
//!
//! [`classify`] scans the data rows of one matrix top to bottom and assigns each of the
//! nine [`SectionMarker`]s to the first row its rule accepts. The result is only returned
//! when the markers are complete, correctly ordered, and every data-bearing row can be
//! attributed to exactly one section.

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::StructuralError, matrix::StatementMatrix, rules::ClassificationRules};

/// Canonical balance sheet landmarks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionMarker {
    /// Heading of current assets.
    CurrentAssets,
    /// Total current assets.
    TotalCurrentAssets,
    /// Total assets.
    TotalAssets,
    /// Heading of current liabilities.
    CurrentLiabilities,
    /// Total current liabilities.
    TotalCurrentLiabilities,
    /// Total liabilities.
    TotalLiabilities,
    /// Heading of stockholders' equity.
    StockholdersEquity,
    /// Total stockholders' equity.
    TotalStockholdersEquity,
    /// Total liabilities and stockholders' equity.
    TotalLiabilitiesAndEquity,
}

impl SectionMarker {
    /// All markers in balance sheet order.
    pub const ALL: [Self; 9] = [
        Self::CurrentAssets,
        Self::TotalCurrentAssets,
        Self::TotalAssets,
        Self::CurrentLiabilities,
        Self::TotalCurrentLiabilities,
        Self::TotalLiabilities,
        Self::StockholdersEquity,
        Self::TotalStockholdersEquity,
        Self::TotalLiabilitiesAndEquity,
    ];

    /// Label written for this marker in merged output.
    #[must_use]
    pub const fn canonical_label(self) -> &'static str {
        match self {
            Self::CurrentAssets => "Current Assets",
            Self::TotalCurrentAssets => "Total Current Assets",
            Self::TotalAssets => "Total Assets",
            Self::CurrentLiabilities => "Current Liabilities",
            Self::TotalCurrentLiabilities => "Total Current Liabilities",
            Self::TotalLiabilities => "Total Liabilities",
            Self::StockholdersEquity => "Stockholders' Equity",
            Self::TotalStockholdersEquity => "Total Stockholders' Equity",
            Self::TotalLiabilitiesAndEquity => "Total Liabilities and Stockholders' Equity",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SectionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_label())
    }
}

/// A block of line items bounded by two markers (both exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// Between the current assets heading and its total.
    CurrentAssets,
    /// Between total current assets and total assets.
    NonCurrentAssets,
    /// Between the current liabilities heading and its total.
    CurrentLiabilities,
    /// Between total current liabilities and total liabilities.
    NonCurrentLiabilities,
    /// Between the equity heading and its total.
    StockholdersEquity,
    /// Between total stockholders' equity and the grand total (noncontrolling
    /// interests, total equity).
    EquityAdjustments,
}

impl Section {
    /// All sections in balance sheet order.
    pub const ALL: [Self; 6] = [
        Self::CurrentAssets,
        Self::NonCurrentAssets,
        Self::CurrentLiabilities,
        Self::NonCurrentLiabilities,
        Self::StockholdersEquity,
        Self::EquityAdjustments,
    ];

    /// The opening and closing markers of the section.
    #[must_use]
    pub const fn bounds(self) -> (SectionMarker, SectionMarker) {
        match self {
            Self::CurrentAssets => {
                (SectionMarker::CurrentAssets, SectionMarker::TotalCurrentAssets)
            }
            Self::NonCurrentAssets => {
                (SectionMarker::TotalCurrentAssets, SectionMarker::TotalAssets)
            }
            Self::CurrentLiabilities => (
                SectionMarker::CurrentLiabilities,
                SectionMarker::TotalCurrentLiabilities,
            ),
            Self::NonCurrentLiabilities => (
                SectionMarker::TotalCurrentLiabilities,
                SectionMarker::TotalLiabilities,
            ),
            Self::StockholdersEquity => (
                SectionMarker::StockholdersEquity,
                SectionMarker::TotalStockholdersEquity,
            ),
            Self::EquityAdjustments => (
                SectionMarker::TotalStockholdersEquity,
                SectionMarker::TotalLiabilitiesAndEquity,
            ),
        }
    }
}

/// Row positions of every section marker in one matrix, plus the other-equity rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionMap {
    rows: [usize; 9],
    other_equities: Vec<usize>,
}

impl SectionMap {
    /// Row index of a marker.
    #[must_use]
    pub const fn row(&self, marker: SectionMarker) -> usize {
        self.rows[marker.index()]
    }

    /// Data-bearing rows between total liabilities and the equity heading, or after the
    /// grand total, in row order.
    #[must_use]
    pub fn other_equities(&self) -> &[usize] {
        &self.other_equities
    }

    /// Rows strictly inside a section; empty when the markers are adjacent.
    #[must_use]
    pub fn interior(&self, section: Section) -> Range<usize> {
        let (open, close) = section.bounds();
        let start = self.row(open) + 1;
        start..self.row(close).max(start)
    }

    /// `(marker, row)` pairs in balance sheet order.
    pub fn markers(&self) -> impl Iterator<Item = (SectionMarker, usize)> + '_ {
        SectionMarker::ALL
            .into_iter()
            .map(|marker| (marker, self.row(marker)))
    }

    fn is_accounted(&self, row: usize) -> bool {
        let within = |open: SectionMarker, close: SectionMarker| {
            self.row(open) < row && row <= self.row(close)
        };
        within(SectionMarker::CurrentAssets, SectionMarker::TotalAssets)
            || within(
                SectionMarker::CurrentLiabilities,
                SectionMarker::TotalLiabilities,
            )
            || within(
                SectionMarker::StockholdersEquity,
                SectionMarker::TotalLiabilitiesAndEquity,
            )
            || self.other_equities.contains(&row)
    }
}

/// Classifies the rows of a balance sheet matrix.
///
/// Each marker takes the first data row its rule accepts; one row may satisfy several
/// markers. Rows that carry data between total liabilities and the equity heading, or
/// after the grand total, become other equities.
///
/// # Errors
/// Returns a [`StructuralError`] if a marker is missing, the first eight markers are not
/// in strictly increasing row order, a data-bearing row lies outside every section, or
/// two other-equity rows share a label.
pub fn classify(
    matrix: &StatementMatrix,
    rules: &ClassificationRules,
) -> Result<SectionMap, StructuralError> {
    let mut slots: [Option<usize>; 9] = [None; 9];
    for row in matrix.data_rows() {
        let label = matrix.label(row);
        let data_bearing = matrix.is_data_bearing(row);
        for marker in SectionMarker::ALL {
            let slot = &mut slots[marker.index()];
            if slot.is_none() && rules.accepts(marker, label, data_bearing) {
                *slot = Some(row);
            }
        }
    }

    let mut rows = [0; 9];
    let mut missing = Vec::new();
    for marker in SectionMarker::ALL {
        match slots[marker.index()] {
            Some(row) => rows[marker.index()] = row,
            None => missing.push(marker),
        }
    }
    if !missing.is_empty() {
        return Err(StructuralError::MissingSections(missing));
    }

    let total_liabilities = rows[SectionMarker::TotalLiabilities.index()];
    let equity = rows[SectionMarker::StockholdersEquity.index()];
    let grand_total = rows[SectionMarker::TotalLiabilitiesAndEquity.index()];
    let other_equities = matrix
        .data_rows()
        .filter(|&row| {
            matrix.is_data_bearing(row)
                && ((total_liabilities < row && row < equity) || row > grand_total)
        })
        .collect();
    let map = SectionMap {
        rows,
        other_equities,
    };

    // The grand total is excluded: some filers print equity adjustments after it.
    for pair in SectionMarker::ALL[..8].windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        if map.row(earlier) >= map.row(later) {
            return Err(StructuralError::OutOfOrder {
                earlier,
                earlier_row: map.row(earlier),
                later,
                later_row: map.row(later),
            });
        }
    }

    if let Some(row) = matrix
        .data_rows()
        .find(|&row| matrix.is_data_bearing(row) && !map.is_accounted(row))
    {
        return Err(StructuralError::UnaccountedRow {
            row,
            label: matrix.label(row).to_string(),
        });
    }

    let mut seen = HashSet::new();
    for &row in &map.other_equities {
        let label = matrix.label(row);
        if !seen.insert(label) {
            return Err(StructuralError::DuplicateOtherEquity {
                label: label.to_string(),
                row,
            });
        }
    }

    debug!(
        other_equities = map.other_equities.len(),
        "Classified balance sheet sections"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::fixtures::{balance_sheet, matrix};

    fn rules() -> ClassificationRules {
        ClassificationRules::default()
    }

    #[test]
    fn test_classifies_every_marker() {
        let map = classify(&balance_sheet("A", "20230331", "3"), &rules()).unwrap();
        let rows: Vec<usize> = map.markers().map(|(_, row)| row).collect();
        assert_eq!(rows, vec![5, 8, 10, 11, 13, 15, 16, 19, 20]);
        assert!(map.other_equities().is_empty());
    }

    #[test]
    fn test_section_interiors() {
        let map = classify(&balance_sheet("A", "20230331", "3"), &rules()).unwrap();
        assert_eq!(map.interior(Section::CurrentAssets), 6..8);
        assert_eq!(map.interior(Section::NonCurrentAssets), 9..10);
        assert_eq!(map.interior(Section::CurrentLiabilities), 12..13);
        assert_eq!(map.interior(Section::NonCurrentLiabilities), 14..15);
        assert_eq!(map.interior(Section::StockholdersEquity), 17..19);
        assert_eq!(map.interior(Section::EquityAdjustments), 20..20);
    }

    #[test]
    fn test_missing_markers_are_all_reported() {
        let m = matrix(&[
            &["separator", ""],
            &["Current assets:", ""],
            &["Cash", "1"],
            &["Total current assets", "1"],
        ]);
        let err = classify(&m, &rules()).unwrap_err();
        assert_eq!(
            err,
            StructuralError::MissingSections(vec![
                SectionMarker::TotalAssets,
                SectionMarker::CurrentLiabilities,
                SectionMarker::TotalCurrentLiabilities,
                SectionMarker::TotalLiabilities,
                SectionMarker::StockholdersEquity,
                SectionMarker::TotalStockholdersEquity,
                SectionMarker::TotalLiabilitiesAndEquity,
            ])
        );
    }

    #[test]
    fn test_totals_require_data() {
        let m = matrix(&[
            &["separator", ""],
            &["Current assets:", ""],
            &["Cash", "1"],
            &["Total current assets", ""],
        ]);
        let StructuralError::MissingSections(missing) = classify(&m, &rules()).unwrap_err() else {
            panic!("expected missing sections");
        };
        assert!(missing.contains(&SectionMarker::TotalCurrentAssets));
    }

    #[test]
    fn test_disorder_names_both_markers() {
        let mut rows: Vec<Vec<String>> = balance_sheet("A", "20230331", "3").into_rows();
        rows.swap(10, 11);
        let m = StatementMatrix::new(rows).unwrap();
        let err = classify(&m, &rules()).unwrap_err();
        assert_eq!(
            err,
            StructuralError::OutOfOrder {
                earlier: SectionMarker::TotalAssets,
                earlier_row: 11,
                later: SectionMarker::CurrentLiabilities,
                later_row: 10,
            }
        );
    }

    #[test]
    fn test_row_matching_two_markers_is_out_of_order() {
        // Without an equity heading the total fills both equity markers.
        let mut rows = balance_sheet("A", "20230331", "3").into_rows();
        rows[16][0] = "Capital:".to_string();
        let m = StatementMatrix::new(rows).unwrap();
        assert!(matches!(
            classify(&m, &rules()),
            Err(StructuralError::OutOfOrder {
                earlier: SectionMarker::StockholdersEquity,
                later: SectionMarker::TotalStockholdersEquity,
                ..
            })
        ));
    }

    #[test]
    fn test_combined_total_fills_both_equity_totals() {
        let mut rows = balance_sheet("A", "20230331", "3").into_rows();
        rows.remove(19);
        rows[19][0] = "Total liabilities and total equity".to_string();
        let m = StatementMatrix::new(rows).unwrap();

        let map = classify(&m, &rules()).unwrap();
        assert_eq!(map.row(SectionMarker::TotalStockholdersEquity), 19);
        assert_eq!(map.row(SectionMarker::TotalLiabilitiesAndEquity), 19);
        assert_eq!(map.interior(Section::StockholdersEquity), 17..19);
        assert!(map.interior(Section::EquityAdjustments).is_empty());
    }

    #[test]
    fn test_unaccounted_row_is_reported() {
        let mut rows = balance_sheet("A", "20230331", "3").into_rows();
        rows.insert(5, vec!["Unclassified reserve".to_string(), "7".to_string()]);
        let m = StatementMatrix::new(rows).unwrap();
        assert_eq!(
            classify(&m, &rules()),
            Err(StructuralError::UnaccountedRow {
                row: 5,
                label: "Unclassified reserve".to_string(),
            })
        );
    }

    #[test]
    fn test_other_equities_between_liabilities_and_equity() {
        let mut rows = balance_sheet("A", "20230331", "3").into_rows();
        rows.insert(16, vec!["Redeemable preferred stock".to_string(), "9".to_string()]);
        rows.push(vec!["Noncontrolling interest".to_string(), "3".to_string()]);
        let m = StatementMatrix::new(rows).unwrap();
        let map = classify(&m, &rules()).unwrap();
        assert_eq!(map.other_equities(), &[16, 22]);
        assert_eq!(map.row(SectionMarker::StockholdersEquity), 17);
    }

    #[test]
    fn test_duplicate_other_equity_label() {
        let mut rows = balance_sheet("A", "20230331", "3").into_rows();
        rows.insert(16, vec!["Mezzanine capital".to_string(), "9".to_string()]);
        rows.push(vec!["Mezzanine capital".to_string(), "3".to_string()]);
        let m = StatementMatrix::new(rows).unwrap();
        assert_eq!(
            classify(&m, &rules()),
            Err(StructuralError::DuplicateOtherEquity {
                label: "Mezzanine capital".to_string(),
                row: 22,
            })
        );
    }

    #[test]
    fn test_same_label_in_different_sections_is_allowed() {
        let mut rows = balance_sheet("A", "20230331", "3").into_rows();
        rows.insert(9, vec!["Other".to_string(), "5".to_string()]);
        rows.insert(13, vec!["Other".to_string(), "6".to_string()]);
        rows.push(vec!["Other".to_string(), "7".to_string()]);
        let m = StatementMatrix::new(rows).unwrap();
        let map = classify(&m, &rules()).unwrap();
        assert_eq!(map.other_equities().len(), 1);
    }

    #[test]
    fn test_equity_method_investments_do_not_open_equity() {
        let mut rows = balance_sheet("A", "20230331", "3").into_rows();
        rows.insert(9, vec!["Equity method investments".to_string(), "25".to_string()]);
        let m = StatementMatrix::new(rows).unwrap();
        let map = classify(&m, &rules()).unwrap();
        assert_eq!(map.row(SectionMarker::StockholdersEquity), 17);
    }
}
