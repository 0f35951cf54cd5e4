//! Merge orchestration.
//!
//! [`combine_two_filings`] classifies two balance sheets, unions their line items per
//! section and writes one matrix with a canonical skeleton:
//!
//! ```text
//! Current Assets, <items>, Total Current Assets,
//! Non Current Assets, <items>, Total Assets,
//! Current Liabilities, <items>, Total Current Liabilities,
//! Non Current Liabilities, <items>, Total Liabilities,
//! Stockholders' Equity, <items>, Total Stockholders' Equity, <items>,
//! Total Liabilities and Stockholders' Equity,
//! Other Equities, <items>
//! ```
//!
//! Because the output carries canonical marker labels it classifies cleanly again, which
//! is what lets [`fold_filings`] merge any number of filings one at a time.

use tracing::{debug, info, warn};

use crate::{
    classify::{Section, SectionMap, SectionMarker, classify},
    error::{FilingError, Result},
    matrix::{ColumnKey, MetadataField, StatementMatrix},
    merge::{merge_rows, merge_section},
    reconcile::reconcile,
    resolve::{lookup_at, lookup_in_rows},
    rules::ClassificationRules,
};

/// Heading placed between total current assets and the non-current items.
pub const NON_CURRENT_ASSETS: &str = "Non Current Assets";
/// Heading placed between total current liabilities and the non-current items.
pub const NON_CURRENT_LIABILITIES: &str = "Non Current Liabilities";
/// Heading placed after the grand total, above other-equity items.
pub const OTHER_EQUITIES: &str = "Other Equities";

/// Placeholder used in diagnostics for a filing without an accession number.
const UNKNOWN_ACCESSION: &str = "unknown";

/// Where the values of one skeleton row come from.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Heading,
    Marker(SectionMarker),
    Items(Section),
    OtherEquities,
}

/// One entry of the output layout.
#[derive(Clone, Copy, Debug)]
enum Part {
    Marker(SectionMarker),
    Heading(&'static str),
    Items(Section),
    OtherEquityItems,
}

const LAYOUT: [Part; 19] = [
    Part::Marker(SectionMarker::CurrentAssets),
    Part::Items(Section::CurrentAssets),
    Part::Marker(SectionMarker::TotalCurrentAssets),
    Part::Heading(NON_CURRENT_ASSETS),
    Part::Items(Section::NonCurrentAssets),
    Part::Marker(SectionMarker::TotalAssets),
    Part::Marker(SectionMarker::CurrentLiabilities),
    Part::Items(Section::CurrentLiabilities),
    Part::Marker(SectionMarker::TotalCurrentLiabilities),
    Part::Heading(NON_CURRENT_LIABILITIES),
    Part::Items(Section::NonCurrentLiabilities),
    Part::Marker(SectionMarker::TotalLiabilities),
    Part::Marker(SectionMarker::StockholdersEquity),
    Part::Items(Section::StockholdersEquity),
    Part::Marker(SectionMarker::TotalStockholdersEquity),
    Part::Items(Section::EquityAdjustments),
    Part::Marker(SectionMarker::TotalLiabilitiesAndEquity),
    Part::Heading(OTHER_EQUITIES),
    Part::OtherEquityItems,
];

/// A filing that passed classification, with its marker rows relabelled canonically.
///
/// A row that carries several markers (a lone "Total liabilities and equity" line filling
/// both equity totals) keeps its own label.
#[derive(Debug)]
struct Classified {
    matrix: StatementMatrix,
    map: SectionMap,
}

impl Classified {
    fn new(matrix: &StatementMatrix, rules: &ClassificationRules) -> Result<Self> {
        matrix.column_keys()?;
        let map = classify(matrix, rules).map_err(|source| {
            FilingError::structural(
                matrix.accession_number().unwrap_or(UNKNOWN_ACCESSION),
                source,
            )
        })?;
        let shared = |row: usize| map.markers().filter(|&(_, other)| other == row).count() > 1;
        let labels: Vec<(usize, &str)> = map
            .markers()
            .filter(|&(_, row)| !shared(row))
            .map(|(marker, row)| (row, marker.canonical_label()))
            .collect();
        Ok(Self {
            matrix: matrix.relabelled(&labels),
            map,
        })
    }

    fn rows(&self, slot: Slot) -> Vec<usize> {
        match slot {
            Slot::Heading | Slot::Marker(_) => Vec::new(),
            Slot::Items(section) => self.map.interior(section).collect(),
            Slot::OtherEquities => self.map.other_equities().to_vec(),
        }
    }

    /// Markers resolve by their classified row, items by label within their section.
    fn resolve(&self, slot: Slot, label: &str, key: &ColumnKey) -> Option<String> {
        match slot {
            Slot::Marker(marker) => lookup_at(&self.matrix, self.map.row(marker), key),
            _ => lookup_in_rows(&self.matrix, self.rows(slot), label, key),
        }
    }
}

/// Metadata rows of both inputs side by side, one per field present in either.
fn metadata_rows(first: &StatementMatrix, second: Option<&StatementMatrix>) -> Vec<Vec<String>> {
    let cells = |matrix: &StatementMatrix, field: MetadataField| -> Vec<String> {
        matrix
            .reporting_columns()
            .map(|column| {
                matrix
                    .metadata(field, column)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    };

    MetadataField::ALL
        .into_iter()
        .filter(|&field| {
            first.metadata_row(field).is_some()
                || second.is_some_and(|matrix| matrix.metadata_row(field).is_some())
        })
        .map(|field| {
            let mut row = vec![field.label().to_string()];
            row.extend(cells(first, field));
            if let Some(second) = second {
                row.extend(cells(second, field));
            }
            row
        })
        .collect()
}

/// Skeleton rows in output order, each with the slot its values come from.
fn skeleton(first: &Classified, second: Option<&Classified>) -> Vec<(String, Slot)> {
    let mut rows = Vec::new();
    for part in LAYOUT {
        match part {
            Part::Marker(marker) => {
                rows.push((marker.canonical_label().to_string(), Slot::Marker(marker)));
            }
            Part::Heading(heading) => rows.push((heading.to_string(), Slot::Heading)),
            Part::Items(section) => {
                let (other, other_rows) = second.map_or((&first.matrix, 0..0), |second| {
                    (&second.matrix, second.map.interior(section))
                });
                let labels = merge_section(
                    &first.matrix,
                    first.map.interior(section),
                    other,
                    other_rows,
                );
                rows.extend(labels.into_iter().map(|label| (label, Slot::Items(section))));
            }
            Part::OtherEquityItems => {
                let (other, other_rows) = second.map_or((&first.matrix, &[][..]), |second| {
                    (&second.matrix, second.map.other_equities())
                });
                let labels = merge_rows(
                    &first.matrix,
                    first.map.other_equities(),
                    other,
                    other_rows,
                );
                rows.extend(labels.into_iter().map(|label| (label, Slot::OtherEquities)));
            }
        }
    }
    rows
}

/// Builds the canonical matrix for one or two classified filings.
fn assemble(first: &Classified, second: Option<&Classified>) -> Result<StatementMatrix> {
    let skeleton = skeleton(first, second);
    let metadata = metadata_rows(&first.matrix, second.map(|second| &second.matrix));
    let width = metadata.first().map_or(1, Vec::len);

    let blank = skeleton
        .iter()
        .map(|(label, _)| {
            let mut row = vec![String::new(); width];
            row[0].clone_from(label);
            row
        })
        .collect();
    let sorted = reconcile(&StatementMatrix::from_parts(metadata, blank)?)?;

    let keys = sorted.column_keys()?;
    let data_start = sorted.separator() + 1;
    let mut rows = sorted.into_rows();
    for ((label, slot), cells) in skeleton.iter().zip(&mut rows[data_start..]) {
        if matches!(slot, Slot::Heading) {
            continue;
        }
        for (key, cell) in keys.iter().zip(cells.iter_mut().skip(1)) {
            *cell = first
                .resolve(*slot, label, key)
                .or_else(|| second.and_then(|second| second.resolve(*slot, label, key)))
                .unwrap_or_default();
        }
    }

    let merged = StatementMatrix::new(rows)?;
    debug!(
        columns = merged.width() - 1,
        line_items = merged.data_rows().len(),
        "Assembled balance sheet"
    );
    Ok(merged)
}

/// Merges two balance sheets into one matrix.
///
/// Neither input is modified. Columns of both inputs are kept and ordered by
/// `(reportPeriod, reportDate)`; values are taken from `first` where it has them, then
/// from `second`, and left empty otherwise.
///
/// # Errors
/// Returns [`FilingError::Structural`] naming the filing that failed classification, or
/// [`FilingError::Consistency`] if a filing lacks the metadata rows that key its columns.
pub fn combine_two_filings(
    first: &StatementMatrix,
    second: &StatementMatrix,
    rules: &ClassificationRules,
) -> Result<StatementMatrix> {
    let first = Classified::new(first, rules)?;
    let second = Classified::new(second, rules)?;
    assemble(&first, Some(&second))
}

/// Rewrites one balance sheet into the canonical skeleton without merging.
///
/// # Errors
/// Fails under the same conditions as [`combine_two_filings`].
pub fn normalize_filing(
    matrix: &StatementMatrix,
    rules: &ClassificationRules,
) -> Result<StatementMatrix> {
    assemble(&Classified::new(matrix, rules)?, None)
}

/// Merges filings one at a time, oldest first.
///
/// # Errors
/// Returns [`FilingError::InvalidParameter`] for an empty slice and stops at the first
/// filing that cannot be merged. Use [`merge_batch`] to skip such filings instead.
pub fn fold_filings(
    matrices: &[StatementMatrix],
    rules: &ClassificationRules,
) -> Result<StatementMatrix> {
    let (first, rest) = matrices
        .split_first()
        .ok_or_else(|| FilingError::InvalidParameter("no filings to merge".to_string()))?;
    let mut merged = normalize_filing(first, rules)?;
    for next in rest {
        merged = combine_two_filings(&merged, next, rules)?;
    }
    Ok(merged)
}

/// A filing left out of a batch merge.
#[derive(Debug)]
pub struct Exclusion {
    /// Accession number of the filing (`unknown` when the matrix has none).
    pub accession: String,
    /// Why the filing was excluded.
    pub reason: FilingError,
}

/// Outcome of [`merge_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// The merged matrix, if at least one filing could be merged.
    pub merged: Option<StatementMatrix>,
    /// Accession numbers merged, in fold order.
    pub included: Vec<String>,
    /// Filings that were skipped, with reasons.
    pub excluded: Vec<Exclusion>,
}

impl BatchReport {
    /// Returns true if every filing was merged.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.excluded.is_empty() && self.merged.is_some()
    }
}

/// Merges every filing that classifies, oldest first, and reports the rest.
///
/// A failing filing never aborts the batch: it is recorded as an [`Exclusion`] and the
/// fold continues with the remaining filings. Each merge step is classified again before
/// it is accepted, so a step that would leave an unusable accumulator is rejected and
/// charged to the filing it tried to add, never to the filings after it.
pub fn merge_batch(filings: &[StatementMatrix], rules: &ClassificationRules) -> BatchReport {
    let mut report = BatchReport::default();
    let mut current: Option<Classified> = None;

    for filing in filings {
        let accession = filing
            .accession_number()
            .unwrap_or(UNKNOWN_ACCESSION)
            .to_string();

        let step = Classified::new(filing, rules).and_then(|incoming| {
            let merged = match &current {
                None => assemble(&incoming, None)?,
                Some(current) => assemble(current, Some(&incoming))?,
            };
            let next = Classified::new(&merged, rules).map_err(|e| match e {
                FilingError::Structural { source, .. } => {
                    FilingError::structural(accession.as_str(), source)
                }
                other => other,
            })?;
            Ok((merged, next))
        });

        match step {
            Ok((merged, next)) => {
                report.merged = Some(merged);
                current = Some(next);
                report.included.push(accession);
            }
            Err(reason) => {
                warn!(accession = %accession, error = %reason, "Excluding filing from merge");
                report.excluded.push(Exclusion { accession, reason });
            }
        }
    }

    info!(
        included = report.included.len(),
        excluded = report.excluded.len(),
        "Merged balance sheet batch"
    );
    report
}
