//! Error types for filing operations.
//!
//! [`StructuralError`] reports a balance sheet whose sections could not be proven
//! complete and ordered, [`ConsistencyError`] reports a malformed matrix, and
//! [`FilingError`] wraps both together with collaborator failures (network, store,
//! parsing).

use std::time::Duration;

use thiserror::Error;

use crate::{classify::SectionMarker, matrix::MetadataField};

/// A classification invariant was violated.
///
/// The filing is excluded from merging; it is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// One or more section markers were not found.
    #[error("missing section markers: {}", marker_list(.0))]
    MissingSections(Vec<SectionMarker>),

    /// Two section markers appear in the wrong order.
    #[error("{earlier} (row {earlier_row}) must come before {later} (row {later_row})")]
    OutOfOrder {
        /// The marker expected first.
        earlier: SectionMarker,
        /// Row the first marker was found on.
        earlier_row: usize,
        /// The marker expected second.
        later: SectionMarker,
        /// Row the second marker was found on.
        later_row: usize,
    },

    /// A data-bearing row falls outside every section.
    #[error("data row {row} ({label:?}) is not covered by any section")]
    UnaccountedRow {
        /// Matrix row index.
        row: usize,
        /// Line-item label of the row.
        label: String,
    },

    /// Two other-equity rows share a label.
    #[error("other equity label {label:?} repeats at row {row}")]
    DuplicateOtherEquity {
        /// The repeated label.
        label: String,
        /// Row of the second occurrence.
        row: usize,
    },
}

fn marker_list(markers: &[SectionMarker]) -> String {
    markers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A statement matrix is malformed and cannot be classified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// The matrix has no rows.
    #[error("statement matrix is empty")]
    EmptyMatrix,

    /// The matrix has a label column but no reporting columns.
    #[error("statement matrix has no reporting columns")]
    NoReportingColumns,

    /// A row is not as wide as the first row.
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        /// Offending row index.
        row: usize,
        /// Width of row 0.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// No `separator` row divides metadata from data.
    #[error("statement matrix has no separator row")]
    MissingSeparator,

    /// Nothing follows the separator row.
    #[error("statement matrix has no data rows")]
    NoDataRows,

    /// A metadata row needed for column keys is absent.
    #[error("metadata row {0} is missing")]
    MissingMetadata(MetadataField),
}

/// Errors that can occur while fetching, parsing, classifying or merging filings.
#[derive(Error, Debug)]
pub enum FilingError {
    /// Classification of one filing failed.
    #[error("filing {accession}: {source}")]
    Structural {
        /// Accession number of the failing filing.
        accession: String,
        /// The violated invariant.
        #[source]
        source: StructuralError,
    },

    /// A matrix failed validation.
    #[error("inconsistent statement matrix: {0}")]
    Consistency(#[from] ConsistencyError),

    /// Network-related errors (connection failures, timeouts, server errors).
    #[error("Network error: {0}")]
    Network(String),

    /// The requested document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded by the remote service.
    #[error("Rate limited: retry after {retry_after:?}")]
    RateLimited {
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// Error parsing a document.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with the metadata store.
    #[error("Store error: {0}")]
    Store(String),

    /// Error writing merged output.
    #[error("Output error: {0}")]
    Output(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl FilingError {
    /// Returns true for failures a caller may retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }

    /// Wraps a classification failure with the filing it came from.
    pub fn structural(accession: impl Into<String>, source: StructuralError) -> Self {
        Self::Structural {
            accession: accession.into(),
            source,
        }
    }
}

/// Result type alias using [`FilingError`].
pub type Result<T> = std::result::Result<T, FilingError>;
