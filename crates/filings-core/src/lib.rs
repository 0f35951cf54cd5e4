#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/filings/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for balance sheet merging.
//!
//! - [`StatementMatrix`](matrix::StatementMatrix) - Normalized statement grid
//! - [`classify`](classify::classify) - Section classifier
//! - [`reorder`](reconcile::reorder) - Column reconciler
//! - [`merge_section`](merge::merge_section) - Line-item merger
//! - [`lookup`](resolve::lookup) - Cell resolver
//! - [`combine_two_filings`](combine::combine_two_filings) - Merge orchestrator
//! - [`DocumentFetcher`](fetch::DocumentFetcher) - Document download abstraction
//! - [`MetadataStore`](store::MetadataStore) - Filing metadata storage abstraction

/// Section classification of a balance sheet matrix.
pub mod classify;
/// Two-filing merge and multi-filing fold.
pub mod combine;
/// Error types for classification, merging and collaborators.
pub mod error;
/// Document fetcher trait.
pub mod fetch;
/// Polars export of merged matrices.
pub mod frame;
/// The statement matrix and its metadata rows.
pub mod matrix;
/// Line-item union per section.
pub mod merge;
/// CSV reading and writing of statement matrices.
pub mod output;
/// Column ordering, duplicate-period collapse and row pruning.
pub mod reconcile;
/// Cross-statement cell lookup.
pub mod resolve;
/// Keyword rules driving the classifier.
pub mod rules;
/// Metadata store trait.
pub mod store;
/// Filing metadata types (Cik, FilingMetadata, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use classify::{Section, SectionMap, SectionMarker, classify};
pub use combine::{
    BatchReport, Exclusion, combine_two_filings, fold_filings, merge_batch, normalize_filing,
};
pub use error::{ConsistencyError, FilingError, Result, StructuralError};
pub use fetch::{DocumentFetcher, DocumentRequest};
pub use frame::{to_frame, write_parquet};
pub use matrix::{ColumnKey, MetadataField, StatementMatrix};
pub use merge::{merge_rows, merge_section};
pub use output::{from_csv, to_csv, to_csv_string};
pub use reconcile::{
    ColumnPermutation, collapse_duplicate_periods, level_two, prune_empty_rows, reconcile, reorder,
};
pub use resolve::{clean_numeric, lookup, lookup_at, lookup_in_rows};
pub use rules::{ClassificationRules, MatchRule, OrderedRule};
pub use store::MetadataStore;
pub use types::{Cik, FilingMetadata, FormType, StatementFile, StatementKind};
