#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/filings/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Engine, core types and traits
pub use filings_core::*;

// Stores
pub use filings_store::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use filings_store::SqliteStore;

// EDGAR adapters
#[cfg(feature = "edgar")]
pub use filings_edgar::{
    CategoryRules, EdgarConfig, EdgarFetcher, FILING_SUMMARY, RawCell, RawTable, ReportEntry,
    categorize, parse_filing_summary, parse_report,
};

#[cfg(feature = "edgar")]
mod pipeline;
#[cfg(feature = "edgar")]
pub use pipeline::{BalanceSheetPipeline, PipelineConfig};
