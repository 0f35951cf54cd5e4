//! Metadata store trait.
//!
//! This module defines the [`MetadataStore`] trait: filing metadata keyed by accession
//! number, the R-files discovered for each filing, and a cache of raw documents so
//! repeated runs do not download the same R-file twice.

use async_trait::async_trait;
use std::time::Duration;

use crate::{
    error::Result,
    types::{Cik, FilingMetadata, StatementFile, StatementKind},
};

/// Storage for filing metadata and downloaded documents.
///
/// Implementations can store data in various backends (SQLite, in-memory, etc.).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Inserts a filing unless its accession number is already stored.
    ///
    /// Returns `Ok(true)` if the filing was inserted, `Ok(false)` if it existed. An
    /// existing record is never overwritten.
    async fn upsert_filing(&self, filing: &FilingMetadata) -> Result<bool>;

    /// Retrieves a filing by accession number.
    ///
    /// Returns `Ok(None)` if the filing is not stored.
    async fn get_filing(&self, accession_number: &str) -> Result<Option<FilingMetadata>>;

    /// Lists all filings of a filer, oldest report date first.
    async fn filings_for_cik(&self, cik: Cik) -> Result<Vec<FilingMetadata>>;

    /// Records the R-file found for a statement kind.
    ///
    /// Returns [`FilingError::NotFound`](crate::error::FilingError::NotFound) if the
    /// filing is not stored.
    async fn set_statement_file(
        &self,
        accession_number: &str,
        kind: StatementKind,
        file: &StatementFile,
    ) -> Result<()>;

    /// Retrieves a cached document.
    ///
    /// Returns `Ok(Some(bytes))` if cached, `Ok(None)` if not cached.
    async fn get_document(&self, accession_number: &str, name: &str) -> Result<Option<Vec<u8>>>;

    /// Stores a downloaded document.
    async fn put_document(&self, accession_number: &str, name: &str, data: &[u8]) -> Result<()>;

    /// Removes cached documents older than the specified TTL.
    ///
    /// Filing metadata is not affected. Returns the number of documents removed.
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize>;

    /// Clears all stored data.
    async fn clear(&self) -> Result<()>;
}
