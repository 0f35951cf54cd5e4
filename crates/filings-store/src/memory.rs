//! In-memory store implementation.

use async_trait::async_trait;
use chrono::Utc;
use filings_core::{
    Cik, FilingError, FilingMetadata, MetadataStore, Result, StatementFile, StatementKind,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Document entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct DocumentEntry {
    data: Vec<u8>,
    cached_at: chrono::DateTime<Utc>,
}

impl DocumentEntry {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age > chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// Simple in-memory store for testing and one-off runs.
///
/// Data is stored in `RwLock`-protected `HashMap`s and is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    filings: RwLock<HashMap<String, FilingMetadata>>,
    documents: RwLock<HashMap<(String, String), DocumentEntry>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    #[instrument(skip(self, filing), fields(accession = %filing.accession_number))]
    async fn upsert_filing(&self, filing: &FilingMetadata) -> Result<bool> {
        let mut filings = self.filings.write().await;
        match filings.entry(filing.accession_number.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(filing.clone());
                Ok(true)
            }
        }
    }

    async fn get_filing(&self, accession_number: &str) -> Result<Option<FilingMetadata>> {
        Ok(self.filings.read().await.get(accession_number).cloned())
    }

    #[instrument(skip(self), fields(cik = %cik))]
    async fn filings_for_cik(&self, cik: Cik) -> Result<Vec<FilingMetadata>> {
        let mut filings: Vec<FilingMetadata> = self
            .filings
            .read()
            .await
            .values()
            .filter(|filing| filing.cik == cik)
            .cloned()
            .collect();
        filings.sort_by(|a, b| {
            (a.report_date, &a.accession_number).cmp(&(b.report_date, &b.accession_number))
        });
        debug!("Found {} stored filings", filings.len());
        Ok(filings)
    }

    async fn set_statement_file(
        &self,
        accession_number: &str,
        kind: StatementKind,
        file: &StatementFile,
    ) -> Result<()> {
        let mut filings = self.filings.write().await;
        let filing = filings
            .get_mut(accession_number)
            .ok_or_else(|| FilingError::NotFound(format!("filing {}", accession_number)))?;
        filing.statement_files.insert(kind, file.clone());
        Ok(())
    }

    async fn get_document(&self, accession_number: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let key = (accession_number.to_string(), name.to_string());
        let documents = self.documents.read().await;
        match documents.get(&key) {
            Some(entry) => {
                debug!("Cache hit for {}/{}", accession_number, name);
                Ok(Some(entry.data.clone()))
            }
            None => {
                debug!("Cache miss for {}/{}", accession_number, name);
                Ok(None)
            }
        }
    }

    async fn put_document(&self, accession_number: &str, name: &str, data: &[u8]) -> Result<()> {
        let key = (accession_number.to_string(), name.to_string());
        self.documents
            .write()
            .await
            .insert(key, DocumentEntry::new(data.to_vec()));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, entry| !entry.is_stale(ttl));
        let removed = before - documents.len();

        if removed > 0 {
            debug!("Invalidated {} stale documents", removed);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.filings.write().await.clear();
        self.documents.write().await.clear();
        debug!("Cleared all stored data");
        Ok(())
    }
}
