//! Document fetcher trait.

use async_trait::async_trait;
use std::fmt::{self, Debug};

use crate::{error::Result, types::Cik};

/// One document inside a filing folder.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentRequest {
    /// Filer.
    pub cik: Cik,
    /// Accession number with dashes.
    pub accession_number: String,
    /// Document name (e.g. `FilingSummary.xml`, `R2.htm`).
    pub name: String,
}

impl DocumentRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(cik: Cik, accession_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cik,
            accession_number: accession_number.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DocumentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.cik, self.accession_number, self.name)
    }
}

/// Downloads documents from a filing archive.
///
/// Implementations do not retry; callers use
/// [`FilingError::is_transient`](crate::error::FilingError::is_transient) to decide.
#[async_trait]
pub trait DocumentFetcher: Send + Sync + Debug {
    /// Returns the name of this fetcher (e.g., "SEC EDGAR").
    fn name(&self) -> &str;

    /// Fetches one document.
    ///
    /// Fails with `NotFound` for a missing document and with `Network` or
    /// `RateLimited` for transient failures.
    async fn fetch_document(&self, request: &DocumentRequest) -> Result<Vec<u8>>;

    /// Fetches several documents, returning one result per request in request order.
    ///
    /// A failed download never cancels the others. Default implementation calls
    /// `fetch_document` sequentially; fetchers can override with a concurrent version.
    async fn fetch_documents(&self, requests: &[DocumentRequest]) -> Vec<Result<Vec<u8>>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.fetch_document(request).await);
        }
        results
    }
}
