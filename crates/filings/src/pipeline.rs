//! Balance sheet pipeline wiring a document fetcher and a metadata store to the merge engine.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use filings_core::{
    BatchReport, Cik, ClassificationRules, DocumentFetcher, DocumentRequest, Exclusion,
    FilingError, FilingMetadata, MetadataStore, Result, StatementKind, StatementMatrix,
    level_two, merge_batch,
};
use filings_edgar::{CategoryRules, FILING_SUMMARY, categorize, parse_filing_summary, parse_report};
use filings_store::InMemoryStore;

/// Rules and options for a [`BalanceSheetPipeline`].
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    /// Keyword tables for section classification.
    pub rules: ClassificationRules,
    /// Long-name tables for finding statement R-files in a filing summary.
    pub categories: CategoryRules,
    /// Collapse duplicate periods and prune empty rows after merging.
    pub level_two: bool,
}

impl PipelineConfig {
    /// Sets the classification rules.
    #[must_use]
    pub fn with_rules(mut self, rules: ClassificationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Sets the R-file categorization rules.
    #[must_use]
    pub fn with_categories(mut self, categories: CategoryRules) -> Self {
        self.categories = categories;
        self
    }

    /// Enables or disables the level-2 pass.
    #[must_use]
    pub const fn with_level_two(mut self, level_two: bool) -> Self {
        self.level_two = level_two;
        self
    }
}

/// Fetches, parses and merges the balance sheets of one filer.
///
/// Filing metadata and downloaded documents go through a [`MetadataStore`], so a second run
/// over the same filings only downloads what is new.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use filings::{BalanceSheetPipeline, Cik, EdgarConfig, EdgarFetcher};
///
/// let fetcher = EdgarFetcher::new(EdgarConfig::new("MyApp/1.0 (contact@example.com)"))?;
/// let submissions = fetcher.fetch_submissions(Cik::new(320193)).await?;
/// let report = BalanceSheetPipeline::new(Arc::new(fetcher))
///     .merge_filings(Cik::new(320193), &submissions)
///     .await?;
/// ```
pub struct BalanceSheetPipeline {
    fetcher: Arc<dyn DocumentFetcher>,
    store: Arc<dyn MetadataStore>,
    config: PipelineConfig,
}

impl std::fmt::Debug for BalanceSheetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceSheetPipeline")
            .field("fetcher", &self.fetcher.name())
            .field("store", &"configured")
            .field("config", &self.config)
            .finish()
    }
}

impl BalanceSheetPipeline {
    /// Creates a pipeline backed by an [`InMemoryStore`].
    #[must_use]
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            fetcher,
            store: Arc::new(InMemoryStore::new()),
            config: PipelineConfig::default(),
        }
    }

    /// Replaces the store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration in use.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The store in use.
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Records filing metadata, one upsert per filing.
    ///
    /// Filings already stored are left untouched. Returns how many were new.
    ///
    /// # Errors
    /// Returns the first store error.
    #[instrument(skip(self, filings), fields(count = filings.len()))]
    pub async fn record_filings(&self, filings: &[FilingMetadata]) -> Result<usize> {
        let results = join_all(filings.iter().map(|filing| self.store.upsert_filing(filing))).await;

        let mut inserted = 0;
        for result in results {
            if result? {
                inserted += 1;
            }
        }
        info!("Recorded {} new filings out of {}", inserted, filings.len());
        Ok(inserted)
    }

    /// Records `filings`, then merges every stored balance sheet of `cik`.
    ///
    /// # Errors
    /// See [`record_filings`](Self::record_filings) and
    /// [`merge_balance_sheets`](Self::merge_balance_sheets).
    pub async fn merge_filings(&self, cik: Cik, filings: &[FilingMetadata]) -> Result<BatchReport> {
        self.record_filings(filings).await?;
        self.merge_balance_sheets(cik).await
    }

    /// Merges the balance sheets of every stored filing of `cik`, oldest first.
    ///
    /// Filings whose R-files cannot be found, downloaded, parsed or classified are listed in
    /// [`BatchReport::excluded`] and do not stop the merge.
    ///
    /// # Errors
    /// Returns [`FilingError::NotFound`] if no filing of `cik` is stored, a store error, or a
    /// consistency error from the level-2 pass.
    #[instrument(skip(self), fields(cik = %cik))]
    pub async fn merge_balance_sheets(&self, cik: Cik) -> Result<BatchReport> {
        let filings = self.store.filings_for_cik(cik).await?;
        if filings.is_empty() {
            return Err(FilingError::NotFound(format!("No filings stored for CIK {}", cik)));
        }

        let (filings, mut excluded) = self.discover_statements(filings).await;
        let (matrices, mut failed) = self.load_balance_sheets(&filings).await;
        excluded.append(&mut failed);

        let mut report = merge_batch(&matrices, &self.config.rules);
        excluded.append(&mut report.excluded);
        report.excluded = excluded;

        if self.config.level_two {
            report.merged = report
                .merged
                .map(|merged| level_two(&merged))
                .transpose()?;
        }

        info!(
            "Merged {} balance sheets, excluded {}",
            report.included.len(),
            report.excluded.len()
        );
        Ok(report)
    }

    /// Finds the statement R-files of filings that have none recorded yet.
    async fn discover_statements(
        &self,
        filings: Vec<FilingMetadata>,
    ) -> (Vec<FilingMetadata>, Vec<Exclusion>) {
        let (mut ready, pending): (Vec<_>, Vec<_>) = filings
            .into_iter()
            .partition(|filing| !filing.statement_files.is_empty());

        let requests: Vec<DocumentRequest> = pending
            .iter()
            .map(|filing| {
                DocumentRequest::new(filing.cik, &filing.accession_number, FILING_SUMMARY)
            })
            .collect();
        let summaries = self.fetch_cached(&requests).await;

        let mut excluded = Vec::new();
        for (mut filing, summary) in pending.into_iter().zip(summaries) {
            match self.record_statement_files(&mut filing, summary).await {
                Ok(()) => ready.push(filing),
                Err(reason) => {
                    warn!(
                        accession = %filing.accession_number,
                        error = %reason,
                        "Failed to read filing summary"
                    );
                    excluded.push(Exclusion {
                        accession: filing.accession_number,
                        reason,
                    });
                }
            }
        }

        ready.sort_by(|a, b| {
            (a.report_date, &a.accession_number).cmp(&(b.report_date, &b.accession_number))
        });
        (ready, excluded)
    }

    async fn record_statement_files(
        &self,
        filing: &mut FilingMetadata,
        summary: Result<Vec<u8>>,
    ) -> Result<()> {
        let reports = parse_filing_summary(&summary?)?;
        let files = categorize(&reports, &self.config.categories);
        debug!(
            "Found {} statement R-files in {}",
            files.len(),
            filing.accession_number
        );

        for (kind, file) in files {
            self.store
                .set_statement_file(&filing.accession_number, kind, &file)
                .await?;
            filing.statement_files.insert(kind, file);
        }
        Ok(())
    }

    /// Downloads and parses the balance sheet of each filing, keeping filing order.
    async fn load_balance_sheets(
        &self,
        filings: &[FilingMetadata],
    ) -> (Vec<StatementMatrix>, Vec<Exclusion>) {
        let mut excluded = Vec::new();
        let mut with_sheet = Vec::with_capacity(filings.len());
        for filing in filings {
            match filing.statement_file(StatementKind::BalanceSheet) {
                Some(file) => with_sheet.push((filing, file.file_name.clone())),
                None => excluded.push(Exclusion {
                    accession: filing.accession_number.clone(),
                    reason: FilingError::NotFound(format!(
                        "No balance sheet R-file in {}",
                        filing.accession_number
                    )),
                }),
            }
        }

        let requests: Vec<DocumentRequest> = with_sheet
            .iter()
            .map(|(filing, name)| DocumentRequest::new(filing.cik, &filing.accession_number, name))
            .collect();
        let documents = self.fetch_cached(&requests).await;

        let mut matrices = Vec::with_capacity(with_sheet.len());
        for ((filing, name), document) in with_sheet.into_iter().zip(documents) {
            match document.and_then(|document| parse_report(&name, &document, filing)) {
                Ok(matrix) => matrices.push(matrix),
                Err(reason) => {
                    warn!(
                        accession = %filing.accession_number,
                        error = %reason,
                        "Failed to load balance sheet"
                    );
                    excluded.push(Exclusion {
                        accession: filing.accession_number.clone(),
                        reason,
                    });
                }
            }
        }
        (matrices, excluded)
    }

    /// Serves documents from the store, downloading and caching the missing ones.
    ///
    /// Returns one result per request in request order.
    async fn fetch_cached(&self, requests: &[DocumentRequest]) -> Vec<Result<Vec<u8>>> {
        let mut cached = Vec::with_capacity(requests.len());
        let mut missing = Vec::new();
        for request in requests {
            match self
                .store
                .get_document(&request.accession_number, &request.name)
                .await
            {
                Ok(Some(data)) => cached.push(Some(data)),
                Ok(None) => {
                    cached.push(None);
                    missing.push(request.clone());
                }
                Err(e) => {
                    warn!("Failed to read cached {}: {}", request, e);
                    cached.push(None);
                    missing.push(request.clone());
                }
            }
        }

        debug!(
            "Fetching {} of {} documents from {}",
            missing.len(),
            requests.len(),
            self.fetcher.name()
        );
        let mut fetched = self.fetcher.fetch_documents(&missing).await.into_iter();

        let mut results = Vec::with_capacity(requests.len());
        for (request, hit) in requests.iter().zip(cached) {
            if let Some(data) = hit {
                results.push(Ok(data));
                continue;
            }

            let result = fetched
                .next()
                .unwrap_or_else(|| Err(FilingError::NotFound(request.to_string())));
            if let Ok(data) = &result {
                if let Err(e) = self
                    .store
                    .put_document(&request.accession_number, &request.name, data)
                    .await
                {
                    warn!("Failed to cache {}: {}", request, e);
                }
            }
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use filings_core::{FormType, MetadataField};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CIK: Cik = Cik::new(320193);
    const FIRST: &str = "0000320193-23-000006";
    const SECOND: &str = "0000320193-23-000064";

    /// Serves documents from a map keyed by `accession/name` and counts downloads.
    #[derive(Debug, Default)]
    struct MapFetcher {
        documents: HashMap<String, Vec<u8>>,
        downloads: AtomicUsize,
    }

    impl MapFetcher {
        fn with(mut self, accession: &str, name: &str, document: impl Into<Vec<u8>>) -> Self {
            self.documents
                .insert(format!("{}/{}", accession, name), document.into());
            self
        }

        fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentFetcher for MapFetcher {
        fn name(&self) -> &str {
            "map"
        }

        async fn fetch_document(&self, request: &DocumentRequest) -> Result<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            self.documents
                .get(&format!("{}/{}", request.accession_number, request.name))
                .cloned()
                .ok_or_else(|| FilingError::NotFound(request.to_string()))
        }
    }

    fn summary(balance_sheet: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<FilingSummary>
  <MyReports>
    <Report>
      <HtmlFileName>R2.htm</HtmlFileName>
      <LongName>0000002 - Statement - CONDENSED CONSOLIDATED STATEMENTS OF OPERATIONS</LongName>
      <ShortName>CONDENSED CONSOLIDATED STATEMENTS OF OPERATIONS</ShortName>
      <MenuCategory>Statements</MenuCategory>
      <Position>2</Position>
    </Report>
    <Report>
      <HtmlFileName>{}</HtmlFileName>
      <LongName>0000004 - Statement - CONDENSED CONSOLIDATED BALANCE SHEETS</LongName>
      <ShortName>CONDENSED CONSOLIDATED BALANCE SHEETS</ShortName>
      <MenuCategory>Statements</MenuCategory>
      <Position>4</Position>
    </Report>
  </MyReports>
</FilingSummary>"#,
            balance_sheet
        )
    }

    fn r_file(date: &str, rows: &[(&str, &str)]) -> String {
        let mut html = format!(
            "<html><body><table class=\"report\"><tr>\
             <th>CONDENSED CONSOLIDATED BALANCE SHEETS - USD ($)<br> $ in Millions</th>\
             <th>{}</th></tr>",
            date
        );
        for (label, value) in rows {
            html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>", label, value));
        }
        html.push_str("</table></body></html>");
        html
    }

    fn first_sheet() -> String {
        r_file(
            "Mar. 31, 2023",
            &[
                ("Current assets:", ""),
                ("Cash and cash equivalents", "$ 120"),
                ("Accounts receivable, net", "80"),
                ("Total current assets", "200"),
                ("Property, plant and equipment, net", "500"),
                ("Total assets", "$ 700"),
                ("Current liabilities:", ""),
                ("Accounts payable", "60"),
                ("Total current liabilities", "60"),
                ("Long-term debt", "240"),
                ("Total liabilities", "300"),
                ("Shareholders' equity:", ""),
                ("Common stock", "250"),
                ("Retained earnings", "150"),
                ("Total shareholders' equity", "400"),
                ("Total liabilities and shareholders' equity", "$ 700"),
            ],
        )
    }

    fn second_sheet() -> String {
        r_file(
            "Jul. 01, 2023",
            &[
                ("Current assets:", ""),
                ("Cash and cash equivalents", "$ 130"),
                ("Short-term investments", "15"),
                ("Accounts receivable, net", "85"),
                ("Total current assets", "230"),
                ("Property, plant and equipment, net", "510"),
                ("Total assets", "$ 740"),
                ("Current liabilities:", ""),
                ("Accounts payable", "70"),
                ("Total current liabilities", "70"),
                ("Long-term debt", "250"),
                ("Total liabilities", "320"),
                ("Shareholders' equity:", ""),
                ("Common stock", "250"),
                ("Retained earnings", "(170)"),
                ("Total shareholders' equity", "420"),
                ("Total liabilities and shareholders' equity", "$ 740"),
            ],
        )
    }

    fn filing(accession: &str, month: u32, day: u32) -> FilingMetadata {
        FilingMetadata::new(CIK, accession, FormType::TenQ)
            .with_report_date(NaiveDate::from_ymd_opt(2023, month, day).unwrap())
    }

    fn submissions() -> Vec<FilingMetadata> {
        // Newest first, as the submissions index lists them.
        vec![filing(SECOND, 7, 1), filing(FIRST, 3, 31)]
    }

    fn complete_fetcher() -> MapFetcher {
        MapFetcher::default()
            .with(FIRST, FILING_SUMMARY, summary("R4.htm"))
            .with(FIRST, "R4.htm", first_sheet())
            .with(SECOND, FILING_SUMMARY, summary("R3.htm"))
            .with(SECOND, "R3.htm", second_sheet())
    }

    fn row<'a>(matrix: &'a StatementMatrix, label: &str) -> Vec<&'a str> {
        matrix
            .rows()
            .iter()
            .find(|row| row[0] == label)
            .map(|row| row[1..].iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_merges_filings_oldest_first() {
        let fetcher = Arc::new(complete_fetcher());
        let pipeline = BalanceSheetPipeline::new(fetcher.clone());

        let report = pipeline.merge_filings(CIK, &submissions()).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.included, vec![FIRST, SECOND]);

        let merged = report.merged.unwrap();
        assert_eq!(
            row(&merged, MetadataField::ReportDate.label()),
            ["20230331", "20230701"]
        );
        assert_eq!(row(&merged, "Short-term investments"), ["", "15"]);
        assert_eq!(row(&merged, "Retained earnings"), ["150", "-170"]);
        assert_eq!(fetcher.downloads(), 4);
    }

    #[tokio::test]
    async fn test_records_statement_files_and_reuses_cache() {
        let fetcher = Arc::new(complete_fetcher());
        let pipeline = BalanceSheetPipeline::new(fetcher.clone());
        pipeline.merge_filings(CIK, &submissions()).await.unwrap();

        let stored = pipeline.store().get_filing(SECOND).await.unwrap().unwrap();
        assert_eq!(
            stored
                .statement_file(StatementKind::BalanceSheet)
                .map(|file| file.file_name.as_str()),
            Some("R3.htm")
        );
        assert!(
            stored
                .statement_file(StatementKind::IncomeStatement)
                .is_some()
        );

        let report = pipeline.merge_balance_sheets(CIK).await.unwrap();
        assert_eq!(report.included.len(), 2);
        assert_eq!(fetcher.downloads(), 4);
    }

    #[tokio::test]
    async fn test_excludes_filings_that_cannot_be_loaded() {
        let third = "0000320193-23-000077";
        let fetcher = complete_fetcher()
            .with(third, FILING_SUMMARY, summary("R9.htm"))
            .with(
                "0000320193-23-000099",
                FILING_SUMMARY,
                "<FilingSummary><MyReports></MyReports></FilingSummary>",
            );
        let mut filings = submissions();
        filings.push(filing(third, 9, 30));
        filings.push(filing("0000320193-23-000099", 12, 30));

        let pipeline = BalanceSheetPipeline::new(Arc::new(fetcher));
        let report = pipeline.merge_filings(CIK, &filings).await.unwrap();

        assert_eq!(report.included, vec![FIRST, SECOND]);
        assert!(!report.is_complete());
        let mut excluded: Vec<&str> = report
            .excluded
            .iter()
            .map(|exclusion| exclusion.accession.as_str())
            .collect();
        excluded.sort_unstable();
        assert_eq!(excluded, [third, "0000320193-23-000099"]);
        assert!(
            report
                .excluded
                .iter()
                .all(|exclusion| matches!(exclusion.reason, FilingError::NotFound(_)))
        );
    }

    #[tokio::test]
    async fn test_unknown_cik() {
        let pipeline = BalanceSheetPipeline::new(Arc::new(MapFetcher::default()));
        let result = pipeline.merge_balance_sheets(Cik::new(1)).await;
        assert!(matches!(result, Err(FilingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_record_filings_counts_new_filings() {
        let pipeline = BalanceSheetPipeline::new(Arc::new(MapFetcher::default()));
        assert_eq!(pipeline.record_filings(&submissions()).await.unwrap(), 2);
        assert_eq!(pipeline.record_filings(&submissions()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_level_two_pass() {
        let pipeline = BalanceSheetPipeline::new(Arc::new(complete_fetcher()))
            .with_config(PipelineConfig::default().with_level_two(true));
        assert!(pipeline.config().level_two);

        let report = pipeline.merge_filings(CIK, &submissions()).await.unwrap();
        let merged = report.merged.unwrap();
        // Both columns are quarters, so only the later one survives.
        assert_eq!(merged.reporting_columns().len(), 1);
        assert_eq!(row(&merged, MetadataField::ReportDate.label()), ["20230701"]);
        assert_eq!(row(&merged, "Short-term investments"), ["15"]);
    }
}
