#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/filings/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC EDGAR adapters.
//!
//! # Example
//!
//! ```no_run
//! use filings_core::{Cik, DocumentFetcher, DocumentRequest};
//! use filings_edgar::{EdgarConfig, EdgarFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = EdgarFetcher::new(EdgarConfig::new("MyApp/1.0 (contact@example.com)"))?;
//!
//!     let cik = Cik::new(320193);
//!     for filing in fetcher.fetch_submissions(cik).await? {
//!         println!("{} {} {:?}", filing.accession_number, filing.form, filing.report_date);
//!     }
//!
//!     let request = DocumentRequest::new(cik, "0000320193-23-000077", "FilingSummary.xml");
//!     let summary = fetcher.fetch_document(&request).await?;
//!     println!("{} bytes", summary.len());
//!     Ok(())
//! }
//! ```

/// HTML and XML R-file parsing.
pub mod rfile;
/// Submissions index parsing.
pub mod submissions;
/// FilingSummary.xml parsing and R-file categorization.
pub mod summary;

pub use rfile::{RawCell, RawTable, parse_html_report, parse_report, parse_xml_report};
pub use submissions::{SubmissionsIndex, parse_submission_page, parse_submissions};
pub use summary::{CategoryRules, FILING_SUMMARY, ReportEntry, categorize, parse_filing_summary};

use async_trait::async_trait;
use filings_core::{Cik, DocumentFetcher, DocumentRequest, FilingError, FilingMetadata, Result};
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, warn};

/// SEC EDGAR archive base URL
const ARCHIVE_BASE_URL: &str = "https://www.sec.gov";

/// SEC EDGAR API base URL
const DATA_BASE_URL: &str = "https://data.sec.gov";

/// Default requests per tick (SEC fair-access limit is 10 per second)
const DEFAULT_REQUESTS_PER_TICK: u32 = 10;

/// Default rate limiter window
const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Default number of downloads in flight
const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Default HTTP timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`EdgarFetcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgarConfig {
    /// Identifying user agent, e.g. `"AppName/Version (contact@email.com)"`.
    pub user_agent: String,
    /// Base URL of the filing archive.
    pub archive_base_url: String,
    /// Base URL of the submissions API.
    pub data_base_url: String,
    /// Maximum number of downloads in flight during a batch.
    pub max_in_flight: usize,
    /// Maximum number of requests started per tick.
    pub requests_per_tick: u32,
    /// Rate limiter window.
    pub tick: Duration,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl EdgarConfig {
    /// Default configuration with the given user agent.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            archive_base_url: ARCHIVE_BASE_URL.to_string(),
            data_base_url: DATA_BASE_URL.to_string(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            requests_per_tick: DEFAULT_REQUESTS_PER_TICK,
            tick: DEFAULT_TICK,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the maximum number of downloads in flight.
    #[must_use]
    pub const fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub const fn with_rate_limit(mut self, requests_per_tick: u32, tick: Duration) -> Self {
        self.requests_per_tick = requests_per_tick;
        self.tick = tick;
        self
    }

    /// Sets the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Points the fetcher at other hosts (mirrors, test servers).
    #[must_use]
    pub fn with_base_urls(
        mut self,
        archive_base_url: impl Into<String>,
        data_base_url: impl Into<String>,
    ) -> Self {
        self.archive_base_url = archive_base_url.into();
        self.data_base_url = data_base_url.into();
        self
    }
}

/// Rate limiter allowing at most `per_tick` requests to start in each window.
#[derive(Debug)]
struct RateLimiter {
    window_start: Instant,
    started: u32,
    per_tick: u32,
    tick: Duration,
}

impl RateLimiter {
    fn new(per_tick: u32, tick: Duration) -> Self {
        Self {
            window_start: Instant::now(),
            started: 0,
            per_tick: per_tick.max(1),
            tick,
        }
    }

    async fn wait(&mut self) {
        if self.window_start.elapsed() >= self.tick {
            self.window_start = Instant::now();
            self.started = 0;
        }
        if self.started >= self.per_tick {
            let next_window = self.window_start + self.tick;
            sleep(next_window.saturating_duration_since(Instant::now())).await;
            self.window_start = Instant::now();
            self.started = 0;
        }
        self.started += 1;
    }
}

/// SEC EDGAR document fetcher.
///
/// Every request, single or batched, passes through one shared rate limiter. Batches keep
/// at most `max_in_flight` downloads running and return results in request order.
#[derive(Debug)]
pub struct EdgarFetcher {
    client: reqwest::Client,
    config: EdgarConfig,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl EdgarFetcher {
    /// Creates a fetcher.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] for an empty user agent and
    /// [`FilingError::Network`] if the HTTP client cannot be built.
    pub fn new(config: EdgarConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(FilingError::InvalidParameter(
                "SEC requests need an identifying user agent".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FilingError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config))
    }

    /// Creates a fetcher with a pre-configured HTTP client.
    ///
    /// The client is expected to send the identifying user agent itself.
    pub fn with_client(client: reqwest::Client, config: EdgarConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.requests_per_tick, config.tick);
        Self {
            client,
            config,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
        }
    }

    /// The configuration in use.
    pub const fn config(&self) -> &EdgarConfig {
        &self.config
    }

    /// Archive URL of a document.
    pub fn document_url(&self, request: &DocumentRequest) -> String {
        format!(
            "{}/Archives/edgar/data/{}/{}/{}",
            self.config.archive_base_url.trim_end_matches('/'),
            request.cik,
            request.accession_number.replace('-', ""),
            request.name
        )
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        // Rate limit
        self.rate_limiter.lock().await.wait().await;

        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FilingError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FilingError::NotFound(url.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
                .map(Duration::from_secs);
            return Err(FilingError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(FilingError::Network(format!(
                "Failed to fetch {}: HTTP {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FilingError::Network(format!("Failed to read {}: {}", url, e)))?;
        Ok(body.to_vec())
    }

    /// Fetches the 10-K and 10-Q filings of a filer from the submissions API, including
    /// the older pages the index points to.
    ///
    /// # Errors
    /// Fails if the main index or any page cannot be fetched or parsed.
    #[instrument(skip(self), fields(cik = %cik))]
    pub async fn fetch_submissions(&self, cik: Cik) -> Result<Vec<FilingMetadata>> {
        let base = self.config.data_base_url.trim_end_matches('/');
        let url = format!("{}/submissions/CIK{}.json", base, cik.padded());
        let index = submissions::parse_submissions(cik, &self.get(&url).await?)?;

        let mut filings = index.filings;
        for page in &index.pages {
            let url = format!("{}/submissions/{}", base, page);
            filings.extend(submissions::parse_submission_page(cik, &self.get(&url).await?)?);
        }

        debug!("Found {} periodic filings for CIK {}", filings.len(), cik);
        Ok(filings)
    }
}

#[async_trait]
impl DocumentFetcher for EdgarFetcher {
    fn name(&self) -> &str {
        "SEC EDGAR"
    }

    #[instrument(skip(self), fields(request = %request))]
    async fn fetch_document(&self, request: &DocumentRequest) -> Result<Vec<u8>> {
        self.get(&self.document_url(request)).await
    }

    async fn fetch_documents(&self, requests: &[DocumentRequest]) -> Vec<Result<Vec<u8>>> {
        let futures: Vec<_> = requests
            .iter()
            .map(|request| async move {
                let result = self.fetch_document(request).await;
                if let Err(e) = &result {
                    warn!("Failed to fetch {}: {}", request, e);
                }
                result
            })
            .collect();
        stream::iter(futures)
            .buffered(self.config.max_in_flight.max(1))
            .collect::<Vec<_>>()
            .await
    }
}
