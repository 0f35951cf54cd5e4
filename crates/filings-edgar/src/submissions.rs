//! Submissions index reader.
//!
//! `data.sec.gov/submissions/CIK##########.json` lists a filer's most recent filings as
//! parallel arrays under `filings.recent`; older filings live in extra page files named in
//! `filings.files`, whose top-level object has the same parallel arrays. Only 10-K and 10-Q
//! filings are kept.

use chrono::NaiveDate;
use filings_core::{Cik, FilingError, FilingMetadata, FormType, Result};
use serde::Deserialize;

/// A parsed submissions index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionsIndex {
    /// Entity name as registered with the SEC.
    pub name: Option<String>,
    /// 10-K and 10-Q filings from the recent section.
    pub filings: Vec<FilingMetadata>,
    /// File names of the older pages still to be fetched.
    pub pages: Vec<String>,
}

/// Parses the main submissions document of a filer.
///
/// # Errors
/// Returns [`FilingError::Parse`] if the document is not valid submissions JSON.
pub fn parse_submissions(cik: Cik, json: &[u8]) -> Result<SubmissionsIndex> {
    let response: SubmissionsResponse = serde_json::from_slice(json)
        .map_err(|e| FilingError::Parse(format!("Failed to parse submissions: {}", e)))?;

    Ok(SubmissionsIndex {
        name: response.name,
        filings: response.filings.recent.into_filings(cik),
        pages: response
            .filings
            .files
            .into_iter()
            .map(|file| file.name)
            .collect(),
    })
}

/// Parses one older submissions page.
///
/// # Errors
/// Returns [`FilingError::Parse`] if the page is not valid JSON.
pub fn parse_submission_page(cik: Cik, json: &[u8]) -> Result<Vec<FilingMetadata>> {
    let page: FilingColumns = serde_json::from_slice(json)
        .map_err(|e| FilingError::Parse(format!("Failed to parse submissions page: {}", e)))?;
    Ok(page.into_filings(cik))
}

// ===== SEC API Response Types =====

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    #[serde(default)]
    name: Option<String>,
    filings: FilingsSection,
}

#[derive(Debug, Deserialize)]
struct FilingsSection {
    recent: FilingColumns,
    #[serde(default)]
    files: Vec<PageFile>,
}

#[derive(Debug, Deserialize)]
struct PageFile {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FilingColumns {
    accession_number: Vec<String>,
    filing_date: Vec<String>,
    report_date: Vec<String>,
    acceptance_date_time: Vec<String>,
    act: Vec<String>,
    form: Vec<String>,
    file_number: Vec<String>,
    film_number: Vec<String>,
    items: Vec<String>,
    size: Vec<u64>,
}

impl FilingColumns {
    fn into_filings(self, cik: Cik) -> Vec<FilingMetadata> {
        let text = |column: &[String], i: usize| {
            column
                .get(i)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let date = |column: &[String], i: usize| {
            column
                .get(i)
                .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
        };

        let mut filings = Vec::new();
        for (i, accession) in self.accession_number.iter().enumerate() {
            let Some(form) = self.form.get(i).and_then(|form| FormType::parse(form)) else {
                continue;
            };
            let mut filing = FilingMetadata::new(cik, accession.trim(), form);
            filing.filing_date = date(&self.filing_date, i);
            filing.report_date = date(&self.report_date, i);
            filing.acceptance_date_time = text(&self.acceptance_date_time, i);
            filing.act = text(&self.act, i);
            filing.file_number = text(&self.file_number, i);
            filing.film_number = text(&self.film_number, i);
            filing.items = text(&self.items, i);
            filing.size = self.size.get(i).copied();
            filings.push(filing);
        }
        filings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMISSIONS: &str = r#"{
        "cik": "320193",
        "name": "Apple Inc.",
        "filings": {
            "recent": {
                "accessionNumber": ["0000320193-23-000077", "0000320193-23-000064", "0000320193-23-000106"],
                "filingDate": ["2023-08-10", "2023-08-04", "2023-11-03"],
                "reportDate": ["", "2023-07-01", "2023-09-30"],
                "acceptanceDateTime": ["2023-08-10T18:31:30.000Z", "2023-08-04T18:03:00.000Z", "2023-11-02T18:08:27.000Z"],
                "act": ["", "34", "34"],
                "form": ["4", "10-Q", "10-K"],
                "fileNumber": ["", "001-36743", "001-36743"],
                "filmNumber": ["", "231144356", "231373899"],
                "items": ["", "", ""],
                "size": [5000, 5731810, 9500000]
            },
            "files": [
                {"name": "CIK0000320193-submissions-001.json", "filingCount": 1190}
            ]
        }
    }"#;

    #[test]
    fn test_keeps_only_periodic_reports() {
        let index = parse_submissions(Cik::new(320193), SUBMISSIONS.as_bytes()).unwrap();
        assert_eq!(index.name.as_deref(), Some("Apple Inc."));
        assert_eq!(index.filings.len(), 2);
        assert_eq!(index.pages, vec!["CIK0000320193-submissions-001.json"]);

        let quarterly = &index.filings[0];
        assert_eq!(quarterly.accession_number, "0000320193-23-000064");
        assert_eq!(quarterly.form, FormType::TenQ);
        assert_eq!(quarterly.report_date, NaiveDate::from_ymd_opt(2023, 7, 1));
        assert_eq!(quarterly.filing_date, NaiveDate::from_ymd_opt(2023, 8, 4));
        assert_eq!(quarterly.file_number.as_deref(), Some("001-36743"));
        assert_eq!(quarterly.items, None);
        assert_eq!(quarterly.size, Some(5731810));

        assert_eq!(index.filings[1].form, FormType::TenK);
    }

    #[test]
    fn test_page_has_columns_at_top_level() {
        let page = r#"{
            "accessionNumber": ["0000320193-10-000012"],
            "filingDate": ["2010-01-25"],
            "reportDate": ["2009-12-26"],
            "form": ["10-Q"]
        }"#;
        let filings = parse_submission_page(Cik::new(320193), page.as_bytes()).unwrap();
        assert_eq!(filings.len(), 1);
        assert_eq!(filings[0].report_date, NaiveDate::from_ymd_opt(2009, 12, 26));
        assert_eq!(filings[0].size, None);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let err = parse_submissions(Cik::new(1), b"not json").unwrap_err();
        assert!(matches!(err, FilingError::Parse(_)));
    }
}
