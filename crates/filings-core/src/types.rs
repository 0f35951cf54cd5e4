//! Filing metadata types.
//!
//! - [`Cik`] - SEC Central Index Key
//! - [`FormType`] - Periodic report form (10-K or 10-Q)
//! - [`StatementKind`] - Statement categories found in a filing
//! - [`StatementFile`] - One R-file discovered for a statement kind
//! - [`FilingMetadata`] - Per-filing record kept in the metadata store

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::FilingError;

/// SEC Central Index Key.
///
/// Stored as a number; leading zeros are only added back by [`Cik::padded`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Cik(u64);

impl Cik {
    /// Creates a CIK from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the ten-digit zero-padded form used by `data.sec.gov`.
    #[must_use]
    pub fn padded(self) -> String {
        format!("{:010}", self.0)
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cik {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches("CIK");
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FilingError::InvalidParameter(format!("Invalid CIK: {}", s)));
        }
        digits
            .parse()
            .map(Self)
            .map_err(|e| FilingError::InvalidParameter(format!("Invalid CIK {}: {}", s, e)))
    }
}

impl From<u64> for Cik {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Periodic report form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    /// Annual report.
    #[serde(rename = "10-K")]
    TenK,
    /// Quarterly report.
    #[serde(rename = "10-Q")]
    TenQ,
}

impl FormType {
    /// Returns the form name as filed.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TenK => "10-K",
            Self::TenQ => "10-Q",
        }
    }

    /// Months covered by a column when the header does not say.
    #[must_use]
    pub const fn default_period_months(self) -> u32 {
        match self {
            Self::TenK => 12,
            Self::TenQ => 3,
        }
    }

    /// Parses a form name, returning `None` for anything but `10-K` and `10-Q`.
    #[must_use]
    pub fn parse(form: &str) -> Option<Self> {
        match form.trim() {
            "10-K" => Some(Self::TenK),
            "10-Q" => Some(Self::TenQ),
            _ => None,
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statement categories recognized in a filing's R-file listing.
///
/// Only balance sheets are classified and merged; the other kinds are recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatementKind {
    /// Balance sheet.
    BalanceSheet,
    /// Income statement.
    IncomeStatement,
    /// Statement of comprehensive income.
    ComprehensiveIncome,
    /// Cash flow statement.
    CashFlow,
}

impl StatementKind {
    /// All kinds in categorization order.
    pub const ALL: [Self; 4] = [
        Self::BalanceSheet,
        Self::IncomeStatement,
        Self::ComprehensiveIncome,
        Self::CashFlow,
    ];

    /// Short code used in logs and storage.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BalanceSheet => "BS",
            Self::IncomeStatement => "IS",
            Self::ComprehensiveIncome => "CIS",
            Self::CashFlow => "CF",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An R-file listed in a filing summary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementFile {
    /// Document name inside the filing folder (e.g. `R2.htm`).
    pub file_name: String,
    /// Long report name (e.g. `0000002 - Statement - CONSOLIDATED BALANCE SHEETS`).
    pub long_name: String,
    /// Short report name (e.g. `CONSOLIDATED BALANCE SHEETS`).
    pub short_name: String,
    /// Menu category (`Statements`, `Notes`, ...).
    pub menu_category: String,
}

/// Metadata of one 10-K or 10-Q filing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingMetadata {
    /// Filer.
    pub cik: Cik,
    /// Accession number with dashes (e.g. `0000320193-23-000064`).
    pub accession_number: String,
    /// Form type.
    pub form: FormType,
    /// Date the filing was submitted.
    pub filing_date: Option<NaiveDate>,
    /// Period end date of the report.
    pub report_date: Option<NaiveDate>,
    /// Acceptance timestamp as published.
    pub acceptance_date_time: Option<String>,
    /// Securities act.
    pub act: Option<String>,
    /// SEC file number.
    pub file_number: Option<String>,
    /// Film number.
    pub film_number: Option<String>,
    /// Form 8-K style item list; usually empty for periodic reports.
    pub items: Option<String>,
    /// Size of the submission in bytes.
    pub size: Option<u64>,
    /// R-files discovered per statement kind.
    #[serde(default)]
    pub statement_files: BTreeMap<StatementKind, StatementFile>,
}

impl FilingMetadata {
    /// Creates metadata with required fields.
    #[must_use]
    pub fn new(cik: Cik, accession_number: impl Into<String>, form: FormType) -> Self {
        Self {
            cik,
            accession_number: accession_number.into(),
            form,
            filing_date: None,
            report_date: None,
            acceptance_date_time: None,
            act: None,
            file_number: None,
            film_number: None,
            items: None,
            size: None,
            statement_files: BTreeMap::new(),
        }
    }

    /// Sets the report date.
    #[must_use]
    pub fn with_report_date(mut self, report_date: NaiveDate) -> Self {
        self.report_date = Some(report_date);
        self
    }

    /// Sets the filing date.
    #[must_use]
    pub fn with_filing_date(mut self, filing_date: NaiveDate) -> Self {
        self.filing_date = Some(filing_date);
        self
    }

    /// Accession number without dashes, as used in archive paths.
    #[must_use]
    pub fn accession_path(&self) -> String {
        self.accession_number.replace('-', "")
    }

    /// The R-file recorded for a statement kind.
    #[must_use]
    pub fn statement_file(&self, kind: StatementKind) -> Option<&StatementFile> {
        self.statement_files.get(&kind)
    }
}
