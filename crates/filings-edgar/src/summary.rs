//! FilingSummary.xml reader and R-file categorization.
//!
//! Every XBRL filing ships a `FilingSummary.xml` listing its rendered reports (`R1.htm`,
//! `R2.htm`, ...). [`parse_filing_summary`] reads the `MyReports/Report` entries and
//! [`categorize`] picks the R-file of each financial statement by report name.

use std::collections::BTreeMap;

use filings_core::rules::normalize;
use filings_core::{FilingError, MatchRule, Result, StatementFile, StatementKind};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the summary document inside a filing folder.
pub const FILING_SUMMARY: &str = "FilingSummary.xml";

/// One `Report` entry of a filing summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportEntry {
    /// `HtmlFileName` (e.g. `R2.htm`).
    pub html_file_name: Option<String>,
    /// `XmlFileName` used by older filings (e.g. `R2.xml`).
    pub xml_file_name: Option<String>,
    /// `LongName`.
    pub long_name: String,
    /// `ShortName`.
    pub short_name: String,
    /// `MenuCategory`.
    pub menu_category: String,
    /// `Position`.
    pub position: Option<u32>,
}

impl ReportEntry {
    /// The R-file name, preferring the HTML rendering.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.html_file_name
            .as_deref()
            .or(self.xml_file_name.as_deref())
    }

    fn set(&mut self, field: &[u8], text: &str) {
        let append = |target: &mut String| target.push_str(text);
        match field {
            b"HtmlFileName" => append(self.html_file_name.get_or_insert_with(String::new)),
            b"XmlFileName" => append(self.xml_file_name.get_or_insert_with(String::new)),
            b"LongName" => append(&mut self.long_name),
            b"ShortName" => append(&mut self.short_name),
            b"MenuCategory" => append(&mut self.menu_category),
            b"Position" => self.position = text.trim().parse().ok(),
            _ => {}
        }
    }
}

/// Reads the report entries of a `FilingSummary.xml`, in document order.
///
/// # Errors
/// Returns [`FilingError::Parse`] if the document is not well-formed XML.
pub fn parse_filing_summary(xml: &[u8]) -> Result<Vec<ReportEntry>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut reports = Vec::new();
    let mut current: Option<ReportEntry> = None;
    let mut field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"Report" => current = Some(ReportEntry::default()),
                name => field = Some(name.to_vec()),
            },
            Ok(Event::Text(t)) => {
                if let (Some(report), Some(name)) = (current.as_mut(), field.as_deref()) {
                    let text = t.unescape().map_err(|e| {
                        FilingError::Parse(format!("Invalid {}: {}", FILING_SUMMARY, e))
                    })?;
                    report.set(name, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(report), Some(name)) = (current.as_mut(), field.as_deref()) {
                    report.set(name, &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"Report" {
                    reports.extend(current.take());
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(FilingError::Parse(format!(
                    "Invalid {} at byte {}: {}",
                    FILING_SUMMARY,
                    reader.buffer_position(),
                    e
                )));
            }
        }
        buf.clear();
    }

    debug!("Read {} reports from {}", reports.len(), FILING_SUMMARY);
    Ok(reports)
}

/// Report-name rules per statement kind.
///
/// A report belongs to the first kind (in [`StatementKind::ALL`] order) whose `any_of`
/// names appear in its long name; it is then dropped if that kind's `none_of` terms appear
/// too. Names are compared after [`normalize`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRules {
    /// Balance sheet names and exclusions.
    pub balance_sheet: MatchRule,
    /// Income statement names and exclusions.
    pub income_statement: MatchRule,
    /// Comprehensive income names and exclusions.
    pub comprehensive_income: MatchRule,
    /// Cash flow names and exclusions.
    pub cash_flow: MatchRule,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            balance_sheet: MatchRule::new(["Balance Sheet", "Financial Position"]).excluding([
                "Parenthetical",
                "Derivative",
                "Fair",
                "Current",
                "Detail",
                "Disclosure",
            ]),
            income_statement: MatchRule::new([
                "Income Statement",
                "Statements of Income",
                "Statement of Income",
                "Statements of Operation",
                "Statement of Operation",
                "Statements of Operations and Comprehensive",
                "Statement of Operations and Comprehensive",
            ])
            .excluding(["Detail", "Notes"]),
            comprehensive_income: MatchRule::new([
                "Statements of Comprehensive Income",
                "Statement of Comprehensive Income",
                "Comprehensive Income",
                "Comprehensive Loss",
            ])
            .excluding(["Detail", "Disclosure", "Notes"]),
            cash_flow: MatchRule::new([
                "Statements of Cash Flows",
                "Statement of Cash Flows",
                "Statement of Cash Flow",
            ])
            .excluding(["Detail", "Notes"]),
        }
    }
}

impl CategoryRules {
    /// The rule for one statement kind.
    #[must_use]
    pub const fn rule(&self, kind: StatementKind) -> &MatchRule {
        match kind {
            StatementKind::BalanceSheet => &self.balance_sheet,
            StatementKind::IncomeStatement => &self.income_statement,
            StatementKind::ComprehensiveIncome => &self.comprehensive_income,
            StatementKind::CashFlow => &self.cash_flow,
        }
    }

    /// Categorizes a report by its long name.
    #[must_use]
    pub fn kind_of(&self, long_name: &str) -> Option<StatementKind> {
        let name = normalize(long_name);
        let contains = |terms: &[String]| terms.iter().any(|term| name.contains(&normalize(term)));

        let kind = StatementKind::ALL
            .into_iter()
            .find(|&kind| contains(&self.rule(kind).any_of))?;
        (!contains(&self.rule(kind).none_of)).then_some(kind)
    }
}

/// Picks the R-file of each statement kind.
///
/// The first matching report of a kind wins; reports without a file name are skipped.
#[must_use]
pub fn categorize(
    reports: &[ReportEntry],
    rules: &CategoryRules,
) -> BTreeMap<StatementKind, StatementFile> {
    let mut files = BTreeMap::new();
    for report in reports {
        let (Some(file_name), Some(kind)) = (report.file_name(), rules.kind_of(&report.long_name))
        else {
            continue;
        };
        files.entry(kind).or_insert_with(|| StatementFile {
            file_name: file_name.trim().to_string(),
            long_name: report.long_name.clone(),
            short_name: report.short_name.clone(),
            menu_category: report.menu_category.clone(),
        });
    }
    files
}
