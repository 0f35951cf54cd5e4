//! Integration tests for classification and multi-filing merges.

use filings_core::{
    ClassificationRules, ColumnKey, FilingError, MetadataField, SectionMarker, StatementMatrix,
    StructuralError, classify, clean_numeric, combine_two_filings, fold_filings, from_csv,
    level_two, lookup, merge_batch, normalize_filing, to_csv_string,
};

fn owned(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|cells| cells.iter().map(|cell| (*cell).to_string()).collect())
        .collect()
}

/// Filing A: one quarterly column ending 2023-03-31.
fn filing_a() -> StatementMatrix {
    StatementMatrix::new(owned(&[
        &["accessionNumber", "0000000001-23-000001"],
        &["form", "10-Q"],
        &["reportDate", "20230331"],
        &["denomination", "Millions"],
        &["reportPeriod", "3"],
        &["reportDuration", "3 Months Ended"],
        &["separator", ""],
        &["CURRENT ASSETS:", ""],
        &["Cash and cash equivalents", "120"],
        &["Accounts receivable, net", "80"],
        &["Total current assets", "200"],
        &["Property, plant and equipment, net", "500"],
        &["Total assets", "700"],
        &["Current liabilities:", ""],
        &["Accounts payable", "60"],
        &["Total current liabilities", "60"],
        &["Long-term debt", "240"],
        &["Total liabilities", "300"],
        &["Shareholders' equity:", ""],
        &["Common stock", "250"],
        &["Retained earnings", "150"],
        &["Total shareholders' equity", "400"],
        &["Total liabilities and shareholders' equity", "700"],
    ]))
    .unwrap()
}

/// Filing B: a quarterly and a six-month column, both ending 2023-06-30.
fn filing_b() -> StatementMatrix {
    StatementMatrix::new(owned(&[
        &["accessionNumber", "0000000001-23-000002", "0000000001-23-000002"],
        &["form", "10-Q", "10-Q"],
        &["reportDate", "20230630", "20230630"],
        &["denomination", "Millions", "Millions"],
        &["reportPeriod", "6", "3"],
        &["reportDuration", "6 Months Ended", "3 Months Ended"],
        &["separator", "", ""],
        &["Current assets", "", ""],
        &["Cash and cash equivalents", "130", "130"],
        &["Short-term investments", "15", "15"],
        &["Receivables", "85", "85"],
        &["Total current assets", "230", "230"],
        &["Property, plant and equipment, net", "510", "510"],
        &["Total assets", "740", "740"],
        &["Current liabilities", "", ""],
        &["Accounts payable", "70", "70"],
        &["Total current liabilities", "70", "70"],
        &["Long-term debt", "250", "250"],
        &["Total liabilities", "320", "320"],
        &["Stockholders' equity", "", ""],
        &["Common stock", "250", "250"],
        &["Retained earnings", "170", "170"],
        &["Total stockholders' equity", "420", "420"],
        &["Total liabilities and stockholders' equity", "740", "740"],
    ]))
    .unwrap()
}

fn labels(matrix: &StatementMatrix) -> Vec<&str> {
    matrix.data_rows().map(|row| matrix.label(row)).collect()
}

fn position(matrix: &StatementMatrix, label: &str) -> usize {
    matrix
        .data_rows()
        .find(|&row| matrix.label(row) == label)
        .unwrap()
}

#[test]
fn test_two_filing_merge_end_to_end() {
    let rules = ClassificationRules::default();
    assert!(classify(&filing_a(), &rules).is_ok());
    assert!(classify(&filing_b(), &rules).is_ok());

    let merged = combine_two_filings(&filing_a(), &filing_b(), &rules).unwrap();

    // Reporting columns: A 3m 3/31, B 3m 6/30, B 6m 6/30.
    assert_eq!(
        merged.column_keys().unwrap(),
        vec![
            ColumnKey::new("0000000001-23-000001", "20230331", "3"),
            ColumnKey::new("0000000001-23-000002", "20230630", "3"),
            ColumnKey::new("0000000001-23-000002", "20230630", "6"),
        ]
    );
    assert_eq!(merged.metadata(MetadataField::Denomination, 3), Some("Millions"));
    assert_eq!(
        merged.metadata(MetadataField::ReportDuration, 3),
        Some("6 Months Ended")
    );

    // B-only items appear once, after A's items of the same section.
    let short_term = position(&merged, "Short-term investments");
    assert!(position(&merged, "Accounts receivable, net") < short_term);
    assert!(short_term < position(&merged, "Total Current Assets"));
    assert_eq!(
        labels(&merged)
            .iter()
            .filter(|label| **label == "Short-term investments")
            .count(),
        1
    );

    // Same concept under different labels stays as two rows.
    let receivable = position(&merged, "Accounts receivable, net");
    let receivables = position(&merged, "Receivables");
    assert_ne!(receivable, receivables);
    assert_eq!(merged.rows()[receivable][1..], ["80", "", ""]);
    assert_eq!(merged.rows()[receivables][1..], ["", "85", "85"]);

    // Differently worded headings collapse into the canonical skeleton.
    assert_eq!(labels(&merged)[0], "Current Assets");
    let equity = position(&merged, SectionMarker::StockholdersEquity.canonical_label());
    assert!(equity > position(&merged, "Total Liabilities"));

    let b_quarter = ColumnKey::new("0000000001-23-000002", "20230630", "3");
    assert_eq!(
        lookup(&merged, "Total Stockholders' Equity", &b_quarter),
        Some("420".to_string())
    );
}

#[test]
fn test_merge_with_itself_adds_no_line_items() {
    let rules = ClassificationRules::default();
    let single = normalize_filing(&filing_b(), &rules).unwrap();
    let doubled = combine_two_filings(&filing_b(), &filing_b(), &rules).unwrap();

    assert_eq!(labels(&doubled), labels(&single));
    for key in doubled.column_keys().unwrap() {
        for row in doubled.data_rows() {
            let label = doubled.label(row);
            assert_eq!(lookup(&doubled, label, &key), lookup(&single, label, &key));
        }
    }
    assert_eq!(level_two(&doubled).unwrap(), level_two(&single).unwrap());
}

#[test]
fn test_fold_is_reclassifiable() {
    let rules = ClassificationRules::default();
    let merged = fold_filings(&[filing_a(), filing_b(), filing_a()], &rules).unwrap();
    assert!(classify(&merged, &rules).is_ok());
    assert_eq!(merged.width(), 5);

    // Level two keeps the latest column per period length.
    let collapsed = level_two(&merged).unwrap();
    assert_eq!(
        collapsed.column_keys().unwrap(),
        vec![
            ColumnKey::new("0000000001-23-000002", "20230630", "3"),
            ColumnKey::new("0000000001-23-000002", "20230630", "6"),
        ]
    );
}

#[test]
fn test_batch_reports_structural_failures() {
    let rules = ClassificationRules::default();
    let mut rows = filing_b().into_rows();
    rows.swap(13, 14);
    let broken = StatementMatrix::new(rows).unwrap();

    let report = merge_batch(&[filing_a(), broken], &rules);
    assert_eq!(report.included, vec!["0000000001-23-000001"]);
    assert_eq!(report.excluded.len(), 1);
    match &report.excluded[0].reason {
        FilingError::Structural {
            accession,
            source: StructuralError::OutOfOrder { earlier, later, .. },
        } => {
            assert_eq!(accession, "0000000001-23-000002");
            assert_eq!(*earlier, SectionMarker::TotalAssets);
            assert_eq!(*later, SectionMarker::CurrentLiabilities);
        }
        other => panic!("unexpected exclusion: {other}"),
    }
}

#[test]
fn test_combined_equity_total_survives_batch() {
    let rules = ClassificationRules::default();
    // Filing A without its own equity total: the grand total closes the equity block.
    let mut rows = filing_a().into_rows();
    rows.remove(21);
    rows[21][0] = "Total liabilities and total equity".to_string();
    let combined = StatementMatrix::new(rows).unwrap();

    let report = merge_batch(&[combined, filing_b()], &rules);
    assert!(report.is_complete());
    assert_eq!(
        report.included,
        vec!["0000000001-23-000001", "0000000001-23-000002"]
    );

    let merged = report.merged.unwrap();
    assert!(classify(&merged, &rules).is_ok());
    let a_quarter = ColumnKey::new("0000000001-23-000001", "20230331", "3");
    assert_eq!(
        lookup(&merged, "Total Stockholders' Equity", &a_quarter),
        Some("700".to_string())
    );
    let b_quarter = ColumnKey::new("0000000001-23-000002", "20230630", "3");
    assert_eq!(
        lookup(&merged, "Total Stockholders' Equity", &b_quarter),
        Some("420".to_string())
    );
}

#[test]
fn test_resolver_keeps_clean_numbers() {
    assert_eq!(
        clean_numeric("-228us-gaap_AccumulatedOtherComprehensiveIncomeLossNetOfTax"),
        "-228"
    );
    assert_eq!(clean_numeric("-1234"), "-1234");
    assert_eq!(clean_numeric("1234.50"), "1234.50");
}

#[test]
fn test_csv_roundtrip_of_merged_matrix() {
    let rules = ClassificationRules::default();
    let merged = combine_two_filings(&filing_a(), &filing_b(), &rules).unwrap();
    let text = to_csv_string(&merged).unwrap();
    assert!(text.contains("\"Property, plant and equipment, net\",500,510,510"));
    assert_eq!(from_csv(text.as_bytes()).unwrap(), merged);
}
