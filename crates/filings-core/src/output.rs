//! CSV reading and writing.
//!
//! A matrix is written row by row with no header line, so metadata rows, the separator
//! and data rows round-trip through the same file.

use std::io::{Read, Write};

use crate::{
    error::{FilingError, Result},
    matrix::StatementMatrix,
};

/// Writes every row of a matrix as CSV.
///
/// Fields containing the delimiter, a quote or a newline are quoted with doubled quotes.
///
/// # Errors
/// Returns [`FilingError::Output`] if writing fails.
pub fn to_csv<W: Write>(matrix: &StatementMatrix, writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    for row in matrix.rows() {
        csv.write_record(row)
            .map_err(|e| FilingError::Output(e.to_string()))?;
    }
    csv.flush().map_err(|e| FilingError::Output(e.to_string()))
}

/// Renders a matrix as a CSV string.
///
/// # Errors
/// Returns [`FilingError::Output`] if serialization fails.
pub fn to_csv_string(matrix: &StatementMatrix) -> Result<String> {
    let mut buffer = Vec::new();
    to_csv(matrix, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| FilingError::Output(e.to_string()))
}

/// Reads a matrix written by [`to_csv`] (or any headerless CSV in the same layout).
///
/// # Errors
/// Returns [`FilingError::Parse`] for malformed CSV and [`FilingError::Consistency`]
/// if the rows do not form a valid matrix.
pub fn from_csv<R: Read>(reader: R) -> Result<StatementMatrix> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record.map_err(|e| FilingError::Parse(format!("Invalid CSV: {}", e)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(StatementMatrix::new(rows)?)
}
