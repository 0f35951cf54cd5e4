//! Polars export.
//!
//! [`to_frame`] turns a statement matrix into a [`DataFrame`] with one `line_item`
//! column and one `f64` column per reporting column, named after its
//! [`ColumnKey`](crate::matrix::ColumnKey). Cells that are empty or not numeric become
//! nulls, never zero.

use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use crate::{
    error::{FilingError, Result},
    matrix::StatementMatrix,
};

/// Name of the label column.
pub const LINE_ITEM_COLUMN: &str = "line_item";

fn parse_value(cell: &str) -> Option<f64> {
    cell.trim().parse().ok()
}

/// Builds a DataFrame from the data rows of a matrix.
///
/// # Errors
/// Returns [`FilingError::Consistency`] if a column key cannot be read, or
/// [`FilingError::Output`] if polars rejects the frame.
pub fn to_frame(matrix: &StatementMatrix) -> Result<DataFrame> {
    let rows = matrix.rows();
    let data = &rows[matrix.data_rows()];

    let labels: Vec<&str> = data.iter().map(|cells| cells[0].as_str()).collect();
    let mut columns = vec![Column::new(LINE_ITEM_COLUMN.into(), labels)];

    let mut seen: HashMap<String, usize> = HashMap::new();
    for column in matrix.reporting_columns() {
        let base = matrix.column_key(column)?.to_string();
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let name = if *count == 1 {
            base
        } else {
            format!("{}_{}", base, count)
        };

        let values: Vec<Option<f64>> = data
            .iter()
            .map(|cells| parse_value(&cells[column]))
            .collect();
        columns.push(Column::new(name.into(), values));
    }

    DataFrame::new(columns).map_err(|e| FilingError::Output(e.to_string()))
}

/// Writes a matrix as a Parquet file.
///
/// # Errors
/// Returns [`FilingError::Output`] if the file cannot be created or written.
pub fn write_parquet(matrix: &StatementMatrix, path: impl AsRef<Path>) -> Result<()> {
    let mut frame = to_frame(matrix)?;
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .map_err(|e| FilingError::Output(format!("Cannot create {}: {}", path.display(), e)))?;
    ParquetWriter::new(file)
        .finish(&mut frame)
        .map_err(|e| FilingError::Output(e.to_string()))?;
    Ok(())
}
