//! CSV loading.

use super::{Column, ColumnType, FieldValue, Table};
use crate::error::{ChurnError, Result};
use std::io::Read;
use std::path::Path;

impl Table {
    /// Load a headered CSV file.
    ///
    /// Column types are inferred from the cells (see
    /// [`ColumnType::infer`](super::ColumnType::infer)).
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ChurnError::Io(format!("failed to open dataset {}: {}", path.display(), e))
        })?;
        let table = Self::from_csv_reader(file)?;
        log::info!(
            "Loaded dataset {} ({} rows, {} columns)",
            path.display(),
            table.n_rows(),
            table.n_cols()
        );
        Ok(table)
    }

    /// Load headered CSV from any reader.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(ChurnError::Csv("CSV input has no header row".to_string()));
        }

        let mut raw_cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(ChurnError::Csv(format!(
                    "row {} has {} fields, expected {}",
                    line + 1,
                    record.len(),
                    headers.len()
                )));
            }
            for (col, raw) in record.iter().enumerate() {
                raw_cells[col].push(raw.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw_cells)
            .map(|(name, raw)| typed_column(name, raw))
            .collect();
        Table::from_columns(columns)
    }
}

/// Parse one column of raw cells.
///
/// Categorical columns keep the cell text as written: `"01"` stays `"01"`
/// rather than becoming `Int(1)`, so the fitted vocabulary matches what a
/// caller sends at prediction time.
fn typed_column(name: String, raw: Vec<String>) -> Column {
    let parsed: Vec<FieldValue> = raw.iter().map(|cell| FieldValue::parse(cell)).collect();
    match ColumnType::infer(&parsed) {
        ColumnType::Numeric => Column::new(name, parsed),
        ColumnType::Categorical => {
            let text = raw
                .into_iter()
                .map(|cell| {
                    if cell.trim().is_empty() {
                        FieldValue::Missing
                    } else {
                        FieldValue::Text(cell)
                    }
                })
                .collect();
            Column::categorical(name, text)
        }
    }
}
