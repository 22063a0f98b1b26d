//! Column-major table with declared column types.

use super::{ColumnType, CustomerRecord, FieldValue};
use crate::error::{ChurnError, Result};
use std::collections::HashSet;

/// A named, typed column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: ColumnType,
    values: Vec<FieldValue>,
}

impl Column {
    /// Create a column, inferring its type from the values.
    pub fn new(name: impl Into<String>, values: Vec<FieldValue>) -> Self {
        let dtype = ColumnType::infer(&values);
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub(crate) fn categorical(name: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Self {
            name: name.into(),
            dtype: ColumnType::Categorical,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> ColumnType {
        self.dtype
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column-major dataset.
///
/// Every column has the same number of rows and column names are unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table from columns.
    ///
    /// # Errors
    /// Returns [`ChurnError::InvalidParameter`] if column lengths differ or a
    /// column name is duplicated.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != n_rows {
                return Err(ChurnError::InvalidParameter(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    n_rows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ChurnError::InvalidParameter(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            ChurnError::Schema(format!("dataset has no column named '{}'", name))
        })
    }

    /// Materialize row `row` as a record.
    pub fn record(&self, row: usize) -> CustomerRecord {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.values[row].clone()))
            .collect()
    }

    /// New table holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                dtype: c.dtype,
                values: rows.iter().map(|&r| c.values[r].clone()).collect(),
            })
            .collect();
        Table {
            columns,
            n_rows: rows.len(),
        }
    }

    /// Remove a column and return it.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.column_index(name)?;
        Some(self.columns.remove(idx))
    }

    /// Coerce a column to numbers and drop the rows where that fails.
    ///
    /// Blank and unparseable cells both count as failures, so after this call
    /// the column is numeric with no missing values. Returns the number of
    /// dropped rows.
    pub fn coerce_numeric(&mut self, name: &str) -> Result<usize> {
        let idx = self.require_column(name)?;
        let parsed: Vec<Option<f64>> = self.columns[idx]
            .values
            .iter()
            .map(|v| v.coerce_number().ok().flatten())
            .collect();

        let keep: Vec<usize> = parsed
            .iter()
            .enumerate()
            .filter_map(|(row, v)| v.map(|_| row))
            .collect();
        let dropped = self.n_rows - keep.len();

        let mut filtered = self.select_rows(&keep);
        filtered.columns[idx] = Column {
            name: name.to_string(),
            dtype: ColumnType::Numeric,
            values: keep
                .iter()
                .filter_map(|&row| parsed[row].map(FieldValue::Float))
                .collect(),
        };
        *self = filtered;
        Ok(dropped)
    }

    /// Map a textual label column to `{0, 1}`.
    ///
    /// Text equal to `positive` maps to 1, numeric cells equal to 1 map to 1,
    /// everything else maps to 0.
    pub fn binary_labels(&self, name: &str, positive: &str) -> Result<Vec<u8>> {
        let idx = self.require_column(name)?;
        Ok(self.columns[idx]
            .values
            .iter()
            .map(|v| match v {
                FieldValue::Text(s) if s.trim() == positive => 1,
                FieldValue::Int(1) => 1,
                FieldValue::Float(f) if *f == 1.0 => 1,
                _ => 0,
            })
            .collect())
    }
}
