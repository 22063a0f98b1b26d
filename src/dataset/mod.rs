//! Tabular data: cell values, customer records and column-major tables.
//!
//! # Core Concepts
//!
//! - [`FieldValue`] — one scalar cell (integer, float, text or missing).
//! - [`CustomerRecord`] — one customer as a column-name → value mapping; the
//!   unit the inference service works on.
//! - [`Table`] — a column-major dataset whose columns carry a declared
//!   [`ColumnType`], inferred once when the data is loaded.
//!
//! # Example
//!
//! ```rust
//! use churn_predictor::dataset::Table;
//!
//! let csv = "customerID,tenure,Contract,Churn\nA-1,5,Month-to-month,Yes\nB-2,40,Two year,No\n";
//! let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
//! assert_eq!(table.n_rows(), 2);
//! assert!(table.column("tenure").unwrap().dtype().is_numeric());
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

mod loader;
pub mod split;
mod table;

pub use split::{stratified_split, SplitIndices};
pub use table::{Column, Table};

/// One scalar cell of a record or table.
///
/// Deserializes untagged from JSON, so `5`, `29.85`, `"Yes"` and `null` map to
/// `Int`, `Float`, `Text` and `Missing` respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// Parse a raw CSV cell. Blank cells become `Missing`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return FieldValue::Missing;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return FieldValue::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => FieldValue::Float(v),
            _ => FieldValue::Text(raw.to_string()),
        }
    }

    /// `Missing`, or text that is empty after trimming.
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Whether this cell already holds a number.
    pub fn is_number(&self) -> bool {
        matches!(self, FieldValue::Int(_) | FieldValue::Float(_))
    }

    /// Coerce to a number.
    ///
    /// Returns `Ok(None)` for missing cells and `Err` with a reason when the
    /// cell holds text that is not a finite number.
    pub fn coerce_number(&self) -> Result<Option<f64>, String> {
        match self {
            FieldValue::Int(i) => Ok(Some(*i as f64)),
            FieldValue::Float(v) if v.is_finite() => Ok(Some(*v)),
            FieldValue::Float(v) => Err(format!("{} is not a finite number", v)),
            FieldValue::Missing => Ok(None),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(Some(v)),
                    _ => Err(format!("could not parse '{}' as a number", s)),
                }
            }
        }
    }

    /// Canonical category label, or `None` for a missing cell.
    ///
    /// Numbers render without a trailing `.0`, so `Int(1)` and `Float(1.0)`
    /// both map to `"1"`.
    pub fn category(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Text(s) if s.trim().is_empty() => None,
            FieldValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            FieldValue::Int(i) => Some(Cow::Owned(i.to_string())),
            FieldValue::Float(v) => Some(Cow::Owned(v.to_string())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Missing => write!(f, ""),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// Declared semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
}

impl ColumnType {
    /// A column is numeric when every non-missing cell is a number.
    ///
    /// A column with no observed values is numeric too (an all-NaN column
    /// in a dataframe is a float column).
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a FieldValue>) -> Self {
        let all_numbers = values
            .into_iter()
            .filter(|v| !v.is_missing())
            .all(FieldValue::is_number);
        if all_numbers {
            ColumnType::Numeric
        } else {
            ColumnType::Categorical
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Numeric)
    }
}

/// One customer: column name → cell value.
///
/// Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerRecord(BTreeMap<String, FieldValue>);

impl CustomerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(column.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        self.0.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for CustomerRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
