//! Column-wise transformation pipeline.
//!
//! Numeric columns are imputed then standard-scaled; categorical columns are
//! imputed then one-hot encoded. Output layout is fixed at fit time: one
//! feature per numeric column in schema order, followed by one indicator block
//! per categorical column in schema order.
//!
//! # Example
//! ```ignore
//! use churn_predictor::preprocessing::{derive_schema, TransformationPipeline};
//!
//! let schema = derive_schema(&train, "Churn", &["customerID"])?;
//! let pipeline = TransformationPipeline::new().fit(&train, &schema)?;
//!
//! let x_train = pipeline.transform_table(&train)?;
//! let features = pipeline.transform_record(&record)?;
//! ```

use crate::dataset::{CustomerRecord, FieldValue, Table};
use crate::error::{ChurnError, Result, TransformError};
use crate::preprocessing::encoding::{FittedOneHotEncoder, OneHotEncoder};
use crate::preprocessing::imputation::{
    CategoricalImputer, FittedCategoricalImputer, FittedSimpleImputer, SimpleImputer,
};
use crate::preprocessing::scaling::{FittedStandardScaler, StandardScaler};
use crate::preprocessing::schema::FeatureSchema;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Unfitted pipeline: the steps applied to every column.
#[derive(Clone, Debug, Default)]
pub struct TransformationPipeline {
    numeric_imputer: SimpleImputer,
    scaler: StandardScaler,
    categorical_imputer: CategoricalImputer,
    encoder: OneHotEncoder,
}

impl TransformationPipeline {
    /// Median imputation, standard scaling, most-frequent imputation and
    /// one-hot encoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit every step on the training table.
    ///
    /// # Errors
    /// - [`ChurnError::Fit`] if the table is empty or a feature column holds
    ///   only missing values.
    /// - [`ChurnError::Transform`] if a schema column is absent from the table,
    ///   or a numeric column holds unparseable text.
    pub fn fit(&self, table: &Table, schema: &FeatureSchema) -> Result<FittedPipeline> {
        if table.is_empty() {
            return Err(ChurnError::Fit {
                column: schema
                    .feature_columns()
                    .next()
                    .unwrap_or(schema.target_column.as_str())
                    .to_string(),
                reason: "training table has no rows".to_string(),
            });
        }
        check_columns_present(table, schema.feature_columns())?;

        let mut numeric = Vec::with_capacity(schema.numeric_columns.len());
        let mut invalid = Vec::new();
        for name in &schema.numeric_columns {
            let values = match numeric_values(table, name) {
                Some(values) => values,
                None => {
                    invalid.push(name.clone());
                    continue;
                }
            };
            let imputer = self.numeric_imputer.fit(name, &values)?;
            let imputed: Vec<f64> = values.iter().map(|&v| imputer.transform(v)).collect();
            let scaler = self.scaler.fit(name, &imputed)?;
            numeric.push(NumericColumnParams {
                name: name.clone(),
                imputer,
                scaler,
            });
        }
        if !invalid.is_empty() {
            return Err(TransformError {
                missing_columns: Vec::new(),
                invalid_columns: invalid,
            }
            .into());
        }

        let mut categorical = Vec::with_capacity(schema.categorical_columns.len());
        for name in &schema.categorical_columns {
            let values = categorical_values(table, name);
            let imputer = self.categorical_imputer.fit(name, &values)?;
            let imputed: Vec<String> = values
                .iter()
                .map(|v| imputer.transform(v.as_deref()).to_string())
                .collect();
            let encoder = self.encoder.fit(name, &imputed)?;
            categorical.push(CategoricalColumnParams {
                name: name.clone(),
                imputer,
                encoder,
            });
        }

        let fitted = FittedPipeline::from_parts(numeric, categorical);
        log::info!(
            "Fitted pipeline on {} rows: {} numeric, {} categorical columns, {} output features",
            table.n_rows(),
            fitted.numeric.len(),
            fitted.categorical.len(),
            fitted.n_features_out()
        );
        Ok(fitted)
    }
}

fn check_columns_present<'a>(
    table: &Table,
    columns: impl Iterator<Item = &'a str>,
) -> std::result::Result<(), TransformError> {
    let missing: Vec<String> = columns
        .filter(|name| table.column(name).is_none())
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TransformError {
            missing_columns: missing,
            invalid_columns: Vec::new(),
        })
    }
}

/// Parsed cells of a numeric column, or `None` if any cell is not a number.
fn numeric_values(table: &Table, name: &str) -> Option<Vec<Option<f64>>> {
    table
        .column(name)?
        .values()
        .iter()
        .map(|v| v.coerce_number().ok())
        .collect()
}

fn categorical_values(table: &Table, name: &str) -> Vec<Option<String>> {
    table
        .column(name)
        .map(|c| {
            c.values()
                .iter()
                .map(|v| v.category().map(|s| s.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Fitted parameters of one numeric column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericColumnParams {
    pub name: String,
    pub imputer: FittedSimpleImputer,
    pub scaler: FittedStandardScaler,
}

impl NumericColumnParams {
    /// Training median, used for missing cells.
    pub fn median(&self) -> f64 {
        self.imputer.statistic
    }

    pub fn mean(&self) -> f64 {
        self.scaler.mean
    }

    pub fn std(&self) -> f64 {
        self.scaler.std
    }
}

/// Fitted parameters of one categorical column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalColumnParams {
    pub name: String,
    pub imputer: FittedCategoricalImputer,
    pub encoder: FittedOneHotEncoder,
}

impl CategoricalColumnParams {
    pub fn most_frequent(&self) -> &str {
        &self.imputer.fill_value
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.encoder.vocabulary
    }
}

/// A category seen at transform time but not during fitting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnseenCategory {
    pub column: String,
    pub value: String,
}

/// Frozen, serializable pipeline.
///
/// Column order and all statistics are fixed at fit time. Transforms take
/// `&self` only, so one instance can serve concurrent callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    numeric: Vec<NumericColumnParams>,
    categorical: Vec<CategoricalColumnParams>,
    n_features_out: usize,
}

impl FittedPipeline {
    fn from_parts(
        numeric: Vec<NumericColumnParams>,
        categorical: Vec<CategoricalColumnParams>,
    ) -> Self {
        let n_features_out = numeric.len()
            + categorical
                .iter()
                .map(|c| c.encoder.n_features_out())
                .sum::<usize>();
        Self {
            numeric,
            categorical,
            n_features_out,
        }
    }

    pub fn numeric_columns(&self) -> &[NumericColumnParams] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumnParams] {
        &self.categorical
    }

    /// Width of every feature vector this pipeline produces.
    pub fn n_features_out(&self) -> usize {
        self.n_features_out
    }

    /// Output feature names: numeric column names, then `column_label` for
    /// each vocabulary entry of each categorical column.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &self.categorical {
            names.extend(
                column
                    .vocabulary()
                    .iter()
                    .map(|label| format!("{}_{}", column.name, label)),
            );
        }
        names
    }

    /// Transform one record into a feature vector.
    ///
    /// # Errors
    /// Returns [`TransformError`] listing every feature column the record
    /// lacks and every numeric column whose value is not a number. Columns not
    /// in the pipeline are ignored; unseen categories encode as zeros.
    pub fn transform_record(
        &self,
        record: &CustomerRecord,
    ) -> std::result::Result<Array1<f64>, TransformError> {
        let mut out = vec![0.0; self.n_features_out];
        self.encode_row(
            self.numeric.iter().map(|c| record.get(&c.name)),
            self.categorical.iter().map(|c| record.get(&c.name)),
            &mut out,
            None,
        )?;
        Ok(Array1::from(out))
    }

    /// [`transform_record`](Self::transform_record), also returning the
    /// categorical values that fell outside the fitted vocabulary.
    pub fn transform_record_with_report(
        &self,
        record: &CustomerRecord,
    ) -> std::result::Result<(Array1<f64>, Vec<UnseenCategory>), TransformError> {
        let mut out = vec![0.0; self.n_features_out];
        let mut unseen = Vec::new();
        self.encode_row(
            self.numeric.iter().map(|c| record.get(&c.name)),
            self.categorical.iter().map(|c| record.get(&c.name)),
            &mut out,
            Some(&mut unseen),
        )?;
        Ok((Array1::from(out), unseen))
    }

    /// Transform every row of a table into an `(n_rows, n_features_out)`
    /// matrix.
    ///
    /// # Errors
    /// Returns [`TransformError`] if a feature column is absent or any numeric
    /// cell cannot be parsed; the error lists every offending column.
    pub fn transform_table(
        &self,
        table: &Table,
    ) -> std::result::Result<Array2<f64>, TransformError> {
        check_columns_present(
            table,
            self.numeric
                .iter()
                .map(|c| c.name.as_str())
                .chain(self.categorical.iter().map(|c| c.name.as_str())),
        )?;

        let numeric_idx: Vec<usize> = self
            .numeric
            .iter()
            .filter_map(|c| table.column_index(&c.name))
            .collect();
        let categorical_idx: Vec<usize> = self
            .categorical
            .iter()
            .filter_map(|c| table.column_index(&c.name))
            .collect();
        let columns = table.columns();

        let mut matrix = Array2::zeros((table.n_rows(), self.n_features_out));
        let mut buffer = vec![0.0; self.n_features_out];
        let mut invalid: Vec<String> = Vec::new();

        for (row, mut out) in matrix.outer_iter_mut().enumerate() {
            buffer.fill(0.0);
            let result = self.encode_row(
                numeric_idx.iter().map(|&i| Some(&columns[i].values()[row])),
                categorical_idx.iter().map(|&i| Some(&columns[i].values()[row])),
                &mut buffer,
                None,
            );
            match result {
                Ok(()) => out.assign(&ArrayView1::from(&buffer[..])),
                Err(err) => {
                    for column in err.invalid_columns {
                        if !invalid.contains(&column) {
                            invalid.push(column);
                        }
                    }
                }
            }
        }

        if invalid.is_empty() {
            Ok(matrix)
        } else {
            Err(TransformError {
                missing_columns: Vec::new(),
                invalid_columns: invalid,
            })
        }
    }

    /// Encode one row. `out` must be zeroed and `n_features_out` long.
    fn encode_row<'v>(
        &self,
        numeric_cells: impl Iterator<Item = Option<&'v FieldValue>>,
        categorical_cells: impl Iterator<Item = Option<&'v FieldValue>>,
        out: &mut [f64],
        mut unseen: Option<&mut Vec<UnseenCategory>>,
    ) -> std::result::Result<(), TransformError> {
        let mut error = TransformError::default();

        for (i, (params, cell)) in self.numeric.iter().zip(numeric_cells).enumerate() {
            match cell.map(FieldValue::coerce_number) {
                None => error.missing_columns.push(params.name.clone()),
                Some(Err(_)) => error.invalid_columns.push(params.name.clone()),
                Some(Ok(value)) => {
                    out[i] = params.scaler.transform(params.imputer.transform(value));
                }
            }
        }

        let mut offset = self.numeric.len();
        for (params, cell) in self.categorical.iter().zip(categorical_cells) {
            let width = params.encoder.n_features_out();
            match cell {
                None => error.missing_columns.push(params.name.clone()),
                Some(value) => {
                    let category = value.category();
                    let label = params.imputer.transform(category.as_deref());
                    let block = &mut out[offset..offset + width];
                    if !params.encoder.encode_into(label, block) {
                        if let Some(report) = unseen.as_deref_mut() {
                            report.push(UnseenCategory {
                                column: params.name.clone(),
                                value: label.to_string(),
                            });
                        }
                    }
                }
            }
            offset += width;
        }

        if error.is_empty() {
            Ok(())
        } else {
            Err(error)
        }
    }

    /// Check the invariants of deserialized parameters.
    ///
    /// Column names are unique, every step validates, and the cached output
    /// width matches the vocabularies.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for name in self
            .numeric
            .iter()
            .map(|c| &c.name)
            .chain(self.categorical.iter().map(|c| &c.name))
        {
            if !seen.insert(name.as_str()) {
                return Err(format!("column '{}' appears twice", name));
            }
        }
        for column in &self.numeric {
            column
                .imputer
                .validate()
                .and_then(|_| column.scaler.validate())
                .map_err(|e| format!("column '{}': {}", column.name, e))?;
        }
        for column in &self.categorical {
            column
                .imputer
                .validate()
                .and_then(|_| column.encoder.validate())
                .map_err(|e| format!("column '{}': {}", column.name, e))?;
        }
        let expected =
            Self::from_parts(self.numeric.clone(), self.categorical.clone()).n_features_out;
        if expected != self.n_features_out {
            return Err(format!(
                "declared output width {} does not match fitted columns ({})",
                self.n_features_out, expected
            ));
        }
        Ok(())
    }

    /// Whether the column lists match `schema` exactly, in order.
    pub fn matches_schema(&self, schema: &FeatureSchema) -> bool {
        self.numeric
            .iter()
            .map(|c| &c.name)
            .eq(schema.numeric_columns.iter())
            && self
                .categorical
                .iter()
                .map(|c| &c.name)
                .eq(schema.categorical_columns.iter())
    }
}
