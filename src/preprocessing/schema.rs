//! Feature schema: which columns feed the model, and how.

use crate::dataset::{ColumnType, Table};
use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column roles derived once from the training table.
///
/// Identifier columns never appear in `numeric_columns` or
/// `categorical_columns`, and the two feature lists are disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub identifier_columns: BTreeSet<String>,
    pub target_column: String,
}

impl FeatureSchema {
    /// Feature columns in pipeline order: numeric first, then categorical.
    pub fn feature_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(String::as_str)
    }

    pub fn n_features_in(&self) -> usize {
        self.numeric_columns.len() + self.categorical_columns.len()
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric_columns.iter().any(|c| c == column)
    }
}

/// Derive the feature schema of a training table.
///
/// Every column other than the target and the identifiers becomes a feature,
/// bucketed by its declared type and kept in table order. Identifiers absent
/// from the table are ignored.
///
/// # Errors
/// Returns [`ChurnError::Schema`] if the target column is missing or no
/// feature column remains.
pub fn derive_schema(table: &Table, target: &str, identifiers: &[&str]) -> Result<FeatureSchema> {
    if table.column(target).is_none() {
        return Err(ChurnError::Schema(format!(
            "target column '{}' not found",
            target
        )));
    }

    let identifier_columns: BTreeSet<String> = identifiers
        .iter()
        .filter(|&&id| id != target)
        .map(|id| id.to_string())
        .collect();

    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();
    for column in table.columns() {
        let name = column.name();
        if name == target || identifier_columns.contains(name) {
            continue;
        }
        match column.dtype() {
            ColumnType::Numeric => numeric_columns.push(name.to_string()),
            ColumnType::Categorical => categorical_columns.push(name.to_string()),
        }
    }

    if numeric_columns.is_empty() && categorical_columns.is_empty() {
        return Err(ChurnError::Schema(
            "no feature columns remain after excluding target and identifiers".to_string(),
        ));
    }

    Ok(FeatureSchema {
        numeric_columns,
        categorical_columns,
        identifier_columns,
        target_column: target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telco_table() -> Table {
        let csv = "customerID,gender,SeniorCitizen,tenure,Contract,MonthlyCharges,Churn\n\
                   7590-VHVEG,Female,0,1,Month-to-month,29.85,No\n\
                   5575-GNVDE,Male,0,34,One year,56.95,Yes\n";
        Table::from_csv_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_derive_schema_buckets_by_type() {
        let schema = derive_schema(&telco_table(), "Churn", &["customerID"]).unwrap();
        assert_eq!(
            schema.numeric_columns,
            vec!["SeniorCitizen", "tenure", "MonthlyCharges"]
        );
        assert_eq!(schema.categorical_columns, vec!["gender", "Contract"]);
        assert!(schema.identifier_columns.contains("customerID"));
        assert_eq!(schema.target_column, "Churn");
        assert_eq!(schema.n_features_in(), 5);
    }

    #[test]
    fn test_identifiers_never_features() {
        let schema = derive_schema(&telco_table(), "Churn", &["customerID", "gender"]).unwrap();
        let features: Vec<&str> = schema.feature_columns().collect();
        assert!(!features.contains(&"customerID"));
        assert!(!features.contains(&"gender"));
        assert!(!features.contains(&"Churn"));
    }

    #[test]
    fn test_absent_identifier_ignored() {
        let schema = derive_schema(&telco_table(), "Churn", &["accountNumber"]).unwrap();
        // customerID is not declared an identifier here, so it is a feature.
        assert!(schema.categorical_columns.contains(&"customerID".to_string()));
    }

    #[test]
    fn test_missing_target() {
        assert!(matches!(
            derive_schema(&telco_table(), "Label", &[]),
            Err(ChurnError::Schema(_))
        ));
    }

    #[test]
    fn test_only_numeric_features() {
        let csv = "tenure,Churn\n1,Yes\n5,No\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        let schema = derive_schema(&table, "Churn", &[]).unwrap();
        assert_eq!(schema.numeric_columns, vec!["tenure"]);
        assert!(schema.categorical_columns.is_empty());
    }

    #[test]
    fn test_no_features() {
        let csv = "customerID,Churn\nA,Yes\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(matches!(
            derive_schema(&table, "Churn", &["customerID"]),
            Err(ChurnError::Schema(_))
        ));
    }
}
