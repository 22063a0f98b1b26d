//! Imputers for completing missing values.
//!
//! [`SimpleImputer`] fills numeric cells with the training median;
//! [`CategoricalImputer`] fills categorical cells with the most frequent
//! training value.

use crate::error::{ChurnError, Result};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Median imputer for numeric cells (unfitted).
#[derive(Clone, Debug, Default)]
pub struct SimpleImputer;

impl SimpleImputer {
    pub fn new() -> Self {
        Self
    }
}

/// Fitted numeric imputer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedSimpleImputer {
    /// Training median.
    pub statistic: f64,
}

impl FittedSimpleImputer {
    #[inline]
    pub fn transform(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.statistic)
    }
}

pub(crate) fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

impl Transformer for SimpleImputer {
    type Input = Option<f64>;
    type Fitted = FittedSimpleImputer;

    fn fit(&self, column: &str, values: &[Option<f64>]) -> Result<FittedSimpleImputer> {
        let mut observed: Vec<f64> = values.iter().flatten().copied().collect();

        if observed.is_empty() {
            return Err(ChurnError::Fit {
                column: column.to_string(),
                reason: "column contains only missing values".to_string(),
            });
        }
        observed.sort_by(f64::total_cmp);

        Ok(FittedSimpleImputer {
            statistic: median(&observed),
        })
    }
}

impl FittedTransformer for FittedSimpleImputer {
    fn n_features_out(&self) -> usize {
        1
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.statistic.is_finite() {
            Ok(())
        } else {
            Err(format!("imputation value {} is not finite", self.statistic))
        }
    }
}

/// Most-frequent imputer for categorical cells (unfitted).
#[derive(Clone, Debug, Default)]
pub struct CategoricalImputer;

impl CategoricalImputer {
    pub fn new() -> Self {
        Self
    }
}

/// Fitted categorical imputer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FittedCategoricalImputer {
    pub fill_value: String,
}

impl FittedCategoricalImputer {
    #[inline]
    pub fn transform<'a>(&'a self, value: Option<&'a str>) -> &'a str {
        value.unwrap_or(&self.fill_value)
    }
}

impl Transformer for CategoricalImputer {
    type Input = Option<String>;
    type Fitted = FittedCategoricalImputer;

    fn fit(&self, column: &str, values: &[Option<String>]) -> Result<FittedCategoricalImputer> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in values.iter().flatten() {
            *counts.entry(value.as_str()).or_insert(0) += 1;
        }

        // BTreeMap iterates in key order, so on equal counts the first
        // (lexicographically smallest) value wins.
        let mut best: Option<(&str, usize)> = None;
        for (&value, &count) in &counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }

        match best {
            Some((value, _)) => Ok(FittedCategoricalImputer {
                fill_value: value.to_string(),
            }),
            None => Err(ChurnError::Fit {
                column: column.to_string(),
                reason: "column contains only missing values".to_string(),
            }),
        }
    }
}

impl FittedTransformer for FittedCategoricalImputer {
    fn n_features_out(&self) -> usize {
        1
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.fill_value.trim().is_empty() {
            Err("imputation value is empty".to_string())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn column_with_missing() -> Vec<Option<f64>> {
        vec![Some(1.0), None, Some(3.0), Some(10.0), None]
    }

    #[test]
    fn test_simple_imputer_median() {
        let fitted = SimpleImputer::new()
            .fit("tenure", &column_with_missing())
            .unwrap();
        assert_relative_eq!(fitted.statistic, 3.0);
        assert_relative_eq!(fitted.transform(None), 3.0);
        assert_relative_eq!(fitted.transform(Some(7.5)), 7.5);
    }

    #[test]
    fn test_simple_imputer_median_even_count() {
        let values = vec![Some(4.0), Some(1.0), Some(3.0), Some(2.0)];
        let fitted = SimpleImputer::new().fit("x", &values).unwrap();
        assert_relative_eq!(fitted.statistic, 2.5);
    }

    #[test]
    fn test_simple_imputer_all_missing_is_fit_error() {
        let result = SimpleImputer::new().fit("TotalCharges", &[None, None, None]);
        match result {
            Err(ChurnError::Fit { column, .. }) => assert_eq!(column, "TotalCharges"),
            other => panic!("expected fit error, got {:?}", other),
        }
    }

    #[test]
    fn test_categorical_imputer_most_frequent() {
        let values: Vec<Option<String>> = ["DSL", "Fiber optic", "Fiber optic", "No"]
            .iter()
            .map(|s| Some(s.to_string()))
            .chain(std::iter::once(None))
            .collect();
        let fitted = CategoricalImputer::new().fit("InternetService", &values).unwrap();
        assert_eq!(fitted.fill_value, "Fiber optic");
        assert_eq!(fitted.transform(None), "Fiber optic");
        assert_eq!(fitted.transform(Some("DSL")), "DSL");
    }

    #[test]
    fn test_categorical_imputer_tie_break() {
        let values = vec![Some("b".to_string()), Some("a".to_string())];
        let fitted = CategoricalImputer::new().fit("x", &values).unwrap();
        assert_eq!(fitted.fill_value, "a");
    }

    #[test]
    fn test_categorical_imputer_all_missing() {
        let result = CategoricalImputer::new().fit("gender", &[None, None]);
        assert!(matches!(result, Err(ChurnError::Fit { .. })));
    }

    #[test]
    fn test_fitted_imputer_validate() {
        let ok = FittedSimpleImputer { statistic: 1.0 };
        assert!(ok.validate().is_ok());
        let bad = FittedSimpleImputer {
            statistic: f64::NAN,
        };
        assert!(bad.validate().is_err());
    }
}
