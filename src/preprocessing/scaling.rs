//! Standard scaling (z-score normalization).
//!
//! ```text
//! z = (x - u) / s
//! ```
//! where `u` is the training mean and `s` the population standard deviation
//! (ddof = 0). A constant column gets `s = 1`.

use crate::error::{ChurnError, Result};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use serde::{Deserialize, Serialize};

/// StandardScaler (unfitted).
#[derive(Clone, Debug, Default)]
pub struct StandardScaler;

impl StandardScaler {
    pub fn new() -> Self {
        Self
    }
}

/// Fitted StandardScaler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    pub mean: f64,
    pub std: f64,
}

impl FittedStandardScaler {
    #[inline]
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

impl Transformer for StandardScaler {
    type Input = f64;
    type Fitted = FittedStandardScaler;

    fn fit(&self, column: &str, values: &[f64]) -> Result<FittedStandardScaler> {
        if values.is_empty() {
            return Err(ChurnError::Fit {
                column: column.to_string(),
                reason: "cannot fit StandardScaler on empty data".to_string(),
            });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        Ok(FittedStandardScaler {
            mean,
            std: if std > 0.0 { std } else { 1.0 },
        })
    }
}

impl FittedTransformer for FittedStandardScaler {
    fn n_features_out(&self) -> usize {
        1
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.mean.is_finite() {
            return Err(format!("mean {} is not finite", self.mean));
        }
        if !(self.std.is_finite() && self.std > 0.0) {
            return Err(format!("std {} is not a positive finite number", self.std));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standard_scaler_fit() {
        let fitted = StandardScaler::new().fit("x", &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(fitted.mean, 2.5);
        assert_relative_eq!(fitted.std, 1.25f64.sqrt());
    }

    #[test]
    fn test_standard_scaler_zero_mean_unit_variance() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let fitted = StandardScaler::new().fit("x", &data).unwrap();
        let scaled: Vec<f64> = data.iter().map(|&v| fitted.transform(v)).collect();

        let mean = scaled.iter().sum::<f64>() / scaled.len() as f64;
        let var = scaled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / scaled.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standard_scaler_constant_column() {
        let fitted = StandardScaler::new().fit("x", &[3.0, 3.0, 3.0]).unwrap();
        assert_relative_eq!(fitted.std, 1.0);
        assert_relative_eq!(fitted.transform(3.0), 0.0);
    }

    #[test]
    fn test_standard_scaler_empty() {
        assert!(matches!(
            StandardScaler::new().fit("x", &[]),
            Err(ChurnError::Fit { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_std() {
        let bad = FittedStandardScaler {
            mean: 0.0,
            std: 0.0,
        };
        assert!(bad.validate().is_err());
    }
}
