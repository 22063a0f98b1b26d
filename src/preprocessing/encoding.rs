//! One-hot encoding for categorical features.
//!
//! The encoder learns the sorted set of distinct labels (the vocabulary) of one
//! column. A label is encoded as a block of `vocabulary.len()` indicators with
//! a single 1 at the label's position; a label not seen during fitting maps to
//! an all-zero block.

use crate::error::{ChurnError, Result};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder (unfitted).
///
/// # Example
/// ```ignore
/// use churn_predictor::preprocessing::{OneHotEncoder, Transformer};
///
/// let values = vec!["No".to_string(), "Yes".to_string(), "No".to_string()];
/// let fitted = OneHotEncoder::new().fit("Partner", &values)?;
///
/// let mut block = [0.0; 2];
/// fitted.encode_into("Yes", &mut block);
/// // block == [0.0, 1.0]
/// ```
#[derive(Clone, Debug, Default)]
pub struct OneHotEncoder;

impl OneHotEncoder {
    pub fn new() -> Self {
        Self
    }
}

/// Fitted one-hot encoder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FittedOneHotEncoder {
    /// Distinct training labels, strictly ascending.
    pub vocabulary: Vec<String>,
}

impl FittedOneHotEncoder {
    /// Position of `label` in the vocabulary, or `None` if it was unseen.
    #[inline]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.vocabulary
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
    }

    /// Write the indicator block for `label` into `out`.
    ///
    /// `out` must be `vocabulary.len()` long and zeroed. Returns `false` when
    /// the label is unseen (the block stays all zero).
    pub fn encode_into(&self, label: &str, out: &mut [f64]) -> bool {
        debug_assert_eq!(out.len(), self.vocabulary.len());
        match self.index_of(label) {
            Some(i) => {
                out[i] = 1.0;
                true
            }
            None => false,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.vocabulary
    }
}

impl Transformer for OneHotEncoder {
    type Input = String;
    type Fitted = FittedOneHotEncoder;

    fn fit(&self, column: &str, values: &[String]) -> Result<FittedOneHotEncoder> {
        if values.is_empty() {
            return Err(ChurnError::Fit {
                column: column.to_string(),
                reason: "cannot fit OneHotEncoder on empty data".to_string(),
            });
        }

        let vocabulary: Vec<String> = values
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(FittedOneHotEncoder { vocabulary })
    }
}

impl FittedTransformer for FittedOneHotEncoder {
    fn n_features_out(&self) -> usize {
        self.vocabulary.len()
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.vocabulary.is_empty() {
            return Err("vocabulary is empty".to_string());
        }
        if self.vocabulary.windows(2).any(|w| w[0] >= w[1]) {
            return Err("vocabulary is not sorted and deduplicated".to_string());
        }
        Ok(())
    }
}
