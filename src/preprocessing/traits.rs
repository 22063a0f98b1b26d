//! Core traits for per-column preprocessing steps.
//!
//! - [`Transformer`]: unfitted step holding hyperparameters; learns from one
//!   column of training data.
//! - [`FittedTransformer`]: frozen, serializable parameters ready for
//!   inference.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for unfitted steps with hyperparameters.
///
/// # Example
/// ```ignore
/// use churn_predictor::preprocessing::{StandardScaler, Transformer};
///
/// let fitted = StandardScaler::new().fit("tenure", &[1.0, 2.0, 3.0])?;
/// let z = fitted.transform(2.0);
/// ```
pub trait Transformer {
    /// One training cell, as seen by this step.
    type Input;
    /// The fitted step produced by [`fit`](Self::fit).
    type Fitted: FittedTransformer;

    /// Learn parameters from the training values of `column`.
    ///
    /// # Errors
    /// Returns [`ChurnError::Fit`](crate::ChurnError::Fit) naming `column` if
    /// no parameter can be computed (empty or all-missing data).
    fn fit(&self, column: &str, values: &[Self::Input]) -> Result<Self::Fitted>;
}

/// Trait for fitted steps.
///
/// Fitted steps are plain data: `Clone`, serializable, and never mutated after
/// fitting.
pub trait FittedTransformer: Clone + Serialize + DeserializeOwned {
    /// Number of output features this step produces for one input column.
    fn n_features_out(&self) -> usize;

    /// Check the internal consistency of deserialized parameters.
    ///
    /// Returns a description of the first violated invariant.
    fn validate(&self) -> std::result::Result<(), String>;
}
