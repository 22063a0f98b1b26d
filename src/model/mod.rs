//! Classifiers.
//!
//! [`Estimator`] is the unfitted side (`fit`), [`Predictor`] the fitted side
//! (`predict_proba`, `predict`). [`ModelConfig`] and [`FittedModel`] close the
//! set of supported variants so a fitted model can live inside an artifact.

pub mod forest;
pub mod linear;
pub mod state;

pub use forest::{DecisionTree, MaxFeatures, RandomForest, RandomForestConfig};
pub use linear::{LinearParams, LogisticRegression, LogisticRegressionConfig};
pub use state::{Fitted, Unfitted};

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Probability above which a row is labelled as churn.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// A fitted binary classifier.
pub trait Predictor {
    /// Width of the feature vectors this model accepts.
    fn n_features_in(&self) -> usize;

    /// Probability of the positive class for every row of `x`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard labels: 1 where the probability exceeds [`DECISION_THRESHOLD`].
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| u8::from(p > DECISION_THRESHOLD)))
    }
}

/// An unfitted classifier.
pub trait Estimator {
    type Fitted: Predictor;

    /// Fit on a feature matrix and `{0, 1}` labels, one per row.
    fn fit(&self, x: &Array2<f64>, y: &[u8]) -> Result<Self::Fitted>;
}

pub(crate) fn check_training_data(x: &Array2<f64>, y: &[u8]) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ChurnError::InvalidParameter(format!(
            "cannot fit on an empty feature matrix ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(ChurnError::InvalidParameter(format!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&label| label > 1) {
        return Err(ChurnError::InvalidParameter(format!(
            "labels must be 0 or 1, got {}",
            bad
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ChurnError::InvalidParameter(
            "feature matrix contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_width(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() == expected {
        Ok(())
    } else {
        Err(ChurnError::InvalidParameter(format!(
            "expected {} features, got {}",
            expected,
            x.ncols()
        )))
    }
}

/// Which classifier to train, with its hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelConfig {
    LogisticRegression(LogisticRegressionConfig),
    RandomForest(RandomForestConfig),
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::RandomForest(RandomForestConfig::default())
    }
}

impl ModelConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelConfig::LogisticRegression(_) => "logistic_regression",
            ModelConfig::RandomForest(_) => "random_forest",
        }
    }

    /// Flat, human-readable hyperparameter listing for run metadata.
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        match self {
            ModelConfig::LogisticRegression(config) => config.hyperparameters(),
            ModelConfig::RandomForest(config) => config.hyperparameters(),
        }
    }

    /// Replace the seed of whichever variant this is.
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            ModelConfig::LogisticRegression(config) => {
                ModelConfig::LogisticRegression(config.with_seed(seed))
            }
            ModelConfig::RandomForest(config) => ModelConfig::RandomForest(config.with_seed(seed)),
        }
    }
}

impl Estimator for ModelConfig {
    type Fitted = FittedModel;

    fn fit(&self, x: &Array2<f64>, y: &[u8]) -> Result<FittedModel> {
        log::info!(
            "Fitting {} on {} rows x {} features",
            self.kind(),
            x.nrows(),
            x.ncols()
        );
        match self {
            ModelConfig::LogisticRegression(config) => LogisticRegression::new(config.clone())
                .fit(x, y)
                .map(FittedModel::LogisticRegression),
            ModelConfig::RandomForest(config) => RandomForest::new(config.clone())
                .fit(x, y)
                .map(FittedModel::RandomForest),
        }
    }
}

/// A fitted classifier of any supported kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FittedModel {
    LogisticRegression(LogisticRegression<Fitted>),
    RandomForest(RandomForest<Fitted>),
}

impl FittedModel {
    pub fn kind(&self) -> &'static str {
        match self {
            FittedModel::LogisticRegression(_) => "logistic_regression",
            FittedModel::RandomForest(_) => "random_forest",
        }
    }

    /// Check the invariants of deserialized parameters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            FittedModel::LogisticRegression(model) => model.validate(),
            FittedModel::RandomForest(model) => model.validate(),
        }
    }
}

impl Predictor for FittedModel {
    fn n_features_in(&self) -> usize {
        match self {
            FittedModel::LogisticRegression(model) => model.n_features_in(),
            FittedModel::RandomForest(model) => model.n_features_in(),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::LogisticRegression(model) => model.predict_proba(x),
            FittedModel::RandomForest(model) => model.predict_proba(x),
        }
    }
}
