use crate::error::{ChurnError, Result};
use crate::model::{check_training_data, check_width, Estimator, Fitted, Predictor, Unfitted};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Numerically stable sigmoid.
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

/// Mean binary cross-entropy on logits:
/// `max(z, 0) - z * t + ln(1 + exp(-|z|))`.
fn bce_with_logits(logits: &Array1<f64>, targets: ArrayView1<f64>) -> f64 {
    let total: f64 = logits
        .iter()
        .zip(targets.iter())
        .map(|(&z, &t)| z.max(0.0) - z * t + (-z.abs()).exp().ln_1p())
        .sum();
    total / logits.len() as f64
}

/// Hyperparameters for [`LogisticRegression`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionConfig {
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    /// L2 penalty `0.5 * l2 * ||w||²`; the bias is not penalized.
    pub l2: f64,
    /// Stop when the epoch loss improves by less than this.
    pub tolerance: f64,
    /// Seed for the per-epoch batch shuffle.
    pub seed: u64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_epochs: 200,
            batch_size: 64,
            l2: 1e-4,
            tolerance: 1e-6,
            seed: 42,
        }
    }
}

impl LogisticRegressionConfig {
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ChurnError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_epochs == 0 || self.batch_size == 0 {
            return Err(ChurnError::InvalidParameter(
                "max_epochs and batch_size must be at least 1".to_string(),
            ));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(ChurnError::InvalidParameter(format!(
                "l2 must be non-negative, got {}",
                self.l2
            )));
        }
        Ok(())
    }

    pub(crate) fn hyperparameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("learning_rate".to_string(), self.learning_rate.to_string()),
            ("max_epochs".to_string(), self.max_epochs.to_string()),
            ("batch_size".to_string(), self.batch_size.to_string()),
            ("l2".to_string(), self.l2.to_string()),
            ("tolerance".to_string(), self.tolerance.to_string()),
            ("seed".to_string(), self.seed.to_string()),
        ])
    }
}

/// Weights and bias of a linear decision function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// Binary logistic regression trained with mini-batch SGD on the
/// BCE-with-logits loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression<S = Fitted> {
    config: LogisticRegressionConfig,
    params: LinearParams,
    #[serde(skip)]
    _state: PhantomData<S>,
}

impl LogisticRegression<Unfitted> {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        Self {
            config,
            params: LinearParams {
                weights: Vec::new(),
                bias: 0.0,
            },
            _state: PhantomData,
        }
    }
}

impl Default for LogisticRegression<Unfitted> {
    fn default() -> Self {
        Self::new(LogisticRegressionConfig::default())
    }
}

impl Estimator for LogisticRegression<Unfitted> {
    type Fitted = LogisticRegression<Fitted>;

    fn fit(&self, x: &Array2<f64>, y: &[u8]) -> Result<LogisticRegression<Fitted>> {
        self.config.validate()?;
        check_training_data(x, y)?;

        let (n_samples, n_features) = x.dim();
        let targets: Array1<f64> = y.iter().map(|&label| f64::from(label)).collect();
        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..n_samples).collect();
        let lr = self.config.learning_rate;
        let mut previous_loss = f64::INFINITY;

        for epoch in 0..self.config.max_epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(self.config.batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = targets.select(Axis(0), batch);
                let m = batch.len() as f64;

                let logits = xb.dot(&weights) + bias;
                // dL/dz = sigmoid(z) - t
                let residual = logits.mapv(sigmoid) - &yb;
                let grad_w = xb.t().dot(&residual) / m + &weights * self.config.l2;
                let grad_b = residual.sum() / m;

                weights.scaled_add(-lr, &grad_w);
                bias -= lr * grad_b;
            }

            let logits = x.dot(&weights) + bias;
            let loss = bce_with_logits(&logits, targets.view())
                + 0.5 * self.config.l2 * weights.dot(&weights);
            if epoch % 20 == 0 {
                log::debug!("Epoch {}: loss = {:.6}", epoch, loss);
            }
            if !loss.is_finite() {
                return Err(ChurnError::InvalidParameter(format!(
                    "training diverged at epoch {} (loss = {}); lower the learning rate",
                    epoch, loss
                )));
            }
            if (previous_loss - loss).abs() < self.config.tolerance {
                log::debug!("Converged after {} epochs (loss = {:.6})", epoch + 1, loss);
                break;
            }
            previous_loss = loss;
        }

        Ok(LogisticRegression {
            config: self.config.clone(),
            params: LinearParams {
                weights: weights.to_vec(),
                bias,
            },
            _state: PhantomData,
        })
    }
}

impl LogisticRegression<Fitted> {
    /// Rebuild a fitted model from stored parameters.
    pub fn from_params(config: LogisticRegressionConfig, params: LinearParams) -> Self {
        Self {
            config,
            params,
            _state: PhantomData,
        }
    }

    pub fn params(&self) -> &LinearParams {
        &self.params
    }

    pub fn config(&self) -> &LogisticRegressionConfig {
        &self.config
    }

    /// Raw logits `x · w + b`.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_width(self.n_features_in(), x)?;
        let weights = ArrayView1::from(&self.params.weights[..]);
        Ok(x.dot(&weights) + self.params.bias)
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.params.weights.is_empty() {
            return Err("logistic regression has no weights".to_string());
        }
        if !self.params.bias.is_finite() || self.params.weights.iter().any(|w| !w.is_finite()) {
            return Err("logistic regression has non-finite parameters".to_string());
        }
        Ok(())
    }
}

impl Predictor for LogisticRegression<Fitted> {
    fn n_features_in(&self) -> usize {
        self.params.weights.len()
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}
