//! # churn_predictor
//!
//! Telco customer churn prediction with a strict split between an offline
//! training phase and a load-once, read-only inference phase.
//!
//! ## Core Design Principles
//!
//! - **Fit once, transform forever**: every statistic the feature pipeline
//!   needs (medians, means, standard deviations, vocabularies) is learned from
//!   the training partition and frozen in a [`preprocessing::FittedPipeline`].
//! - **Stateful Type Safety**: models carry their training state in the type
//!   system (`Unfitted` vs `Fitted`); only fitted models can predict.
//! - **One artifact, one unit**: schema, pipeline, model and run metadata are
//!   persisted together in an [`artifact::ArtifactBundle`] and checked for
//!   consistency when built and when loaded.
//! - **Explicit model handle**: the [`inference::InferenceService`] owns its
//!   bundle behind an `Arc`; there is no global model state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use churn_predictor::config::{ServiceConfig, TrainingConfig};
//! use churn_predictor::dataset::CustomerRecord;
//! use churn_predictor::inference::InferenceService;
//! use churn_predictor::trainer::Trainer;
//!
//! // Offline: train and register a new version.
//! let report = Trainer::new(TrainingConfig::default())?.run()?;
//! println!("accuracy = {:.3}", report.accuracy);
//!
//! // Online: load once, answer many.
//! let service = InferenceService::start(&ServiceConfig::default().source());
//! let record = CustomerRecord::new()
//!     .with("tenure", 2i64)
//!     .with("MonthlyCharges", 85.0)
//!     .with("TotalCharges", "170.0")
//!     .with("Contract", "Month-to-month");
//! let result = service.predict(&record)?;
//! println!("churn = {}", result.churn_prediction);
//! # Ok::<(), churn_predictor::error::ChurnError>(())
//! ```
//!
//! ## Module Structure
//!
//! - `dataset` — cell values, customer records, CSV tables, stratified split
//! - `preprocessing` — schema derivation, imputers, scaler, one-hot encoder, pipeline
//! - `model` — logistic regression and random forest behind `Estimator`/`Predictor`
//! - `metrics` — confusion matrix, accuracy, precision, recall, F1
//! - `artifact` — enveloped bundle files and the versioned model registry
//! - `trainer` — the deterministic training procedure
//! - `inference` — the prediction service and its JSON request protocol
//! - `config` — training and serving configuration
//! - `error` — the crate error type and its HTTP status mapping

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod preprocessing;
pub mod trainer;

pub use artifact::{ArtifactBundle, ArtifactSource, ModelRegistry};
pub use dataset::{CustomerRecord, FieldValue, Table};
pub use error::{ChurnError, Result};
pub use inference::{InferenceService, PredictionResult};
pub use model::{Estimator, Fitted, Predictor, Unfitted};
pub use trainer::{Trainer, TrainingReport};
