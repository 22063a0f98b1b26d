use crate::artifact::{ArtifactBundle, ArtifactSource};
use crate::dataset::{CustomerRecord, FieldValue};
use crate::error::{ChurnError, Result};
use crate::inference::{HealthStatus, ModelInfo, PredictionResult};
use crate::model::{Predictor, DECISION_THRESHOLD};
use ndarray::Array2;
use std::sync::Arc;

/// Answers churn predictions from one bundle loaded at startup.
///
/// Cloning is cheap; all clones share the same immutable bundle, so the
/// service can be handed to any number of threads. A service whose startup
/// load failed stays degraded for its whole lifetime.
#[derive(Debug, Clone)]
pub struct InferenceService {
    bundle: Option<Arc<ArtifactBundle>>,
    load_error: Option<String>,
}

impl InferenceService {
    /// Load the bundle from `source`.
    ///
    /// Never fails: a load error is logged and the service starts degraded,
    /// answering every prediction with [`ChurnError::ModelUnavailable`].
    pub fn start(source: &ArtifactSource) -> Self {
        log::info!("Loading model from {}", source);
        match source.load() {
            Ok(bundle) => Self::from_bundle(bundle),
            Err(e) => {
                log::error!("Failed to load model from {}: {}", source, e);
                log::warn!("Serving in degraded mode; predictions will be refused");
                Self {
                    bundle: None,
                    load_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn from_bundle(bundle: ArtifactBundle) -> Self {
        log::info!(
            "Model {} ready ({}, {} features)",
            bundle.version().label(),
            bundle.model().kind(),
            bundle.pipeline().n_features_out()
        );
        Self {
            bundle: Some(Arc::new(bundle)),
            load_error: None,
        }
    }

    /// A service with no model.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            bundle: None,
            load_error: Some(reason.into()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.bundle.is_some()
    }

    pub fn bundle(&self) -> Option<&ArtifactBundle> {
        self.bundle.as_deref()
    }

    fn require_bundle(&self) -> Result<&ArtifactBundle> {
        self.bundle.as_deref().ok_or(ChurnError::ModelUnavailable)
    }

    /// Predict churn for one customer.
    ///
    /// # Errors
    /// - [`ChurnError::ModelUnavailable`] if no model was loaded;
    /// - [`ChurnError::Validation`] naming the first numeric field whose text
    ///   is not a number;
    /// - [`ChurnError::Transform`] listing every missing feature column.
    pub fn predict(&self, record: &CustomerRecord) -> Result<PredictionResult> {
        let bundle = self.require_bundle()?;
        let x = feature_row(bundle, record)?;
        let probability = bundle.model().predict_proba(&x)?[0];
        Ok(PredictionResult {
            churn_prediction: u8::from(probability > DECISION_THRESHOLD),
            churn_probability: probability,
            model_version: bundle.version().label(),
        })
    }

    /// Predict a batch in one model call. Fails on the first invalid record.
    pub fn predict_batch(&self, records: &[CustomerRecord]) -> Result<Vec<PredictionResult>> {
        let bundle = self.require_bundle()?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let width = bundle.pipeline().n_features_out();
        let mut x = Array2::<f64>::zeros((records.len(), width));
        for (mut row, record) in x.outer_iter_mut().zip(records) {
            row.assign(&feature_row(bundle, record)?.row(0));
        }

        let version = bundle.version().label();
        Ok(bundle
            .model()
            .predict_proba(&x)?
            .iter()
            .map(|&p| PredictionResult {
                churn_prediction: u8::from(p > DECISION_THRESHOLD),
                churn_probability: p,
                model_version: version.clone(),
            })
            .collect())
    }

    pub fn health(&self) -> HealthStatus {
        match &self.bundle {
            Some(bundle) => HealthStatus {
                status: "ok".to_string(),
                model_version: Some(bundle.version().label()),
                error: None,
            },
            None => HealthStatus {
                status: "degraded".to_string(),
                model_version: None,
                error: self.load_error.clone(),
            },
        }
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        let bundle = self.require_bundle()?;
        let schema = bundle.schema();
        Ok(ModelInfo {
            model_version: bundle.version().label(),
            run_id: bundle.version().run_id.clone(),
            created_at: bundle.version().created_at,
            model_kind: bundle.model().kind().to_string(),
            accuracy: bundle.metadata().accuracy(),
            hyperparameters: bundle.metadata().hyperparameters.clone(),
            numeric_features: schema.numeric_columns.clone(),
            categorical_features: schema.categorical_columns.clone(),
            n_features: bundle.pipeline().n_features_out(),
        })
    }
}

/// Coerce the numeric fields, transform, and shape as a one-row matrix.
fn feature_row(bundle: &ArtifactBundle, record: &CustomerRecord) -> Result<Array2<f64>> {
    let record = coerce_numeric_fields(bundle, record)?;
    let (features, unseen) = bundle.pipeline().transform_record_with_report(&record)?;
    for category in &unseen {
        log::debug!(
            "Unseen category '{}' in column '{}' encoded as all zeros",
            category.value,
            category.column
        );
    }
    let width = features.len();
    features
        .into_shape((1, width))
        .map_err(|e| ChurnError::InvalidParameter(format!("cannot shape feature row: {}", e)))
}

/// Parse text in declared-numeric fields. Missing fields are left for the
/// transform to report.
fn coerce_numeric_fields(
    bundle: &ArtifactBundle,
    record: &CustomerRecord,
) -> Result<CustomerRecord> {
    let mut coerced = record.clone();
    for column in &bundle.schema().numeric_columns {
        let Some(value) = record.get(column) else {
            continue;
        };
        let number = value
            .coerce_number()
            .map_err(|reason| ChurnError::Validation {
                field: column.clone(),
                reason,
            })?;
        coerced.insert(
            column.as_str(),
            number.map_or(FieldValue::Missing, FieldValue::Float),
        );
    }
    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::sample_bundle;

    fn churny() -> CustomerRecord {
        CustomerRecord::new()
            .with("customerID", "Z")
            .with("tenure", 2i64)
            .with("MonthlyCharges", "85.0")
            .with("Contract", "Month-to-month")
    }

    #[test]
    fn test_unavailable_service() {
        let service = InferenceService::unavailable("no artifact");
        assert!(matches!(
            service.predict(&churny()),
            Err(ChurnError::ModelUnavailable)
        ));
        assert!(matches!(
            service.predict_batch(&[churny()]),
            Err(ChurnError::ModelUnavailable)
        ));
        let health = service.health();
        assert_eq!(health.status, "degraded");
        assert_eq!(health.error.as_deref(), Some("no artifact"));
    }

    #[test]
    fn test_start_with_missing_file_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let service = InferenceService::start(&ArtifactSource::File(dir.path().join("none.bin")));
        assert!(!service.is_ready());
        assert_eq!(service.predict(&churny()).unwrap_err().status_code(), 503);
    }

    #[test]
    fn test_predict_and_batch_agree() {
        let service = InferenceService::from_bundle(sample_bundle());
        let loyal = CustomerRecord::new()
            .with("tenure", 50i64)
            .with("MonthlyCharges", 20.0)
            .with("Contract", "Two year");

        let single = service.predict(&churny()).unwrap();
        assert_eq!(single.churn_prediction, 1);
        let batch = service.predict_batch(&[churny(), loyal.clone()]).unwrap();
        assert_eq!(batch[0], single);
        assert_eq!(batch[1], service.predict(&loyal).unwrap());
        assert_eq!(batch[1].churn_prediction, 0);
    }

    #[test]
    fn test_non_numeric_text_names_field() {
        let service = InferenceService::from_bundle(sample_bundle());
        let record = churny().with("MonthlyCharges", "abc");
        match service.predict(&record) {
            Err(ChurnError::Validation { field, .. }) => assert_eq!(field, "MonthlyCharges"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_columns_reported_together() {
        let service = InferenceService::from_bundle(sample_bundle());
        let record = CustomerRecord::new().with("Contract", "One year");
        match service.predict(&record) {
            Err(ChurnError::Transform(err)) => {
                assert_eq!(err.missing_columns, vec!["tenure", "MonthlyCharges"]);
            }
            other => panic!("expected transform error, got {:?}", other),
        }
    }

    #[test]
    fn test_model_info() {
        let service = InferenceService::from_bundle(sample_bundle());
        let info = service.model_info().unwrap();
        assert_eq!(info.model_kind, "random_forest");
        assert_eq!(info.numeric_features, vec!["tenure", "MonthlyCharges"]);
        assert_eq!(info.categorical_features, vec!["Contract"]);
        assert_eq!(info.n_features, 5);
        assert_eq!(service.health().status, "ok");
    }
}
