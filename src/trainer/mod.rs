//! Offline training: CSV in, validated [`ArtifactBundle`] out.
//!
//! The procedure is deterministic for a given dataset and [`TrainingConfig`]:
//!
//! 1. load the CSV and coerce the cleanup columns, dropping rows that fail;
//! 2. map the target to `{0, 1}`;
//! 3. stratified split with the configured fraction and seed;
//! 4. derive the schema and fit the pipeline on the train partition only;
//! 5. fit the model on the transformed train partition;
//! 6. evaluate on the transformed test partition;
//! 7. compose the bundle and persist it to a file or the registry.

use crate::artifact::{
    ArtifactBundle, ArtifactVersion, ModelRegistry, RegisteredModel, TrainingMetadata,
};
use crate::config::TrainingConfig;
use crate::dataset::{stratified_split, Table};
use crate::error::Result;
use crate::metrics::ClassificationReport;
use crate::model::{Estimator, Predictor};
use crate::preprocessing::{derive_schema, TransformationPipeline};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where a persisted bundle ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistedArtifact {
    File { path: PathBuf },
    Registry { version: u32, path: PathBuf },
}

impl From<RegisteredModel> for PersistedArtifact {
    fn from(registered: RegisteredModel) -> Self {
        PersistedArtifact::Registry {
            version: registered.version,
            path: registered.bundle_path,
        }
    }
}

/// What a finished run reports back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub model_kind: String,
    pub accuracy: f64,
    pub evaluation: ClassificationReport,
    pub n_train: usize,
    pub n_test: usize,
    pub dropped_rows: usize,
    pub n_features: usize,
    pub artifact: Option<PersistedArtifact>,
}

impl TrainingReport {
    pub fn from_bundle(bundle: &ArtifactBundle, artifact: Option<PersistedArtifact>) -> Self {
        let metadata = bundle.metadata();
        Self {
            run_id: bundle.version().run_id.clone(),
            model_kind: metadata.model_kind.clone(),
            accuracy: metadata.accuracy(),
            evaluation: metadata.evaluation.clone(),
            n_train: metadata.n_train,
            n_test: metadata.n_test,
            dropped_rows: metadata.dropped_rows,
            n_features: bundle.pipeline().n_features_out(),
            artifact,
        }
    }
}

/// Runs the training procedure. Immutable once built.
pub struct Trainer {
    config: TrainingConfig,
    pipeline: TransformationPipeline,
}

impl Trainer {
    /// Validate the configuration and build a trainer.
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pipeline: TransformationPipeline::new(),
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the configured CSV and train on it.
    pub fn train(&self) -> Result<ArtifactBundle> {
        let table = Table::from_csv_path(&self.config.data_path)?;
        self.train_on_table(table)
    }

    /// Train on an already loaded table.
    pub fn train_on_table(&self, mut table: Table) -> Result<ArtifactBundle> {
        let config = &self.config;

        let mut dropped_rows = 0;
        for column in &config.numeric_cleanup_columns {
            if table.column(column).is_none() {
                log::warn!("Cleanup column '{}' not in dataset, skipping", column);
                continue;
            }
            let dropped = table.coerce_numeric(column)?;
            if dropped > 0 {
                log::info!("Dropped {} rows with non-numeric '{}'", dropped, column);
            }
            dropped_rows += dropped;
        }

        let labels = table.binary_labels(&config.target_column, &config.positive_label)?;
        let positives = labels.iter().filter(|&&l| l == 1).count();
        log::info!(
            "Dataset: {} rows, {} columns, {} positive ({:.1}%)",
            table.n_rows(),
            table.n_cols(),
            positives,
            100.0 * positives as f64 / labels.len().max(1) as f64
        );

        let split = stratified_split(&labels, config.test_size, config.seed)?;
        let train = table.select_rows(&split.train);
        let test = table.select_rows(&split.test);
        let y_train: Vec<u8> = split.train.iter().map(|&r| labels[r]).collect();
        let y_test: Vec<u8> = split.test.iter().map(|&r| labels[r]).collect();
        log::info!("Split: {} train / {} test", train.n_rows(), test.n_rows());

        let identifiers: Vec<&str> = config.identifier_columns.iter().map(String::as_str).collect();
        let schema = derive_schema(&train, &config.target_column, &identifiers)?;
        let pipeline = self.pipeline.fit(&train, &schema)?;
        let x_train = pipeline.transform_table(&train)?;
        let x_test = pipeline.transform_table(&test)?;

        let model_config = config.model.clone().with_seed(config.seed);
        let model = model_config.fit(&x_train, &y_train)?;

        let y_pred = model.predict(&x_test)?.to_vec();
        let evaluation = ClassificationReport::from_labels(&y_test, &y_pred)?;
        log::info!(
            "Evaluation: accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            evaluation.accuracy,
            evaluation.precision,
            evaluation.recall,
            evaluation.f1
        );

        let metadata = TrainingMetadata {
            model_kind: model_config.kind().to_string(),
            hyperparameters: model_config.hyperparameters(),
            evaluation,
            n_train: y_train.len(),
            n_test: y_test.len(),
            dropped_rows,
            test_size: config.test_size,
            seed: config.seed,
        };
        ArtifactBundle::new(
            ArtifactVersion::new(Utc::now(), config.seed),
            schema,
            pipeline,
            model,
            metadata,
        )
    }

    /// Persist to `model_path` if configured, otherwise register into
    /// `registry_dir`.
    pub fn persist(&self, bundle: &ArtifactBundle) -> Result<PersistedArtifact> {
        match &self.config.model_path {
            Some(path) => {
                bundle.save(path)?;
                Ok(PersistedArtifact::File { path: path.clone() })
            }
            None => register_into(&self.config.registry_dir, bundle),
        }
    }

    /// Train, persist and report.
    pub fn run(&self) -> Result<TrainingReport> {
        let bundle = self.train()?;
        let artifact = self.persist(&bundle)?;
        Ok(TrainingReport::from_bundle(&bundle, Some(artifact)))
    }
}

fn register_into(root: &Path, bundle: &ArtifactBundle) -> Result<PersistedArtifact> {
    Ok(ModelRegistry::open(root)?.register(bundle)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChurnError;
    use crate::model::{ModelConfig, RandomForestConfig};
    use std::fmt::Write;

    /// 40 customers; short-tenure month-to-month customers churn.
    fn telco_csv() -> String {
        let mut csv =
            String::from("customerID,tenure,MonthlyCharges,TotalCharges,Contract,Churn\n");
        for i in 0..40 {
            let churn = i % 2 == 0;
            let tenure = if churn { 1 + i % 5 } else { 30 + i };
            let contract = if churn { "Month-to-month" } else { "Two year" };
            let monthly = if churn { 80.0 } else { 25.0 } + (i % 3) as f64;
            let total = if i == 3 {
                " ".to_string()
            } else {
                format!("{:.2}", monthly * tenure as f64)
            };
            writeln!(
                csv,
                "C{:03},{},{:.2},{},{},{}",
                i,
                tenure,
                monthly,
                total,
                contract,
                if churn { "Yes" } else { "No" }
            )
            .unwrap();
        }
        csv
    }

    fn config() -> TrainingConfig {
        TrainingConfig::default().with_model(ModelConfig::RandomForest(
            RandomForestConfig::default().with_n_estimators(15),
        ))
    }

    #[test]
    fn test_train_on_table() {
        let table = Table::from_csv_reader(telco_csv().as_bytes()).unwrap();
        let bundle = Trainer::new(config()).unwrap().train_on_table(table).unwrap();

        let metadata = bundle.metadata();
        assert_eq!(metadata.dropped_rows, 1);
        assert_eq!(metadata.n_train + metadata.n_test, 39);
        assert_eq!(metadata.model_kind, "random_forest");
        assert_eq!(metadata.hyperparameters["seed"], "42");
        assert!(metadata.accuracy() >= 0.85, "accuracy {}", metadata.accuracy());

        let schema = bundle.schema();
        assert!(!schema.feature_columns().any(|c| c == "customerID" || c == "Churn"));
        assert!(schema.is_numeric("TotalCharges"));
    }

    #[test]
    fn test_same_seed_same_model() {
        let trainer = Trainer::new(config()).unwrap();
        let a = trainer
            .train_on_table(Table::from_csv_reader(telco_csv().as_bytes()).unwrap())
            .unwrap();
        let b = trainer
            .train_on_table(Table::from_csv_reader(telco_csv().as_bytes()).unwrap())
            .unwrap();
        assert_eq!(a.pipeline(), b.pipeline());
        assert_eq!(a.model(), b.model());
        assert_eq!(a.metadata(), b.metadata());
    }

    #[test]
    fn test_missing_target() {
        let table = Table::from_csv_reader(telco_csv().as_bytes()).unwrap();
        let trainer = Trainer::new(TrainingConfig {
            target_column: "Exited".to_string(),
            ..config()
        })
        .unwrap();
        assert!(matches!(trainer.train_on_table(table), Err(ChurnError::Schema(_))));
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        assert!(Trainer::new(config().with_test_size(0.0)).is_err());
    }

    #[test]
    fn test_run_registers_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("telco.csv");
        std::fs::write(&data, telco_csv()).unwrap();
        let registry = dir.path().join("registry");

        let trainer = Trainer::new(
            config()
                .with_data_path(&data)
                .with_registry_dir(&registry),
        )
        .unwrap();
        let report = trainer.run().unwrap();
        assert_eq!(
            report.artifact,
            Some(PersistedArtifact::Registry {
                version: 1,
                path: registry.join("v0001").join("bundle.bin"),
            })
        );
        let second = trainer.run().unwrap();
        assert!(matches!(
            second.artifact,
            Some(PersistedArtifact::Registry { version: 2, .. })
        ));
        assert_eq!(ModelRegistry::open(&registry).unwrap().versions().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_run_writes_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("telco.csv");
        std::fs::write(&data, telco_csv()).unwrap();
        let model_path = dir.path().join("model.bin");

        let report = Trainer::new(config().with_data_path(&data).with_model_path(&model_path))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(
            report.artifact,
            Some(PersistedArtifact::File {
                path: model_path.clone()
            })
        );
        let loaded = ArtifactBundle::load(&model_path).unwrap();
        assert_eq!(loaded.version().run_id, report.run_id);
    }
}
