mod common;

use churn_predictor::artifact::{ArtifactBundle, ArtifactSource, ModelRegistry};
use churn_predictor::dataset::{CustomerRecord, FieldValue, Table};
use churn_predictor::error::ChurnError;
use churn_predictor::inference::InferenceService;
use churn_predictor::model::{LogisticRegressionConfig, ModelConfig, Predictor};
use churn_predictor::trainer::{PersistedArtifact, Trainer};
use common::{churny_customer, fast_config, loyal_customer, telco_csv, write_telco_csv};
use std::sync::OnceLock;
use std::thread;

/// One forest trained on 600 synthetic customers, shared by the tests below.
fn trained_bundle() -> &'static ArtifactBundle {
    static BUNDLE: OnceLock<ArtifactBundle> = OnceLock::new();
    BUNDLE.get_or_init(|| {
        let table = Table::from_csv_reader(telco_csv(600, 7).as_bytes()).unwrap();
        Trainer::new(fast_config())
            .unwrap()
            .train_on_table(table)
            .unwrap()
    })
}

fn service() -> InferenceService {
    InferenceService::from_bundle(trained_bundle().clone())
}

#[test]
fn trained_model_separates_churners() {
    let bundle = trained_bundle();
    let metadata = bundle.metadata();
    assert_eq!(metadata.dropped_rows, 24);
    assert_eq!(metadata.n_train + metadata.n_test, 576);
    assert!(metadata.accuracy() >= 0.9, "accuracy {}", metadata.accuracy());

    let service = service();
    assert_eq!(service.predict(&churny_customer()).unwrap().churn_prediction, 1);
    assert_eq!(service.predict(&loyal_customer()).unwrap().churn_prediction, 0);
}

#[test]
fn schema_excludes_identifier_and_target() {
    let schema = trained_bundle().schema();
    let features: Vec<&str> = schema.feature_columns().collect();
    assert!(!features.contains(&"customerID"));
    assert!(!features.contains(&"Churn"));
    assert_eq!(
        schema.numeric_columns,
        vec!["SeniorCitizen", "tenure", "MonthlyCharges", "TotalCharges"]
    );
    assert!(schema.categorical_columns.contains(&"Contract".to_string()));
}

#[test]
fn identifier_is_optional_and_extra_fields_ignored() {
    let service = service();
    let full = churny_customer();
    let expected = service.predict(&full).unwrap();

    let mut without_id = full.clone();
    without_id.remove("customerID");
    assert_eq!(service.predict(&without_id).unwrap(), expected);

    let with_extra = full.with("FavouriteColour", "green");
    assert_eq!(service.predict(&with_extra).unwrap(), expected);
}

#[test]
fn non_numeric_total_charges_is_a_validation_error() {
    let service = service();
    let record = churny_customer().with("TotalCharges", "abc");
    let err = service.predict(&record).unwrap_err();
    assert_eq!(err.status_code(), 400);
    match err {
        ChurnError::Validation { field, .. } => assert_eq!(field, "TotalCharges"),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn numbers_sent_as_text_are_accepted() {
    let service = service();
    let as_numbers = churny_customer();
    let as_text = churny_customer()
        .with("tenure", "2")
        .with("MonthlyCharges", "70.0")
        .with("SeniorCitizen", "0");
    assert_eq!(
        service.predict(&as_text).unwrap(),
        service.predict(&as_numbers).unwrap()
    );
}

#[test]
fn missing_columns_are_listed() {
    let service = service();
    let mut record = churny_customer();
    record.remove("tenure");
    record.remove("Contract");
    match service.predict(&record) {
        Err(ChurnError::Transform(err)) => {
            assert_eq!(err.missing_columns, vec!["tenure", "Contract"]);
        }
        other => panic!("expected transform error, got {:?}", other),
    }
}

#[test]
fn unseen_category_encodes_as_zero_block() {
    let pipeline = trained_bundle().pipeline();
    let record = churny_customer().with("Contract", "Ten year");
    let (features, unseen) = pipeline.transform_record_with_report(&record).unwrap();
    assert_eq!(unseen.len(), 1);
    assert_eq!(unseen[0].column, "Contract");

    let names = pipeline.feature_names();
    for (name, value) in names.iter().zip(features.iter()) {
        if name.starts_with("Contract_") {
            assert_eq!(*value, 0.0, "{}", name);
        }
    }
    // Still answerable.
    assert!(service().predict(&record).is_ok());
}

#[test]
fn blank_category_imputes_most_frequent() {
    let pipeline = trained_bundle().pipeline();
    let contract = pipeline
        .categorical_columns()
        .iter()
        .find(|c| c.name == "Contract")
        .unwrap();
    let mode = contract.most_frequent().to_string();

    let blank = churny_customer().with("Contract", "");
    let null = churny_customer().with("Contract", FieldValue::Missing);
    let explicit = churny_customer().with("Contract", mode.as_str());
    let expected = pipeline.transform_record(&explicit).unwrap();
    assert_eq!(pipeline.transform_record(&blank).unwrap(), expected);
    assert_eq!(pipeline.transform_record(&null).unwrap(), expected);
}

#[test]
fn missing_artifact_means_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let service = InferenceService::start(&ArtifactSource::Registry(dir.path().join("nothing")));
    assert!(!service.is_ready());
    let err = service.predict(&churny_customer()).unwrap_err();
    assert!(matches!(err, ChurnError::ModelUnavailable));
    assert_eq!(err.status_code(), 503);
    assert_eq!(service.health().status, "degraded");
}

#[test]
fn corrupt_artifact_means_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let mut bytes = trained_bundle().to_bytes().unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x55;
    std::fs::write(&path, bytes).unwrap();

    let service = InferenceService::start(&ArtifactSource::File(path));
    assert!(!service.is_ready());
    assert!(service.health().error.unwrap().contains("checksum"));
}

#[test]
fn saved_bundle_predicts_identically_after_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let bundle = trained_bundle();
    bundle.save(&path).unwrap();
    let loaded = ArtifactBundle::load(&path).unwrap();
    assert_eq!(&loaded, bundle);

    let table = Table::from_csv_reader(telco_csv(50, 99).as_bytes()).unwrap();
    let rows: Vec<CustomerRecord> = (0..table.n_rows())
        .map(|r| table.record(r))
        .filter(|r| !r.get("TotalCharges").map_or(true, FieldValue::is_missing))
        .collect();

    let before = InferenceService::from_bundle(bundle.clone());
    let after = InferenceService::from_bundle(loaded);
    assert_eq!(
        before.predict_batch(&rows).unwrap(),
        after.predict_batch(&rows).unwrap()
    );
}

#[test]
fn concurrent_predictions_match_sequential() {
    let service = service();
    let records: Vec<CustomerRecord> = (0..24)
        .map(|i| {
            let contract = if i % 2 == 0 { "Month-to-month" } else { "One year" };
            common::customer(1 + i * 2, contract)
        })
        .collect();
    let expected: Vec<_> = records
        .iter()
        .map(|r| service.predict(r).unwrap())
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let records = records.clone();
            thread::spawn(move || {
                records
                    .iter()
                    .map(|r| service.predict(r).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn registry_flow_through_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("telco.csv");
    write_telco_csv(&data, 300, 3);
    let registry_dir = dir.path().join("registry");

    let trainer = Trainer::new(
        fast_config()
            .with_data_path(&data)
            .with_registry_dir(&registry_dir),
    )
    .unwrap();
    let first = trainer.run().unwrap();
    let second = trainer.run().unwrap();
    assert!(matches!(
        first.artifact,
        Some(PersistedArtifact::Registry { version: 1, .. })
    ));
    assert!(matches!(
        second.artifact,
        Some(PersistedArtifact::Registry { version: 2, .. })
    ));

    let registry = ModelRegistry::open_existing(&registry_dir).unwrap();
    assert_eq!(registry.latest_version().unwrap(), Some(2));
    assert_eq!(registry.summary(2).unwrap().run_id, second.run_id);

    let latest = InferenceService::start(&ArtifactSource::Registry(registry_dir.clone()));
    assert_eq!(latest.predict(&churny_customer()).unwrap().model_version, "v0002");

    let pinned = InferenceService::start(&ArtifactSource::RegistryVersion(registry_dir, 1));
    assert_eq!(pinned.predict(&churny_customer()).unwrap().model_version, "v0001");
}

#[test]
fn logistic_regression_variant_trains() {
    let table = Table::from_csv_reader(telco_csv(400, 11).as_bytes()).unwrap();
    let config = fast_config().with_model(ModelConfig::LogisticRegression(
        LogisticRegressionConfig::default(),
    ));
    let bundle = Trainer::new(config).unwrap().train_on_table(table).unwrap();
    assert_eq!(bundle.model().kind(), "logistic_regression");
    assert_eq!(bundle.model().n_features_in(), bundle.pipeline().n_features_out());
    assert!(bundle.metadata().accuracy() >= 0.8, "accuracy {}", bundle.metadata().accuracy());

    let service = InferenceService::from_bundle(bundle);
    let p_churny = service.predict(&churny_customer()).unwrap().churn_probability;
    let p_loyal = service.predict(&loyal_customer()).unwrap().churn_probability;
    assert!(p_churny > p_loyal, "{} <= {}", p_churny, p_loyal);
}
