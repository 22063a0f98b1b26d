use churn_predictor::config::TrainingConfig;
use churn_predictor::dataset::{CustomerRecord, Table};
use churn_predictor::inference::InferenceService;
use churn_predictor::metrics::ClassificationReport;
use churn_predictor::model::{ModelConfig, RandomForestConfig};
use churn_predictor::trainer::Trainer;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn synthetic_csv(n: usize) -> String {
    let mut csv = String::from(
        "customerID,tenure,MonthlyCharges,TotalCharges,Contract,InternetService,Churn\n",
    );
    for i in 0..n {
        let tenure = 1 + (i * 7) % 72;
        let contract = ["Month-to-month", "One year", "Two year"][i % 3];
        let internet = ["DSL", "Fiber optic", "No"][(i / 3) % 3];
        let monthly = 20.0 + ((i * 13) % 90) as f64;
        let churn = contract == "Month-to-month" && tenure <= 24;
        csv.push_str(&format!(
            "{:05},{},{:.2},{:.2},{},{},{}\n",
            i,
            tenure,
            monthly,
            monthly * tenure as f64,
            contract,
            internet,
            if churn { "Yes" } else { "No" }
        ));
    }
    csv
}

fn trained_service(n_estimators: usize) -> InferenceService {
    let table = Table::from_csv_reader(synthetic_csv(2000).as_bytes()).unwrap();
    let config = TrainingConfig::default().with_model(ModelConfig::RandomForest(
        RandomForestConfig::default().with_n_estimators(n_estimators),
    ));
    let bundle = Trainer::new(config).unwrap().train_on_table(table).unwrap();
    InferenceService::from_bundle(bundle)
}

fn record(i: usize) -> CustomerRecord {
    let tenure = 1 + (i * 5) % 72;
    CustomerRecord::new()
        .with("tenure", tenure as i64)
        .with("MonthlyCharges", 70.0)
        .with("TotalCharges", format!("{:.2}", 70.0 * tenure as f64))
        .with("Contract", if i % 2 == 0 { "Month-to-month" } else { "Two year" })
        .with("InternetService", "Fiber optic")
}

fn bench_predict_single(c: &mut Criterion) {
    for n_estimators in [10, 150].iter() {
        let service = trained_service(*n_estimators);
        let customer = record(3);
        c.bench_with_input(
            BenchmarkId::new("predict_single", n_estimators),
            n_estimators,
            |b, _| {
                b.iter(|| black_box(service.predict(black_box(&customer)).unwrap()));
            },
        );
    }
}

fn bench_predict_batch(c: &mut Criterion) {
    let service = trained_service(150);
    for size in [10, 100, 1000].iter() {
        let records: Vec<CustomerRecord> = (0..*size).map(record).collect();
        c.bench_with_input(BenchmarkId::new("predict_batch", size), size, |b, _| {
            b.iter(|| black_box(service.predict_batch(black_box(&records)).unwrap()));
        });
    }
}

fn bench_report(c: &mut Criterion) {
    for size in [1000, 100000].iter() {
        c.bench_with_input(BenchmarkId::new("classification_report", size), size, |b, &n| {
            let y_true: Vec<u8> = (0..n).map(|i| (i % 3 == 0) as u8).collect();
            let y_pred: Vec<u8> = (0..n).map(|i| (i % 4 == 0) as u8).collect();
            b.iter(|| {
                let report =
                    ClassificationReport::from_labels(black_box(&y_true), black_box(&y_pred));
                black_box(report.unwrap())
            });
        });
    }
}

criterion_group!(benches, bench_predict_single, bench_predict_batch, bench_report);
criterion_main!(benches);
