//! Synthetic telco data shared by the integration tests.
//!
//! Churn is fully determined by contract and tenure: month-to-month customers
//! in their first two years churn, everybody else stays.

#![allow(dead_code)]

use churn_predictor::config::TrainingConfig;
use churn_predictor::dataset::CustomerRecord;
use churn_predictor::model::{ModelConfig, RandomForestConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt::Write;
use std::path::Path;

pub const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,\
PhoneService,InternetService,Contract,PaperlessBilling,PaymentMethod,\
MonthlyCharges,TotalCharges,Churn";

const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];
const INTERNET: [&str; 3] = ["DSL", "Fiber optic", "No"];
const PAYMENT: [&str; 4] = [
    "Electronic check",
    "Mailed check",
    "Bank transfer (automatic)",
    "Credit card (automatic)",
];

pub fn churns(contract: &str, tenure: i64) -> bool {
    contract == "Month-to-month" && tenure <= 24
}

/// `n_rows` customers as CSV text. Customers with zero tenure have a blank
/// `TotalCharges`, like the real dataset.
pub fn telco_csv(n_rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for i in 0..n_rows {
        let contract = if rng.gen_bool(0.5) {
            CONTRACTS[0]
        } else {
            *CONTRACTS[1..].choose(&mut rng).unwrap()
        };
        let tenure: i64 = if i % 25 == 0 { 0 } else { rng.gen_range(1..=48) };
        let monthly: f64 = rng.gen_range(18.0..110.0);
        let total = if tenure == 0 {
            " ".to_string()
        } else {
            format!("{:.2}", monthly * tenure as f64)
        };
        writeln!(
            csv,
            "{:04}-SYNTH,{},{},{},{},{},{},{},{},{},{},{:.2},{},{}",
            i,
            if rng.gen_bool(0.5) { "Male" } else { "Female" },
            u8::from(rng.gen_bool(0.15)),
            if rng.gen_bool(0.5) { "Yes" } else { "No" },
            if rng.gen_bool(0.3) { "Yes" } else { "No" },
            tenure,
            if rng.gen_bool(0.9) { "Yes" } else { "No" },
            INTERNET.choose(&mut rng).unwrap(),
            contract,
            if rng.gen_bool(0.6) { "Yes" } else { "No" },
            PAYMENT.choose(&mut rng).unwrap(),
            monthly,
            total,
            if churns(contract, tenure) { "Yes" } else { "No" }
        )
        .unwrap();
    }
    csv
}

pub fn write_telco_csv(path: &Path, n_rows: usize, seed: u64) {
    std::fs::write(path, telco_csv(n_rows, seed)).unwrap();
}

/// Default training configuration with a smaller forest.
pub fn fast_config() -> TrainingConfig {
    TrainingConfig::default().with_model(ModelConfig::RandomForest(
        RandomForestConfig::default().with_n_estimators(40),
    ))
}

/// A complete request record.
pub fn customer(tenure: i64, contract: &str) -> CustomerRecord {
    let monthly = 70.0;
    CustomerRecord::new()
        .with("customerID", "9999-TEST")
        .with("gender", "Female")
        .with("SeniorCitizen", 0i64)
        .with("Partner", "No")
        .with("Dependents", "No")
        .with("tenure", tenure)
        .with("PhoneService", "Yes")
        .with("InternetService", "Fiber optic")
        .with("Contract", contract)
        .with("PaperlessBilling", "Yes")
        .with("PaymentMethod", "Electronic check")
        .with("MonthlyCharges", monthly)
        .with("TotalCharges", format!("{:.2}", monthly * tenure as f64))
}

pub fn churny_customer() -> CustomerRecord {
    customer(2, "Month-to-month")
}

pub fn loyal_customer() -> CustomerRecord {
    customer(40, "Two year")
}
