//! Train a churn model and persist it as a bundle file or registry version.

use churn_predictor::config::TrainingConfig;
use churn_predictor::model::{LogisticRegressionConfig, ModelConfig, RandomForestConfig};
use churn_predictor::trainer::Trainer;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModelKind {
    RandomForest,
    LogisticRegression,
}

#[derive(Parser, Debug)]
#[command(name = "churn-train")]
#[command(version)]
#[command(about = "Train a customer churn model from the telco CSV")]
struct Args {
    /// JSON training configuration; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Training CSV
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Registry directory to register the new version into
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Write a single bundle file instead of registering
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Classifier to train
    #[arg(short, long, value_enum)]
    model: Option<ModelKind>,

    /// Number of trees (random forest)
    #[arg(long)]
    n_estimators: Option<usize>,

    /// Seed for the split and the model
    #[arg(long)]
    seed: Option<u64>,

    /// Held-out fraction
    #[arg(long)]
    test_size: Option<f64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(args: &Args) -> churn_predictor::Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    }
    .apply_env_overrides();

    if let Some(data) = &args.data {
        config = config.with_data_path(data);
    }
    if let Some(registry) = &args.registry {
        config = config.with_registry_dir(registry);
    }
    if let Some(output) = &args.output {
        config = config.with_model_path(output);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(test_size) = args.test_size {
        config = config.with_test_size(test_size);
    }
    match args.model {
        Some(ModelKind::LogisticRegression) => {
            config = config.with_model(ModelConfig::LogisticRegression(
                LogisticRegressionConfig::default(),
            ));
        }
        Some(ModelKind::RandomForest) => {
            config = config.with_model(ModelConfig::RandomForest(RandomForestConfig::default()));
        }
        None => {}
    }
    if let Some(n) = args.n_estimators {
        if let ModelConfig::RandomForest(rf) = &config.model {
            config.model = ModelConfig::RandomForest(rf.clone().with_n_estimators(n));
        } else {
            log::warn!("--n-estimators ignored for {}", config.model.kind());
        }
    }
    Ok(config)
}

fn run(args: &Args) -> churn_predictor::Result<()> {
    let config = build_config(args)?;
    log::info!(
        "Training {} on {}",
        config.model.kind(),
        config.data_path.display()
    );
    let report = Trainer::new(config)?.run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let e = &report.evaluation;
        println!("run        {}", report.run_id);
        println!("model      {}", report.model_kind);
        println!(
            "rows       {} train / {} test ({} dropped)",
            report.n_train, report.n_test, report.dropped_rows
        );
        println!("accuracy   {:.4}", e.accuracy);
        println!("precision  {:.4}", e.precision);
        println!("recall     {:.4}", e.recall);
        println!("f1         {:.4}", e.f1);
        if let Some(artifact) = &report.artifact {
            println!("artifact   {}", serde_json::to_string(artifact)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Training failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
