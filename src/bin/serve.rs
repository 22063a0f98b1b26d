//! Load a churn model once and answer JSON requests, one per line, on
//! stdin. Each answer is written as one JSON line on stdout:
//! `{"status": 200, "body": {...}}`.

use churn_predictor::config::ServiceConfig;
use churn_predictor::inference::{handle_request, InferenceService};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "churn-serve")]
#[command(version)]
#[command(about = "Serve churn predictions over a JSON-lines protocol")]
struct Args {
    /// JSON service configuration; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Load this bundle file instead of the registry
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Registry directory
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Pin a registry version instead of following LATEST
    #[arg(long)]
    model_version: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(args: &Args) -> churn_predictor::Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_json_file(path)?,
        None => ServiceConfig::default(),
    }
    .apply_env_overrides();

    if let Some(model) = &args.model {
        config = config.with_model_path(model);
    }
    if let Some(registry) = &args.registry {
        config = config.with_registry_dir(registry);
    }
    if let Some(version) = args.model_version {
        config = config.with_registry_version(version);
    }
    Ok(config)
}

fn serve(service: &InferenceService) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_request(service, &line);
        let rendered = serde_json::json!({ "status": response.status, "body": response.body });
        writeln!(out, "{}", rendered)?;
        out.flush()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = InferenceService::start(&config.source());
    match serve(&service) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("I/O error while serving: {}", e);
            ExitCode::FAILURE
        }
    }
}
