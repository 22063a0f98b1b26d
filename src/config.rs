//! Training and serving configuration.
//!
//! Values come from `Default`, an optional JSON file and `CHURN_*`
//! environment variables, applied in that order. The binaries layer CLI flags
//! on top.

use crate::artifact::ArtifactSource;
use crate::error::{ChurnError, Result};
use crate::model::ModelConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Dataset path used when nothing else is configured.
pub const DEFAULT_DATA_PATH: &str = "data/WA_Fn-UseC_-Telco-Customer-Churn.csv";
/// Registry directory used when nothing else is configured.
pub const DEFAULT_REGISTRY_DIR: &str = "saved_artifacts";

pub const ENV_DATA_PATH: &str = "CHURN_DATA_PATH";
pub const ENV_REGISTRY_DIR: &str = "CHURN_REGISTRY_DIR";
pub const ENV_MODEL_PATH: &str = "CHURN_MODEL_PATH";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ChurnError::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        ChurnError::Config(format!("failed to parse config file {}: {}", path.display(), e))
    })
}

/// Everything a training run needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub data_path: PathBuf,
    /// Registry the bundle is registered into when `model_path` is unset.
    pub registry_dir: PathBuf,
    /// Write a single bundle file here instead of registering it.
    pub model_path: Option<PathBuf>,
    pub target_column: String,
    /// Target value mapped to label 1.
    pub positive_label: String,
    /// Columns excluded from the features.
    pub identifier_columns: Vec<String>,
    /// Columns coerced to numbers before the split; rows that fail are dropped.
    pub numeric_cleanup_columns: Vec<String>,
    pub test_size: f64,
    /// Seed for the split and the model.
    pub seed: u64,
    pub model: ModelConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            model_path: None,
            target_column: "Churn".to_string(),
            positive_label: "Yes".to_string(),
            identifier_columns: vec!["customerID".to_string()],
            numeric_cleanup_columns: vec!["TotalCharges".to_string()],
            test_size: 0.2,
            seed: 42,
            model: ModelConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_registry_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.registry_dir = dir.into();
        self
    }

    pub fn with_model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Apply `CHURN_DATA_PATH`, `CHURN_REGISTRY_DIR` and `CHURN_MODEL_PATH`.
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = non_empty(lookup(ENV_DATA_PATH)) {
            self.data_path = PathBuf::from(path);
        }
        if let Some(dir) = non_empty(lookup(ENV_REGISTRY_DIR)) {
            self.registry_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty(lookup(ENV_MODEL_PATH)) {
            self.model_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ChurnError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.target_column.is_empty() {
            return Err(ChurnError::Config("target_column is empty".to_string()));
        }
        if self.identifier_columns.contains(&self.target_column) {
            return Err(ChurnError::Config(format!(
                "'{}' is both the target and an identifier",
                self.target_column
            )));
        }
        Ok(())
    }
}

/// Where the inference service loads its bundle from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// A bundle file. Takes precedence over the registry.
    pub model_path: Option<PathBuf>,
    pub registry_dir: PathBuf,
    /// Pin a registry version instead of following `LATEST`.
    pub registry_version: Option<u32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            registry_version: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn with_model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_registry_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.registry_dir = dir.into();
        self
    }

    pub fn with_registry_version(mut self, version: u32) -> Self {
        self.registry_version = Some(version);
        self
    }

    /// Apply `CHURN_REGISTRY_DIR` and `CHURN_MODEL_PATH`.
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = non_empty(lookup(ENV_REGISTRY_DIR)) {
            self.registry_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty(lookup(ENV_MODEL_PATH)) {
            self.model_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn source(&self) -> ArtifactSource {
        match (&self.model_path, self.registry_version) {
            (Some(path), _) => ArtifactSource::File(path.clone()),
            (None, Some(version)) => {
                ArtifactSource::RegistryVersion(self.registry_dir.clone(), version)
            }
            (None, None) => ArtifactSource::Registry(self.registry_dir.clone()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
