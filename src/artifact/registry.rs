//! Directory of monotonically versioned bundles.
//!
//! ```text
//! <root>/
//!   LATEST            "v0003"
//!   v0001/bundle.bin
//!   v0001/run.json
//!   ...
//!   v0003/bundle.bin
//!   v0003/run.json
//! ```
//!
//! A version directory is staged under a temporary name and renamed into
//! place once complete, then `LATEST` is rewritten atomically. Existing
//! version directories are never modified. Concurrent `register` calls on one
//! registry must be serialized by the caller.

use crate::artifact::{write_atomic, ArtifactBundle};
use crate::error::{ChurnError, Result};
use crate::metrics::ClassificationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LATEST_FILE: &str = "LATEST";
const BUNDLE_FILE: &str = "bundle.bin";
const SUMMARY_FILE: &str = "run.json";

/// Human-readable description of one registered version (`run.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub model_kind: String,
    pub accuracy: f64,
    pub evaluation: ClassificationReport,
    pub hyperparameters: BTreeMap<String, String>,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    /// Hex SHA-256 of `bundle.bin`.
    pub sha256: String,
}

/// Result of [`ModelRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModel {
    pub version: u32,
    pub bundle_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
}

fn version_dir_name(version: u32) -> String {
    format!("v{:04}", version)
}

fn parse_version(name: &str) -> Option<u32> {
    let digits = name.strip_prefix('v')?;
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl ModelRegistry {
    /// Open a registry, creating its directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open a registry that must already exist.
    pub fn open_existing<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ChurnError::ArtifactLoad(format!(
                "model registry {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundle_path(&self, version: u32) -> PathBuf {
        self.root.join(version_dir_name(version)).join(BUNDLE_FILE)
    }

    /// Registered versions, ascending.
    pub fn versions(&self) -> Result<Vec<u32>> {
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(version) = name.to_str().and_then(parse_version) {
                if entry.path().join(BUNDLE_FILE).is_file() {
                    versions.push(version);
                }
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Version named by `LATEST`, if any.
    pub fn latest_version(&self) -> Result<Option<u32>> {
        let path = self.root.join(LATEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => parse_version(contents.trim()).map(Some).ok_or_else(|| {
                ChurnError::ArtifactLoad(format!(
                    "{} holds '{}', not a version",
                    path.display(),
                    contents.trim()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store `bundle` as the next version and point `LATEST` at it.
    pub fn register(&self, bundle: &ArtifactBundle) -> Result<RegisteredModel> {
        let version = self.versions()?.last().map_or(1, |v| v + 1);
        let final_dir = self.root.join(version_dir_name(version));
        if final_dir.exists() {
            return Err(ChurnError::Io(format!(
                "version directory {} already exists",
                final_dir.display()
            )));
        }

        let stamped = bundle.with_registry_version(version);
        let bytes = stamped.to_bytes()?;
        let summary = RunSummary {
            version,
            run_id: stamped.version().run_id.clone(),
            created_at: stamped.version().created_at,
            registered_at: Utc::now(),
            model_kind: stamped.metadata().model_kind.clone(),
            accuracy: stamped.metadata().accuracy(),
            evaluation: stamped.metadata().evaluation.clone(),
            hyperparameters: stamped.metadata().hyperparameters.clone(),
            n_train: stamped.metadata().n_train,
            n_test: stamped.metadata().n_test,
            n_features: stamped.pipeline().n_features_out(),
            sha256: hex::encode(Sha256::digest(&bytes)),
        };

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;
        write_atomic(&staging.path().join(BUNDLE_FILE), &bytes)?;
        write_atomic(
            &staging.path().join(SUMMARY_FILE),
            serde_json::to_string_pretty(&summary)?.as_bytes(),
        )?;
        std::fs::rename(staging.path(), &final_dir)?;

        let mut pointer = version_dir_name(version);
        pointer.push('\n');
        write_atomic(&self.root.join(LATEST_FILE), pointer.as_bytes())?;

        log::info!(
            "Registered {} in {} (accuracy {:.4})",
            version_dir_name(version),
            self.root.display(),
            summary.accuracy
        );
        Ok(RegisteredModel {
            version,
            bundle_path: final_dir.join(BUNDLE_FILE),
        })
    }

    pub fn load_version(&self, version: u32) -> Result<ArtifactBundle> {
        ArtifactBundle::load(self.bundle_path(version))
    }

    /// Load the version `LATEST` points at.
    ///
    /// # Errors
    /// Returns [`ChurnError::ArtifactLoad`] if nothing has been registered.
    pub fn load_latest(&self) -> Result<ArtifactBundle> {
        match self.latest_version()? {
            Some(version) => self.load_version(version),
            None => Err(ChurnError::ArtifactLoad(format!(
                "model registry {} has no registered versions",
                self.root.display()
            ))),
        }
    }

    pub fn summary(&self, version: u32) -> Result<RunSummary> {
        let path = self.root.join(version_dir_name(version)).join(SUMMARY_FILE);
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::bundle::tests::sample_bundle;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v0001"), Some(1));
        assert_eq!(parse_version("v12345"), Some(12345));
        assert_eq!(parse_version("v01"), None);
        assert_eq!(parse_version("0001"), None);
        assert_eq!(parse_version(".staging-abc"), None);
    }

    #[test]
    fn test_register_versions_increase() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let bundle = sample_bundle();

        assert!(registry.versions().unwrap().is_empty());
        assert_eq!(registry.latest_version().unwrap(), None);

        let first = registry.register(&bundle).unwrap();
        let second = registry.register(&bundle).unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(registry.versions().unwrap(), vec![1, 2]);
        assert_eq!(registry.latest_version().unwrap(), Some(2));

        let latest = registry.load_latest().unwrap();
        assert_eq!(latest.version().registry_version, Some(2));
        assert_eq!(latest.version().label(), "v0002");
        assert_eq!(latest.pipeline(), bundle.pipeline());

        let old = registry.load_version(1).unwrap();
        assert_eq!(old.version().registry_version, Some(1));
    }

    #[test]
    fn test_run_summary_written() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        let registered = registry.register(&sample_bundle()).unwrap();

        let summary = registry.summary(registered.version).unwrap();
        assert_eq!(summary.version, 1);
        assert_eq!(summary.model_kind, "random_forest");
        assert_eq!(summary.hyperparameters["n_estimators"], "5");

        let bytes = std::fs::read(&registered.bundle_path).unwrap();
        assert_eq!(summary.sha256, hex::encode(Sha256::digest(&bytes)));
    }

    #[test]
    fn test_no_staging_dirs_left() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        registry.register(&sample_bundle()).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.starts_with(".staging-")), "{:?}", names);
    }

    #[test]
    fn test_empty_registry_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        assert!(matches!(
            registry.load_latest(),
            Err(ChurnError::ArtifactLoad(_))
        ));
        assert!(ModelRegistry::open_existing(dir.path().join("missing")).is_err());
    }
}
