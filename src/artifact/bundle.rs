//! The composed, persisted artifact.
//!
//! # File layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     Magic ("CHURNART")
//! 8       4     Format version (u32, little-endian)
//! 12      32    SHA-256 of the payload
//! 44      ...   Payload (bincode-encoded ArtifactBundle)
//! ```

use crate::artifact::write_atomic;
use crate::error::{ChurnError, Result};
use crate::metrics::ClassificationReport;
use crate::model::{FittedModel, Predictor};
use crate::preprocessing::{FeatureSchema, FittedPipeline};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Magic bytes identifying an artifact file.
pub const MAGIC: &[u8; 8] = b"CHURNART";

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_SIZE: usize = 8 + 4 + 32;

/// Identity of one training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    /// Unique id of the run that produced the bundle.
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// Set when the bundle is written into a [`ModelRegistry`](super::ModelRegistry).
    pub registry_version: Option<u32>,
}

impl ArtifactVersion {
    pub fn new(created_at: DateTime<Utc>, seed: u64) -> Self {
        Self {
            run_id: format!("{}-{}", created_at.format("%Y%m%dT%H%M%S%.3fZ"), seed),
            created_at,
            registry_version: None,
        }
    }

    /// `v0003` for registered bundles, the run id otherwise.
    pub fn label(&self) -> String {
        match self.registry_version {
            Some(version) => format!("v{:04}", version),
            None => self.run_id.clone(),
        }
    }
}

/// What the training run measured and how it was configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub model_kind: String,
    pub hyperparameters: BTreeMap<String, String>,
    /// Held-out evaluation.
    pub evaluation: ClassificationReport,
    pub n_train: usize,
    pub n_test: usize,
    /// Rows removed during cleaning, before the split.
    pub dropped_rows: usize,
    pub test_size: f64,
    pub seed: u64,
}

impl TrainingMetadata {
    pub fn accuracy(&self) -> f64 {
        self.evaluation.accuracy
    }
}

/// Fitted pipeline and model, persisted and loaded as one unit.
///
/// A bundle is checked for internal consistency when it is built and again
/// when it is loaded, so a bundle in memory always satisfies:
/// - the pipeline columns equal the schema columns, in the same order;
/// - the pipeline output width equals the model input width;
/// - every vocabulary is sorted and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    format_version: u32,
    version: ArtifactVersion,
    schema: FeatureSchema,
    pipeline: FittedPipeline,
    model: FittedModel,
    metadata: TrainingMetadata,
}

impl ArtifactBundle {
    /// Compose a bundle.
    ///
    /// # Errors
    /// Returns [`ChurnError::ArtifactLoad`] if the parts are inconsistent.
    pub fn new(
        version: ArtifactVersion,
        schema: FeatureSchema,
        pipeline: FittedPipeline,
        model: FittedModel,
        metadata: TrainingMetadata,
    ) -> Result<Self> {
        let bundle = Self {
            format_version: FORMAT_VERSION,
            version,
            schema,
            pipeline,
            model,
            metadata,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn version(&self) -> &ArtifactVersion {
        &self.version
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn pipeline(&self) -> &FittedPipeline {
        &self.pipeline
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Copy of this bundle stamped with a registry version.
    pub(crate) fn with_registry_version(&self, version: u32) -> Self {
        let mut bundle = self.clone();
        bundle.version.registry_version = Some(version);
        bundle
    }

    /// Check the consistency invariants.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ChurnError::ArtifactLoad(msg));

        if self.format_version != FORMAT_VERSION {
            return fail(format!(
                "unsupported format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            ));
        }
        if let Err(e) = self.pipeline.validate() {
            return fail(format!("invalid pipeline: {}", e));
        }
        if let Err(e) = self.model.validate() {
            return fail(format!("invalid model: {}", e));
        }
        if !self.pipeline.matches_schema(&self.schema) {
            return fail("pipeline columns do not match the schema".to_string());
        }
        if let Some(id) = self
            .schema
            .feature_columns()
            .find(|c| self.schema.identifier_columns.contains(*c))
        {
            return fail(format!("identifier column '{}' is also a feature", id));
        }
        if self.pipeline.n_features_out() != self.model.n_features_in() {
            return fail(format!(
                "pipeline produces {} features but the model expects {}",
                self.pipeline.n_features_out(),
                self.model.n_features_in()
            ));
        }
        Ok(())
    }

    /// Encode into the enveloped byte format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let digest = Sha256::digest(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&digest);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode and validate enveloped bytes.
    ///
    /// # Errors
    /// Returns [`ChurnError::ArtifactLoad`] for a wrong magic or version, a
    /// checksum mismatch, an undecodable payload or a failed consistency check.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ChurnError::ArtifactLoad(format!(
                "file truncated: {} bytes, header needs {}",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        let (header, payload) = bytes.split_at(HEADER_SIZE);

        if &header[0..8] != MAGIC {
            return Err(ChurnError::ArtifactLoad("not a churn artifact file".to_string()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&header[8..12]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(ChurnError::ArtifactLoad(format!(
                "unsupported format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }
        let actual = Sha256::digest(payload);
        if actual.as_slice() != &header[12..HEADER_SIZE] {
            return Err(ChurnError::ArtifactLoad(format!(
                "checksum mismatch: expected {}, got {}",
                hex::encode(&header[12..HEADER_SIZE]),
                hex::encode(actual)
            )));
        }

        let bundle: ArtifactBundle = bincode::deserialize(payload)
            .map_err(|e| ChurnError::ArtifactLoad(format!("corrupt payload: {}", e)))?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Atomically write the bundle to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)?;
        log::info!(
            "Saved artifact {} ({} bytes) to {}",
            self.version.label(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    /// Read and validate a bundle from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            ChurnError::ArtifactLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        let bundle = Self::from_bytes(&bytes)?;
        log::info!(
            "Loaded artifact {} ({}, {} features) from {}",
            bundle.version.label(),
            bundle.model.kind(),
            bundle.pipeline.n_features_out(),
            path.display()
        );
        Ok(bundle)
    }
}
