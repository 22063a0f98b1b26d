//! Artifact persistence: the composed bundle file and the versioned registry.

mod bundle;
mod registry;

pub use bundle::{
    ArtifactBundle, ArtifactVersion, TrainingMetadata, FORMAT_VERSION, MAGIC,
};
pub use registry::{ModelRegistry, RegisteredModel, RunSummary};

#[cfg(test)]
pub(crate) use bundle::tests::sample_bundle;

use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where a service should load its bundle from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A single bundle file.
    File(PathBuf),
    /// The `LATEST` version of a registry directory.
    Registry(PathBuf),
    /// A specific version of a registry directory.
    RegistryVersion(PathBuf, u32),
}

impl ArtifactSource {
    /// Resolve and load the bundle this source points at.
    pub fn load(&self) -> Result<ArtifactBundle> {
        match self {
            ArtifactSource::File(path) => ArtifactBundle::load(path),
            ArtifactSource::Registry(root) => ModelRegistry::open_existing(root)?.load_latest(),
            ArtifactSource::RegistryVersion(root, version) => {
                ModelRegistry::open_existing(root)?.load_version(*version)
            }
        }
    }
}

impl std::fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactSource::File(path) => write!(f, "file {}", path.display()),
            ArtifactSource::Registry(root) => write!(f, "registry {} (latest)", root.display()),
            ArtifactSource::RegistryVersion(root, version) => {
                write!(f, "registry {} (v{:04})", root.display(), version)
            }
        }
    }
}

/// Write `bytes` to `path` so that readers see either the old file or the
/// complete new one: temp file in the same directory, fsync, rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
