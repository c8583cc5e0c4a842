//! Trained bundle persistence

use atomicwrites::{AllowOverwrite, AtomicFile};
use compx_core::{Error, Result};
use compx_engine::TrainedBundle;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const MODEL_FILE: &str = "model.bin";

/// Stores the trained bundle as a single bincode file inside a data
/// directory.
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(MODEL_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically persist a bundle. The bundle is validated before any bytes
    /// hit the disk.
    pub fn save(&self, bundle: &TrainedBundle) -> Result<()> {
        bundle.validate()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes =
            bincode::serialize(bundle).map_err(|e| Error::Serialization(e.to_string()))?;
        AtomicFile::new(&self.path, AllowOverwrite)
            .write(|f| f.write_all(&bytes))
            .map_err(|e| match e {
                atomicwrites::Error::Internal(err) | atomicwrites::Error::User(err) => err,
            })?;

        info!(path = %self.path.display(), "model bundle saved");
        Ok(())
    }

    /// Load the persisted bundle, if one exists.
    ///
    /// A missing file is `Ok(None)` so callers can start cold; bytes that do
    /// not decode into a valid bundle are a `CorruptArtifact` error.
    pub fn load(&self) -> Result<Option<TrainedBundle>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&self.path)?;
        let bundle: TrainedBundle = bincode::deserialize(&bytes)
            .map_err(|e| Error::CorruptArtifact(format!("model bundle: {e}")))?;
        bundle.validate()?;

        info!(
            path = %self.path.display(),
            version = %bundle.metadata.version,
            "model bundle loaded"
        );
        Ok(Some(bundle))
    }
}
