//! Embedding index persistence
//!
//! The on-disk form is a dedicated snapshot layout rather than the in-memory
//! types: candidate records are stored field by field because the engine's
//! wire representation flattens them, which bincode cannot encode.

use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, Utc};
use compx_core::{
    CandidateProperty, Condition, Error, Property, Result, StructureType, Vector,
};
use compx_engine::{EmbeddingIndex, StandardScaler};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const INDEX_FILE: &str = "index.bin";

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    scaler: StandardScaler,
    matrix: Vec<Vector>,
    candidates: Vec<CandidateSnapshot>,
    built_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CandidateSnapshot {
    id: String,
    address: String,
    structure_type: StructureType,
    property_type: Option<String>,
    gla: f64,
    lot_size: f64,
    bedrooms: f64,
    bathrooms: f64,
    year_built: i32,
    garage_spaces: f64,
    condition: Condition,
    quality: Condition,
    latitude: f64,
    longitude: f64,
    neighborhood: Option<String>,
    features: Vec<String>,
    sale_date: Option<DateTime<Utc>>,
    sale_price: Option<f64>,
}

impl From<&CandidateProperty> for CandidateSnapshot {
    fn from(c: &CandidateProperty) -> Self {
        let p = &c.property;
        Self {
            id: c.id.clone(),
            address: p.address.clone(),
            structure_type: p.structure_type,
            property_type: p.property_type.clone(),
            gla: p.gla,
            lot_size: p.lot_size,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            year_built: p.year_built,
            garage_spaces: p.garage_spaces,
            condition: p.condition,
            quality: p.quality,
            latitude: p.latitude,
            longitude: p.longitude,
            neighborhood: p.neighborhood.clone(),
            features: p.features.clone(),
            sale_date: c.sale_date,
            sale_price: c.sale_price,
        }
    }
}

impl From<CandidateSnapshot> for CandidateProperty {
    fn from(s: CandidateSnapshot) -> Self {
        Self {
            id: s.id,
            property: Property {
                address: s.address,
                structure_type: s.structure_type,
                property_type: s.property_type,
                gla: s.gla,
                lot_size: s.lot_size,
                bedrooms: s.bedrooms,
                bathrooms: s.bathrooms,
                year_built: s.year_built,
                garage_spaces: s.garage_spaces,
                condition: s.condition,
                quality: s.quality,
                latitude: s.latitude,
                longitude: s.longitude,
                neighborhood: s.neighborhood,
                features: s.features,
            },
            sale_date: s.sale_date,
            sale_price: s.sale_price,
        }
    }
}

/// Stores the embedding index (matrix, candidate metadata and its fitted
/// scaler) as a single bincode file inside a data directory.
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(INDEX_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically persist an index.
    pub fn save(&self, index: &EmbeddingIndex) -> Result<()> {
        index.validate()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let snapshot = IndexSnapshot {
            scaler: index.scaler().clone(),
            matrix: index.rows().to_vec(),
            candidates: index.candidates().iter().map(Into::into).collect(),
            built_at: index.built_at(),
        };
        let bytes =
            bincode::serialize(&snapshot).map_err(|e| Error::Serialization(e.to_string()))?;
        AtomicFile::new(&self.path, AllowOverwrite)
            .write(|f| f.write_all(&bytes))
            .map_err(|e| match e {
                atomicwrites::Error::Internal(err) | atomicwrites::Error::User(err) => err,
            })?;

        info!(path = %self.path.display(), rows = index.len(), "embedding index saved");
        Ok(())
    }

    /// Load the persisted index, if one exists.
    ///
    /// A missing file is `Ok(None)`. Decoded snapshots are re-validated: row
    /// count alignment, dimensionality and finiteness all have to hold before
    /// the index is handed out.
    pub fn load(&self) -> Result<Option<EmbeddingIndex>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&self.path)?;
        let snapshot: IndexSnapshot = bincode::deserialize(&bytes)
            .map_err(|e| Error::CorruptArtifact(format!("embedding index: {e}")))?;
        let index = EmbeddingIndex::from_parts(
            snapshot.scaler,
            snapshot.matrix,
            snapshot.candidates.into_iter().map(Into::into).collect(),
            snapshot.built_at,
        )?;

        info!(path = %self.path.display(), rows = index.len(), "embedding index loaded");
        Ok(Some(index))
    }
}
