//! # compx
//!
//! A comparable-property ("comp") recommendation engine for real-estate
//! appraisals. Given a subject property and a pool of candidate sales, compx
//! ranks the candidates by similarity, prices the differences as dollar
//! adjustments, and explains every score factor by factor.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use compx::prelude::*;
//!
//! let engine = CompEngine::default();
//!
//! let subject: SubjectProperty = serde_json::from_str("{...}").unwrap();
//! let candidates: Vec<CandidateProperty> = serde_json::from_str("[...]").unwrap();
//!
//! // Works untrained: similarity degrades to the rule-based scorer.
//! let recs = engine
//!     .recommend(&subject, &candidates, &RankingParams::strict())
//!     .unwrap();
//! for rec in recs {
//!     println!("#{} {} ({:.1}%)", rec.rank, rec.candidate.property.address, rec.similarity_score);
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `compx-core` - Property model, geo math, vectors, error taxonomy
//! - `compx-engine` - Features, scorers, training, ranking, embedding index
//! - `compx-storage` - Atomic bincode persistence for trained artifacts

use std::path::Path;
use tracing::info;

// Re-export core types
pub use compx_core::{
    Adjustments, CandidateProperty, CompRecommendation, Condition, Error, Explanation, Property,
    Result, StructureType, SubjectProperty, Vector,
};

// Re-export the engine
pub use compx_engine::{
    load_appraisals, train, CompEngine, EmbeddingIndex, EngineStatus, HistoricalAppraisal,
    RankingConfig, RankingParams, ScoreSource, TrainedBundle, TrainingMetrics,
};

// Re-export storage
pub use compx_storage::{IndexStore, ModelStore};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CandidateProperty, CompEngine, CompRecommendation, EmbeddingIndex, EngineStatus, Error,
        HistoricalAppraisal, IndexStore, ModelStore, Property, RankingConfig, RankingParams,
        Result, SubjectProperty, TrainedBundle,
    };
}

/// Build an engine from the artifacts persisted under `data_dir`.
///
/// Disk I/O and artifact validation run on the blocking pool. Missing
/// artifacts are not errors: the engine comes up with whatever is available
/// and `status()` reports what that is.
pub async fn initialize_engine(data_dir: impl AsRef<Path>) -> anyhow::Result<CompEngine> {
    let data_dir = data_dir.as_ref().to_path_buf();

    let (bundle, index) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let bundle = ModelStore::new(&data_dir).load()?;
        let index = IndexStore::new(&data_dir).load()?;
        Ok((bundle, index))
    })
    .await??;

    let engine = CompEngine::default();
    match bundle {
        Some(bundle) => engine.install_model(bundle)?,
        None => info!("no trained model on disk, scoring falls back to rules"),
    }
    match index {
        Some(index) => engine.install_index(index)?,
        None => info!("no embedding index on disk, vectorized search unavailable"),
    }

    Ok(engine)
}
