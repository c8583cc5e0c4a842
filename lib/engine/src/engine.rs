//! Engine facade
//!
//! Owns the trained bundle and the embedding index behind swap-in slots so a
//! retrain or reindex replaces the artifact atomically while requests are in
//! flight. Readers clone an `Arc` out of the slot and never hold the lock
//! across scoring work.

use crate::adjust::calculate_adjustments;
use crate::explain::{explain_index_match, reasoning};
use crate::features::effective_as_of;
use crate::index::EmbeddingIndex;
use crate::model::TrainedBundle;
use crate::pipeline::{rank_candidates, RankingConfig, RankingParams};
use compx_core::geo::{days_since, haversine_miles};
use compx_core::{CandidateProperty, CompRecommendation, Error, Result, SubjectProperty};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Readiness snapshot for health endpoints and CLI output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineStatus {
    pub model_ready: bool,
    pub model_version: Option<String>,
    pub index_ready: bool,
    pub indexed_candidates: usize,
}

/// Thread-safe recommendation engine.
///
/// Both artifacts are optional: without a model the ranking path degrades to
/// the rule-based scorer, while without an index the vectorized search path
/// fails hard with `NotReady`.
pub struct CompEngine {
    bundle: RwLock<Option<Arc<TrainedBundle>>>,
    index: RwLock<Option<Arc<EmbeddingIndex>>>,
    config: RankingConfig,
}

impl Default for CompEngine {
    fn default() -> Self {
        Self::new(RankingConfig::default())
    }
}

impl CompEngine {
    #[must_use]
    pub fn new(config: RankingConfig) -> Self {
        Self {
            bundle: RwLock::new(None),
            index: RwLock::new(None),
            config,
        }
    }

    /// Validate and swap in a trained bundle.
    pub fn install_model(&self, bundle: TrainedBundle) -> Result<()> {
        bundle.validate()?;
        let version = bundle.metadata.version.clone();
        *self.bundle.write() = Some(Arc::new(bundle));
        info!(%version, "similarity model installed");
        Ok(())
    }

    /// Validate and swap in an embedding index.
    pub fn install_index(&self, index: EmbeddingIndex) -> Result<()> {
        index.validate()?;
        let rows = index.len();
        *self.index.write() = Some(Arc::new(index));
        info!(rows, "embedding index installed");
        Ok(())
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let bundle = self.bundle.read().clone();
        let index = self.index.read().clone();
        EngineStatus {
            model_ready: bundle.is_some(),
            model_version: bundle.map(|b| b.metadata.version.clone()),
            index_ready: index.is_some(),
            indexed_candidates: index.map_or(0, |i| i.len()),
        }
    }

    /// Rank a caller-supplied candidate set against the subject.
    pub fn recommend(
        &self,
        subject: &SubjectProperty,
        candidates: &[CandidateProperty],
        params: &RankingParams,
    ) -> Result<Vec<CompRecommendation>> {
        let bundle = self.bundle.read().clone();
        rank_candidates(bundle.as_deref(), subject, candidates, params, &self.config)
    }

    /// Search the prebuilt index for the subject's nearest candidates.
    ///
    /// Unlike `recommend`, a missing index is a hard failure: the caller
    /// asked specifically for the vectorized path.
    pub fn search_index(
        &self,
        subject: &SubjectProperty,
        top_k: usize,
    ) -> Result<Vec<CompRecommendation>> {
        let index = self
            .index
            .read()
            .clone()
            .ok_or_else(|| Error::NotReady("embedding index not built".into()))?;

        let as_of = effective_as_of(subject);
        let s = &subject.property;

        let recommendations = index
            .query(subject, top_k)?
            .into_iter()
            .enumerate()
            .map(|(i, hit)| {
                let c = &hit.candidate.property;
                let distance = haversine_miles(s.latitude, s.longitude, c.latitude, c.longitude);
                let days = days_since(hit.candidate.sale_date, as_of);
                let overall = hit.similarity
                    - distance * self.config.distance_penalty
                    - days as f64 * self.config.recency_penalty;
                CompRecommendation {
                    rank: i + 1,
                    similarity_score: hit.similarity,
                    overall_score: overall,
                    distance_miles: distance,
                    days_since_sale: days,
                    adjustments: calculate_adjustments(subject, &hit.candidate, as_of),
                    explanations: explain_index_match(subject, &hit.candidate, hit.similarity, as_of),
                    reasoning: reasoning(subject, &hit.candidate, hit.similarity, distance, days),
                    candidate: hit.candidate,
                }
            })
            .collect();

        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::HistoricalAppraisal;
    use crate::model::train;
    use chrono::{Duration, Utc};
    use compx_core::{Property, StructureType};

    fn property(address: &str, gla: f64, lat: f64) -> Property {
        Property {
            address: address.into(),
            gla,
            lot_size: 5000.0,
            bedrooms: 3.0,
            bathrooms: 2.0,
            year_built: 2000,
            latitude: lat,
            longitude: -76.48,
            structure_type: StructureType::Detached,
            ..Default::default()
        }
    }

    fn subject() -> SubjectProperty {
        SubjectProperty {
            property: property("100 King St", 2000.0, 44.23),
            appraisal_date: Some(Utc::now()),
            estimated_value: Some(400_000.0),
        }
    }

    fn candidates() -> Vec<CandidateProperty> {
        (0..8)
            .map(|i| CandidateProperty {
                id: format!("c{i}"),
                property: property(&format!("{i} Elm St"), 1800.0 + i as f64 * 50.0, 44.23),
                sale_date: Some(Utc::now() - Duration::days(10 + i * 5)),
                sale_price: Some(380_000.0 + i as f64 * 5000.0),
            })
            .collect()
    }

    #[test]
    fn test_fresh_engine_status() {
        let engine = CompEngine::default();
        let status = engine.status();
        assert!(!status.model_ready);
        assert!(!status.index_ready);
        assert_eq!(status.indexed_candidates, 0);
        assert_eq!(status.model_version, None);
    }

    #[test]
    fn test_recommend_without_model_uses_rule_based_path() {
        let engine = CompEngine::default();
        let recs = engine
            .recommend(&subject(), &candidates(), &RankingParams::strict())
            .unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].rank, 1);
    }

    #[test]
    fn test_search_index_requires_index() {
        let engine = CompEngine::default();
        let err = engine.search_index(&subject(), 3).unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
    }

    #[test]
    fn test_install_index_enables_search() {
        let engine = CompEngine::default();
        engine
            .install_index(EmbeddingIndex::build(&candidates()).unwrap())
            .unwrap();

        let status = engine.status();
        assert!(status.index_ready);
        assert_eq!(status.indexed_candidates, 8);

        let recs = engine.search_index(&subject(), 3).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(
            recs.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(recs[0].explanations[0].factor, "Embedding Similarity");
    }

    #[test]
    fn test_install_model_swaps_in() {
        let now = Utc::now();
        let appraisals: Vec<HistoricalAppraisal> = (0..10)
            .map(|i| HistoricalAppraisal {
                id: format!("a{i}"),
                subject: subject(),
                candidates: vec![
                    CandidateProperty {
                        id: "good".into(),
                        property: property("1 Twin St", 2000.0, 44.23),
                        sale_date: Some(now - Duration::days(15)),
                        sale_price: Some(400_000.0),
                    },
                    CandidateProperty {
                        id: "bad".into(),
                        property: property("9 Far Rd", 700.0, 44.9),
                        sale_date: Some(now - Duration::days(300)),
                        sale_price: Some(120_000.0),
                    },
                ],
                selected_comp_ids: vec!["good".into()],
            })
            .collect();
        let (bundle, _) = train(&appraisals).unwrap();

        let engine = CompEngine::default();
        engine.install_model(bundle).unwrap();
        let status = engine.status();
        assert!(status.model_ready);
        assert_eq!(status.model_version.as_deref(), Some("2.0.0"));

        let recs = engine
            .recommend(&subject(), &candidates(), &RankingParams::strict())
            .unwrap();
        assert_eq!(recs.len(), 3);
    }
}
