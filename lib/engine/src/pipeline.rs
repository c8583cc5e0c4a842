//! Candidate ranking pipeline
//!
//! Filtering -> Scoring -> Sorting -> Ranked. Bounds are always
//! caller-supplied and validated; the penalty constants in the overall-score
//! formula are configuration, not law.

use crate::adjust::calculate_adjustments;
use crate::explain::{explain_pair, reasoning};
use crate::features::effective_as_of;
use crate::model::{score_similarity, ScoreSource, TrainedBundle};
use compx_core::geo::{days_since, haversine_miles};
use compx_core::{CandidateProperty, CompRecommendation, Error, Result, SubjectProperty};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Caller-supplied filter bounds and result size. All values must be
/// positive; non-positive values are a caller error, never silently clamped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RankingParams {
    pub max_distance_miles: f64,
    pub max_days_since_sale: i64,
    pub top_k: usize,
}

impl RankingParams {
    /// Strict defaults for appraisal-grade comps: 5 miles, 90 days, top 3.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_distance_miles: 5.0,
            max_days_since_sale: 90,
            top_k: 3,
        }
    }

    /// Wide bounds for exploratory search: 50 miles, 2 years, top 10.
    #[must_use]
    pub fn exploratory() -> Self {
        Self {
            max_distance_miles: 50.0,
            max_days_since_sale: 730,
            top_k: 10,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_distance_miles <= 0.0 {
            return Err(Error::InvalidBound {
                name: "max_distance_miles",
                value: self.max_distance_miles,
            });
        }
        if self.max_days_since_sale <= 0 {
            return Err(Error::InvalidBound {
                name: "max_days_since_sale",
                value: self.max_days_since_sale as f64,
            });
        }
        if self.top_k == 0 {
            return Err(Error::InvalidBound {
                name: "top_k",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Tunable penalties for the overall-score combination
/// `overall = similarity - distance * distance_penalty - days * recency_penalty`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RankingConfig {
    pub distance_penalty: f64,
    pub recency_penalty: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            distance_penalty: 5.0,
            recency_penalty: 0.1,
        }
    }
}

/// Rank candidates for a subject.
///
/// Invalid candidates and those outside the distance/recency bounds are
/// skipped (logged, never fatal). Survivors are scored with the trained
/// model when one is available, the rule-based scorer otherwise; sorted by
/// descending overall score with input order breaking ties; truncated to
/// `top_k`; and assigned dense 1-based ranks. Zero survivors is an empty
/// result, not an error.
pub fn rank_candidates(
    bundle: Option<&TrainedBundle>,
    subject: &SubjectProperty,
    candidates: &[CandidateProperty],
    params: &RankingParams,
    config: &RankingConfig,
) -> Result<Vec<CompRecommendation>> {
    params.validate()?;

    let as_of = effective_as_of(subject);
    let s = &subject.property;
    let mut recommendations: Vec<CompRecommendation> = Vec::new();

    for candidate in candidates {
        if !candidate.is_valid() {
            debug!(candidate_id = %candidate.id, "skipping invalid candidate");
            continue;
        }

        let c = &candidate.property;
        let distance = haversine_miles(s.latitude, s.longitude, c.latitude, c.longitude);
        let days = days_since(candidate.sale_date, as_of);

        if distance > params.max_distance_miles || days > params.max_days_since_sale {
            continue;
        }

        let (similarity, source) = score_similarity(bundle, subject, candidate, as_of);
        if source == ScoreSource::RuleBased && bundle.is_some() {
            debug!(candidate_id = %candidate.id, "scored via rule-based fallback");
        }

        let overall = similarity
            - distance * config.distance_penalty
            - days as f64 * config.recency_penalty;

        recommendations.push(CompRecommendation {
            rank: 0, // assigned after sorting
            similarity_score: similarity,
            overall_score: overall,
            distance_miles: distance,
            days_since_sale: days,
            adjustments: calculate_adjustments(subject, candidate, as_of),
            explanations: explain_pair(subject, candidate, as_of),
            reasoning: reasoning(subject, candidate, similarity, distance, days),
            candidate: candidate.clone(),
        });
    }

    // Stable sort: ties keep input order.
    recommendations.sort_by(|a, b| {
        b.overall_score
            .partial_cmp(&a.overall_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recommendations.truncate(params.top_k);

    for (i, rec) in recommendations.iter_mut().enumerate() {
        rec.rank = i + 1;
    }

    Ok(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use compx_core::{Property, StructureType};

    fn subject() -> SubjectProperty {
        SubjectProperty {
            property: Property {
                address: "100 King St".into(),
                gla: 2000.0,
                lot_size: 5000.0,
                bedrooms: 3.0,
                bathrooms: 2.0,
                year_built: 2000,
                latitude: 44.23,
                longitude: -76.48,
                structure_type: StructureType::Detached,
                ..Default::default()
            },
            appraisal_date: Some(Utc::now()),
            estimated_value: Some(400_000.0),
        }
    }

    fn candidate(id: &str, gla: f64, lat_offset: f64, sale_days_ago: i64) -> CandidateProperty {
        let mut property = subject().property;
        property.address = format!("{id} Side St");
        property.gla = gla;
        property.latitude += lat_offset;
        CandidateProperty {
            id: id.into(),
            property,
            sale_date: Some(Utc::now() - Duration::days(sale_days_ago)),
            sale_price: Some(400_000.0),
        }
    }

    #[test]
    fn test_empty_candidates_is_empty_result() {
        let recs =
            rank_candidates(None, &subject(), &[], &RankingParams::strict(), &RankingConfig::default())
                .unwrap();
        assert!(recs.is_empty());
    }

    #[test]
    fn test_nonpositive_bounds_rejected() {
        let mut params = RankingParams::strict();
        params.max_distance_miles = 0.0;
        let err = rank_candidates(None, &subject(), &[], &params, &RankingConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBound { name: "max_distance_miles", .. }));

        let mut params = RankingParams::strict();
        params.top_k = 0;
        assert!(rank_candidates(None, &subject(), &[], &params, &RankingConfig::default()).is_err());
    }

    #[test]
    fn test_filter_correctness() {
        let candidates = vec![
            candidate("near-fresh", 2000.0, 0.0, 10),
            candidate("far", 2000.0, 7.3, 10),    // ~500 miles north
            candidate("stale", 2000.0, 0.0, 180), // past 90 days
        ];
        let recs = rank_candidates(
            None,
            &subject(),
            &candidates,
            &RankingParams::strict(),
            &RankingConfig::default(),
        )
        .unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].candidate.id, "near-fresh");
        assert!(recs[0].distance_miles <= 5.0);
        assert!(recs[0].days_since_sale <= 90);
    }

    #[test]
    fn test_distant_candidate_survives_wide_bounds() {
        let candidates = vec![candidate("forty-miles", 2000.0, 0.58, 10)];
        let strict = rank_candidates(
            None,
            &subject(),
            &candidates,
            &RankingParams::strict(),
            &RankingConfig::default(),
        )
        .unwrap();
        assert!(strict.is_empty());

        let wide = rank_candidates(
            None,
            &subject(),
            &candidates,
            &RankingParams::exploratory(),
            &RankingConfig::default(),
        )
        .unwrap();
        assert_eq!(wide.len(), 1);
    }

    #[test]
    fn test_sorted_descending_with_dense_ranks() {
        let candidates = vec![
            candidate("worse", 1400.0, 0.02, 80),
            candidate("best", 2000.0, 0.0, 5),
            candidate("middle", 1800.0, 0.01, 30),
        ];
        let recs = rank_candidates(
            None,
            &subject(),
            &candidates,
            &RankingParams::strict(),
            &RankingConfig::default(),
        )
        .unwrap();

        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].candidate.id, "best");
        for window in recs.windows(2) {
            assert!(window[0].overall_score >= window[1].overall_score);
        }
        assert_eq!(
            recs.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_top_k_truncation() {
        let candidates: Vec<_> = (0..10)
            .map(|i| candidate(&format!("c{i}"), 1900.0 + i as f64 * 10.0, 0.0, 10))
            .collect();
        let mut params = RankingParams::strict();
        params.top_k = 4;
        let recs = rank_candidates(
            None,
            &subject(),
            &candidates,
            &params,
            &RankingConfig::default(),
        )
        .unwrap();
        assert_eq!(recs.len(), 4);
    }

    #[test]
    fn test_invalid_candidates_skipped_not_fatal() {
        let mut broken = candidate("broken", 2000.0, 0.0, 10);
        broken.sale_price = None;
        let candidates = vec![broken, candidate("ok", 2000.0, 0.0, 10)];
        let recs = rank_candidates(
            None,
            &subject(),
            &candidates,
            &RankingParams::strict(),
            &RankingConfig::default(),
        )
        .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].candidate.id, "ok");
    }

    #[test]
    fn test_identical_property_scores_100_at_zero_distance() {
        let recs = rank_candidates(
            None,
            &subject(),
            &[candidate("twin", 2000.0, 0.0, 0)],
            &RankingParams::strict(),
            &RankingConfig::default(),
        )
        .unwrap();
        assert_eq!(recs.len(), 1);
        assert!((recs[0].similarity_score - 100.0).abs() < 1e-9);
        assert!(recs[0].distance_miles.abs() < 1e-9);
        assert_eq!(recs[0].days_since_sale, 0);
        assert!((recs[0].overall_score - 100.0).abs() < 1e-6);
    }
}
