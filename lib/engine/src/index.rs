//! Vectorized embedding index
//!
//! Precomputes a scaled, L2-normalized embedding matrix over a candidate
//! corpus so that query-time scoring is a single dot-product pass plus a
//! partial top-K selection. Business-rule filters (price band, size band,
//! subject-address exclusion) run after selection and are allowed to shrink
//! the result below `top_k`; there is no backfill pass.

use crate::features::{current_year, embed_candidate, embed_subject, effective_as_of, EMBEDDING_DIM};
use crate::model::StandardScaler;
use ahash::AHashSet;
use chrono::{DateTime, Datelike, Utc};
use compx_core::{CandidateProperty, Error, Result, SubjectProperty, Vector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Matches below this cosine similarity are noise, not comps.
const MIN_COSINE: f32 = 0.01;

/// Candidates selected per requested result before business filters run.
const OVERFETCH_FACTOR: usize = 3;

const PRICE_MIN_RATIO: f64 = 0.25;
const PRICE_MAX_RATIO: f64 = 2.0;
const SIZE_MIN_RATIO: f64 = 0.4;
const SIZE_MAX_RATIO: f64 = 2.5;

/// A single index hit: the stored candidate and its cosine similarity
/// expressed as a 0-100 score.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub candidate: CandidateProperty,
    pub similarity: f64,
}

/// Immutable searchable index over a candidate corpus.
///
/// Rows of `matrix` are scaled, unit-length embeddings; `metadata[i]` is the
/// candidate behind row `i`. The two stay aligned for the life of the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    scaler: StandardScaler,
    matrix: Vec<Vector>,
    metadata: Vec<CandidateProperty>,
    built_at: DateTime<Utc>,
}

impl EmbeddingIndex {
    /// Build an index from a candidate corpus.
    ///
    /// Invalid candidates are skipped, duplicate addresses keep the first
    /// occurrence, and non-finite embeddings are dropped before the scaler is
    /// fit on this corpus alone. An empty usable corpus is an error.
    pub fn build(candidates: &[CandidateProperty]) -> Result<Self> {
        let as_of_year = current_year();

        let mut seen: AHashSet<String> = AHashSet::new();
        let mut raw: Vec<Vec<f64>> = Vec::with_capacity(candidates.len());
        let mut kept: Vec<CandidateProperty> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if !candidate.is_valid() {
                debug!(candidate_id = %candidate.id, "skipping invalid candidate");
                continue;
            }
            if !seen.insert(candidate.property.normalized_address()) {
                debug!(candidate_id = %candidate.id, "skipping duplicate address");
                continue;
            }
            let embedding = embed_candidate(candidate, as_of_year);
            // Reject before the scaler fit so one bad row cannot skew the
            // corpus statistics for every other row.
            if !embedding.iter().all(|x| x.is_finite()) {
                warn!(candidate_id = %candidate.id, "dropping non-finite embedding row");
                continue;
            }
            raw.push(embedding);
            kept.push(candidate.clone());
        }

        if raw.is_empty() {
            return Err(Error::NoTrainingData);
        }

        let scaler = StandardScaler::fit(&raw)?;

        let mut matrix: Vec<Vector> = Vec::with_capacity(raw.len());
        let mut metadata: Vec<CandidateProperty> = Vec::with_capacity(kept.len());
        for (row, candidate) in raw.into_iter().zip(kept) {
            let scaled = scaler.transform(&row)?;
            let mut vector = Vector::new(scaled.iter().map(|&x| x as f32).collect());
            if !vector.is_finite() {
                warn!(candidate_id = %candidate.id, "dropping non-finite embedding row");
                continue;
            }
            vector.normalize();
            matrix.push(vector);
            metadata.push(candidate);
        }

        if matrix.is_empty() {
            return Err(Error::NoTrainingData);
        }

        info!(rows = matrix.len(), dim = EMBEDDING_DIM, "embedding index built");
        Ok(Self {
            scaler,
            matrix,
            metadata,
            built_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[must_use]
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    #[must_use]
    pub fn rows(&self) -> &[Vector] {
        &self.matrix
    }

    #[must_use]
    pub fn candidates(&self) -> &[CandidateProperty] {
        &self.metadata
    }

    /// Reassemble an index from persisted parts. Validation runs before the
    /// index is handed out, so a torn or hand-edited snapshot never becomes a
    /// live index.
    pub fn from_parts(
        scaler: StandardScaler,
        matrix: Vec<Vector>,
        metadata: Vec<CandidateProperty>,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        let index = Self {
            scaler,
            matrix,
            metadata,
            built_at,
        };
        index.validate()?;
        Ok(index)
    }

    /// Structural integrity check, used after deserializing a persisted
    /// index. Everything checked here is an invariant `build` establishes.
    pub fn validate(&self) -> Result<()> {
        if self.matrix.len() != self.metadata.len() {
            return Err(Error::CorruptArtifact(format!(
                "index row/metadata mismatch: {} rows, {} records",
                self.matrix.len(),
                self.metadata.len()
            )));
        }
        if self.scaler.dim() != EMBEDDING_DIM {
            return Err(Error::CorruptArtifact(format!(
                "index scaler dimension {} != {EMBEDDING_DIM}",
                self.scaler.dim()
            )));
        }
        for (i, row) in self.matrix.iter().enumerate() {
            if row.dim() != EMBEDDING_DIM {
                return Err(Error::CorruptArtifact(format!(
                    "index row {i} has dimension {}",
                    row.dim()
                )));
            }
            if !row.is_finite() {
                return Err(Error::CorruptArtifact(format!(
                    "index row {i} contains non-finite values"
                )));
            }
        }
        Ok(())
    }

    /// Search the index for the subject's nearest candidates.
    ///
    /// Scores every row in one pass, takes the top `top_k * 3` by partial
    /// selection, then applies the business filters and truncates to `top_k`.
    /// Filtered-out results are not backfilled, so fewer than `top_k` matches
    /// is a normal outcome.
    pub fn query(&self, subject: &SubjectProperty, top_k: usize) -> Result<Vec<IndexMatch>> {
        if top_k == 0 {
            return Err(Error::InvalidBound {
                name: "top_k",
                value: 0.0,
            });
        }

        let as_of = effective_as_of(subject);
        let raw = embed_subject(subject, as_of.year());
        let scaled = self.scaler.transform(&raw)?;
        let mut query = Vector::new(scaled.iter().map(|&x| x as f32).collect());
        if !query.is_finite() {
            return Err(Error::InvalidProperty(
                "subject embeds to non-finite values".into(),
            ));
        }
        query.normalize();

        let mut scored: Vec<(usize, f32)> = self
            .matrix
            .iter()
            .enumerate()
            .map(|(i, row)| (i, row.dot(&query)))
            .filter(|&(_, score)| score >= MIN_COSINE)
            .collect();

        let fetch = top_k.saturating_mul(OVERFETCH_FACTOR).min(scored.len());
        if fetch == 0 {
            return Ok(Vec::new());
        }
        if fetch < scored.len() {
            scored.select_nth_unstable_by(fetch - 1, |a, b| {
                b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(fetch);
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let subject_address = subject.property.normalized_address();
        let mut matches: Vec<IndexMatch> = Vec::with_capacity(top_k);
        for (i, score) in scored {
            let candidate = &self.metadata[i];
            if !self.passes_business_filters(subject, &subject_address, candidate) {
                continue;
            }
            matches.push(IndexMatch {
                candidate: candidate.clone(),
                similarity: f64::from(score) * 100.0,
            });
            if matches.len() == top_k {
                break;
            }
        }

        Ok(matches)
    }

    fn passes_business_filters(
        &self,
        subject: &SubjectProperty,
        subject_address: &str,
        candidate: &CandidateProperty,
    ) -> bool {
        if candidate.property.normalized_address() == subject_address {
            return false;
        }

        if let Some(value) = subject.estimated_value.filter(|v| *v > 0.0) {
            let price = candidate.sale_price.unwrap_or(0.0);
            if price < value * PRICE_MIN_RATIO || price > value * PRICE_MAX_RATIO {
                return false;
            }
        }

        let gla = subject.property.gla;
        if gla > 0.0 {
            let candidate_gla = candidate.property.gla;
            if candidate_gla < gla * SIZE_MIN_RATIO || candidate_gla > gla * SIZE_MAX_RATIO {
                return false;
            }
        }

        true
    }
}
