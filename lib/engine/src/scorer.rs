//! Rule-based similarity scoring
//!
//! The always-available fallback: a deterministic weighted-sum score with no
//! dependency on trained artifacts. Factor weights: GLA 30, neighborhood 25,
//! structure type 20, room counts 15, sale recency 10.

use chrono::{DateTime, Utc};
use compx_core::{CandidateProperty, SubjectProperty};

/// Days per point of recency decay (10 points fade out over ~a year).
const RECENCY_DECAY_DAYS_PER_POINT: f64 = 36.5;

/// Deterministic similarity score in [0, 100] for a (subject, candidate) pair.
///
/// An identical candidate sold on the as-of date scores exactly 100.
#[must_use]
pub fn score_rule_based(
    subject: &SubjectProperty,
    candidate: &CandidateProperty,
    as_of: DateTime<Utc>,
) -> f64 {
    let s = &subject.property;
    let c = &candidate.property;
    let mut score = 0.0;

    // GLA similarity (30 points)
    let gla_diff = (c.gla - s.gla).abs() / s.gla.max(1.0);
    score += (1.0 - gla_diff.min(1.0)) * 30.0;

    // Neighborhood (25 points). Two records without neighborhood data are
    // treated as matching so the identical-property invariant holds.
    if s.neighborhood == c.neighborhood {
        score += 25.0;
    }

    // Structure type (20 points)
    if s.structure_type == c.structure_type {
        score += 20.0;
    }

    // Room counts (15 points, 3 per room of difference)
    let room_diff = (c.bedrooms - s.bedrooms).abs() + (c.bathrooms - s.bathrooms).abs();
    score += (15.0 - room_diff * 3.0).max(0.0);

    // Sale recency (10 points, decaying over ~a year). Candidates without a
    // sale date earn nothing here rather than failing.
    if let Some(sale_date) = candidate.sale_date {
        let days = (as_of - sale_date).num_days().max(0) as f64;
        score += (10.0 - days / RECENCY_DECAY_DAYS_PER_POINT).max(0.0);
    }

    score.clamp(0.0, 100.0)
}
