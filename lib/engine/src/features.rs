//! Shared feature extraction
//!
//! One extraction module feeds training, inference and embedding generation.
//! The layouts below are load-bearing: a trained model and a persisted
//! embedding index are only valid against the exact dimensionality and field
//! order they were built with, so both are pinned by public constants and
//! asserted at every call site.
//!
//! Extraction is pure and total: missing optionals substitute documented
//! defaults, ratio denominators are floored at 1, and nothing here returns
//! an error or panics on valid property records.

use chrono::{DateTime, Datelike, Utc};
use compx_core::geo::{days_since, haversine_miles};
use compx_core::{CandidateProperty, Property, StructureType, SubjectProperty};
use std::collections::HashSet;

/// Dimensionality of the pairwise (subject, candidate) feature vector.
pub const PAIR_FEATURE_DIM: usize = 16;

/// Dimensionality of the single-property embedding.
pub const EMBEDDING_DIM: usize = 16;

/// Days over which sale recency decays to zero.
pub const RECENCY_HORIZON_DAYS: f64 = 365.0;

/// Substituted when a record carries no plausible year built.
const DEFAULT_YEAR_BUILT: f64 = 1990.0;

/// Sale price above which a property counts as high-value in the embedding.
const HIGH_VALUE_THRESHOLD: f64 = 300_000.0;

/// Reference date for recency features: the appraisal date when the subject
/// has one, otherwise now.
#[must_use]
pub fn effective_as_of(subject: &SubjectProperty) -> DateTime<Utc> {
    subject.appraisal_date.unwrap_or_else(Utc::now)
}

#[inline]
fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[inline]
fn year_or_default(year_built: i32) -> f64 {
    if year_built > 0 {
        f64::from(year_built)
    } else {
        DEFAULT_YEAR_BUILT
    }
}

/// Jaccard overlap of feature-tag sets, in [0, 1].
/// Two empty tag sets count as fully overlapping.
#[must_use]
pub fn tag_overlap(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<String> = a.iter().map(|t| t.trim().to_lowercase()).collect();
    let set_b: HashSet<String> = b.iter().map(|t| t.trim().to_lowercase()).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union.max(1) as f64
}

/// Extract the pairwise feature vector for a (subject, candidate) pair.
///
/// Order is fixed and must not be reordered without retraining every
/// persisted model:
///
/// 0. normalized GLA difference
/// 1. normalized lot-size difference
/// 2. bedroom difference
/// 3. bathroom difference
/// 4. year-built difference
/// 5. great-circle distance (miles)
/// 6. same-neighborhood flag
/// 7. same-property-type flag
/// 8. same-structure-type flag
/// 9. condition ordinal difference
/// 10. quality ordinal difference
/// 11. feature-tag overlap
/// 12. days since sale
/// 13. recency score
/// 14. sale price / estimated value
/// 15. sale price per square foot
#[must_use]
pub fn extract_pair(
    subject: &SubjectProperty,
    candidate: &CandidateProperty,
    as_of: DateTime<Utc>,
) -> Vec<f64> {
    let s = &subject.property;
    let c = &candidate.property;
    let sale_price = candidate.sale_price.unwrap_or(0.0);

    let days = days_since(candidate.sale_date, as_of) as f64;
    let recency = (1.0 - days / RECENCY_HORIZON_DAYS).max(0.0);

    let price_ratio = match subject.estimated_value {
        Some(v) if v > 0.0 => sale_price / v,
        _ => 1.0,
    };

    let features = vec![
        (c.gla - s.gla).abs() / s.gla.max(1.0),
        (c.lot_size - s.lot_size).abs() / s.lot_size.max(1.0),
        (c.bedrooms - s.bedrooms).abs(),
        (c.bathrooms - s.bathrooms).abs(),
        (year_or_default(c.year_built) - year_or_default(s.year_built)).abs(),
        haversine_miles(s.latitude, s.longitude, c.latitude, c.longitude),
        flag(s.neighborhood == c.neighborhood),
        flag(s.property_type == c.property_type),
        flag(s.structure_type == c.structure_type),
        (c.condition.ordinal() - s.condition.ordinal()).abs(),
        (c.quality.ordinal() - s.quality.ordinal()).abs(),
        tag_overlap(&s.features, &c.features),
        days,
        recency,
        price_ratio,
        sale_price / c.gla.max(1.0),
    ];

    debug_assert_eq!(features.len(), PAIR_FEATURE_DIM);
    features
}

/// Extract the single-property embedding used by the vectorized index.
///
/// `price` is the sale price for candidates and the estimated value for
/// subjects; `as_of_year` anchors the age feature so index builds are
/// reproducible.
#[must_use]
pub fn extract_embedding(property: &Property, price: f64, as_of_year: i32) -> Vec<f64> {
    let year = year_or_default(property.year_built);
    let age = (f64::from(as_of_year) - year).max(0.0);

    let features = vec![
        price / 1000.0,
        property.gla,
        property.lot_size,
        property.bedrooms,
        property.bathrooms,
        year,
        property.garage_spaces,
        flag(property.structure_type == StructureType::Detached),
        flag(property.structure_type == StructureType::Attached),
        flag(property.structure_type == StructureType::SemiDetached),
        property.latitude,
        property.longitude,
        price / property.gla.max(1.0),
        age,
        property.bedrooms + property.bathrooms,
        flag(price > HIGH_VALUE_THRESHOLD),
    ];

    debug_assert_eq!(features.len(), EMBEDDING_DIM);
    features
}

/// Embedding for a candidate record (sale price as the price slot).
#[must_use]
pub fn embed_candidate(candidate: &CandidateProperty, as_of_year: i32) -> Vec<f64> {
    extract_embedding(
        &candidate.property,
        candidate.sale_price.unwrap_or(0.0),
        as_of_year,
    )
}

/// Embedding for the subject (estimated value as the price slot).
#[must_use]
pub fn embed_subject(subject: &SubjectProperty, as_of_year: i32) -> Vec<f64> {
    extract_embedding(
        &subject.property,
        subject.estimated_value.unwrap_or(0.0),
        as_of_year,
    )
}

/// The year used to anchor age features for live queries.
#[must_use]
pub fn current_year() -> i32 {
    Utc::now().year()
}
