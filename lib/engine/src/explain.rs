//! Explanation generation
//!
//! Decomposes a score into weighted per-factor contributions with
//! human-readable descriptions that embed the literal measured quantities.
//! Two variants: the five-factor breakdown for the full ranking pipeline
//! (weights sum to 1.0) and a three-factor breakdown for the vectorized
//! index path, where the model score itself is the dominant factor.

use chrono::{DateTime, Utc};
use compx_core::geo::{days_since, haversine_miles};
use compx_core::{CandidateProperty, Explanation, SubjectProperty};

/// Five-factor explanation for the full pipeline.
///
/// Weights: GLA 0.30, location 0.25, recency 0.20, type match 0.15,
/// lot size 0.10. Every contribution is derivable from the same inputs the
/// scorers see, so an identical call reproduces identical explanations.
#[must_use]
pub fn explain_pair(
    subject: &SubjectProperty,
    candidate: &CandidateProperty,
    as_of: DateTime<Utc>,
) -> Vec<Explanation> {
    let s = &subject.property;
    let c = &candidate.property;

    let distance = haversine_miles(s.latitude, s.longitude, c.latitude, c.longitude);
    let days = days_since(candidate.sale_date, as_of);

    let gla_diff = (c.gla - s.gla).abs();
    let gla_contribution = if s.gla > 0.0 {
        ((1.0 - gla_diff / s.gla) * 30.0).max(0.0)
    } else {
        0.0
    };

    let location_contribution = ((2.0 - distance) / 2.0 * 25.0).max(0.0);

    let recency_contribution = if days <= 90 {
        (90 - days) as f64 / 90.0 * 20.0
    } else {
        0.0
    };

    let type_match = s.structure_type == c.structure_type;
    let type_contribution = if type_match { 15.0 } else { 0.0 };

    let lot_diff = (c.lot_size - s.lot_size).abs();
    let lot_contribution = if s.lot_size > 0.0 {
        ((1.0 - lot_diff / s.lot_size) * 10.0).max(0.0)
    } else {
        0.0
    };

    vec![
        Explanation {
            factor: "GLA Similarity".into(),
            description: format!("{gla_diff:.0} sq ft difference"),
            weight: 0.30,
            contribution: gla_contribution,
        },
        Explanation {
            factor: "Location Proximity".into(),
            description: format!("{distance:.2} miles away"),
            weight: 0.25,
            contribution: location_contribution,
        },
        Explanation {
            factor: "Sale Recency".into(),
            description: format!("Sold {days} days ago"),
            weight: 0.20,
            contribution: recency_contribution,
        },
        Explanation {
            factor: "Structure Type Match".into(),
            description: if type_match {
                "Exact match".into()
            } else {
                "Different type".into()
            },
            weight: 0.15,
            contribution: type_contribution,
        },
        Explanation {
            factor: "Lot Size Similarity".into(),
            description: format!("{lot_diff:.0} sq ft difference"),
            weight: 0.10,
            contribution: lot_contribution,
        },
    ]
}

/// Three-factor explanation for the vectorized index path: the model's
/// similarity score carries full weight, geography and recency annotate it.
#[must_use]
pub fn explain_index_match(
    subject: &SubjectProperty,
    candidate: &CandidateProperty,
    similarity_score: f64,
    as_of: DateTime<Utc>,
) -> Vec<Explanation> {
    let s = &subject.property;
    let c = &candidate.property;
    let distance = haversine_miles(s.latitude, s.longitude, c.latitude, c.longitude);
    let days = days_since(candidate.sale_date, as_of);

    vec![
        Explanation {
            factor: "Embedding Similarity".into(),
            description: format!("{similarity_score:.1}% match across all indexed properties"),
            weight: 1.0,
            contribution: similarity_score,
        },
        Explanation {
            factor: "Location Proximity".into(),
            description: format!("{distance:.2} miles away"),
            weight: 0.3,
            contribution: ((2.0 - distance) / 2.0 * 25.0).max(0.0),
        },
        Explanation {
            factor: "Sale Recency".into(),
            description: format!("Sold {days} days ago"),
            weight: 0.2,
            contribution: if days <= 90 {
                (90 - days) as f64 / 90.0 * 20.0
            } else {
                0.0
            },
        },
    ]
}

/// One-line reasoning string summarizing the headline numbers.
#[must_use]
pub fn reasoning(
    subject: &SubjectProperty,
    candidate: &CandidateProperty,
    similarity_score: f64,
    distance_miles: f64,
    days_since_sale: i64,
) -> String {
    format!(
        "This property is a {:.0}% match based on similar living area ({:.0} vs {:.0} sq ft), \
         proximity ({:.1} miles), and sale date ({} days ago).",
        similarity_score,
        candidate.property.gla,
        subject.property.gla,
        distance_miles,
        days_since_sale
    )
}
