//! Geographic and temporal utilities
//!
//! Pure helpers shared by the ranking pipeline, the feature extractor and
//! the embedding index. Distances are in miles, to match the appraisal
//! conventions of the source data.

use chrono::{DateTime, Utc};
use tracing::warn;

/// Earth radius in miles.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Substituted when a candidate has no parsable sale date.
pub const DEFAULT_DAYS_SINCE_SALE: i64 = 365;

/// Great-circle distance between two points in decimal degrees, in miles.
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Days elapsed between `date` and `as_of`, floored at zero.
///
/// A missing date substitutes [`DEFAULT_DAYS_SINCE_SALE`] and logs a warning
/// rather than failing: a candidate without a sale date is stale, not broken.
pub fn days_since(date: Option<DateTime<Utc>>, as_of: DateTime<Utc>) -> i64 {
    match date {
        Some(d) => (as_of - d).num_days().max(0),
        None => {
            warn!(
                default_days = DEFAULT_DAYS_SINCE_SALE,
                "missing sale date, substituting default recency"
            );
            DEFAULT_DAYS_SINCE_SALE
        }
    }
}
