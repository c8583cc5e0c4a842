//! Dollar-value adjustment calculus
//!
//! Each adjustment is an independent linear function of one feature
//! difference, presented to the appraiser alongside the ranking. Location and
//! time are threshold-gated: no adjustment inside 1 mile or 90 days.
//! Adjustments are informational, never fed back into ranking, and never
//! clamped.

use chrono::{DateTime, Utc};
use compx_core::geo::{days_since, haversine_miles};
use compx_core::{Adjustments, CandidateProperty, SubjectProperty};

const GLA_DOLLARS_PER_SQFT: f64 = 50.0;
const LOT_DOLLARS_PER_SQFT: f64 = 5.0;
const LOCATION_DOLLARS_PER_MILE: f64 = -2000.0;
const LOCATION_FREE_MILES: f64 = 1.0;
const TIME_DOLLARS_PER_30_DAYS: f64 = -3000.0;
const TIME_FREE_DAYS: f64 = 90.0;

/// Condition ordinal to dollar value; the adjustment is the candidate/subject
/// delta of these.
fn condition_dollars(ordinal: f64) -> f64 {
    (ordinal - 3.0) * 5000.0
}

/// Compute all adjustments for a candidate relative to the subject.
#[must_use]
pub fn calculate_adjustments(
    subject: &SubjectProperty,
    candidate: &CandidateProperty,
    as_of: DateTime<Utc>,
) -> Adjustments {
    let s = &subject.property;
    let c = &candidate.property;

    let distance = haversine_miles(s.latitude, s.longitude, c.latitude, c.longitude);
    let location = if distance > LOCATION_FREE_MILES {
        LOCATION_DOLLARS_PER_MILE * (distance - LOCATION_FREE_MILES)
    } else {
        0.0
    };

    let days = days_since(candidate.sale_date, as_of) as f64;
    let time = if days > TIME_FREE_DAYS {
        TIME_DOLLARS_PER_30_DAYS * ((days - TIME_FREE_DAYS) / 30.0)
    } else {
        0.0
    };

    Adjustments {
        gla: (c.gla - s.gla) * GLA_DOLLARS_PER_SQFT,
        lot_size: (c.lot_size - s.lot_size) * LOT_DOLLARS_PER_SQFT,
        condition: condition_dollars(c.condition.ordinal()) - condition_dollars(s.condition.ordinal()),
        location,
        time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use compx_core::{Condition, Property};

    fn pair(distance_lat_offset: f64, sale_days_ago: i64) -> (SubjectProperty, CandidateProperty) {
        let base = Property {
            address: "1 Main St".into(),
            gla: 2000.0,
            lot_size: 5000.0,
            latitude: 44.23,
            longitude: -76.48,
            ..Default::default()
        };
        let subject = SubjectProperty {
            property: base.clone(),
            appraisal_date: None,
            estimated_value: Some(400_000.0),
        };
        let mut prop = base;
        prop.address = "2 Main St".into();
        prop.latitude += distance_lat_offset;
        let candidate = CandidateProperty {
            id: "c".into(),
            property: prop,
            sale_date: Some(Utc::now() - Duration::days(sale_days_ago)),
            sale_price: Some(400_000.0),
        };
        (subject, candidate)
    }

    #[test]
    fn test_gla_and_lot_adjustments_are_signed() {
        let (subject, mut candidate) = pair(0.0, 0);
        candidate.property.gla = 2100.0; // 100 sq ft larger
        candidate.property.lot_size = 4000.0; // 1000 sq ft smaller
        let adj = calculate_adjustments(&subject, &candidate, Utc::now());
        assert_eq!(adj.gla, 5000.0);
        assert_eq!(adj.lot_size, -5000.0);
    }

    #[test]
    fn test_condition_adjustment_delta() {
        let (mut subject, mut candidate) = pair(0.0, 0);
        subject.property.condition = Condition::Fair;
        candidate.property.condition = Condition::Good;
        let adj = calculate_adjustments(&subject, &candidate, Utc::now());
        assert_eq!(adj.condition, 10_000.0);
    }

    #[test]
    fn test_location_gated_at_one_mile() {
        let (subject, candidate) = pair(0.0, 0);
        let adj = calculate_adjustments(&subject, &candidate, Utc::now());
        assert_eq!(adj.location, 0.0);

        // ~0.1 degree of latitude is ~7 miles
        let (subject, candidate) = pair(0.1, 0);
        let adj = calculate_adjustments(&subject, &candidate, Utc::now());
        assert!(adj.location < 0.0);
    }

    #[test]
    fn test_time_gated_at_ninety_days() {
        let (subject, candidate) = pair(0.0, 60);
        let as_of = Utc::now();
        assert_eq!(
            calculate_adjustments(&subject, &candidate, as_of).time,
            0.0
        );

        let (subject, candidate) = pair(0.0, 120);
        let as_of = Utc::now();
        let adj = calculate_adjustments(&subject, &candidate, as_of);
        assert!((adj.time - (-3000.0)).abs() < 1e-9, "got {}", adj.time);
    }
}
