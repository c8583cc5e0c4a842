use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Structure type of a dwelling. Unknown strings deserialize to [`StructureType::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StructureType {
    #[default]
    Detached,
    Attached,
    SemiDetached,
    Other,
}

impl StructureType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StructureType::Detached => "Detached",
            StructureType::Attached => "Attached",
            StructureType::SemiDetached => "Semi-Detached",
            StructureType::Other => "Other",
        }
    }
}

impl Serialize for StructureType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StructureType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "Detached" => StructureType::Detached,
            "Attached" => StructureType::Attached,
            "Semi-Detached" => StructureType::SemiDetached,
            _ => StructureType::Other,
        })
    }
}

/// Ordinal condition/quality rating, `Poor < Fair < Average < Good < Excellent`.
///
/// Missing or unrecognized values fall back to `Average`, which is also the
/// documented default the feature extractor substitutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Condition {
    Poor,
    Fair,
    #[default]
    Average,
    Good,
    Excellent,
}

impl Condition {
    /// Ordinal value 1-5 used by the feature extractor and adjustments.
    #[inline]
    #[must_use]
    pub fn ordinal(self) -> f64 {
        match self {
            Condition::Poor => 1.0,
            Condition::Fair => 2.0,
            Condition::Average => 3.0,
            Condition::Good => 4.0,
            Condition::Excellent => 5.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Poor => "Poor",
            Condition::Fair => "Fair",
            Condition::Average => "Average",
            Condition::Good => "Good",
            Condition::Excellent => "Excellent",
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "Poor" => Condition::Poor,
            "Fair" => Condition::Fair,
            "Good" => Condition::Good,
            "Excellent" => Condition::Excellent,
            _ => Condition::Average,
        })
    }
}

/// Attributes shared by subjects and candidates.
///
/// Numeric fields default to zero when absent from the source record; the
/// feature extractor substitutes its documented defaults for them rather than
/// failing, and candidate validation rejects records where zero would poison
/// a ratio (GLA, sale price).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub address: String,
    #[serde(default)]
    pub structure_type: StructureType,
    #[serde(default)]
    pub property_type: Option<String>,
    /// Gross Living Area in square feet.
    #[serde(default)]
    pub gla: f64,
    /// Lot size in square feet.
    #[serde(default)]
    pub lot_size: f64,
    #[serde(default)]
    pub bedrooms: f64,
    #[serde(default)]
    pub bathrooms: f64,
    #[serde(default)]
    pub year_built: i32,
    #[serde(default)]
    pub garage_spaces: f64,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub quality: Condition,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub neighborhood: Option<String>,
    /// Free-form feature tags ("garage", "pool", ...).
    #[serde(default)]
    pub features: Vec<String>,
}

impl Property {
    /// Address normalized for identity comparisons (dedup, self-match exclusion).
    #[must_use]
    pub fn normalized_address(&self) -> String {
        self.address.trim().to_lowercase()
    }
}

/// The property being appraised.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubjectProperty {
    #[serde(flatten)]
    pub property: Property,
    #[serde(default)]
    pub appraisal_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
}

/// A previously sold property offered as a potential comp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CandidateProperty {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub property: Property,
    #[serde(default)]
    pub sale_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sale_price: Option<f64>,
}

impl CandidateProperty {
    /// A candidate is scoreable only if the fields that appear as ratio
    /// denominators are positive and it carries a real address.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.sale_price.is_some_and(|p| p > 0.0)
            && self.property.gla > 0.0
            && !self.property.address.trim().is_empty()
    }
}

/// Dollar-value adjustments for appraiser review. Informational only,
/// never used for ranking, and deliberately unclamped.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Adjustments {
    pub gla: f64,
    pub lot_size: f64,
    pub condition: f64,
    pub location: f64,
    pub time: f64,
}

impl Adjustments {
    /// Net adjustment across all factors.
    #[inline]
    #[must_use]
    pub fn total(&self) -> f64 {
        self.gla + self.lot_size + self.condition + self.location + self.time
    }
}

/// One weighted factor in a score explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    pub factor: String,
    /// Human-readable description embedding the measured quantity.
    pub description: String,
    pub weight: f64,
    pub contribution: f64,
}

/// A ranked comp recommendation. Constructed fresh per request, never
/// persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompRecommendation {
    pub candidate: CandidateProperty,
    /// Dense 1-based rank, assigned after sorting and truncation.
    pub rank: usize,
    /// Similarity score in [0, 100].
    pub similarity_score: f64,
    /// Similarity adjusted by distance and recency penalties; unbounded.
    pub overall_score: f64,
    pub distance_miles: f64,
    pub days_since_sale: i64,
    pub adjustments: Adjustments,
    pub explanations: Vec<Explanation>,
    pub reasoning: String,
}
