//! # compx Core
//!
//! Core library for the compx comparable-property recommendation engine.
//!
//! This crate provides the fundamental data structures and pure utilities:
//!
//! - [`Property`] / [`SubjectProperty`] / [`CandidateProperty`] - strongly
//!   typed property records with boundary validation
//! - [`Vector`] - dense embedding vector with cosine similarity
//! - [`geo`] - haversine distance and days-since-sale helpers
//! - [`Error`] - the typed error taxonomy shared across the workspace
//!
//! ## Example
//!
//! ```rust
//! use compx_core::{Property, SubjectProperty, StructureType};
//!
//! let subject = SubjectProperty {
//!     property: Property {
//!         address: "100 King St".into(),
//!         gla: 2000.0,
//!         lot_size: 5000.0,
//!         bedrooms: 3.0,
//!         bathrooms: 2.0,
//!         year_built: 2000,
//!         latitude: 44.23,
//!         longitude: -76.48,
//!         structure_type: StructureType::Detached,
//!         ..Default::default()
//!     },
//!     appraisal_date: None,
//!     estimated_value: Some(400_000.0),
//! };
//! assert_eq!(subject.property.gla, 2000.0);
//! ```

pub mod error;
pub mod geo;
pub mod property;
pub mod vector;

pub use error::{Error, Result};
pub use property::{
    Adjustments, CandidateProperty, CompRecommendation, Condition, Explanation, Property,
    StructureType, SubjectProperty,
};
pub use vector::Vector;
