//! Comparable-property recommendation engine
//!
//! Feature extraction, rule-based and learned similarity scoring, dollar
//! adjustments, explanation generation, the candidate ranking pipeline and
//! the vectorized embedding index, tied together by [`CompEngine`].

pub mod adjust;
pub mod dataset;
pub mod engine;
pub mod explain;
pub mod features;
pub mod index;
pub mod model;
pub mod pipeline;
pub mod scorer;

pub use adjust::calculate_adjustments;
pub use dataset::{load_appraisals, HistoricalAppraisal};
pub use engine::{CompEngine, EngineStatus};
pub use explain::{explain_index_match, explain_pair};
pub use features::{EMBEDDING_DIM, PAIR_FEATURE_DIM};
pub use index::{EmbeddingIndex, IndexMatch};
pub use model::{
    score_similarity, train, ScoreSource, StandardScaler, TrainedBundle, TrainingMetrics,
};
pub use pipeline::{rank_candidates, RankingConfig, RankingParams};
pub use scorer::score_rule_based;
