//! Trained similarity model
//!
//! A binary classifier over scaled pairwise features predicting
//! P(candidate selected as comp), trained on historical appraiser selections.
//! Positives are rare (roughly 1:10 or worse), so training applies balanced
//! class weights. The classifier is a logistic model fitted with seeded
//! batch gradient descent: the contract (scaled features in, calibrated
//! probability out) is what matters, not the fitting library.
//!
//! Inference follows a strict fallback protocol: an untrained bundle, a
//! feature-count mismatch or a non-finite output delegates to the rule-based
//! scorer. A prediction failure never aborts a request.

use crate::dataset::HistoricalAppraisal;
use crate::features::{effective_as_of, extract_pair, PAIR_FEATURE_DIM};
use crate::scorer::score_rule_based;
use chrono::{DateTime, Utc};
use compx_core::{CandidateProperty, Error, Result, SubjectProperty};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Fixed seed so training runs are reproducible.
const TRAIN_SEED: u64 = 42;
const TEST_FRACTION: f64 = 0.2;
const CV_FOLDS: usize = 5;
const EPOCHS: usize = 300;
const LEARNING_RATE: f64 = 0.1;

/// Bundle version prefix; artifacts from a different major line are rejected
/// at load time.
pub const MODEL_VERSION: &str = "2.0.0";

/// Per-feature standardization fitted on training data and applied, never
/// refitted, at inference and embedding time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    /// Fit mean/std per column. Zero-variance columns scale by 1 so constant
    /// features pass through instead of dividing by zero.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let dim = rows.first().map(Vec::len).ok_or(Error::NoTrainingData)?;
        let n = rows.len() as f64;

        let mut mean = vec![0.0; dim];
        for row in rows {
            if row.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: row.len(),
                });
            }
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }

        let mut var = vec![0.0; dim];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                *v += (x - m).powi(2) / n;
            }
        }

        let std = var
            .into_iter()
            .map(|v| {
                let s = v.sqrt();
                if s > f64::EPSILON {
                    s
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, std })
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one feature vector with the fitted parameters.
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }
}

/// Weighted logistic regression classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    /// Fit on scaled rows with per-class sample weights.
    fn fit(rows: &[Vec<f64>], labels: &[bool], w_pos: f64, w_neg: f64) -> Result<Self> {
        let dim = rows.first().map(Vec::len).ok_or(Error::NoTrainingData)?;
        let n = rows.len() as f64;
        let mut weights = vec![0.0; dim];
        let mut bias = 0.0;

        for _ in 0..EPOCHS {
            let mut grad_w = vec![0.0; dim];
            let mut grad_b = 0.0;

            for (row, &label) in rows.iter().zip(labels) {
                let z = bias
                    + weights
                        .iter()
                        .zip(row)
                        .map(|(w, x)| w * x)
                        .sum::<f64>();
                let p = sigmoid(z);
                let target = if label { 1.0 } else { 0.0 };
                let sample_weight = if label { w_pos } else { w_neg };
                let err = sample_weight * (p - target);

                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= LEARNING_RATE * g / n;
            }
            bias -= LEARNING_RATE * grad_b / n;
        }

        Ok(Self { weights, bias })
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.weights.len()
    }

    /// P(positive class) for one scaled feature vector.
    pub fn predict_proba(&self, scaled: &[f64]) -> Result<f64> {
        if scaled.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: scaled.len(),
            });
        }
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(scaled)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        Ok(sigmoid(z))
    }
}

/// Co-versioned description persisted with every bundle and validated on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    pub version: String,
    pub trained: bool,
    pub feature_count: usize,
    pub trained_at: DateTime<Utc>,
}

/// Classifier + fitted scaler + metadata, trained and swapped in as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainedBundle {
    pub model: LogisticModel,
    pub scaler: StandardScaler,
    pub metadata: ModelMetadata,
}

impl TrainedBundle {
    /// Internal consistency check, applied after deserialization.
    pub fn validate(&self) -> Result<()> {
        if !self.metadata.version.starts_with("2.") {
            return Err(Error::CorruptArtifact(format!(
                "unsupported model version {}",
                self.metadata.version
            )));
        }
        if self.metadata.feature_count != PAIR_FEATURE_DIM {
            return Err(Error::DimensionMismatch {
                expected: PAIR_FEATURE_DIM,
                actual: self.metadata.feature_count,
            });
        }
        if self.model.dim() != PAIR_FEATURE_DIM || self.scaler.dim() != PAIR_FEATURE_DIM {
            return Err(Error::CorruptArtifact(
                "model/scaler dimensionality disagrees with metadata".into(),
            ));
        }
        Ok(())
    }
}

/// Held-out evaluation plus k-fold cross-validation summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub training_samples: usize,
    pub test_samples: usize,
}

/// Which path produced a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Model,
    RuleBased,
}

/// Label every offered candidate in every appraisal. Invalid candidates are
/// skipped and logged, never fatal for the batch.
fn collect_samples(appraisals: &[HistoricalAppraisal]) -> (Vec<Vec<f64>>, Vec<bool>) {
    let mut rows = Vec::new();
    let mut labels = Vec::new();

    for appraisal in appraisals {
        let selected = appraisal.selected_ids();
        let as_of = effective_as_of(&appraisal.subject);

        for candidate in &appraisal.candidates {
            if !candidate.is_valid() {
                debug!(
                    candidate_id = %candidate.id,
                    appraisal_id = %appraisal.id,
                    "skipping invalid training candidate"
                );
                continue;
            }
            rows.push(extract_pair(&appraisal.subject, candidate, as_of));
            labels.push(selected.contains(candidate.id.as_str()));
        }
    }

    (rows, labels)
}

fn evaluate(
    model: &LogisticModel,
    scaler: &StandardScaler,
    rows: &[Vec<f64>],
    labels: &[bool],
) -> Result<(f64, f64, f64, f64)> {
    let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);

    for (row, &label) in rows.iter().zip(labels) {
        let p = model.predict_proba(&scaler.transform(row)?)?;
        let predicted = p >= 0.5;
        match (predicted, label) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let total = (tp + fp + tn + fn_).max(1) as f64;
    let accuracy = (tp + tn) as f64 / total;
    let precision = tp as f64 / (tp + fp).max(1) as f64;
    let recall = tp as f64 / (tp + fn_).max(1) as f64;
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    Ok((accuracy, precision, recall, f1))
}

fn fit_weighted(rows: &[Vec<f64>], labels: &[bool]) -> Result<(LogisticModel, StandardScaler)> {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(Error::NoTrainingData);
    }

    let scaler = StandardScaler::fit(rows)?;
    let scaled: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| scaler.transform(r))
        .collect::<Result<_>>()?;

    // Balanced class weights: n / (2 * class_count)
    let n = labels.len() as f64;
    let w_pos = n / (2.0 * positives as f64);
    let w_neg = n / (2.0 * negatives as f64);

    let model = LogisticModel::fit(&scaled, labels, w_pos, w_neg)?;
    Ok((model, scaler))
}

/// Train a bundle from historical appraisals.
///
/// Stratified 80/20 split with a seeded shuffle, balanced class weights,
/// metrics on the held-out split plus 5-fold cross-validation over the
/// training portion.
pub fn train(appraisals: &[HistoricalAppraisal]) -> Result<(TrainedBundle, TrainingMetrics)> {
    let (rows, labels) = collect_samples(appraisals);
    let positives = labels.iter().filter(|&&l| l).count();
    if rows.is_empty() || positives == 0 || positives == labels.len() {
        return Err(Error::NoTrainingData);
    }

    info!(
        samples = rows.len(),
        positives,
        "training similarity model"
    );

    // Stratified split: shuffle each class separately, hold out 20% of each.
    let mut rng = StdRng::seed_from_u64(TRAIN_SEED);
    let mut pos_idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i]).collect();
    let mut neg_idx: Vec<usize> = (0..labels.len()).filter(|&i| !labels[i]).collect();
    pos_idx.shuffle(&mut rng);
    neg_idx.shuffle(&mut rng);

    let split = |idx: &[usize]| {
        let holdout = ((idx.len() as f64 * TEST_FRACTION).round() as usize).min(idx.len() - 1);
        let (test, train) = idx.split_at(holdout);
        (train.to_vec(), test.to_vec())
    };
    let (pos_train, pos_test) = split(&pos_idx);
    let (neg_train, neg_test) = split(&neg_idx);

    let gather = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<bool>) {
        (
            idx.iter().map(|&i| rows[i].clone()).collect(),
            idx.iter().map(|&i| labels[i]).collect(),
        )
    };
    let train_idx: Vec<usize> = pos_train.iter().chain(&neg_train).copied().collect();
    let test_idx: Vec<usize> = pos_test.iter().chain(&neg_test).copied().collect();
    let (train_rows, train_labels) = gather(&train_idx);
    let (test_rows, test_labels) = gather(&test_idx);

    let (model, scaler) = fit_weighted(&train_rows, &train_labels)?;
    let (accuracy, precision, recall, f1_score) =
        evaluate(&model, &scaler, &test_rows, &test_labels)?;

    // K-fold CV over the training portion, each fold refitting from scratch.
    let mut fold_scores = Vec::with_capacity(CV_FOLDS);
    let mut shuffled: Vec<usize> = (0..train_rows.len()).collect();
    shuffled.shuffle(&mut rng);
    for fold in 0..CV_FOLDS {
        let held: Vec<usize> = shuffled
            .iter()
            .enumerate()
            .filter(|(i, _)| i % CV_FOLDS == fold)
            .map(|(_, &idx)| idx)
            .collect();
        let kept: Vec<usize> = shuffled
            .iter()
            .enumerate()
            .filter(|(i, _)| i % CV_FOLDS != fold)
            .map(|(_, &idx)| idx)
            .collect();

        let fold_train_rows: Vec<Vec<f64>> = kept.iter().map(|&i| train_rows[i].clone()).collect();
        let fold_train_labels: Vec<bool> = kept.iter().map(|&i| train_labels[i]).collect();
        let fold_test_rows: Vec<Vec<f64>> = held.iter().map(|&i| train_rows[i].clone()).collect();
        let fold_test_labels: Vec<bool> = held.iter().map(|&i| train_labels[i]).collect();

        match fit_weighted(&fold_train_rows, &fold_train_labels) {
            Ok((fold_model, fold_scaler)) => {
                let (acc, _, _, _) = evaluate(
                    &fold_model,
                    &fold_scaler,
                    &fold_test_rows,
                    &fold_test_labels,
                )?;
                fold_scores.push(acc);
            }
            // A fold can lose all its positives when they are very rare.
            Err(Error::NoTrainingData) => continue,
            Err(e) => return Err(e),
        }
    }
    let cv_mean = if fold_scores.is_empty() {
        0.0
    } else {
        fold_scores.iter().sum::<f64>() / fold_scores.len() as f64
    };
    let cv_std = if fold_scores.is_empty() {
        0.0
    } else {
        (fold_scores
            .iter()
            .map(|s| (s - cv_mean).powi(2))
            .sum::<f64>()
            / fold_scores.len() as f64)
            .sqrt()
    };

    let bundle = TrainedBundle {
        model,
        scaler,
        metadata: ModelMetadata {
            version: MODEL_VERSION.to_string(),
            trained: true,
            feature_count: PAIR_FEATURE_DIM,
            trained_at: Utc::now(),
        },
    };
    bundle.validate()?;

    let metrics = TrainingMetrics {
        accuracy,
        precision,
        recall,
        f1_score,
        cv_mean,
        cv_std,
        training_samples: train_rows.len(),
        test_samples: test_rows.len(),
    };
    info!(?metrics, "similarity model trained");

    Ok((bundle, metrics))
}

/// Score a pair with the trained model when possible, the rule-based scorer
/// otherwise. Only the documented degradation conditions trigger fallback:
/// no bundle, untrained flag, dimension mismatch, non-finite output.
#[must_use]
pub fn score_similarity(
    bundle: Option<&TrainedBundle>,
    subject: &SubjectProperty,
    candidate: &CandidateProperty,
    as_of: DateTime<Utc>,
) -> (f64, ScoreSource) {
    let Some(bundle) = bundle.filter(|b| b.metadata.trained) else {
        return (
            score_rule_based(subject, candidate, as_of),
            ScoreSource::RuleBased,
        );
    };

    let features = extract_pair(subject, candidate, as_of);
    debug_assert_eq!(features.len(), PAIR_FEATURE_DIM);

    let predicted = bundle
        .scaler
        .transform(&features)
        .and_then(|scaled| bundle.model.predict_proba(&scaled));

    match predicted {
        Ok(p) if p.is_finite() => ((p * 100.0).clamp(0.0, 100.0), ScoreSource::Model),
        Ok(p) => {
            warn!(probability = p, "non-finite model output, using rule-based score");
            (
                score_rule_based(subject, candidate, as_of),
                ScoreSource::RuleBased,
            )
        }
        Err(e) => {
            warn!(error = %e, "model inference failed, using rule-based score");
            (
                score_rule_based(subject, candidate, as_of),
                ScoreSource::RuleBased,
            )
        }
    }
}
