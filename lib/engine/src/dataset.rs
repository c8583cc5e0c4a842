//! Historical appraisal dataset input
//!
//! Training consumes an ordered sequence of appraisal records: a subject, the
//! candidates that were offered, and the subset the appraiser selected. A
//! missing dataset file is a hard, typed failure - a production training run
//! must never silently proceed on synthetic data.

use compx_core::{CandidateProperty, Error, Result, SubjectProperty};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// One historical appraisal: what was offered and what was chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalAppraisal {
    #[serde(default)]
    pub id: String,
    pub subject: SubjectProperty,
    pub candidates: Vec<CandidateProperty>,
    /// Ids of candidates the appraiser selected as comps.
    #[serde(default)]
    pub selected_comp_ids: Vec<String>,
}

impl HistoricalAppraisal {
    /// Selected ids as a set for labeling.
    #[must_use]
    pub fn selected_ids(&self) -> HashSet<&str> {
        self.selected_comp_ids.iter().map(String::as_str).collect()
    }
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    appraisals: Vec<HistoricalAppraisal>,
}

/// Load the appraisal dataset from a JSON file.
///
/// Accepts either a top-level `{"appraisals": [...]}` object or a bare array.
pub fn load_appraisals(path: &Path) -> Result<Vec<HistoricalAppraisal>> {
    if !path.exists() {
        return Err(Error::TrainingDataMissing(path.display().to_string()));
    }

    let raw = std::fs::read_to_string(path)?;
    // Parse only the form the top-level value announces, so a malformed
    // record surfaces its own error instead of the wrong form's mismatch.
    let appraisals = if raw.trim_start().starts_with('{') {
        serde_json::from_str::<DatasetFile>(&raw)
            .map(|file| file.appraisals)
            .map_err(|e| Error::Serialization(e.to_string()))?
    } else {
        serde_json::from_str::<Vec<HistoricalAppraisal>>(&raw)
            .map_err(|e| Error::Serialization(e.to_string()))?
    };

    info!(
        count = appraisals.len(),
        path = %path.display(),
        "loaded appraisal dataset"
    );
    Ok(appraisals)
}
