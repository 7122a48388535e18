//! Per-sample metadata and group labels

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DgeError, Result};

/// Two-level grouping used by the comparison.
///
/// `WildType` is the reference level, so fold changes read mutant over wild-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupLabel {
    #[serde(rename = "wild-type")]
    WildType,
    #[serde(rename = "mutant")]
    Mutant,
}

impl GroupLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupLabel::WildType => "wild-type",
            GroupLabel::Mutant => "mutant",
        }
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample metadata aligned to a count matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    sample_ids: Vec<String>,
    /// Key used to look samples up in the mutation table
    model_ids: Vec<String>,
    /// Group label per sample; `None` means unknown
    groups: Vec<Option<GroupLabel>>,
}

impl SampleMetadata {
    /// Metadata with no groups assigned yet
    pub fn new(sample_ids: Vec<String>, model_ids: Vec<String>) -> Result<Self> {
        if model_ids.len() != sample_ids.len() {
            return Err(DgeError::validation(format!(
                "expected {} model IDs, got {}",
                sample_ids.len(),
                model_ids.len()
            )));
        }
        let groups = vec![None; sample_ids.len()];
        Ok(Self { sample_ids, model_ids, groups })
    }

    /// Return a copy with the given group labels attached
    pub fn with_groups(&self, groups: Vec<Option<GroupLabel>>) -> Result<Self> {
        if groups.len() != self.sample_ids.len() {
            return Err(DgeError::validation(format!(
                "expected {} group labels, got {}",
                self.sample_ids.len(),
                groups.len()
            )));
        }
        Ok(Self {
            sample_ids: self.sample_ids.clone(),
            model_ids: self.model_ids.clone(),
            groups,
        })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn model_ids(&self) -> &[String] {
        &self.model_ids
    }

    pub fn groups(&self) -> &[Option<GroupLabel>] {
        &self.groups
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Subset metadata to specific samples, in the given order
    pub fn subset(&self, sample_indices: &[usize]) -> Self {
        let pick = |v: &Vec<String>| sample_indices.iter().map(|&i| v[i].clone()).collect::<Vec<_>>();
        Self {
            sample_ids: pick(&self.sample_ids),
            model_ids: pick(&self.model_ids),
            groups: sample_indices.iter().map(|&i| self.groups[i]).collect(),
        }
    }
}
