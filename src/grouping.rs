//! Mutant / wild-type labels from the mutation table

use crate::align::AlignedSamples;
use crate::data::{CountMatrix, GroupLabel, MutationTable, SampleMetadata};
use crate::error::{DgeError, Result};

/// Default minimum number of samples required in each group
pub const DEFAULT_MIN_SAMPLES_PER_GROUP: usize = 2;

/// Samples that received a label, with counts and metadata restricted to them
#[derive(Debug, Clone)]
pub struct LabeledSamples {
    pub counts: CountMatrix,
    pub metadata: SampleMetadata,
    /// One label per sample, in count-matrix order
    pub labels: Vec<GroupLabel>,
    /// Samples dropped because the mutation table has no record for them
    pub unlabeled: Vec<String>,
}

impl LabeledSamples {
    pub fn group_size(&self, label: GroupLabel) -> usize {
        self.labels.iter().filter(|l| **l == label).count()
    }
}

/// Label one sample for `gene`.
///
/// `None` when the mutation table has no record of any kind for the sample.
pub fn label_sample(mutations: &MutationTable, model_id: &str, gene: &str) -> Option<GroupLabel> {
    if !mutations.has_sample(model_id) {
        return None;
    }
    let mutant = mutations
        .for_sample(model_id)
        .any(|r| r.gene == gene && r.is_qualifying());
    Some(if mutant { GroupLabel::Mutant } else { GroupLabel::WildType })
}

/// Split aligned samples into mutant and wild-type groups for `gene`.
///
/// A sample is mutant when it carries a driver or likely-driver call on the
/// gene, wild-type when it has mutation records but none qualifying on the
/// gene. Samples without any mutation record are unlabeled and excluded.
///
/// Fails with insufficient data when either group has fewer than
/// `min_per_group` samples, and with invalid input when `min_per_group < 2`.
pub fn assign_groups(
    mutations: &MutationTable,
    gene: &str,
    aligned: &AlignedSamples,
    min_per_group: usize,
) -> Result<LabeledSamples> {
    if min_per_group < 2 {
        return Err(DgeError::invalid_input(format!(
            "minimum samples per group must be at least 2, got {}",
            min_per_group
        )));
    }

    let meta = &aligned.metadata;
    let labels: Vec<Option<GroupLabel>> = meta
        .model_ids()
        .iter()
        .map(|m| label_sample(mutations, m, gene))
        .collect();

    let keep: Vec<usize> = (0..labels.len()).filter(|&i| labels[i].is_some()).collect();
    let unlabeled: Vec<String> = (0..labels.len())
        .filter(|&i| labels[i].is_none())
        .map(|i| meta.sample_ids()[i].clone())
        .collect();
    if !unlabeled.is_empty() {
        log::info!("Excluded {} sample(s) with no mutation records", unlabeled.len());
    }

    let kept_labels: Vec<GroupLabel> = keep.iter().filter_map(|&i| labels[i]).collect();
    for label in [GroupLabel::Mutant, GroupLabel::WildType] {
        let n = kept_labels.iter().filter(|l| **l == label).count();
        if n < min_per_group {
            return Err(DgeError::insufficient(format!(
                "{} group for {} has {} sample(s), at least {} required",
                label, gene, n, min_per_group
            )));
        }
    }

    let counts = aligned.counts.subset_samples(&keep)?;
    let metadata = meta.with_groups(labels)?.subset(&keep);
    log::info!(
        "{}: {} mutant, {} wild-type",
        gene,
        kept_labels.iter().filter(|l| **l == GroupLabel::Mutant).count(),
        kept_labels.iter().filter(|l| **l == GroupLabel::WildType).count()
    );

    Ok(LabeledSamples {
        counts,
        metadata,
        labels: kept_labels,
        unlabeled,
    })
}
