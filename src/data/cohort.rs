//! Cohort membership table

use std::collections::HashMap;

/// One eligible sample in the cohort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortMember {
    /// Identifier matching the count table index
    pub sample_id: String,
    /// Identifier matching the mutation table sample column
    pub model_id: String,
}

/// Samples eligible for analysis.
///
/// Repeated sample identifiers keep their first entry.
#[derive(Debug, Clone, Default)]
pub struct CohortTable {
    members: Vec<CohortMember>,
    by_sample: HashMap<String, usize>,
}

impl CohortTable {
    pub fn new(members: Vec<CohortMember>) -> Self {
        let mut kept = Vec::with_capacity(members.len());
        let mut by_sample = HashMap::with_capacity(members.len());
        for m in members {
            if by_sample.contains_key(&m.sample_id) {
                log::debug!("Ignoring repeated cohort entry for sample '{}'", m.sample_id);
                continue;
            }
            by_sample.insert(m.sample_id.clone(), kept.len());
            kept.push(m);
        }
        Self { members: kept, by_sample }
    }

    /// Cohort where each sample joins the mutation table under its own identifier
    pub fn from_sample_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            ids.into_iter()
                .map(|s| {
                    let sample_id = s.into();
                    CohortMember { model_id: sample_id.clone(), sample_id }
                })
                .collect(),
        )
    }

    pub fn members(&self) -> &[CohortMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, sample_id: &str) -> Option<&CohortMember> {
        self.by_sample.get(sample_id).map(|&i| &self.members[i])
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.by_sample.contains_key(sample_id)
    }
}
