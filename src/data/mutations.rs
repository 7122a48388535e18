//! Somatic mutation annotations

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A single mutation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Sample key (the cohort's model identifier)
    pub sample_id: String,
    pub gene: String,
    pub is_driver: bool,
    pub is_likely_driver: bool,
}

impl MutationRecord {
    /// Driver or likely-driver call
    pub fn is_qualifying(&self) -> bool {
        self.is_driver || self.is_likely_driver
    }
}

/// Mutation records indexed by sample
#[derive(Debug, Clone, Default)]
pub struct MutationTable {
    records: Vec<MutationRecord>,
    by_sample: HashMap<String, Vec<usize>>,
}

impl MutationTable {
    pub fn new(records: Vec<MutationRecord>) -> Self {
        let mut by_sample: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_sample.entry(r.sample_id.clone()).or_default().push(i);
        }
        Self { records, by_sample }
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the table holds any record at all for this sample
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.by_sample.contains_key(sample_id)
    }

    /// All records for one sample
    pub fn for_sample<'a>(&'a self, sample_id: &str) -> impl Iterator<Item = &'a MutationRecord> + 'a {
        self.by_sample
            .get(sample_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.records[i])
    }

    /// Genes with at least one driver or likely-driver call, sorted
    pub fn driver_genes(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_qualifying())
            .map(|r| r.gene.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(sample: &str, gene: &str, driver: bool, likely: bool) -> MutationRecord {
        MutationRecord {
            sample_id: sample.into(),
            gene: gene.into(),
            is_driver: driver,
            is_likely_driver: likely,
        }
    }

    #[test]
    fn test_lookup_by_sample() {
        let table = MutationTable::new(vec![
            rec("M1", "TP53", true, false),
            rec("M2", "KRAS", false, false),
            rec("M1", "EGFR", false, true),
        ]);
        assert_eq!(table.for_sample("M1").count(), 2);
        assert!(table.has_sample("M2"));
        assert!(!table.has_sample("M3"));
        assert_eq!(table.for_sample("M3").count(), 0);
    }

    #[test]
    fn test_driver_genes_sorted_unique() {
        let table = MutationTable::new(vec![
            rec("M1", "TP53", true, false),
            rec("M2", "TP53", false, true),
            rec("M2", "KRAS", false, false),
            rec("M3", "EGFR", true, true),
        ]);
        assert_eq!(table.driver_genes(), vec!["EGFR".to_string(), "TP53".to_string()]);
    }
}
