//! Sample alignment between the count table and the cohort
//!
//! The count table and the cohort are keyed by the same sample identifiers
//! but neither is guaranteed to be a subset of the other. Alignment keeps
//! the intersection, in count-table order, and turns the raw table into a
//! validated [`CountMatrix`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::{first_occurrences, CohortMember, CohortTable, CountMatrix, CountTable, SampleMetadata};
use crate::error::{DgeError, Result};

/// Options for [`align_samples`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    /// Truncate fractional counts toward zero instead of rejecting them
    pub truncate_fractional: bool,
}

/// Count matrix and metadata over the same samples, in the same order
#[derive(Debug, Clone)]
pub struct AlignedSamples {
    pub counts: CountMatrix,
    pub metadata: SampleMetadata,
}

impl AlignedSamples {
    /// Aligned counts back in table form (samples x genes)
    pub fn to_count_table(&self) -> Result<CountTable> {
        CountTable::new(
            self.counts.counts().t().to_owned(),
            self.counts.sample_ids().to_vec(),
            self.counts.gene_ids().to_vec(),
        )
    }

    /// The cohort this alignment was built against, restricted to kept samples
    pub fn cohort(&self) -> CohortTable {
        CohortTable::new(
            self.metadata
                .sample_ids()
                .iter()
                .zip(self.metadata.model_ids())
                .map(|(s, m)| CohortMember {
                    sample_id: s.clone(),
                    model_id: m.clone(),
                })
                .collect(),
        )
    }

    /// Align this output again; the result equals `self`.
    pub fn realign(&self, options: &AlignOptions) -> Result<AlignedSamples> {
        align_samples(&self.to_count_table()?, &self.cohort(), options)
    }
}

/// Reduce a gene header to its first whitespace-separated token
/// (`"TP53 (7157)"` becomes `"TP53"`).
pub fn normalize_gene_header(header: &str) -> &str {
    header.split_whitespace().next().unwrap_or("")
}

/// Align a raw count table with the cohort.
///
/// - Gene headers are normalized with [`normalize_gene_header`]. When two
///   headers normalize to the same gene, only the first column is kept and
///   the rest are dropped.
/// - Only samples present in both inputs are kept, in count-table order.
/// - Counts must be non-negative integers unless
///   [`AlignOptions::truncate_fractional`] is set.
///
/// Fails with a validation error for duplicate sample identifiers or invalid
/// counts, and with insufficient data when no sample is shared.
pub fn align_samples(table: &CountTable, cohort: &CohortTable, options: &AlignOptions) -> Result<AlignedSamples> {
    let mut seen = HashSet::with_capacity(table.n_samples());
    for id in table.sample_ids() {
        if !seen.insert(id.as_str()) {
            return Err(DgeError::validation(format!(
                "duplicate sample identifier '{}' in count table",
                id
            )));
        }
    }

    let normalized: Vec<String> = table
        .gene_headers()
        .iter()
        .map(|h| normalize_gene_header(h).to_string())
        .collect();
    if let Some(pos) = normalized.iter().position(|g| g.is_empty()) {
        return Err(DgeError::validation(format!("gene column {} has an empty header", pos + 1)));
    }
    let gene_cols = first_occurrences(&normalized);
    if gene_cols.len() < normalized.len() {
        log::warn!(
            "Dropped {} gene column(s) whose normalized identifier repeats an earlier column",
            normalized.len() - gene_cols.len()
        );
    }

    let rows: Vec<usize> = table
        .sample_ids()
        .iter()
        .enumerate()
        .filter(|(_, id)| cohort.contains(id))
        .map(|(i, _)| i)
        .collect();
    let dropped_table = table.n_samples() - rows.len();
    let dropped_cohort = cohort.len() - rows.len();
    if dropped_table > 0 || dropped_cohort > 0 {
        log::info!(
            "Dropped {} count-table sample(s) not in the cohort and {} cohort sample(s) without counts",
            dropped_table,
            dropped_cohort
        );
    }
    if rows.is_empty() {
        return Err(DgeError::insufficient(
            "no sample identifiers shared between the count table and the cohort",
        ));
    }

    let values = table.values();
    let mut n_truncated = 0usize;
    let mut counts = ndarray::Array2::zeros((gene_cols.len(), rows.len()));
    for (s, &row) in rows.iter().enumerate() {
        for (g, &col) in gene_cols.iter().enumerate() {
            let mut x = values[[row, col]];
            if options.truncate_fractional && x.is_finite() && x.fract() != 0.0 {
                x = x.trunc();
                n_truncated += 1;
            }
            counts[[g, s]] = x;
        }
    }
    if n_truncated > 0 {
        log::warn!("Truncated {} fractional count(s) toward zero", n_truncated);
    }

    let sample_ids: Vec<String> = rows.iter().map(|&r| table.sample_ids()[r].clone()).collect();
    let gene_ids: Vec<String> = gene_cols.iter().map(|&c| normalized[c].clone()).collect();
    let model_ids: Vec<String> = sample_ids
        .iter()
        .map(|s| cohort.get(s).map(|m| m.model_id.clone()).unwrap_or_else(|| s.clone()))
        .collect();

    let counts = CountMatrix::new(counts, gene_ids, sample_ids.clone())?;
    let metadata = SampleMetadata::new(sample_ids, model_ids)?;
    log::info!(
        "Aligned {} samples x {} genes",
        counts.n_samples(),
        counts.n_genes()
    );

    Ok(AlignedSamples { counts, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::{array, Array2};
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn table(samples: &[&str], genes: &[&str], values: Array2<f64>) -> CountTable {
        CountTable::new(
            values,
            samples.iter().map(|s| s.to_string()).collect(),
            genes.iter().map(|g| g.to_string()).collect(),
        )
        .unwrap()
    }

    fn cohort(pairs: &[(&str, &str)]) -> CohortTable {
        CohortTable::new(
            pairs
                .iter()
                .map(|(s, m)| CohortMember {
                    sample_id: s.to_string(),
                    model_id: m.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_normalize_gene_header() {
        assert_eq!(normalize_gene_header("TP53 (7157)"), "TP53");
        assert_eq!(normalize_gene_header("  KRAS\t(3845)"), "KRAS");
        assert_eq!(normalize_gene_header("BRCA1"), "BRCA1");
    }

    #[test]
    fn test_intersection_in_table_order() {
        let t = table(
            &["P3", "P1", "P9", "P2"],
            &["TP53 (7157)", "KRAS (3845)"],
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]],
        );
        let c = cohort(&[("P1", "M1"), ("P2", "M2"), ("P3", "M3"), ("P7", "M7")]);
        let aligned = align_samples(&t, &c, &AlignOptions::default()).unwrap();

        assert_eq!(aligned.counts.sample_ids(), &["P3", "P1", "P2"]);
        assert_eq!(aligned.metadata.sample_ids(), aligned.counts.sample_ids());
        assert_eq!(aligned.metadata.model_ids(), &["M3", "M1", "M2"]);
        assert_eq!(aligned.counts.gene_ids(), &["TP53", "KRAS"]);
        assert_eq!(aligned.counts.gene_counts(0).to_vec(), vec![1.0, 3.0, 7.0]);
        assert!(aligned.metadata.groups().iter().all(|g| g.is_none()));
    }

    #[test]
    fn test_duplicate_normalized_gene_keeps_first() {
        let t = table(&["P1"], &["TP53 (7157)", "TP53 (9999)", "EGFR"], array![[4.0, 9.0, 1.0]]);
        let aligned = align_samples(&t, &cohort(&[("P1", "M1")]), &AlignOptions::default()).unwrap();
        assert_eq!(aligned.counts.gene_ids(), &["TP53", "EGFR"]);
        assert_eq!(aligned.counts.sample_counts(0).to_vec(), vec![4.0, 1.0]);
    }

    #[test]
    fn test_fractional_counts() {
        let t = table(&["P1", "P2"], &["A"], array![[2.5], [3.0]]);
        let c = cohort(&[("P1", "M1"), ("P2", "M2")]);
        let err = align_samples(&t, &c, &AlignOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("P1"));

        let opts = AlignOptions { truncate_fractional: true };
        let aligned = align_samples(&t, &c, &opts).unwrap();
        assert_eq!(aligned.counts.gene_counts(0).to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_negative_count_rejected_even_when_truncating() {
        let t = table(&["P1"], &["A"], array![[-1.0]]);
        let opts = AlignOptions { truncate_fractional: true };
        let err = align_samples(&t, &cohort(&[("P1", "M1")]), &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let t = table(&["P1", "P1"], &["A"], array![[1.0], [2.0]]);
        let err = align_samples(&t, &cohort(&[("P1", "M1")]), &AlignOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_empty_intersection() {
        let t = table(&["P1"], &["A"], array![[1.0]]);
        let err = align_samples(&t, &cohort(&[("X", "M")]), &AlignOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_cohort_order_does_not_matter() {
        let samples = ["P1", "P2", "P3", "P4", "P5", "P6", "P7", "P8"];
        let values = Array2::from_shape_fn((8, 3), |(i, j)| (i * 10 + j) as f64);
        let t = table(&samples, &["A", "B", "C"], values);
        let mut pairs: Vec<(&str, &str)> = samples.iter().map(|s| (*s, *s)).collect();
        pairs.push(("EXTRA", "EXTRA"));
        let reference = align_samples(&t, &cohort(&pairs), &AlignOptions::default()).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..20 {
            pairs.shuffle(&mut rng);
            let aligned = align_samples(&t, &cohort(&pairs), &AlignOptions::default()).unwrap();
            assert_eq!(aligned.counts, reference.counts);
            assert_eq!(aligned.metadata.sample_ids(), reference.metadata.sample_ids());
        }
    }

    #[test]
    fn test_table_row_permutation_preserves_table_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut samples = vec!["P1", "P2", "P3", "P4", "P5"];
        let c = cohort(&[("P2", "M2"), ("P4", "M4"), ("P5", "M5")]);
        for _ in 0..10 {
            samples.shuffle(&mut rng);
            let values = Array2::from_shape_fn((5, 1), |(i, _)| i as f64);
            let aligned = align_samples(&table(&samples, &["A"], values), &c, &AlignOptions::default()).unwrap();
            let expected: Vec<&str> = samples.iter().copied().filter(|s| c.contains(s)).collect();
            assert_eq!(aligned.counts.sample_ids(), expected.as_slice());
        }
    }

    #[test]
    fn test_realign_is_noop() {
        let t = table(
            &["P2", "P1", "P3"],
            &["TP53 (7157)", "TP53 (1)", "MYC"],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
        );
        let c = cohort(&[("P1", "M1"), ("P2", "M2")]);
        let once = align_samples(&t, &c, &AlignOptions::default()).unwrap();
        let twice = once.realign(&AlignOptions::default()).unwrap();
        assert_eq!(once.counts, twice.counts);
        assert_eq!(once.metadata.sample_ids(), twice.metadata.sample_ids());
        assert_eq!(once.metadata.model_ids(), twice.metadata.model_ids());
    }
}
