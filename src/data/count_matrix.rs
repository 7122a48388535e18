//! Count matrix representation for RNA-seq data

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{DgeError, Result};

/// Collapse duplicate gene identifiers, keeping the first occurrence.
///
/// Returns the row indices to keep, in their original order.
pub(crate) fn first_occurrences(ids: &[String]) -> Vec<usize> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
    ids.iter()
        .enumerate()
        .filter(|(_, id)| seen.insert(id.as_str()))
        .map(|(i, _)| i)
        .collect()
}

/// Integer read counts for a set of samples.
///
/// Conceptually keyed samples x genes; stored genes x samples because every
/// downstream computation walks one gene at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct CountMatrix {
    /// Raw count data (genes x samples)
    counts: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new count matrix from a genes x samples array.
    ///
    /// Counts must be finite, non-negative and integral. Duplicate sample
    /// identifiers are rejected; duplicate gene identifiers collapse to the
    /// first occurrence.
    pub fn new(counts: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(DgeError::validation(format!(
                "expected {} gene IDs, got {}",
                n_genes,
                gene_ids.len()
            )));
        }
        if sample_ids.len() != n_samples {
            return Err(DgeError::validation(format!(
                "expected {} sample IDs, got {}",
                n_samples,
                sample_ids.len()
            )));
        }

        let mut seen = HashSet::with_capacity(n_samples);
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(DgeError::validation(format!("duplicate sample identifier '{}'", id)));
            }
        }

        for ((g, s), &x) in counts.indexed_iter() {
            if !x.is_finite() || x < 0.0 || x.fract() != 0.0 {
                return Err(DgeError::validation(format!(
                    "count for sample '{}', gene '{}' must be a non-negative integer, got {}",
                    sample_ids[s], gene_ids[g], x
                )));
            }
        }

        let keep = first_occurrences(&gene_ids);
        if keep.len() < n_genes {
            log::warn!(
                "Collapsed {} duplicate gene identifier(s), keeping first occurrences",
                n_genes - keep.len()
            );
            let counts = counts.select(Axis(0), &keep);
            let gene_ids = keep.iter().map(|&i| gene_ids[i].clone()).collect();
            return Ok(Self { counts, gene_ids, sample_ids });
        }

        Ok(Self { counts, gene_ids, sample_ids })
    }

    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    /// Raw counts as a genes x samples view
    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Counts for one gene across all samples
    pub fn gene_counts(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.row(gene_idx)
    }

    /// Counts for one sample across all genes
    pub fn sample_counts(&self, sample_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.column(sample_idx)
    }

    /// Subset to specific samples, in the given order
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let counts = self.counts.select(Axis(1), sample_indices);
        let sample_ids = sample_indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        Self::new(counts, self.gene_ids.clone(), sample_ids)
    }
}
