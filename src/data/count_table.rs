//! Count table as ingested, before alignment

use ndarray::Array2;

use crate::error::{DgeError, Result};

/// A samples x genes table exactly as read from disk.
///
/// Gene headers are kept verbatim (annotation suffixes included) and values
/// have only been parsed as reals; integrality is checked by the aligner.
#[derive(Debug, Clone)]
pub struct CountTable {
    /// Values (samples x genes)
    values: Array2<f64>,
    sample_ids: Vec<String>,
    gene_headers: Vec<String>,
}

impl CountTable {
    pub fn new(values: Array2<f64>, sample_ids: Vec<String>, gene_headers: Vec<String>) -> Result<Self> {
        let (n_samples, n_genes) = values.dim();
        if sample_ids.len() != n_samples || gene_headers.len() != n_genes {
            return Err(DgeError::schema(format!(
                "count table shape {}x{} does not match {} sample IDs and {} gene headers",
                n_samples,
                n_genes,
                sample_ids.len(),
                gene_headers.len()
            )));
        }
        Ok(Self { values, sample_ids, gene_headers })
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_genes(&self) -> usize {
        self.values.ncols()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn gene_headers(&self) -> &[String] {
        &self.gene_headers
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }
}
