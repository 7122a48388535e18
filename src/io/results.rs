//! Differential expression result rows

use std::fmt;

use serde::{Deserialize, Serialize};

/// Test outcome for one gene.
///
/// `None` marks a quantity that is undefined for the gene (untestable gene,
/// Cook's outlier, or filtered out before multiple-testing correction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DgeResult {
    pub gene: String,
    #[serde(rename = "baseMean")]
    pub base_mean: f64,
    #[serde(rename = "log2FoldChange")]
    pub log2_fold_change: f64,
    #[serde(rename = "lfcSE")]
    pub lfc_se: Option<f64>,
    pub stat: Option<f64>,
    pub pvalue: Option<f64>,
    pub padj: Option<f64>,
}

impl DgeResult {
    /// Whether `padj` is defined and strictly below `threshold`
    pub fn is_significant(&self, threshold: f64) -> bool {
        matches!(self.padj, Some(p) if p < threshold)
    }
}

/// Ordered result set for one comparison.
///
/// Built once by an engine and not mutated afterwards; filtered subsets are
/// borrowed views or fresh copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DgeResults {
    rows: Vec<DgeResult>,
    comparison: Option<String>,
}

impl DgeResults {
    pub fn new(rows: Vec<DgeResult>, comparison: Option<String>) -> Self {
        Self { rows, comparison }
    }

    /// Replace the comparison description
    pub fn with_comparison(self, comparison: impl Into<String>) -> Self {
        Self {
            comparison: Some(comparison.into()),
            ..self
        }
    }

    pub fn rows(&self) -> &[DgeResult] {
        &self.rows
    }

    /// Description of the comparison, e.g. `TP53: mutant vs wild-type`
    pub fn comparison(&self) -> Option<&str> {
        self.comparison.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DgeResult> {
        self.rows.iter()
    }

    pub fn get(&self, gene: &str) -> Option<&DgeResult> {
        self.rows.iter().find(|r| r.gene == gene)
    }

    pub fn summary(&self, threshold: f64) -> ResultsSummary {
        let significant: Vec<&DgeResult> = self.rows.iter().filter(|r| r.is_significant(threshold)).collect();
        ResultsSummary {
            total_genes: self.rows.len(),
            genes_tested: self.rows.iter().filter(|r| r.pvalue.is_some()).count(),
            significant: significant.len(),
            upregulated: significant.iter().filter(|r| r.log2_fold_change > 0.0).count(),
            downregulated: significant.iter().filter(|r| r.log2_fold_change < 0.0).count(),
            threshold,
        }
    }
}

impl<'a> IntoIterator for &'a DgeResults {
    type Item = &'a DgeResult;
    type IntoIter = std::slice::Iter<'a, DgeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Counts of tested and significant genes
#[derive(Debug, Clone)]
pub struct ResultsSummary {
    pub total_genes: usize,
    pub genes_tested: usize,
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub threshold: f64,
}

impl fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Differential Expression Summary")?;
        writeln!(f, "===============================")?;
        writeln!(f, "Total genes: {}", self.total_genes)?;
        writeln!(f, "Genes tested: {}", self.genes_tested)?;
        writeln!(f, "Significant (padj < {}): {}", self.threshold, self.significant)?;
        writeln!(f, "  Up in mutant: {}", self.upregulated)?;
        writeln!(f, "  Down in mutant: {}", self.downregulated)?;
        Ok(())
    }
}
