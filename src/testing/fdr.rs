//! Benjamini-Hochberg false discovery rate correction

use std::cmp::Ordering;

/// Apply Benjamini-Hochberg FDR correction.
///
/// NaN p-values are excluded from the number of tests and come back as NaN.
/// Every finite adjusted value is at least its raw p-value and at most 1.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let m = pvalues.iter().filter(|p| !p.is_nan()).count();
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let mut indices: Vec<usize> = (0..n).filter(|&i| !pvalues[i].is_nan()).collect();
    indices.sort_by(|&a, &b| pvalues[a].partial_cmp(&pvalues[b]).unwrap_or(Ordering::Equal));

    let mut padj = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;
    for (rank0, &i) in indices.iter().enumerate().rev() {
        let adj = (pvalues[i] * m as f64 / (rank0 + 1) as f64).min(1.0);
        cummin = cummin.min(adj);
        padj[i] = cummin;
    }

    padj
}
