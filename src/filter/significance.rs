//! Significance threshold applied to a result set
//!
//! Filtering never copies or mutates the raw results; a [`SignificantView`]
//! borrows them and records which rows pass.

use crate::error::{DgeError, Result};
use crate::io::{DgeResult, DgeResults};

/// Default adjusted p-value threshold
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Rows of a result set with defined `padj` strictly below a threshold
#[derive(Debug, Clone)]
pub struct SignificantView<'a> {
    source: &'a DgeResults,
    indices: Vec<usize>,
    threshold: f64,
}

fn check_threshold(threshold: f64) -> Result<()> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(DgeError::invalid_input(format!(
            "significance threshold must be in (0, 1], got {}",
            threshold
        )))
    }
}

/// Select rows with `padj < threshold`; rows with undefined padj never pass.
pub fn significant(results: &DgeResults, threshold: f64) -> Result<SignificantView<'_>> {
    check_threshold(threshold)?;
    let indices = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_significant(threshold))
        .map(|(i, _)| i)
        .collect();
    Ok(SignificantView {
        source: results,
        indices,
        threshold,
    })
}

impl<'a> SignificantView<'a> {
    /// Apply a further threshold to the rows already in the view.
    ///
    /// Refining with the same threshold returns the same rows.
    pub fn refine(&self, threshold: f64) -> Result<SignificantView<'a>> {
        check_threshold(threshold)?;
        let indices = self
            .indices
            .iter()
            .copied()
            .filter(|&i| self.source.rows()[i].is_significant(threshold))
            .collect();
        Ok(SignificantView {
            source: self.source,
            indices,
            threshold: threshold.min(self.threshold),
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The unfiltered set this view borrows from
    pub fn source(&self) -> &'a DgeResults {
        self.source
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a DgeResult> + '_ {
        let rows = self.source.rows();
        self.indices.iter().map(move |&i| &rows[i])
    }

    pub fn genes(&self) -> Vec<&'a str> {
        self.iter().map(|r| r.gene.as_str()).collect()
    }

    /// Owned copy of the selected rows, keeping the source's comparison
    pub fn to_results(&self) -> DgeResults {
        DgeResults::new(
            self.iter().cloned().collect(),
            self.source.comparison().map(str::to_string),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn results_with_padj(padj: &[Option<f64>]) -> DgeResults {
        let rows = padj
            .iter()
            .enumerate()
            .map(|(i, &p)| DgeResult {
                gene: format!("G{}", i + 1),
                base_mean: 50.0,
                log2_fold_change: 1.0,
                lfc_se: Some(0.3),
                stat: Some(3.0),
                pvalue: p.map(|v| v / 2.0),
                padj: p,
            })
            .collect();
        DgeResults::new(rows, Some("TP53: mutant vs wild-type".to_string()))
    }

    #[test]
    fn test_strict_threshold() {
        let results = results_with_padj(&[Some(0.01), Some(0.04), Some(0.05), Some(0.2)]);
        let view = significant(&results, 0.05).unwrap();
        assert_eq!(view.genes(), vec!["G1", "G2"]);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_undefined_padj_excluded() {
        let results = results_with_padj(&[None, Some(0.001), None]);
        let view = significant(&results, 1.0).unwrap();
        assert_eq!(view.genes(), vec!["G2"]);
    }

    #[test]
    fn test_refine_idempotent() {
        let results = results_with_padj(&[Some(0.001), Some(0.03), Some(0.07), None, Some(0.009)]);
        let view = significant(&results, 0.1).unwrap();
        let once = view.refine(0.05).unwrap();
        let twice = once.refine(0.05).unwrap();
        assert_eq!(once.genes(), twice.genes());
        assert_eq!(once.genes(), vec!["G1", "G2", "G5"]);
    }

    #[test]
    fn test_to_results_keeps_comparison() {
        let results = results_with_padj(&[Some(0.01), Some(0.5)]);
        let owned = significant(&results, 0.05).unwrap().to_results();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned.comparison(), results.comparison());
    }

    #[test]
    fn test_invalid_threshold() {
        let results = results_with_padj(&[Some(0.01)]);
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let err = significant(&results, bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }
}
