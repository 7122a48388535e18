//! Independent filtering on mean expression
//!
//! Genes with low baseMean have little power. Removing them before BH
//! reduces the number of tests; the threshold is chosen by scanning 50
//! quantiles of baseMean and keeping the one that rejects the most genes.

use std::cmp::Ordering;

use crate::testing::benjamini_hochberg;

const N_THETA: usize = 50;

/// Below this many rejections at the best threshold, no filtering is applied
const MIN_REJECTIONS: usize = 10;

/// Outcome of independent filtering
#[derive(Debug, Clone)]
pub struct IndependentFilter {
    /// Adjusted p-values; NaN for filtered or untestable genes
    pub padj: Vec<f64>,
    /// baseMean cutoff; genes below it were filtered
    pub threshold: f64,
    /// Quantile of baseMean the cutoff corresponds to
    pub theta: f64,
    pub rejections: usize,
    /// False when the scan found too few rejections and plain BH was used
    pub applied: bool,
}

/// Choose a baseMean cutoff and adjust p-values on the genes that pass it.
///
/// The smallest threshold reaching the maximum number of rejections at
/// `alpha` wins. When the maximum is at most ten rejections, every gene is
/// kept and plain BH is returned.
pub fn independent_filtering(base_means: &[f64], pvalues: &[f64], alpha: f64) -> IndependentFilter {
    let n = base_means.len();
    let unfiltered = || {
        let padj = benjamini_hochberg(pvalues);
        let rejections = count_rejections(&padj, alpha);
        IndependentFilter {
            padj,
            threshold: 0.0,
            theta: 0.0,
            rejections,
            applied: false,
        }
    };

    let mut sorted_means: Vec<f64> = base_means.iter().copied().filter(|m| m.is_finite()).collect();
    if n == 0 || sorted_means.is_empty() {
        return unfiltered();
    }
    sorted_means.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let zero_count = base_means.iter().filter(|&&m| m == 0.0 || !m.is_finite()).count();
    let lower_quantile = zero_count as f64 / n as f64;
    let upper_quantile = if lower_quantile < 0.95 { 0.95 } else { 1.0 };

    let thetas: Vec<f64> = (0..N_THETA)
        .map(|i| lower_quantile + (upper_quantile - lower_quantile) * i as f64 / (N_THETA - 1) as f64)
        .collect();

    let scans: Vec<(f64, Vec<f64>, usize)> = thetas
        .iter()
        .map(|&theta| {
            let cutoff = quantile_type7(&sorted_means, theta);
            let filtered: Vec<f64> = pvalues
                .iter()
                .zip(base_means)
                .map(|(&p, &m)| if m >= cutoff { p } else { f64::NAN })
                .collect();
            let padj = benjamini_hochberg(&filtered);
            let rejections = count_rejections(&padj, alpha);
            (cutoff, padj, rejections)
        })
        .collect();

    let max_rej = scans.iter().map(|(_, _, r)| *r).max().unwrap_or(0);
    if max_rej <= MIN_REJECTIONS {
        log::debug!("Independent filtering skipped: at most {} rejections", max_rej);
        return unfiltered();
    }

    let best = scans.iter().position(|(_, _, r)| *r == max_rej).unwrap_or(0);
    let theta = thetas[best];
    let (threshold, padj, rejections) = scans
        .into_iter()
        .nth(best)
        .unwrap_or_else(|| (0.0, benjamini_hochberg(pvalues), 0));

    log::info!(
        "Independent filtering: theta={:.3}, baseMean cutoff={:.2}, rejections={}",
        theta,
        threshold,
        rejections
    );

    IndependentFilter {
        padj,
        threshold,
        theta,
        rejections,
        applied: true,
    }
}

fn count_rejections(padj: &[f64], alpha: f64) -> usize {
    padj.iter().filter(|&&p| !p.is_nan() && p < alpha).count()
}

/// Sample quantile with linear interpolation between order statistics
/// (the default "type 7" definition)
fn quantile_type7(sorted_x: &[f64], p: f64) -> f64 {
    let n = sorted_x.len();
    if n == 0 {
        return f64::NAN;
    }
    let h = (n as f64 - 1.0) * p;
    let lo = (h.floor() as usize).min(n - 1);
    let hi = (h.ceil() as usize).min(n - 1);
    sorted_x[lo] + (h - h.floor()) * (sorted_x[hi] - sorted_x[lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_type7() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile_type7(&x, 0.0), 1.0);
        assert_relative_eq!(quantile_type7(&x, 0.5), 2.5);
        assert_relative_eq!(quantile_type7(&x, 1.0), 4.0);
    }

    #[test]
    fn test_low_power_skips_filtering() {
        let base_means: Vec<f64> = (0..20).map(|i| i as f64 + 1.0).collect();
        let pvalues = vec![0.5; 20];
        let out = independent_filtering(&base_means, &pvalues, 0.1);
        assert!(!out.applied);
        assert_eq!(out.padj, benjamini_hochberg(&pvalues));
    }

    #[test]
    fn test_filtering_recovers_power() {
        // 200 low-mean genes with uninformative p-values drown 20 strong genes under plain BH
        let mut base_means = Vec::new();
        let mut pvalues = Vec::new();
        for i in 0..200 {
            base_means.push(1.0 + i as f64 * 0.01);
            pvalues.push(0.02 + 0.97 * i as f64 / 200.0);
        }
        for i in 0..20 {
            base_means.push(500.0 + i as f64);
            pvalues.push(0.0005 * (i + 1) as f64);
        }
        assert_eq!(count_rejections(&benjamini_hochberg(&pvalues), 0.1), 0);

        let out = independent_filtering(&base_means, &pvalues, 0.1);
        assert!(out.applied);
        assert_eq!(out.rejections, 20);
        assert!(out.threshold > 1.0);
        for (i, &p) in out.padj.iter().enumerate() {
            if base_means[i] < out.threshold {
                assert!(p.is_nan());
            } else {
                assert!(p >= pvalues[i]);
            }
        }
    }
}
