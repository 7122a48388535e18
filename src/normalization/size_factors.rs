//! Size factor estimation using the median of ratios method

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{DgeError, Result};

/// Method used for the per-gene reference (geometric mean)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeFactorMethod {
    /// Median of ratios over genes with no zero counts
    Ratio,
    /// Geometric mean over positive counts only, divided by the full sample count
    PosCounts,
}

/// Estimate one size factor per sample from a genes x samples count view.
///
/// Tries the standard median-of-ratios first. When every gene has at least one
/// zero, falls back to positive-count geometric means.
pub fn estimate_size_factors(counts: ArrayView2<'_, f64>) -> Result<(Array1<f64>, SizeFactorMethod)> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(DgeError::insufficient("count matrix is empty"));
    }

    if let Some(sf) = median_of_ratios(counts, SizeFactorMethod::Ratio) {
        return Ok((sf, SizeFactorMethod::Ratio));
    }

    log::warn!("Every gene contains at least one zero; using positive-count geometric means");
    median_of_ratios(counts, SizeFactorMethod::PosCounts)
        .map(|sf| (sf, SizeFactorMethod::PosCounts))
        .ok_or_else(|| DgeError::insufficient("no gene has a positive count; cannot normalize library sizes"))
}

fn median_of_ratios(counts: ArrayView2<'_, f64>, method: SizeFactorMethod) -> Option<Array1<f64>> {
    let n_samples = counts.ncols();

    let references: Vec<(usize, f64)> = counts
        .axis_iter(Axis(0))
        .enumerate()
        .filter_map(|(i, row)| {
            let usable = match method {
                SizeFactorMethod::Ratio => row.iter().all(|&x| x > 0.0),
                SizeFactorMethod::PosCounts => row.iter().any(|&x| x > 0.0),
            };
            if !usable {
                return None;
            }
            let log_sum: f64 = row.iter().filter(|&&x| x > 0.0).map(|&x| x.ln()).sum();
            Some((i, (log_sum / n_samples as f64).exp()))
        })
        .collect();

    if references.is_empty() {
        return None;
    }

    let mut size_factors = Array1::zeros(n_samples);
    for j in 0..n_samples {
        let mut ratios: Vec<f64> = references
            .iter()
            .filter(|&&(i, _)| counts[[i, j]] > 0.0)
            .map(|&(i, geo_mean)| counts[[i, j]] / geo_mean)
            .collect();

        size_factors[j] = match median(&mut ratios) {
            Some(m) if m > 0.0 && m.is_finite() => m,
            // A sample with no usable ratio only arises in the poscounts path
            _ if method == SizeFactorMethod::PosCounts => 1.0,
            _ => return None,
        };
    }

    if method == SizeFactorMethod::PosCounts {
        // Center so the geometric mean of the factors is 1
        let log_mean = size_factors.iter().map(|&s: &f64| s.ln()).sum::<f64>() / n_samples as f64;
        let center = log_mean.exp();
        size_factors.mapv_inplace(|s| s / center);
    }

    Some(size_factors)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    Some(if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    })
}

/// Counts divided by their sample's size factor (genes x samples)
pub fn normalized_counts(counts: ArrayView2<'_, f64>, size_factors: &Array1<f64>) -> Array2<f64> {
    let mut normalized = counts.to_owned();
    for (mut col, &sf) in normalized.axis_iter_mut(Axis(1)).zip(size_factors.iter()) {
        col.mapv_inplace(|c| c / sf);
    }
    normalized
}

/// Mean of normalized counts per gene
pub fn base_means(normalized: &Array2<f64>) -> Array1<f64> {
    normalized
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(normalized.nrows()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_size_factors_recover_depth() {
        let counts = array![
            [100.0, 200.0, 80.0, 160.0],
            [500.0, 1000.0, 400.0, 800.0],
            [50.0, 100.0, 40.0, 80.0],
            [200.0, 400.0, 160.0, 320.0]
        ];
        let (sf, method) = estimate_size_factors(counts.view()).unwrap();
        assert_eq!(method, SizeFactorMethod::Ratio);
        assert!(sf.iter().all(|&x| x > 0.0));
        assert_relative_eq!(sf[1] / sf[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(sf[3] / sf[2], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_normalized_counts_equalize() {
        let counts = array![[100.0, 200.0, 80.0, 160.0], [500.0, 1000.0, 400.0, 800.0]];
        let (sf, _) = estimate_size_factors(counts.view()).unwrap();
        let norm = normalized_counts(counts.view(), &sf);
        let means = base_means(&norm);
        for v in norm.row(0).iter() {
            assert_relative_eq!(*v, means[0], max_relative = 1e-10);
        }
    }

    #[test]
    fn test_poscounts_fallback_with_zeros() {
        let counts = array![[0.0, 10.0, 20.0], [5.0, 0.0, 10.0], [8.0, 16.0, 0.0]];
        let (sf, method) = estimate_size_factors(counts.view()).unwrap();
        assert_eq!(method, SizeFactorMethod::PosCounts);
        assert!(sf.iter().all(|&x| x.is_finite() && x > 0.0));
    }

    #[test]
    fn test_all_zero_matrix_is_insufficient() {
        let counts = Array2::<f64>::zeros((3, 4));
        let err = estimate_size_factors(counts.view()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientData);
    }
}
