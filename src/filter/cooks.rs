//! Cook's distance outlier flagging and replacement
//!
//! Cook's distance measures how strongly a single sample pulls the fitted
//! coefficients of a gene. Per sample:
//! `cooks = pearson_res^2 / p * h / (1 - h)^2`, where the Pearson residual uses
//! a robust method-of-moments dispersion rather than the fitted one.

use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::data::GroupLabel;
use crate::glm::nb_variance;

const MIN_MOMENTS_DISP: f64 = 0.04;
const REPLACE_TRIM: f64 = 0.2;

/// Whether any group is large enough for Cook's flagging (three or more samples)
pub fn has_replicated_group(groups: &[GroupLabel]) -> bool {
    [GroupLabel::WildType, GroupLabel::Mutant]
        .iter()
        .any(|label| groups.iter().filter(|g| *g == label).count() >= 3)
}

/// Cook's distances, genes x samples.
///
/// `mu` and `hat_diagonals` come from the GLM fit and share the layout of
/// `counts`. Entries with `h >= 1` or a non-finite residual are NaN.
pub fn calculate_cooks_distance(
    counts: &Array2<f64>,
    normalized: &Array2<f64>,
    mu: &Array2<f64>,
    hat_diagonals: &Array2<f64>,
    groups: &[GroupLabel],
    n_coefs: usize,
) -> Array2<f64> {
    let n_genes = counts.nrows();
    let n_samples = counts.ncols();
    let p = n_coefs as f64;
    let dispersions = robust_method_of_moments_disp(normalized, groups);

    let cooks_flat: Vec<f64> = (0..n_genes)
        .into_par_iter()
        .flat_map_iter(move |i| {
            let alpha = dispersions[i];
            (0..n_samples).map(move |j| {
                let y = counts[[i, j]];
                let m = mu[[i, j]];
                let h = hat_diagonals[[i, j]];
                let v = nb_variance(m, alpha);
                let pearson_sq = if v > 0.0 { (y - m).powi(2) / v } else { 0.0 };
                if h.is_finite() && h < 1.0 && pearson_sq.is_finite() {
                    pearson_sq / p * h / (1.0 - h).powi(2)
                } else {
                    f64::NAN
                }
            })
        })
        .collect();

    Array2::from_shape_vec((n_genes, n_samples), cooks_flat)
        .unwrap_or_else(|_| Array2::from_elem((n_genes, n_samples), f64::NAN))
}

/// Dispersion from trimmed within-group variance: `alpha = (v - m) / m^2`.
///
/// Groups with at least three samples contribute a trimmed cell variance and
/// the largest is used; otherwise a trimmed variance across all samples.
pub fn robust_method_of_moments_disp(normalized: &Array2<f64>, groups: &[GroupLabel]) -> Vec<f64> {
    let n_samples = normalized.ncols();
    let cells: Vec<Vec<usize>> = [GroupLabel::WildType, GroupLabel::Mutant]
        .iter()
        .map(|label| (0..n_samples).filter(|&j| groups.get(j) == Some(label)).collect::<Vec<usize>>())
        .filter(|cell| cell.len() >= 3)
        .collect();

    (0..normalized.nrows())
        .map(|i| {
            let row: Vec<f64> = normalized.row(i).to_vec();
            let variance = if cells.is_empty() {
                trimmed_variance(&row, 1.0 / 8.0, 1.51)
            } else {
                cells
                    .iter()
                    .map(|cell| {
                        let values: Vec<f64> = cell.iter().map(|&j| row[j]).collect();
                        let (trim, scale) = cell_trim(values.len());
                        trimmed_variance(&values, trim, scale)
                    })
                    .fold(0.0_f64, f64::max)
            };
            let mean = row.iter().sum::<f64>() / n_samples as f64;
            if mean > 0.0 {
                ((variance - mean) / (mean * mean)).max(MIN_MOMENTS_DISP)
            } else {
                MIN_MOMENTS_DISP
            }
        })
        .collect()
}

/// Trim ratio and scale constant for a cell of `n` samples
fn cell_trim(n: usize) -> (f64, f64) {
    if n <= 3 {
        (1.0 / 3.0, 2.04)
    } else if n <= 23 {
        (1.0 / 4.0, 1.86)
    } else {
        (1.0 / 8.0, 1.51)
    }
}

fn trimmed_variance(values: &[f64], trim: f64, scale: f64) -> f64 {
    let center = trimmed_mean(&mut values.to_vec(), trim);
    let mut sq_errors: Vec<f64> = values.iter().map(|&v| (v - center).powi(2)).collect();
    scale * trimmed_mean(&mut sq_errors, trim)
}

fn trimmed_mean(values: &mut [f64], trim: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let k = (n as f64 * trim).floor() as usize;
    let kept = if k * 2 >= n { &values[..] } else { &values[k..n - k] };
    kept.iter().sum::<f64>() / kept.len() as f64
}

/// Cutoff at the 0.99 quantile of `F(p, m - p)`.
///
/// Infinite when there are no residual degrees of freedom.
pub fn default_cooks_cutoff(n_samples: usize, n_coefs: usize) -> f64 {
    if n_samples <= n_coefs {
        return f64::INFINITY;
    }
    match FisherSnedecor::new(n_coefs as f64, (n_samples - n_coefs) as f64) {
        Ok(f_dist) => f_dist.inverse_cdf(0.99),
        Err(_) => f64::INFINITY,
    }
}

/// Genes to drop from testing because of a Cook's outlier.
///
/// A gene is flagged when its largest Cook's distance exceeds `cutoff`,
/// unless three or more samples have a raw count above the count of the
/// sample carrying that distance.
pub fn flag_cooks_outliers(cooks: &Array2<f64>, counts: ArrayView2<'_, f64>, cutoff: f64) -> Vec<bool> {
    cooks
        .rows()
        .into_iter()
        .zip(counts.rows())
        .map(|(row, y)| {
            let worst = row
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_finite())
                .max_by(|a, b| a.1.total_cmp(b.1));
            match worst {
                Some((j, &c)) if c > cutoff => y.iter().filter(|&&v| v > y[j]).count() < 3,
                _ => false,
            }
        })
        .collect()
}

/// Samples whose group has at least `min_replicates` members
pub fn replaceable_samples(groups: &[GroupLabel], min_replicates: usize) -> Vec<bool> {
    groups
        .iter()
        .map(|label| groups.iter().filter(|g| *g == label).count() >= min_replicates)
        .collect()
}

/// Counts after outlier replacement
#[derive(Debug, Clone)]
pub struct OutlierReplacement {
    pub counts: Array2<f64>,
    /// Genes with at least one replaced count, in gene order
    pub genes: Vec<usize>,
}

/// Replace outlier counts in replaceable samples.
///
/// An outlier count (Cook's distance above `cutoff`) becomes the gene's 20%
/// trimmed mean of normalized counts across all samples, scaled back by that
/// sample's size factor and truncated to an integer.
pub fn replace_outliers(
    counts: ArrayView2<'_, f64>,
    normalized: &Array2<f64>,
    size_factors: &Array1<f64>,
    cooks: &Array2<f64>,
    cutoff: f64,
    replaceable: &[bool],
) -> OutlierReplacement {
    let mut replaced = counts.to_owned();
    let mut genes = Vec::new();
    for i in 0..counts.nrows() {
        let outliers: Vec<usize> = (0..counts.ncols())
            .filter(|&j| replaceable[j] && cooks[[i, j]].is_finite() && cooks[[i, j]] > cutoff)
            .collect();
        if outliers.is_empty() {
            continue;
        }
        let trim_mean = trimmed_mean(&mut normalized.row(i).to_vec(), REPLACE_TRIM);
        for j in outliers {
            replaced[[i, j]] = (trim_mean * size_factors[j]).floor();
        }
        genes.push(i);
    }
    OutlierReplacement { counts: replaced, genes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_default_cutoff() {
        // qf(0.99, 2, 6)
        assert_relative_eq!(default_cooks_cutoff(8, 2), 10.92477, epsilon = 1e-2);
        assert!(default_cooks_cutoff(2, 2).is_infinite());
    }

    #[test]
    fn test_trimmed_mean() {
        let mut values = vec![8.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_relative_eq!(trimmed_mean(&mut values, 1.0 / 8.0), 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_replicated_group() {
        use GroupLabel::*;
        assert!(!has_replicated_group(&[WildType, WildType, Mutant, Mutant]));
        assert!(has_replicated_group(&[WildType, WildType, WildType, Mutant, Mutant]));
    }

    #[test]
    fn test_single_spike_is_flagged() {
        use GroupLabel::*;
        let groups = [WildType, WildType, WildType, WildType, Mutant, Mutant, Mutant, Mutant];
        let counts = array![
            [100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 103.0, 97.0],
            [100.0, 102.0, 98.0, 2000.0, 99.0, 100.0, 103.0, 97.0]
        ];
        let mu = array![
            [100.25, 100.25, 100.25, 100.25, 99.75, 99.75, 99.75, 99.75],
            [575.0, 575.0, 575.0, 575.0, 99.75, 99.75, 99.75, 99.75]
        ];
        let hat = Array2::from_elem((2, 8), 0.25);
        let cooks = calculate_cooks_distance(&counts, &counts, &mu, &hat, &groups, 2);
        let flags = flag_cooks_outliers(&cooks, counts.view(), default_cooks_cutoff(8, 2));
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_low_outlier_with_larger_counts_is_kept() {
        let counts = array![
            [100.0, 100.0, 100.0, 100.0, 100.0, 100.0],
            [100.0, 100.0, 100.0, 3.0, 100.0, 100.0]
        ];
        let mut cooks = Array2::from_elem((2, 6), 0.1);
        cooks[[0, 2]] = 50.0;
        cooks[[1, 3]] = 50.0;
        let flags = flag_cooks_outliers(&cooks, counts.view(), 10.0);
        assert_eq!(flags, vec![true, false]);

        let mut high = counts.clone();
        high[[1, 3]] = 900.0;
        let flags = flag_cooks_outliers(&cooks, high.view(), 10.0);
        assert_eq!(flags, vec![true, true]);
    }

    #[test]
    fn test_replace_outliers_uses_trimmed_mean() {
        use GroupLabel::*;
        let groups = [WildType, WildType, WildType, WildType, WildType, WildType, WildType, Mutant, Mutant];
        let replaceable = replaceable_samples(&groups, 7);
        assert_eq!(replaceable, vec![true, true, true, true, true, true, true, false, false]);

        let counts = array![
            [10.0, 11.0, 12.0, 13.0, 500.0, 14.0, 15.0, 16.0, 600.0],
            [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0]
        ];
        let size_factors = Array1::from_elem(9, 1.0);
        let mut cooks = Array2::from_elem((2, 9), 0.5);
        cooks[[0, 4]] = 30.0;
        cooks[[0, 8]] = 30.0;

        let replacement = replace_outliers(counts.view(), &counts, &size_factors, &cooks, 10.0, &replaceable);
        assert_eq!(replacement.genes, vec![0]);
        // Sorted row: 10 11 12 13 14 15 16 500 600; one value trimmed from each end.
        let expected = ((11.0 + 12.0 + 13.0 + 14.0 + 15.0 + 16.0 + 500.0) / 7.0_f64).floor();
        assert_eq!(replacement.counts[[0, 4]], expected);
        assert_eq!(replacement.counts[[0, 8]], 600.0);
        assert_eq!(replacement.counts.row(1), counts.row(1));
    }
}
