//! Maximum a posteriori dispersion shrinkage toward the trend

use ndarray::Array2;

use super::posterior::{DispersionPosterior, LogNormalPrior};
use super::DispersionParams;

/// Floor on the prior variance of log dispersions
const MIN_PRIOR_VAR: f64 = 0.25;

/// Median absolute deviation (scaled by 1.4826), squared
fn mad_squared(values: &[f64]) -> f64 {
    fn median(v: &mut [f64]) -> f64 {
        v.sort_by(|a, b| a.total_cmp(b));
        let n = v.len();
        if n % 2 == 0 {
            (v[n / 2 - 1] + v[n / 2]) / 2.0
        } else {
            v[n / 2]
        }
    }
    if values.is_empty() {
        return 0.0;
    }
    let mut v = values.to_vec();
    let center = median(&mut v);
    let mut dev: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    (median(&mut dev) * 1.4826).powi(2)
}

/// Trigamma by recurrence up to x >= 8, then the asymptotic series
pub(crate) fn trigamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }
    let mut acc = 0.0;
    let mut z = x;
    while z < 8.0 {
        acc += 1.0 / (z * z);
        z += 1.0;
    }
    let z2 = z * z;
    acc + 1.0 / z + 0.5 / z2 + 1.0 / (6.0 * z2 * z) - 1.0 / (30.0 * z2 * z2 * z)
}

/// Spread of log gene-wise estimates around the trend.
///
/// Returns `(prior_var, var_log_disp_ests)`: the observed MAD^2 of log
/// residuals minus the sampling variance expected from `df` residual degrees
/// of freedom, floored at 0.25.
pub fn estimate_prior_variance(gene: &[f64], trended: &[f64], min_disp: f64, df: usize) -> (f64, f64) {
    let residuals: Vec<f64> = gene
        .iter()
        .zip(trended)
        .filter(|(&g, &t)| g.is_finite() && g >= 100.0 * min_disp && t.is_finite() && t > 0.0)
        .map(|(&g, &t)| g.ln() - t.ln())
        .collect();

    if residuals.len() < 3 || df == 0 {
        return (MIN_PRIOR_VAR, MIN_PRIOR_VAR);
    }

    let observed = mad_squared(&residuals);
    let expected = trigamma(df as f64 / 2.0);
    ((observed - expected).max(MIN_PRIOR_VAR), observed)
}

/// MAP estimate of one gene's dispersion under a log-normal prior centered on the trend
#[allow(clippy::too_many_arguments)]
pub fn fit_map_dispersion(
    counts: &[f64],
    mu: &[f64],
    design: &Array2<f64>,
    gene_disp: f64,
    trend_disp: f64,
    prior_var: f64,
    max_disp: f64,
    params: &DispersionParams,
) -> f64 {
    if !gene_disp.is_finite() {
        return gene_disp;
    }
    let prior = LogNormalPrior {
        mean: trend_disp.ln(),
        var: prior_var,
    };
    let posterior = DispersionPosterior::new(counts, mu, design, Some(prior));

    let start = if gene_disp > 0.1 * trend_disp { gene_disp } else { trend_disp };
    let search = posterior.line_search(start.ln(), params);
    let alpha = if search.iterations < params.maxit {
        search.log_alpha.exp()
    } else {
        posterior.grid_search(params.min_disp, max_disp)
    };
    alpha.clamp(params.min_disp, max_disp)
}

/// Whether a gene's own estimate sits so far above the trend that it should
/// not be shrunk
pub fn is_upper_outlier(gene_disp: f64, trend_disp: f64, var_log_disp_ests: f64, outlier_sd: f64) -> bool {
    gene_disp.is_finite()
        && gene_disp > 0.0
        && trend_disp > 0.0
        && gene_disp.ln() - trend_disp.ln() > outlier_sd * var_log_disp_ests.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_trigamma_known_values() {
        assert_relative_eq!(trigamma(1.0), std::f64::consts::PI.powi(2) / 6.0, epsilon = 1e-8);
        assert_relative_eq!(trigamma(0.5), std::f64::consts::PI.powi(2) / 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_prior_variance_floor() {
        let gene = vec![0.1, 0.1, 0.1, 0.1];
        let trend = vec![0.1, 0.1, 0.1, 0.1];
        let (prior_var, observed) = estimate_prior_variance(&gene, &trend, 1e-8, 4);
        assert_eq!(prior_var, 0.25);
        assert_eq!(observed, 0.0);
    }

    #[test]
    fn test_map_lies_between_gene_and_trend() {
        let design = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let counts = [20.0, 180.0, 100.0, 60.0, 400.0, 140.0];
        let mu = [100.0, 100.0, 100.0, 200.0, 200.0, 200.0];
        let gene = 0.5;
        let trend = 0.05;
        let map = fit_map_dispersion(&counts, &mu, &design, gene, trend, 0.5, 10.0, &DispersionParams::default());
        assert!(map > trend && map < gene * 1.5, "map = {}", map);
    }

    #[test]
    fn test_upper_outlier_rule() {
        assert!(is_upper_outlier(1.0, 0.01, 0.25, 2.0));
        assert!(!is_upper_outlier(0.012, 0.01, 0.25, 2.0));
        assert!(!is_upper_outlier(f64::NAN, 0.01, 0.25, 2.0));
    }
}
