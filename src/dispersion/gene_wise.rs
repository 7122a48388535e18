//! Gene-wise dispersion estimation using Cox-Reid adjusted profile likelihood

use ndarray::Array2;

use super::posterior::DispersionPosterior;
use super::DispersionParams;
use crate::glm::{solve_symmetric, MIN_MU};

/// Upper bound on any dispersion estimate for `n_samples` samples
pub(crate) fn max_dispersion(n_samples: usize) -> f64 {
    (n_samples as f64).max(10.0)
}

/// Least-squares fitted values of `y` on the design (group means for a group design)
fn linear_model_fit(y: &[f64], design: &Array2<f64>) -> Vec<f64> {
    let (n, p) = design.dim();
    let mut xtx = vec![0.0; p * p];
    let mut xty = vec![0.0; p];
    for i in 0..n {
        for j in 0..p {
            for k in 0..p {
                xtx[j * p + k] += design[[i, j]] * design[[i, k]];
            }
            xty[j] += design[[i, j]] * y[i];
        }
    }
    let beta = solve_symmetric(&xtx, &xty, p);
    (0..n)
        .map(|i| (0..p).map(|j| design[[i, j]] * beta[j]).sum())
        .collect()
}

/// Moment estimate from residuals around the linear fit:
/// sum(((y - mu)^2 - mu) / mu^2) / (m - p), floored at zero
fn rough_estimate(normalized: &[f64], design: &Array2<f64>) -> f64 {
    let (n, p) = design.dim();
    let fitted = linear_model_fit(normalized, design);
    let sum: f64 = normalized
        .iter()
        .zip(&fitted)
        .map(|(&y, &mu)| {
            let mu = mu.max(1.0);
            ((y - mu).powi(2) - mu) / (mu * mu)
        })
        .sum();
    (sum / (n - p) as f64).max(0.0)
}

/// (variance - xim * mean) / mean^2, where xim is the mean of 1 / size factor
fn moments_estimate(normalized: &[f64], xim: f64) -> f64 {
    let n = normalized.len() as f64;
    let mean = normalized.iter().sum::<f64>() / n;
    if mean <= 1e-10 {
        return f64::INFINITY;
    }
    let var = normalized.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (var - xim * mean) / (mean * mean)
}

/// Estimate one gene's dispersion.
///
/// Returns the estimate together with the fitted means it was profiled
/// against. All-zero genes yield `NaN` and zero means.
pub fn estimate_gene_dispersion(
    counts: &[f64],
    size_factors: &[f64],
    design: &Array2<f64>,
    xim: f64,
    params: &DispersionParams,
) -> (f64, Vec<f64>) {
    let n = counts.len();
    if counts.iter().all(|&c| c == 0.0) {
        return (f64::NAN, vec![0.0; n]);
    }

    let max_disp = max_dispersion(n);
    let normalized: Vec<f64> = counts.iter().zip(size_factors).map(|(&c, &s)| c / s).collect();

    let alpha_init = rough_estimate(&normalized, design)
        .min(moments_estimate(&normalized, xim))
        .clamp(params.min_disp, max_disp);

    let mu: Vec<f64> = linear_model_fit(&normalized, design)
        .into_iter()
        .zip(size_factors)
        .map(|(m, &s)| (m * s).max(MIN_MU))
        .collect();

    let posterior = DispersionPosterior::new(counts, &mu, design, None);
    let search = posterior.line_search(alpha_init.ln(), params);

    let no_increase = search.final_lp < search.initial_lp + search.initial_lp.abs() / 1e6;
    let mut alpha = if no_increase { alpha_init } else { search.log_alpha.exp() };

    let converged = search.iterations < params.maxit && search.iterations != 1;
    if !converged && alpha > params.min_disp * 10.0 {
        alpha = posterior.grid_search(params.min_disp, max_disp);
    }

    (alpha.clamp(params.min_disp, max_disp), mu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn design() -> Array2<f64> {
        array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]
    }

    #[test]
    fn test_all_zero_gene_is_nan() {
        let (alpha, mu) = estimate_gene_dispersion(&[0.0; 6], &[1.0; 6], &design(), 1.0, &DispersionParams::default());
        assert!(alpha.is_nan());
        assert_eq!(mu, vec![0.0; 6]);
    }

    #[test]
    fn test_overdispersed_gene_exceeds_poisson_like() {
        let params = DispersionParams::default();
        let sf = [1.0; 6];
        let (tight, _) = estimate_gene_dispersion(&[100.0, 101.0, 99.0, 200.0, 202.0, 198.0], &sf, &design(), 1.0, &params);
        let (noisy, mu) = estimate_gene_dispersion(&[20.0, 180.0, 100.0, 60.0, 400.0, 140.0], &sf, &design(), 1.0, &params);
        assert!(noisy > tight);
        assert!(noisy > 0.1);
        assert!(mu.iter().all(|&m| m >= MIN_MU));
    }

    #[test]
    fn test_linear_model_fit_is_group_mean() {
        let fitted = linear_model_fit(&[1.0, 2.0, 3.0, 10.0, 20.0, 30.0], &design());
        assert!((fitted[0] - 2.0).abs() < 1e-9);
        assert!((fitted[5] - 20.0).abs() < 1e-9);
    }
}
