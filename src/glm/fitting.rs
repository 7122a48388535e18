//! Per-gene negative binomial GLM fitting by iteratively reweighted least squares

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::linalg::{invert_symmetric, solve_symmetric};
use super::negative_binomial::{nb_log_likelihood, nb_mean, nb_weight, MAX_ETA, MAX_LFC_BETA, MIN_MU};

/// Configurable parameters for GLM fitting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlmFitParams {
    /// Maximum IRLS iterations
    pub maxit: usize,
    /// Relative deviance change that counts as converged
    pub beta_tol: f64,
}

impl Default for GlmFitParams {
    fn default() -> Self {
        Self {
            maxit: 100,
            beta_tol: 1e-8,
        }
    }
}

/// Ridge penalty added to the diagonal of X'WX (1e-6 on the log2 scale)
fn ridge_lambda() -> f64 {
    let ln2 = std::f64::consts::LN_2;
    1e-6 / (ln2 * ln2)
}

/// Result of fitting one gene
#[derive(Debug, Clone)]
pub struct GeneFit {
    /// Coefficients on the natural-log scale
    pub coefficients: Vec<f64>,
    pub standard_errors: Vec<f64>,
    /// Fitted means per sample
    pub mu: Vec<f64>,
    /// Diagonal of the weighted hat matrix per sample
    pub hat_diagonals: Vec<f64>,
    pub converged: bool,
    pub log_likelihood: f64,
}

fn linear_predictor(design: &Array2<f64>, beta: &[f64], i: usize) -> f64 {
    beta.iter().enumerate().map(|(j, b)| design[[i, j]] * b).sum()
}

fn fitted_means(design: &Array2<f64>, beta: &[f64], size_factors: ArrayView1<'_, f64>) -> Vec<f64> {
    (0..design.nrows())
        .map(|i| nb_mean(linear_predictor(design, beta, i), size_factors[i]).max(MIN_MU))
        .collect()
}

fn log_likelihood(counts: ArrayView1<'_, f64>, mu: &[f64], alpha: f64) -> f64 {
    counts.iter().zip(mu).map(|(&y, &m)| nb_log_likelihood(y, m, alpha)).sum()
}

/// Fit `log(mu / s) = X beta` for one gene at fixed dispersion `alpha`.
///
/// IRLS with a small ridge penalty and deviance-based convergence; genes that
/// fail to converge or leave the stable region are refit by coordinate-wise
/// Newton ascent and the better of the two fits is kept.
pub fn fit_gene(
    counts: ArrayView1<'_, f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<'_, f64>,
    alpha: f64,
    params: &GlmFitParams,
) -> GeneFit {
    let n = counts.len();
    let p = design.ncols();

    // Start from OLS on log(normalized + 0.1)
    let log_counts: Vec<f64> = counts
        .iter()
        .zip(size_factors.iter())
        .map(|(&c, &s)| (c / s + 0.1).ln())
        .collect();
    let mut xtx = vec![0.0; p * p];
    let mut xty = vec![0.0; p];
    for i in 0..n {
        for j in 0..p {
            for k in 0..p {
                xtx[j * p + k] += design[[i, j]] * design[[i, k]];
            }
            xty[j] += design[[i, j]] * log_counts[i];
        }
    }
    let mut beta = solve_symmetric(&xtx, &xty, p);
    if beta.iter().any(|b| !b.is_finite()) {
        let mean = log_counts.iter().sum::<f64>() / n as f64;
        beta = vec![0.0; p];
        beta[0] = mean;
    }
    let initial_beta = beta.clone();

    let lambda = ridge_lambda();
    let mut converged = false;
    let mut dev_old = 0.0f64;

    for iter in 0..params.maxit {
        let mu = fitted_means(design, &beta, size_factors);
        let weights: Vec<f64> = mu.iter().map(|&m| nb_weight(m, alpha)).collect();
        let z: Vec<f64> = (0..n)
            .map(|i| (mu[i] / size_factors[i]).ln() + (counts[i] - mu[i]) / mu[i])
            .collect();

        let mut xtwx = vec![0.0; p * p];
        let mut xtwz = vec![0.0; p];
        for i in 0..n {
            for j in 0..p {
                for k in 0..p {
                    xtwx[j * p + k] += weights[i] * design[[i, j]] * design[[i, k]];
                }
                xtwz[j] += weights[i] * design[[i, j]] * z[i];
            }
        }
        for j in 0..p {
            xtwx[j * p + j] += lambda;
        }
        beta = solve_symmetric(&xtwx, &xtwz, p);

        if beta.iter().any(|b| b.abs() > MAX_LFC_BETA) {
            break;
        }

        let mu = fitted_means(design, &beta, size_factors);
        let dev = -2.0 * log_likelihood(counts, &mu, alpha);
        let conv_test = (dev - dev_old).abs() / (dev.abs() + 0.1);
        if conv_test.is_nan() {
            break;
        }
        if iter > 0 && conv_test < params.beta_tol {
            converged = true;
            break;
        }
        dev_old = dev;
    }

    let stable = beta.iter().all(|b| b.is_finite() && b.abs() <= MAX_LFC_BETA);
    if !converged || !stable {
        let start = if stable { beta.clone() } else { initial_beta };
        let (fallback_beta, fallback_converged) = coordinate_ascent(counts, design, size_factors, alpha, start);
        let fallback_ll = log_likelihood(counts, &fitted_means(design, &fallback_beta, size_factors), alpha);
        let irls_ll = if stable {
            log_likelihood(counts, &fitted_means(design, &beta, size_factors), alpha)
        } else {
            f64::NEG_INFINITY
        };
        if fallback_ll >= irls_ll {
            beta = fallback_beta;
            converged = fallback_converged;
        }
    }

    finish_fit(counts, design, size_factors, alpha, beta, converged)
}

/// Coordinate-wise Newton ascent on the NB log-likelihood with Armijo backtracking
fn coordinate_ascent(
    counts: ArrayView1<'_, f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<'_, f64>,
    alpha: f64,
    mut beta: Vec<f64>,
) -> (Vec<f64>, bool) {
    const MAX_ITER: usize = 5000;
    const TOL: f64 = 1e-8;
    let n = counts.len();
    let p = design.ncols();

    let ll_of = |b: &[f64]| -> f64 {
        (0..n)
            .map(|i| {
                let eta = linear_predictor(design, b, i).clamp(-MAX_ETA, MAX_ETA);
                let mu = (size_factors[i] * eta.exp()).max(MIN_MU);
                nb_log_likelihood(counts[i], mu, alpha)
            })
            .sum()
    };

    let mut ll = ll_of(&beta);
    for _ in 0..MAX_ITER {
        let ll_start = ll;
        for j in 0..p {
            let mut grad = 0.0;
            let mut hess = 0.0;
            for i in 0..n {
                let mu = nb_mean(linear_predictor(design, &beta, i), size_factors[i]).max(MIN_MU);
                grad += (counts[i] - mu) / (1.0 + alpha * mu) * design[[i, j]];
                hess -= nb_weight(mu, alpha) * design[[i, j]] * design[[i, j]];
            }
            if hess.abs() < 1e-20 {
                continue;
            }
            let delta = -grad / hess;
            if delta.abs() < 1e-14 {
                continue;
            }

            let old = beta[j];
            let mut step = 1.0;
            let mut improved = false;
            for _ in 0..30 {
                beta[j] = (old + step * delta).clamp(-MAX_LFC_BETA, MAX_LFC_BETA);
                let ll_new = ll_of(&beta);
                if ll_new >= ll + 1e-4 * step * grad * delta {
                    ll = ll_new;
                    improved = true;
                    break;
                }
                step *= 0.5;
            }
            if !improved {
                beta[j] = old;
            }
        }
        if (ll - ll_start).abs() / (ll.abs() + 0.1) < TOL {
            return (beta, true);
        }
    }
    (beta, false)
}

fn finish_fit(
    counts: ArrayView1<'_, f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<'_, f64>,
    alpha: f64,
    beta: Vec<f64>,
    converged: bool,
) -> GeneFit {
    let mu = fitted_means(design, &beta, size_factors);
    let weights: Vec<f64> = mu.iter().map(|&m| nb_weight(m, alpha)).collect();
    let (standard_errors, hat_diagonals) = standard_errors_and_hat(design, &weights);
    let log_likelihood = log_likelihood(counts, &mu, alpha);
    GeneFit {
        coefficients: beta,
        standard_errors,
        mu,
        hat_diagonals,
        converged,
        log_likelihood,
    }
}

/// Sandwich covariance `(X'WX + L)^-1 X'WX (X'WX + L)^-1` and hat diagonals
fn standard_errors_and_hat(design: &Array2<f64>, weights: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let (n, p) = design.dim();
    let mut xtwx = vec![0.0; p * p];
    for i in 0..n {
        for j in 0..p {
            for k in 0..p {
                xtwx[j * p + k] += weights[i] * design[[i, j]] * design[[i, k]];
            }
        }
    }
    let mut ridged = xtwx.clone();
    let lambda = ridge_lambda();
    for j in 0..p {
        ridged[j * p + j] += lambda;
    }
    let inv = invert_symmetric(&ridged, p);

    let hat = (0..n)
        .map(|i| {
            let mut h = 0.0;
            for j in 0..p {
                for k in 0..p {
                    h += design[[i, j]] * inv[j * p + k] * design[[i, k]];
                }
            }
            weights[i] * h
        })
        .collect();

    let mut tmp = vec![0.0; p * p];
    for i in 0..p {
        for j in 0..p {
            tmp[i * p + j] = (0..p).map(|k| inv[i * p + k] * xtwx[k * p + j]).sum();
        }
    }
    let se = (0..p)
        .map(|i| {
            let var: f64 = (0..p).map(|k| tmp[i * p + k] * inv[k * p + i]).sum();
            if var > 0.0 {
                var.sqrt()
            } else {
                f64::NAN
            }
        })
        .collect();

    (se, hat)
}
