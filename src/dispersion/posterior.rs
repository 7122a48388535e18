//! Cox-Reid adjusted profile log-posterior over log(alpha) and its optimizers

use ndarray::Array2;
use statrs::function::gamma::{digamma, ln_gamma};

use super::DispersionParams;
use crate::glm::{invert_symmetric, log_det_symmetric};

/// Hard bounds on proposed log(alpha) during line search
const MIN_LOG_ALPHA_HARD: f64 = -30.0;
const MAX_LOG_ALPHA_HARD: f64 = 10.0;
/// Armijo sufficient-increase constant
const ARMIJO_EPS: f64 = 1e-4;
const GRID_POINTS: usize = 20;

/// Log-normal prior on the dispersion: log(alpha) ~ N(mean, var)
#[derive(Debug, Clone, Copy)]
pub(super) struct LogNormalPrior {
    pub mean: f64,
    pub var: f64,
}

/// Log-posterior of one gene's dispersion with the fitted means held fixed
pub(super) struct DispersionPosterior<'a> {
    counts: &'a [f64],
    mu: &'a [f64],
    design: &'a Array2<f64>,
    prior: Option<LogNormalPrior>,
}

/// Outcome of the Armijo line search
#[derive(Debug, Clone, Copy)]
pub(super) struct LineSearch {
    pub log_alpha: f64,
    pub initial_lp: f64,
    pub final_lp: f64,
    pub iterations: usize,
}

impl<'a> DispersionPosterior<'a> {
    pub fn new(counts: &'a [f64], mu: &'a [f64], design: &'a Array2<f64>, prior: Option<LogNormalPrior>) -> Self {
        Self { counts, mu, design, prior }
    }

    /// X'WX and its derivative in alpha, with w = 1 / (1/mu + alpha)
    fn information(&self, alpha: f64) -> (Vec<f64>, Vec<f64>) {
        let p = self.design.ncols();
        let mut b = vec![0.0; p * p];
        let mut db = vec![0.0; p * p];
        for (i, &mu) in self.mu.iter().enumerate() {
            let w = 1.0 / (1.0 / mu.max(1e-10) + alpha);
            for j in 0..p {
                for k in 0..p {
                    let xx = self.design[[i, j]] * self.design[[i, k]];
                    b[j * p + k] += w * xx;
                    db[j * p + k] -= w * w * xx;
                }
            }
        }
        (b, db)
    }

    pub fn value(&self, log_alpha: f64) -> f64 {
        let alpha = log_alpha.exp();
        let inv = 1.0 / alpha;
        let ll: f64 = self
            .counts
            .iter()
            .zip(self.mu)
            .map(|(&y, &mu)| {
                let mu = mu.max(1e-10);
                ln_gamma(y + inv) - ln_gamma(inv) - y * (mu + inv).ln() - inv * (1.0 + mu * alpha).ln()
            })
            .sum();

        let p = self.design.ncols();
        let (b, _) = self.information(alpha);
        let cox_reid = log_det_symmetric(&b, p).map(|ld| -0.5 * ld).unwrap_or(0.0);

        let prior = self
            .prior
            .map(|pr| -0.5 * (log_alpha - pr.mean).powi(2) / pr.var)
            .unwrap_or(0.0);

        ll + cox_reid + prior
    }

    /// Derivative of [`value`](Self::value) with respect to log(alpha)
    pub fn derivative(&self, log_alpha: f64) -> f64 {
        let alpha = log_alpha.exp();
        let inv = 1.0 / alpha;
        let ll_sum: f64 = self
            .counts
            .iter()
            .zip(self.mu)
            .map(|(&y, &mu)| {
                let mu = mu.max(1e-10);
                digamma(inv) + (1.0 + mu * alpha).ln() - mu * alpha / (1.0 + mu * alpha) - digamma(y + inv)
                    + y / (mu + inv)
            })
            .sum();
        let ll_part = ll_sum * inv * inv;

        let p = self.design.ncols();
        let (b, db) = self.information(alpha);
        let b_inv = invert_symmetric(&b, p);
        let trace: f64 = (0..p)
            .flat_map(|i| (0..p).map(move |j| (i, j)))
            .map(|(i, j)| b_inv[i * p + j] * db[j * p + i])
            .sum();
        let cr_part = if trace.is_finite() { -0.5 * trace } else { 0.0 };

        let prior = self.prior.map(|pr| -(log_alpha - pr.mean) / pr.var).unwrap_or(0.0);

        (ll_part + cr_part) * alpha + prior
    }

    /// Gradient ascent on log(alpha) with Armijo backtracking
    pub fn line_search(&self, start_log_alpha: f64, params: &DispersionParams) -> LineSearch {
        let min_log_alpha = (params.min_disp / 10.0).ln();
        let mut log_alpha = start_log_alpha.clamp(MIN_LOG_ALPHA_HARD, MAX_LOG_ALPHA_HARD);
        let initial_lp = self.value(log_alpha);
        let mut lp = initial_lp;
        let mut dlp = self.derivative(log_alpha);
        let mut kappa = params.kappa_0;
        let mut accepted = 0usize;
        let mut iterations = params.maxit;

        for iter in 0..params.maxit {
            let raw = log_alpha + kappa * dlp;
            if dlp.abs() > 1e-10 {
                if raw < MIN_LOG_ALPHA_HARD {
                    kappa = (MIN_LOG_ALPHA_HARD - log_alpha) / dlp;
                }
                if raw > MAX_LOG_ALPHA_HARD {
                    kappa = (MAX_LOG_ALPHA_HARD - log_alpha) / dlp;
                }
            }
            let proposal = log_alpha + kappa * dlp;
            let lp_proposal = self.value(proposal);

            if lp_proposal >= lp + kappa * ARMIJO_EPS * dlp * dlp {
                accepted += 1;
                log_alpha = proposal;
                let change = lp_proposal - lp;
                lp = lp_proposal;
                if change < params.disp_tol || log_alpha < min_log_alpha {
                    iterations = iter + 1;
                    break;
                }
                dlp = self.derivative(log_alpha);
                kappa = (kappa * 1.1).min(params.kappa_0);
                if accepted % 5 == 0 {
                    kappa /= 2.0;
                }
            } else {
                kappa /= 2.0;
            }
        }

        LineSearch {
            log_alpha,
            initial_lp,
            final_lp: lp,
            iterations,
        }
    }

    /// Coarse then fine grid search over log(alpha) in [ln min_disp, ln max_disp]
    pub fn grid_search(&self, min_disp: f64, max_disp: f64) -> f64 {
        let lo = min_disp.ln();
        let hi = max_disp.ln();
        let delta = (hi - lo) / (GRID_POINTS - 1) as f64;
        let coarse = self.best_on_grid(lo, delta);
        let fine_delta = 2.0 * delta / (GRID_POINTS - 1) as f64;
        self.best_on_grid(coarse - delta, fine_delta).exp()
    }

    fn best_on_grid(&self, start: f64, step: f64) -> f64 {
        (0..GRID_POINTS)
            .map(|i| start + i as f64 * step)
            .map(|la| (la, self.value(la)))
            .filter(|(_, lp)| lp.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(la, _)| la)
            .unwrap_or(start)
    }
}
