//! Dispersion estimation for negative binomial models
//!
//! Three stages: gene-wise Cox-Reid estimates, a dispersion-mean trend, and
//! MAP shrinkage of the gene-wise estimates toward that trend.

mod gene_wise;
mod map;
mod posterior;
mod trend;

pub use gene_wise::estimate_gene_dispersion;
pub(crate) use gene_wise::max_dispersion;
pub use map::{estimate_prior_variance, fit_map_dispersion, is_upper_outlier};
pub use trend::{fit_dispersion_trend, DispersionTrend};

use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::glm::GroupDesign;

/// Configurable parameters for dispersion estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionParams {
    /// Minimum dispersion value
    pub min_disp: f64,
    /// Line-search convergence tolerance on the log-posterior
    pub disp_tol: f64,
    /// Initial line-search step size
    pub kappa_0: f64,
    /// Maximum line-search iterations
    pub maxit: usize,
    /// Upper-outlier threshold, in SDs of the log residuals
    pub outlier_sd: f64,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            min_disp: 1e-8,
            disp_tol: 1e-6,
            kappa_0: 1.0,
            maxit: 100,
            outlier_sd: 2.0,
        }
    }
}

/// All dispersion quantities for one fit
#[derive(Debug, Clone)]
pub struct DispersionEstimates {
    /// Values used by the GLM: MAP estimates, or gene-wise for upper outliers
    pub final_values: Array1<f64>,
    pub(crate) trend: DispersionTrend,
    pub(crate) prior_var: f64,
    pub(crate) var_log_disp_ests: f64,
}

impl DispersionEstimates {
    /// Final dispersions for `genes` re-estimated from new counts.
    ///
    /// The trend and prior variance of the original fit are kept; only the
    /// gene-wise estimates and their shrinkage are redone. Genes whose new
    /// counts are all zero get `NaN`.
    pub fn refit(
        &self,
        counts: ArrayView2<'_, f64>,
        size_factors: &Array1<f64>,
        base_means: &Array1<f64>,
        design: &GroupDesign,
        genes: &[usize],
        params: &DispersionParams,
    ) -> Vec<f64> {
        let x = design.matrix();
        let sf: Vec<f64> = size_factors.to_vec();
        let xim = sf.iter().map(|&s| 1.0 / s).sum::<f64>() / sf.len() as f64;
        let max_disp = max_dispersion(sf.len());

        genes
            .par_iter()
            .map(|&i| {
                let y = counts.row(i).to_vec();
                let (gene_disp, mu) = estimate_gene_dispersion(&y, &sf, x, xim, params);
                let trend_disp = self.trend.eval(base_means[i]);
                self.shrink(&y, &mu, x, gene_disp, trend_disp, max_disp, params)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn shrink(
        &self,
        counts: &[f64],
        mu: &[f64],
        design: &Array2<f64>,
        gene_disp: f64,
        trend_disp: f64,
        max_disp: f64,
        params: &DispersionParams,
    ) -> f64 {
        if is_upper_outlier(gene_disp, trend_disp, self.var_log_disp_ests, params.outlier_sd) {
            return gene_disp;
        }
        fit_map_dispersion(counts, mu, design, gene_disp, trend_disp, self.prior_var, max_disp, params)
    }
}

/// Run all three dispersion stages over every gene.
///
/// Per-gene work is dispatched with rayon and collected in gene order, so the
/// result does not depend on the number of worker threads.
pub fn estimate_dispersions(
    counts: ArrayView2<'_, f64>,
    size_factors: &Array1<f64>,
    base_means: &Array1<f64>,
    design: &GroupDesign,
    params: &DispersionParams,
) -> DispersionEstimates {
    let n_genes = counts.nrows();
    let n_samples = counts.ncols();
    let x = design.matrix();
    let sf: Vec<f64> = size_factors.to_vec();
    let xim = sf.iter().map(|&s| 1.0 / s).sum::<f64>() / n_samples as f64;
    let max_disp = max_dispersion(n_samples);

    let gene_fits: Vec<(f64, Vec<f64>)> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let y = counts.row(i).to_vec();
            estimate_gene_dispersion(&y, &sf, x, xim, params)
        })
        .collect();
    let gene_wise: Vec<f64> = gene_fits.iter().map(|(d, _)| *d).collect();
    let means = base_means.to_vec();

    let trend = fit_dispersion_trend(&means, &gene_wise, params.min_disp);
    let trended: Vec<f64> = means.iter().map(|&m| trend.eval(m)).collect();

    let (prior_var, var_log_disp_ests) =
        estimate_prior_variance(&gene_wise, &trended, params.min_disp, design.df_residual());
    log::debug!(
        "Dispersion prior variance {:.4} (observed log-residual variance {:.4})",
        prior_var,
        var_log_disp_ests
    );

    let mut estimates = DispersionEstimates {
        final_values: Array1::zeros(n_genes),
        trend,
        prior_var,
        var_log_disp_ests,
    };

    let final_values: Vec<f64> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let y = counts.row(i).to_vec();
            estimates.shrink(&y, &gene_fits[i].1, x, gene_wise[i], trended[i], max_disp, params)
        })
        .collect();

    let n_outliers = (0..n_genes)
        .filter(|&i| is_upper_outlier(gene_wise[i], trended[i], var_log_disp_ests, params.outlier_sd))
        .count();
    log::info!(
        "Estimated dispersions for {} genes ({} upper outliers kept gene-wise)",
        n_genes,
        n_outliers
    );

    estimates.final_values = Array1::from(final_values);
    estimates
}
