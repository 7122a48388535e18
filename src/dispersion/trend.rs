//! Dispersion-mean trend

use serde::Serialize;

/// Fitted relationship between mean expression and dispersion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DispersionTrend {
    /// alpha(mu) = asympt_disp + extra_pois / mu
    Parametric { asympt_disp: f64, extra_pois: f64 },
    /// Constant trend at the mean of gene-wise estimates
    Mean(f64),
}

impl DispersionTrend {
    /// Trended dispersion at a given base mean
    pub fn eval(&self, base_mean: f64) -> f64 {
        match *self {
            DispersionTrend::Parametric { asympt_disp, extra_pois } => {
                if base_mean > 0.0 {
                    asympt_disp + extra_pois / base_mean
                } else {
                    asympt_disp
                }
            }
            DispersionTrend::Mean(m) => m,
        }
    }
}

/// Fit the dispersion trend, trying the parametric form first.
///
/// Genes with non-finite estimates or estimates at the lower boundary
/// (below `100 * min_disp`) do not inform the fit.
pub fn fit_dispersion_trend(base_means: &[f64], gene_dispersions: &[f64], min_disp: f64) -> DispersionTrend {
    let usable: Vec<(f64, f64)> = base_means
        .iter()
        .zip(gene_dispersions)
        .filter(|(&m, &d)| m > 0.0 && d.is_finite() && d >= 100.0 * min_disp)
        .map(|(&m, &d)| (m, d))
        .collect();

    match fit_parametric(&usable) {
        Ok((asympt_disp, extra_pois)) => {
            log::debug!("Parametric trend: asymptDisp={:.6}, extraPois={:.6}", asympt_disp, extra_pois);
            DispersionTrend::Parametric { asympt_disp, extra_pois }
        }
        Err(reason) => {
            let mean = mean_trend(base_means, gene_dispersions, min_disp);
            log::info!("Parametric dispersion fit failed ({}); using mean dispersion {:.6}", reason, mean);
            DispersionTrend::Mean(mean)
        }
    }
}

fn mean_trend(base_means: &[f64], gene_dispersions: &[f64], min_disp: f64) -> f64 {
    let values: Vec<f64> = base_means
        .iter()
        .zip(gene_dispersions)
        .filter(|(&m, &d)| m > 0.0 && d.is_finite() && d > 10.0 * min_disp)
        .map(|(_, &d)| d)
        .collect();
    if values.is_empty() {
        return 10.0 * min_disp;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Gamma-family GLM with identity link on 1/mean, refit after dropping
/// points whose residual ratio falls outside (1e-4, 15)
fn fit_parametric(data: &[(f64, f64)]) -> std::result::Result<(f64, f64), String> {
    const MAX_ITER: usize = 11;
    let mut coefs = (0.1f64, 1.0f64);

    for _ in 0..MAX_ITER {
        let old = coefs;
        let kept: Vec<(f64, f64)> = data
            .iter()
            .filter(|&&(m, d)| {
                let fitted = coefs.0 + coefs.1 / m;
                fitted > 0.0 && d / fitted > 1e-4 && d / fitted < 15.0
            })
            .copied()
            .collect();
        if kept.len() < 3 {
            return Err(format!("{} usable genes", kept.len()));
        }

        let (next, glm_converged) = gamma_identity_glm(&kept, coefs);
        coefs = next;
        if coefs.0 <= 0.0 || coefs.1 <= 0.0 {
            return Err(format!("non-positive coefficients ({:.4}, {:.4})", coefs.0, coefs.1));
        }

        let change = (coefs.0 / old.0).ln().powi(2) + (coefs.1 / old.1).ln().powi(2);
        if change < 1e-6 && glm_converged {
            return Ok(coefs);
        }
    }
    Err("did not converge".to_string())
}

fn gamma_deviance(data: &[(f64, f64)], a0: f64, a1: f64) -> f64 {
    data.iter()
        .map(|&(m, d)| {
            let mu = (a0 + a1 / m).max(1e-8);
            2.0 * (-(d / mu).ln() + (d - mu) / mu)
        })
        .sum()
}

fn gamma_identity_glm(data: &[(f64, f64)], start: (f64, f64)) -> ((f64, f64), bool) {
    let (mut a0, mut a1) = start;
    let mut dev_old = gamma_deviance(data, a0, a1);

    for _ in 0..25 {
        let (mut sw, mut swx, mut swz, mut swxx, mut swxz) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(m, d) in data {
            let x = 1.0 / m;
            let mu = (a0 + a1 * x).max(1e-8);
            let w = 1.0 / (mu * mu);
            sw += w;
            swx += w * x;
            swz += w * d;
            swxx += w * x * x;
            swxz += w * x * d;
        }
        let det = sw * swxx - swx * swx;
        if det.abs() < 1e-10 {
            break;
        }
        a0 = (swxx * swz - swx * swxz) / det;
        a1 = (sw * swxz - swx * swz) / det;

        let dev = gamma_deviance(data, a0, a1);
        if (dev_old - dev).abs() / (0.1 + dev.abs()) < 1e-8 {
            return ((a0, a1), true);
        }
        dev_old = dev;
    }
    ((a0, a1), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parametric_trend_recovered() {
        let means: Vec<f64> = (1..=200).map(|i| i as f64 * 5.0).collect();
        let disps: Vec<f64> = means
            .iter()
            .enumerate()
            .map(|(i, &m)| (0.05 + 2.0 / m) * if i % 2 == 0 { 1.1 } else { 0.9 })
            .collect();
        let trend = fit_dispersion_trend(&means, &disps, 1e-8);
        match trend {
            DispersionTrend::Parametric { asympt_disp, extra_pois } => {
                assert_relative_eq!(asympt_disp, 0.05, max_relative = 0.15);
                assert_relative_eq!(extra_pois, 2.0, max_relative = 0.15);
            }
            other => panic!("expected parametric trend, got {:?}", other),
        }
    }

    #[test]
    fn test_mean_fallback_with_few_genes() {
        let trend = fit_dispersion_trend(&[10.0, 20.0], &[0.2, 0.4], 1e-8);
        assert!(matches!(trend, DispersionTrend::Mean(_)));
        assert_relative_eq!(trend.eval(1000.0), 0.3, epsilon = 1e-12);
    }
}
