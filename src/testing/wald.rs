//! Wald test on a single GLM coefficient

use std::f64::consts::LN_2;

use super::pvalue::calculate_pvalue;
use crate::glm::GeneFit;

/// Per-gene Wald test output on the log2 scale.
///
/// NaN marks a quantity that is undefined for the gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaldOutcome {
    pub log2_fold_change: f64,
    pub lfc_se: f64,
    pub stat: f64,
    pub pvalue: f64,
}

impl WaldOutcome {
    /// Outcome for a gene with no counts in any sample
    pub fn all_zero() -> Self {
        Self {
            log2_fold_change: 0.0,
            lfc_se: f64::NAN,
            stat: f64::NAN,
            pvalue: f64::NAN,
        }
    }
}

/// Test `H0: beta[coef] = 0` for one fitted gene.
///
/// Coefficients are fit on the natural-log scale and reported in log2 units.
/// A non-finite or non-positive standard error leaves stat and pvalue undefined.
pub fn wald_test(fit: &GeneFit, coef: usize) -> WaldOutcome {
    let beta = fit.coefficients.get(coef).copied().unwrap_or(f64::NAN);
    let se = fit.standard_errors.get(coef).copied().unwrap_or(f64::NAN);

    let log2_fold_change = beta / LN_2;
    let lfc_se = se / LN_2;

    if !beta.is_finite() || !se.is_finite() || se <= 0.0 {
        return WaldOutcome {
            log2_fold_change,
            lfc_se,
            stat: f64::NAN,
            pvalue: f64::NAN,
        };
    }

    let stat = beta / se;
    WaldOutcome {
        log2_fold_change,
        lfc_se,
        stat,
        pvalue: calculate_pvalue(stat),
    }
}
