//! Per-gene differential expression engines
//!
//! An engine turns an aligned count matrix and one group label per sample
//! into a [`DgeResults`]. Callers depend on the [`StatisticalEngine`] trait so
//! a different statistical backend can be swapped in.

mod negative_binomial;

pub use negative_binomial::NegativeBinomialEngine;

use serde::{Deserialize, Serialize};

use crate::data::{CountMatrix, GroupLabel};
use crate::dispersion::DispersionParams;
use crate::error::Result;
use crate::glm::GlmFitParams;
use crate::io::DgeResults;

/// Contract every statistical backend satisfies.
///
/// `groups[i]` labels column `i` of `counts`. Implementations must:
/// - return one row per gene, in the matrix's gene order;
/// - report log2 fold change as mutant over wild-type;
/// - leave pvalue and padj undefined for genes that cannot be tested;
/// - keep `padj >= pvalue` wherever both are defined;
/// - fail with a model-fit error for a length mismatch or a singular design.
pub trait StatisticalEngine {
    fn fit(&self, counts: &CountMatrix, groups: &[GroupLabel]) -> Result<DgeResults>;
}

/// Parameters for [`NegativeBinomialEngine`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub dispersion: DispersionParams,
    pub glm: GlmFitParams,
    /// FDR level used to choose the independent filtering threshold
    pub alpha: f64,
    /// Flag genes with a Cook's distance outlier
    pub cooks_filter: bool,
    /// Replace outlier counts and refit the affected genes
    pub refit_outliers: bool,
    /// Group size at which a group's outlier counts become replaceable
    pub min_replicates_for_replace: usize,
    /// Filter low-mean genes before BH
    pub independent_filter: bool,
    /// Worker threads for per-gene fits; 0 uses the rayon default
    pub workers: usize,
    pub show_progress: bool,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            dispersion: DispersionParams::default(),
            glm: GlmFitParams::default(),
            alpha: 0.1,
            cooks_filter: true,
            refit_outliers: true,
            min_replicates_for_replace: 7,
            independent_filter: true,
            workers: 0,
            show_progress: false,
        }
    }
}
