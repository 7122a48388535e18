//! Negative binomial GLM engine with Wald testing

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;

use super::{EngineParams, StatisticalEngine};
use crate::data::{CountMatrix, GroupLabel};
use crate::dispersion::{estimate_dispersions, DispersionEstimates};
use crate::error::{DgeError, Result};
use crate::filter::{
    calculate_cooks_distance, default_cooks_cutoff, flag_cooks_outliers, has_replicated_group,
    independent_filtering, replace_outliers, replaceable_samples, OutlierReplacement,
};
use crate::glm::{fit_gene, GeneFit, GroupDesign};
use crate::io::{DgeResult, DgeResults};
use crate::normalization::{base_means, estimate_size_factors, normalized_counts};
use crate::testing::{benjamini_hochberg, wald_test, WaldOutcome};

/// DESeq2-style backend: median-of-ratios size factors, shrunken dispersions,
/// a per-gene NB GLM and a Wald test on the mutant coefficient.
#[derive(Debug, Clone, Default)]
pub struct NegativeBinomialEngine {
    params: EngineParams,
}

impl NegativeBinomialEngine {
    pub fn new(params: EngineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.params.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} genes")
        {
            bar.set_style(style);
        }
        bar
    }

    fn run(&self, counts: &CountMatrix, design: &GroupDesign) -> Result<DgeResults> {
        let n_genes = counts.n_genes();
        let n_samples = counts.n_samples();
        let view = counts.counts();

        let all_zero: Vec<bool> = view.rows().into_iter().map(|r| r.iter().all(|&c| c == 0.0)).collect();
        if all_zero.iter().all(|&z| z) {
            log::warn!("No gene has a positive count; all {} genes are untestable", n_genes);
            return Ok(untestable(counts));
        }

        let (size_factors, method) = estimate_size_factors(view)?;
        log::info!("Estimated size factors ({:?}) for {} samples", method, n_samples);
        log::debug!("Size factors: {:?}", size_factors.to_vec());

        let normalized = normalized_counts(view, &size_factors);
        let mut means = base_means(&normalized);

        let dispersions = estimate_dispersions(view, &size_factors, &means, design, &self.params.dispersion);
        log::debug!("Dispersion trend: {:?}", dispersions.trend);

        let bar = self.progress_bar(n_genes);
        let x = design.matrix();
        let fits: Vec<Option<GeneFit>> = (0..n_genes)
            .into_par_iter()
            .map(|i| {
                let fit = if all_zero[i] {
                    None
                } else {
                    Some(fit_gene(
                        view.row(i),
                        x,
                        size_factors.view(),
                        dispersions.final_values[i],
                        &self.params.glm,
                    ))
                };
                bar.inc(1);
                fit
            })
            .collect();
        bar.finish_and_clear();

        let n_unconverged = fits.iter().flatten().filter(|f| !f.converged).count();
        if n_unconverged > 0 {
            log::warn!("{} genes did not converge in IRLS", n_unconverged);
        }

        let mut outcomes: Vec<WaldOutcome> = fits
            .iter()
            .map(|fit| match fit {
                Some(f) => wald_test(f, GroupDesign::GROUP_COEF),
                None => WaldOutcome::all_zero(),
            })
            .collect();

        let mut cooks_flags = vec![false; n_genes];
        let replaceable = replaceable_samples(design.groups(), self.params.min_replicates_for_replace);
        let refit = self.params.refit_outliers && replaceable.iter().any(|&r| r);
        if (self.params.cooks_filter || refit) && has_replicated_group(design.groups()) {
            let mut cooks = cooks_distances(view, &normalized, &fits, design);
            let cutoff = default_cooks_cutoff(n_samples, design.n_coefs());

            if refit {
                let replacement = replace_outliers(view, &normalized, &size_factors, &cooks, cutoff, &replaceable);
                if !replacement.genes.is_empty() {
                    self.refit_replaced(&replacement, &size_factors, design, &dispersions, &mut means, &mut outcomes);
                }
                for j in (0..n_samples).filter(|&j| replaceable[j]) {
                    cooks.column_mut(j).fill(0.0);
                }
            }

            if self.params.cooks_filter {
                cooks_flags = flag_cooks_outliers(&cooks, view, cutoff);
                log::info!(
                    "Cook's distance cutoff {:.3}: {} genes flagged",
                    cutoff,
                    cooks_flags.iter().filter(|&&f| f).count()
                );
            }
        }

        let pvalues: Vec<f64> = outcomes
            .iter()
            .zip(&cooks_flags)
            .map(|(o, &flagged)| if flagged { f64::NAN } else { o.pvalue })
            .collect();

        let padj = if self.params.independent_filter {
            independent_filtering(&means.to_vec(), &pvalues, self.params.alpha).padj
        } else {
            benjamini_hochberg(&pvalues)
        };

        let rows: Vec<DgeResult> = (0..n_genes)
            .map(|i| {
                let o = &outcomes[i];
                DgeResult {
                    gene: counts.gene_ids()[i].clone(),
                    base_mean: means[i],
                    log2_fold_change: o.log2_fold_change,
                    lfc_se: defined(o.lfc_se),
                    stat: defined(o.stat),
                    pvalue: defined(pvalues[i]),
                    padj: defined(padj[i]),
                }
            })
            .collect();

        let tested = rows.iter().filter(|r| r.pvalue.is_some()).count();
        log::info!("Tested {} of {} genes", tested, n_genes);

        Ok(DgeResults::new(rows, Some(CONTRAST.to_string())))
    }

    /// Refit genes whose outlier counts were replaced.
    ///
    /// Dispersions are re-estimated against the original trend and prior,
    /// then the GLM and Wald test are rerun on the replaced counts. Base means
    /// are taken from the replaced counts.
    fn refit_replaced(
        &self,
        replacement: &OutlierReplacement,
        size_factors: &Array1<f64>,
        design: &GroupDesign,
        dispersions: &DispersionEstimates,
        means: &mut Array1<f64>,
        outcomes: &mut [WaldOutcome],
    ) {
        let replaced = replacement.counts.view();
        let new_means = base_means(&normalized_counts(replaced, size_factors));
        let alphas = dispersions.refit(
            replaced,
            size_factors,
            &new_means,
            design,
            &replacement.genes,
            &self.params.dispersion,
        );

        let refit: Vec<WaldOutcome> = replacement
            .genes
            .par_iter()
            .zip(alphas.par_iter())
            .map(|(&i, &alpha)| {
                let y = replaced.row(i);
                if y.iter().all(|&c| c == 0.0) {
                    return WaldOutcome::all_zero();
                }
                let fit = fit_gene(y, design.matrix(), size_factors.view(), alpha, &self.params.glm);
                wald_test(&fit, GroupDesign::GROUP_COEF)
            })
            .collect();

        for (&i, outcome) in replacement.genes.iter().zip(refit) {
            means[i] = new_means[i];
            outcomes[i] = outcome;
        }
        log::info!("Replaced outlier counts and refit {} genes", replacement.genes.len());
    }
}

const CONTRAST: &str = "mutant vs wild-type";

/// Cook's distances from the per-gene fits; unfit genes get NaN
fn cooks_distances(
    counts: ArrayView2<'_, f64>,
    normalized: &Array2<f64>,
    fits: &[Option<GeneFit>],
    design: &GroupDesign,
) -> Array2<f64> {
    let (n_genes, n_samples) = counts.dim();
    let mut mu = Array2::zeros((n_genes, n_samples));
    let mut hat = Array2::from_elem((n_genes, n_samples), f64::NAN);
    for (i, fit) in fits.iter().enumerate() {
        if let Some(f) = fit {
            for j in 0..n_samples {
                mu[[i, j]] = f.mu[j];
                hat[[i, j]] = f.hat_diagonals[j];
            }
        }
    }
    calculate_cooks_distance(&counts.to_owned(), normalized, &mu, &hat, design.groups(), design.n_coefs())
}

/// Rows for a matrix with no positive count
fn untestable(counts: &CountMatrix) -> DgeResults {
    let rows = counts
        .gene_ids()
        .iter()
        .map(|gene| DgeResult {
            gene: gene.clone(),
            base_mean: 0.0,
            log2_fold_change: 0.0,
            lfc_se: None,
            stat: None,
            pvalue: None,
            padj: None,
        })
        .collect();
    DgeResults::new(rows, Some(CONTRAST.to_string()))
}

fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl StatisticalEngine for NegativeBinomialEngine {
    fn fit(&self, counts: &CountMatrix, groups: &[GroupLabel]) -> Result<DgeResults> {
        if groups.len() != counts.n_samples() {
            return Err(DgeError::model_fit(format!(
                "{} group labels for {} samples",
                groups.len(),
                counts.n_samples()
            )));
        }
        let design = GroupDesign::new(groups)?;
        log::info!(
            "Fitting {} genes: {} mutant vs {} wild-type samples",
            counts.n_genes(),
            design.group_size(GroupLabel::Mutant),
            design.group_size(GroupLabel::WildType)
        );

        let mut builder = rayon::ThreadPoolBuilder::new();
        if self.params.workers > 0 {
            builder = builder.num_threads(self.params.workers);
        }
        let pool = builder
            .build()
            .map_err(|e| DgeError::invalid_input(format!("failed to build worker pool: {}", e)))?;

        pool.install(|| self.run(counts, &design))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::Array2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use GroupLabel::{Mutant, WildType};

    /// Genes x samples with the first `n_de` genes four-fold up in mutants
    fn simulated(groups: &[GroupLabel], n_genes: usize, n_de: usize, seed: u64) -> CountMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = groups.len();
        let sf: Vec<f64> = (0..n).map(|_| rng.gen_range(0.8..1.25)).collect();
        let mut counts = Array2::zeros((n_genes, n));
        for g in 0..n_genes {
            let base = 20.0 + 10.0 * g as f64;
            for j in 0..n {
                let fold = if g < n_de && groups[j] == Mutant { 4.0 } else { 1.0 };
                let noise: f64 = rng.gen_range(-0.3..0.3);
                counts[[g, j]] = (base * sf[j] * fold * (1.0 + noise)).round();
            }
        }
        let genes = (0..n_genes).map(|g| format!("GENE{}", g)).collect();
        let samples = (0..n).map(|j| format!("S{}", j)).collect();
        CountMatrix::new(counts, genes, samples).unwrap()
    }

    #[test]
    fn test_detects_fold_change() {
        let groups = [WildType, WildType, WildType, WildType, Mutant, Mutant, Mutant, Mutant];
        let counts = simulated(&groups, 60, 6, 7);
        let results = NegativeBinomialEngine::default().fit(&counts, &groups).unwrap();

        assert_eq!(results.len(), 60);
        for row in results.iter().take(6) {
            assert!(row.log2_fold_change > 1.5, "{:?}", row);
            assert!(row.pvalue.unwrap() < 1e-3, "{:?}", row);
        }
        for row in results.iter() {
            assert!(row.base_mean >= 0.0);
            if let (Some(p), Some(q)) = (row.pvalue, row.padj) {
                assert!(q >= p);
                assert!((0.0..=1.0).contains(&q));
            }
        }
    }

    #[test]
    fn test_all_zero_gene_untestable() {
        let counts = Array2::from_shape_vec(
            (3, 4),
            vec![
                0.0, 0.0, 0.0, 0.0, //
                10.0, 12.0, 30.0, 34.0, //
                100.0, 90.0, 110.0, 95.0,
            ],
        )
        .unwrap();
        let counts = CountMatrix::new(
            counts,
            vec!["ZERO".into(), "A".into(), "B".into()],
            vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
        )
        .unwrap();
        let groups = [WildType, WildType, Mutant, Mutant];
        let results = NegativeBinomialEngine::default().fit(&counts, &groups).unwrap();

        let zero = results.get("ZERO").unwrap();
        assert_eq!(zero.base_mean, 0.0);
        assert_eq!(zero.log2_fold_change, 0.0);
        assert!(zero.pvalue.is_none());
        assert!(zero.padj.is_none());
        assert!(results.get("A").unwrap().pvalue.is_some());
    }

    #[test]
    fn test_single_all_zero_gene_returns_undefined_row() {
        let counts = CountMatrix::new(
            Array2::zeros((1, 4)),
            vec!["ZERO".into()],
            vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
        )
        .unwrap();
        let groups = [WildType, WildType, Mutant, Mutant];
        let results = NegativeBinomialEngine::default().fit(&counts, &groups).unwrap();

        assert_eq!(results.len(), 1);
        let zero = results.get("ZERO").unwrap();
        assert_eq!(zero.base_mean, 0.0);
        assert_eq!(zero.log2_fold_change, 0.0);
        assert!(zero.lfc_se.is_none());
        assert!(zero.pvalue.is_none());
        assert!(zero.padj.is_none());
    }

    /// Seven replicates per group, with one wild-type count of GENE10 inflated forty-fold
    fn with_spike(groups: &[GroupLabel]) -> CountMatrix {
        let clean = simulated(groups, 40, 4, 23);
        let mut counts = clean.counts().to_owned();
        counts[[10, 2]] *= 40.0;
        CountMatrix::new(counts, clean.gene_ids().to_vec(), clean.sample_ids().to_vec()).unwrap()
    }

    #[test]
    fn test_outlier_replaced_and_refit() {
        let mut groups = vec![WildType; 7];
        groups.extend(vec![Mutant; 7]);
        let counts = with_spike(&groups);

        let refit = NegativeBinomialEngine::default().fit(&counts, &groups).unwrap();
        let spiked = refit.get("GENE10").unwrap();
        assert!(spiked.pvalue.is_some(), "{:?}", spiked);
        assert!(spiked.log2_fold_change.abs() < 1.0, "{:?}", spiked);
        assert!(spiked.base_mean < 200.0, "{:?}", spiked);

        let params = EngineParams {
            refit_outliers: false,
            ..EngineParams::default()
        };
        let flagged = NegativeBinomialEngine::new(params).fit(&counts, &groups).unwrap();
        let spiked = flagged.get("GENE10").unwrap();
        assert!(spiked.pvalue.is_none(), "{:?}", spiked);
        assert!(spiked.padj.is_none(), "{:?}", spiked);
        assert!(spiked.base_mean > 300.0, "{:?}", spiked);
    }

    #[test]
    fn test_small_groups_are_not_replaced() {
        let groups = [WildType, WildType, WildType, WildType, Mutant, Mutant, Mutant, Mutant];
        let counts = with_spike(&groups);
        let results = NegativeBinomialEngine::default().fit(&counts, &groups).unwrap();
        let spiked = results.get("GENE10").unwrap();
        assert!(spiked.pvalue.is_none(), "{:?}", spiked);
    }

    #[test]
    fn test_identical_across_worker_counts() {
        let groups = [WildType, WildType, WildType, Mutant, Mutant, Mutant];
        let counts = simulated(&groups, 40, 4, 11);
        let fit_with = |workers| {
            let params = EngineParams {
                workers,
                ..EngineParams::default()
            };
            NegativeBinomialEngine::new(params).fit(&counts, &groups).unwrap()
        };
        assert_eq!(format!("{:?}", fit_with(1)), format!("{:?}", fit_with(4)));
    }

    #[test]
    fn test_group_length_mismatch() {
        let counts = simulated(&[WildType, WildType, Mutant, Mutant], 5, 0, 1);
        let err = NegativeBinomialEngine::default()
            .fit(&counts, &[WildType, Mutant, Mutant])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFit);
    }

    #[test]
    fn test_single_group_is_singular() {
        let groups = [Mutant, Mutant, Mutant, Mutant];
        let counts = simulated(&groups, 5, 0, 2);
        let err = NegativeBinomialEngine::default().fit(&counts, &groups).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFit);
    }
}
