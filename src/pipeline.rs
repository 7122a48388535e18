//! End-to-end analysis for one gene
//!
//! align -> group -> fit -> filter. Any error aborts the run; no partial
//! result set is returned.

use crate::align::align_samples;
use crate::config::AnalysisConfig;
use crate::context::AnalysisContext;
use crate::data::GroupLabel;
use crate::engine::{NegativeBinomialEngine, StatisticalEngine};
use crate::error::Result;
use crate::filter::{significant, SignificantView};
use crate::grouping::assign_groups;
use crate::io::DgeResults;
use crate::volcano::{volcano_points, VolcanoPlot};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub gene: String,
    pub n_mutant: usize,
    pub n_wild_type: usize,
    /// Aligned samples dropped for lack of mutation records
    pub unlabeled: Vec<String>,
    /// Unfiltered results, one row per gene
    pub results: DgeResults,
    pub significance_threshold: f64,
}

impl AnalysisOutcome {
    /// Rows passing the configured threshold
    pub fn significant(&self) -> Result<SignificantView<'_>> {
        significant(&self.results, self.significance_threshold)
    }

    /// Volcano points over all results, or only the significant ones
    pub fn volcano(&self, significant_only: bool) -> Result<VolcanoPlot> {
        if significant_only {
            Ok(volcano_points(&self.significant()?.to_results()))
        } else {
            Ok(volcano_points(&self.results))
        }
    }
}

/// Run the analysis for `gene` with the given engine
pub fn run_analysis_with<E: StatisticalEngine + ?Sized>(
    ctx: &AnalysisContext,
    gene: &str,
    config: &AnalysisConfig,
    engine: &E,
) -> Result<AnalysisOutcome> {
    config.validate()?;

    let aligned = align_samples(ctx.counts(), ctx.cohort(), &config.align)?;
    let labeled = assign_groups(ctx.mutations(), gene, &aligned, config.min_samples_per_group)?;
    let results = engine
        .fit(&labeled.counts, &labeled.labels)?
        .with_comparison(format!("{}: mutant vs wild-type", gene));

    let outcome = AnalysisOutcome {
        gene: gene.to_string(),
        n_mutant: labeled.group_size(GroupLabel::Mutant),
        n_wild_type: labeled.group_size(GroupLabel::WildType),
        unlabeled: labeled.unlabeled,
        results,
        significance_threshold: config.significance_threshold,
    };
    log::info!(
        "{}: {} significant genes at padj < {}",
        gene,
        outcome.significant()?.len(),
        config.significance_threshold
    );
    Ok(outcome)
}

/// Run the analysis for `gene` with the negative binomial engine
pub fn run_analysis(ctx: &AnalysisContext, gene: &str, config: &AnalysisConfig) -> Result<AnalysisOutcome> {
    let engine = NegativeBinomialEngine::new(config.engine.clone());
    run_analysis_with(ctx, gene, config, &engine)
}
