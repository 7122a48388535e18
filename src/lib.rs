//! rust_dge: mutant vs wild-type differential gene expression in Rust
//!
//! Given a count table (samples x genes), a cohort table mapping sample IDs
//! to the IDs used by a mutation table, and the mutation table itself, this
//! crate labels each sample as mutant or wild-type for a chosen gene, fits a
//! negative binomial GLM per gene and reports Wald test results with
//! Benjamini-Hochberg adjusted p-values.
//!
//! # Example
//!
//! ```ignore
//! use rust_dge::prelude::*;
//!
//! let paths = InputPaths {
//!     counts: "counts.csv".into(),
//!     cohort: "models.csv".into(),
//!     mutations: "mutations.csv".into(),
//! };
//! let config = AnalysisConfig::default();
//! let ctx = AnalysisContext::load(&paths, &config.schema)?;
//!
//! let outcome = run_analysis(&ctx, "TP53", &config)?;
//! write_results("tp53.csv", &outcome.results)?;
//!
//! for row in outcome.significant()?.iter() {
//!     println!("{} {}", row.gene, row.log2_fold_change);
//! }
//! ```

pub mod align;
pub mod cli;
pub mod config;
pub mod context;
pub mod data;
pub mod dispersion;
pub mod engine;
pub mod error;
pub mod filter;
pub mod glm;
pub mod grouping;
pub mod io;
pub mod normalization;
pub mod pipeline;
pub mod testing;
pub mod volcano;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::align::{align_samples, AlignOptions, AlignedSamples};
    pub use crate::config::{AnalysisConfig, TableSchema};
    pub use crate::context::{load_mutations, AnalysisContext, InputPaths};
    pub use crate::data::{CohortTable, CountMatrix, CountTable, GroupLabel, MutationTable, SampleMetadata};
    pub use crate::engine::{EngineParams, NegativeBinomialEngine, StatisticalEngine};
    pub use crate::error::{DgeError, ErrorKind, Result};
    pub use crate::filter::{significant, SignificantView};
    pub use crate::grouping::{assign_groups, LabeledSamples};
    pub use crate::io::{
        read_cohort_table, read_count_table, read_mutation_table, read_results, write_results, write_table,
        DgeResult, DgeResults,
    };
    pub use crate::pipeline::{run_analysis, run_analysis_with, AnalysisOutcome};
    pub use crate::volcano::{volcano_points, VolcanoPlot, VolcanoPoint};
}
