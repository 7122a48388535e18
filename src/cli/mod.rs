//! Command-line interface for rust_dge

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::AnalysisConfig;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "rust_dge")]
#[command(version)]
#[command(about = "Mutant vs wild-type differential gene expression")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run differential expression for one gene's mutation status
    #[command(
        long_about = "Run differential expression for one gene's mutation status\n\n\
            Aligns the count table with the cohort, labels samples mutant or wild-type\n\
            from driver / likely-driver calls on the gene, fits a negative binomial GLM\n\
            per gene and writes the full and significant result tables.",
        after_long_help = "\
Examples:
  rust_dge dge -c counts.csv --cohort models.csv -m mutations.csv -g TP53

  rust_dge dge -c counts.tsv --cohort models.csv -m mutations.csv -g KRAS \\
    --threshold 0.01 --significant-output kras_sig.csv --volcano kras.json"
    )]
    Dge(DgeArgs),

    /// Convert a result table into volcano plot points
    #[command(after_long_help = "\
Examples:
  rust_dge volcano -r dge_results.csv -o volcano.json
  rust_dge volcano -r dge_results.csv -o volcano.csv --significant-only --threshold 0.01")]
    Volcano(VolcanoArgs),

    /// List genes with at least one driver or likely-driver mutation
    #[command(long_about = "List genes with at least one driver or likely-driver mutation\n\n\
            Only these genes can be passed to `dge -g`: mutations without a driver or\n\
            likely-driver call never make a sample mutant, so any other mutated gene\n\
            would leave the mutant group empty and fail with an insufficient-data error.")]
    Genes(GenesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DgeArgs {
    /// Count table: first column sample IDs, remaining columns genes
    #[arg(short, long)]
    pub counts: PathBuf,

    /// Cohort table mapping sample IDs to mutation-table IDs
    #[arg(long)]
    pub cohort: PathBuf,

    /// Mutation table
    #[arg(short, long)]
    pub mutations: PathBuf,

    /// Gene whose mutation status defines the groups
    #[arg(short, long)]
    pub gene: String,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Full result table
    #[arg(short, long, default_value = "dge_results.csv")]
    pub output: PathBuf,

    /// Also write rows with padj below the threshold
    #[arg(long, value_name = "PATH")]
    pub significant_output: Option<PathBuf>,

    /// Also write volcano points (.json or .csv)
    #[arg(long, value_name = "PATH")]
    pub volcano: Option<PathBuf>,

    /// Adjusted p-value threshold [default: 0.05]
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Minimum samples in each group [default: 2]
    #[arg(long)]
    pub min_per_group: Option<usize>,

    /// FDR level for independent filtering [default: 0.1]
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Worker threads (0 = all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Truncate fractional counts instead of failing
    #[arg(long)]
    pub truncate_fractional: bool,

    /// Disable Cook's distance outlier flagging
    #[arg(long)]
    pub no_cooks: bool,

    /// Keep outlier counts instead of replacing them and refitting
    #[arg(long)]
    pub no_refit: bool,

    /// Disable independent filtering
    #[arg(long)]
    pub no_independent_filtering: bool,

    /// Show a progress bar over genes
    #[arg(long)]
    pub progress: bool,
}

impl DgeArgs {
    /// Configuration from `--config` (or defaults) with flag overrides applied
    pub fn load_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut AnalysisConfig) {
        if let Some(t) = self.threshold {
            config.significance_threshold = t;
        }
        if let Some(n) = self.min_per_group {
            config.min_samples_per_group = n;
        }
        if let Some(a) = self.alpha {
            config.engine.alpha = a;
        }
        if let Some(w) = self.threads {
            config.engine.workers = w;
        }
        if self.truncate_fractional {
            config.align.truncate_fractional = true;
        }
        if self.no_cooks {
            config.engine.cooks_filter = false;
        }
        if self.no_refit {
            config.engine.refit_outliers = false;
        }
        if self.no_independent_filtering {
            config.engine.independent_filter = false;
        }
        if self.progress {
            config.engine.show_progress = true;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct VolcanoArgs {
    /// Result table with log2FoldChange, pvalue and padj columns
    #[arg(short, long)]
    pub results: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "volcano.json")]
    pub output: PathBuf,

    /// Output format; inferred from the output extension when omitted
    #[arg(long, value_enum)]
    pub format: Option<VolcanoFormat>,

    /// Plot only rows with padj below the threshold
    #[arg(long)]
    pub significant_only: bool,

    #[arg(long, default_value_t = 0.05)]
    pub threshold: f64,
}

impl VolcanoArgs {
    pub fn resolved_format(&self) -> VolcanoFormat {
        self.format.unwrap_or_else(|| VolcanoFormat::from_path(&self.output))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VolcanoFormat {
    Json,
    Csv,
}

impl VolcanoFormat {
    /// CSV for a `.csv` extension, JSON otherwise
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => VolcanoFormat::Csv,
            _ => VolcanoFormat::Json,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenesArgs {
    /// Mutation table
    #[arg(short, long)]
    pub mutations: PathBuf,

    /// JSON configuration file for column names
    #[arg(long)]
    pub config: Option<PathBuf>,
}
