//! rust_dge command-line interface

use std::fs::File;
use std::path::Path;

use clap::Parser;
use log::{info, LevelFilter};

use rust_dge::cli::{Cli, Commands, DgeArgs, GenesArgs, VolcanoArgs, VolcanoFormat};
use rust_dge::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Dge(args)) => run_dge(&args),
        Some(Commands::Volcano(args)) => run_volcano(&args),
        Some(Commands::Genes(args)) => run_genes(&args),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("rust_dge v{}", VERSION);
    println!("Run `rust_dge -h` for usage or `rust_dge --help` for detailed information.");
}

fn run_dge(args: &DgeArgs) -> Result<()> {
    let config = args.load_config()?;
    let paths = InputPaths {
        counts: args.counts.clone(),
        cohort: args.cohort.clone(),
        mutations: args.mutations.clone(),
    };
    let ctx = AnalysisContext::load(&paths, &config.schema)?;
    let outcome = run_analysis(&ctx, &args.gene, &config)?;

    write_results(&args.output, &outcome.results)?;

    let view = outcome.significant()?;
    if let Some(path) = &args.significant_output {
        write_results(path, &view.to_results())?;
    }
    if let Some(path) = &args.volcano {
        write_volcano(&outcome.volcano(false)?, path, VolcanoFormat::from_path(path))?;
    }

    info!(
        "{} ({} mutant, {} wild-type, {} excluded)",
        outcome.results.comparison().unwrap_or(&outcome.gene),
        outcome.n_mutant,
        outcome.n_wild_type,
        outcome.unlabeled.len()
    );
    print!("{}", outcome.results.summary(config.significance_threshold));
    Ok(())
}

fn run_volcano(args: &VolcanoArgs) -> Result<()> {
    let results = read_results(&args.results)?;
    let plot = if args.significant_only {
        volcano_points(&significant(&results, args.threshold)?.to_results())
    } else {
        volcano_points(&results)
    };
    if !plot.omitted.is_empty() {
        info!("{} genes without finite coordinates were omitted", plot.omitted.len());
    }
    write_volcano(&plot, &args.output, args.resolved_format())?;
    info!("Wrote {} volcano points to {}", plot.points.len(), args.output.display());
    Ok(())
}

fn write_volcano(plot: &VolcanoPlot, path: &Path, format: VolcanoFormat) -> Result<()> {
    match format {
        VolcanoFormat::Json => plot.write_json(path),
        VolcanoFormat::Csv => write_table(File::create(path)?, plot.points.iter()),
    }
}

fn run_genes(args: &GenesArgs) -> Result<()> {
    let schema = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?.schema,
        None => TableSchema::default(),
    };
    let mutations = load_mutations(&args.mutations, &schema)?;
    for gene in mutations.driver_genes() {
        println!("{}", gene);
    }
    Ok(())
}
