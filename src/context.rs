//! The three input tables of an analysis, loaded once

use std::path::{Path, PathBuf};

use crate::config::TableSchema;
use crate::data::{CohortTable, CountTable, MutationTable};
use crate::error::Result;
use crate::io::{read_cohort_table, read_count_table, read_mutation_table};

/// Locations of the input tables
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub counts: PathBuf,
    pub cohort: PathBuf,
    pub mutations: PathBuf,
}

/// Input tables shared by every stage of a run.
///
/// Stages borrow from the context and never modify it.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    counts: CountTable,
    cohort: CohortTable,
    mutations: MutationTable,
}

impl AnalysisContext {
    pub fn from_tables(counts: CountTable, cohort: CohortTable, mutations: MutationTable) -> Self {
        Self {
            counts,
            cohort,
            mutations,
        }
    }

    pub fn load(paths: &InputPaths, schema: &TableSchema) -> Result<Self> {
        let counts = read_count_table(&paths.counts)?;
        let cohort = read_cohort_table(&paths.cohort, schema)?;
        let mutations = load_mutations(&paths.mutations, schema)?;
        log::info!(
            "Loaded {} count-table samples, {} cohort samples, {} mutation records",
            counts.n_samples(),
            cohort.len(),
            mutations.len()
        );
        Ok(Self::from_tables(counts, cohort, mutations))
    }

    pub fn counts(&self) -> &CountTable {
        &self.counts
    }

    pub fn cohort(&self) -> &CohortTable {
        &self.cohort
    }

    pub fn mutations(&self) -> &MutationTable {
        &self.mutations
    }
}

/// Read only the mutation table, e.g. to list selectable genes
pub fn load_mutations(path: &Path, schema: &TableSchema) -> Result<MutationTable> {
    read_mutation_table(path, schema)
}
