//! Table ingestion, result rows, and CSV export

mod csv;
mod export;
mod results;

pub use self::csv::{
    detect_delimiter, read_cohort_table, read_cohort_table_from, read_count_table, read_count_table_from,
    read_mutation_table, read_mutation_table_from, read_results, read_results_from,
};
pub use export::{format_float, write_results, write_table, TableRecord};
pub use results::{DgeResult, DgeResults, ResultsSummary};
