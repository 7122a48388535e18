//! Typed input tables for the differential expression pipeline

mod cohort;
mod count_matrix;
mod count_table;
mod metadata;
mod mutations;

pub(crate) use count_matrix::first_occurrences;

pub use cohort::{CohortMember, CohortTable};
pub use count_matrix::CountMatrix;
pub use count_table::CountTable;
pub use metadata::{GroupLabel, SampleMetadata};
pub use mutations::{MutationRecord, MutationTable};
