//! Library-size and composition normalization

mod size_factors;

pub use size_factors::{base_means, estimate_size_factors, normalized_counts, SizeFactorMethod};
