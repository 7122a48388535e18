//! Analysis configuration
//!
//! Every field has a default, so a JSON file only needs the keys it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::align::AlignOptions;
use crate::engine::EngineParams;
use crate::error::{DgeError, Result};
use crate::filter::DEFAULT_SIGNIFICANCE;
use crate::grouping::DEFAULT_MIN_SAMPLES_PER_GROUP;

/// Column names of the cohort and mutation tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    /// Cohort column matching the count table's sample identifiers
    pub cohort_sample_column: String,
    /// Cohort column matching the mutation table; optional in the file
    pub cohort_model_column: String,
    pub mutation_sample_column: String,
    pub mutation_gene_column: String,
    pub mutation_driver_column: String,
    pub mutation_likely_driver_column: String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            cohort_sample_column: "ProfileID".to_string(),
            cohort_model_column: "ModelID".to_string(),
            mutation_sample_column: "ModelID".to_string(),
            mutation_gene_column: "HugoSymbol".to_string(),
            mutation_driver_column: "Driver".to_string(),
            mutation_likely_driver_column: "LikelyDriver".to_string(),
        }
    }
}

/// Everything a run needs besides the input tables and the target gene
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub schema: TableSchema,
    pub align: AlignOptions,
    pub min_samples_per_group: usize,
    /// Adjusted p-value threshold for the significant view
    pub significance_threshold: f64,
    pub engine: EngineParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            schema: TableSchema::default(),
            align: AlignOptions::default(),
            min_samples_per_group: DEFAULT_MIN_SAMPLES_PER_GROUP,
            significance_threshold: DEFAULT_SIGNIFICANCE,
            engine: EngineParams::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        if self.min_samples_per_group < 2 {
            return Err(DgeError::invalid_input(format!(
                "min_samples_per_group must be at least 2, got {}",
                self.min_samples_per_group
            )));
        }
        if !(self.significance_threshold > 0.0 && self.significance_threshold <= 1.0) {
            return Err(DgeError::invalid_input(format!(
                "significance_threshold must be in (0, 1], got {}",
                self.significance_threshold
            )));
        }
        if !(self.engine.alpha > 0.0 && self.engine.alpha < 1.0) {
            return Err(DgeError::invalid_input(format!(
                "alpha must be in (0, 1), got {}",
                self.engine.alpha
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"min_samples_per_group": 3, "engine": {{"workers": 2, "dispersion": {{"outlier_sd": 3.0}}}}}}"#
        )
        .unwrap();

        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.min_samples_per_group, 3);
        assert_eq!(config.engine.workers, 2);
        assert_eq!(config.engine.dispersion.outlier_sd, 3.0);
        assert_eq!(config.engine.dispersion.min_disp, 1e-8);
        assert_eq!(config.significance_threshold, 0.05);
        assert_eq!(config.schema.cohort_sample_column, "ProfileID");
        assert!(config.engine.independent_filter);
    }

    #[test]
    fn test_invalid_min_samples() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_samples_per_group": 1}}"#).unwrap();
        let err = AnalysisConfig::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = AnalysisConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, DgeError::JsonError(_)));
    }
}
