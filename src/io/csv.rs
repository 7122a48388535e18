//! Schema-checked readers for the pipeline's input tables
//!
//! Every table may be comma- or tab-separated; the delimiter is detected
//! from the header line. Cells are trimmed and may be quoted.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::Array2;

use crate::config::TableSchema;
use crate::data::{CohortMember, CohortTable, CountTable, MutationRecord, MutationTable};
use crate::error::{DgeError, Result};
use crate::io::{DgeResult, DgeResults};

/// Tab when the header line contains one, comma otherwise
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Header plus data rows of a delimited table
struct RawTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    fn parse<R: Read>(mut reader: R, what: &str) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let header_line = text.lines().find(|l| !l.trim().is_empty()).ok_or_else(|| {
            DgeError::schema(format!("{} is empty", what))
        })?;

        let mut csv_reader = ::csv::ReaderBuilder::new()
            .delimiter(detect_delimiter(header_line))
            .trim(::csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            if record.len() != header.len() {
                return Err(DgeError::schema(format!(
                    "{}: data row {} has {} fields, header has {}",
                    what,
                    line + 1,
                    record.len(),
                    header.len()
                )));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { header, rows })
    }

    fn column(&self, name: &str, what: &str) -> Result<usize> {
        self.optional_column(name)
            .ok_or_else(|| DgeError::schema(format!("{} has no '{}' column", what, name)))
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

fn open(path: &Path) -> Result<File> {
    Ok(File::open(path)?)
}

/// Read a count table: first column sample identifiers, remaining columns genes.
pub fn read_count_table<P: AsRef<Path>>(path: P) -> Result<CountTable> {
    read_count_table_from(open(path.as_ref())?)
}

pub fn read_count_table_from<R: Read>(reader: R) -> Result<CountTable> {
    let raw = RawTable::parse(reader, "count table")?;
    if raw.header.len() < 2 {
        return Err(DgeError::schema("count table needs a sample column and at least one gene column"));
    }
    let gene_headers: Vec<String> = raw.header[1..].to_vec();

    let mut values = Array2::zeros((raw.rows.len(), gene_headers.len()));
    let mut sample_ids = Vec::with_capacity(raw.rows.len());
    for (i, row) in raw.rows.iter().enumerate() {
        sample_ids.push(row[0].clone());
        for (j, cell) in row[1..].iter().enumerate() {
            values[[i, j]] = cell.parse::<f64>().map_err(|_| {
                DgeError::validation(format!(
                    "non-numeric count '{}' for sample '{}', gene '{}'",
                    cell, row[0], gene_headers[j]
                ))
            })?;
        }
    }
    if sample_ids.is_empty() {
        return Err(DgeError::insufficient("count table has no samples"));
    }
    log::info!(
        "Read count table: {} samples x {} gene columns",
        sample_ids.len(),
        gene_headers.len()
    );

    CountTable::new(values, sample_ids, gene_headers)
}

/// Read the cohort table.
///
/// The model column is optional; when absent each sample joins the mutation
/// table under its own identifier.
pub fn read_cohort_table<P: AsRef<Path>>(path: P, schema: &TableSchema) -> Result<CohortTable> {
    read_cohort_table_from(open(path.as_ref())?, schema)
}

pub fn read_cohort_table_from<R: Read>(reader: R, schema: &TableSchema) -> Result<CohortTable> {
    let raw = RawTable::parse(reader, "cohort table")?;
    let sample_col = raw.column(&schema.cohort_sample_column, "cohort table")?;
    let model_col = raw.optional_column(&schema.cohort_model_column);
    if model_col.is_none() {
        log::debug!(
            "Cohort table has no '{}' column; joining mutations on '{}'",
            schema.cohort_model_column,
            schema.cohort_sample_column
        );
    }

    let members = raw
        .rows
        .iter()
        .filter(|row| !row[sample_col].is_empty())
        .map(|row| {
            let sample_id = row[sample_col].clone();
            let model_id = match model_col {
                Some(c) if !row[c].is_empty() => row[c].clone(),
                _ => sample_id.clone(),
            };
            CohortMember { sample_id, model_id }
        })
        .collect();
    Ok(CohortTable::new(members))
}

fn parse_flag(value: &str, column: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(DgeError::schema(format!("column '{}' has non-boolean value '{}'", column, other))),
    }
}

pub fn read_mutation_table<P: AsRef<Path>>(path: P, schema: &TableSchema) -> Result<MutationTable> {
    read_mutation_table_from(open(path.as_ref())?, schema)
}

pub fn read_mutation_table_from<R: Read>(reader: R, schema: &TableSchema) -> Result<MutationTable> {
    let what = "mutation table";
    let raw = RawTable::parse(reader, what)?;
    let sample_col = raw.column(&schema.mutation_sample_column, what)?;
    let gene_col = raw.column(&schema.mutation_gene_column, what)?;
    let driver_col = raw.column(&schema.mutation_driver_column, what)?;
    let likely_col = raw.column(&schema.mutation_likely_driver_column, what)?;

    let records = raw
        .rows
        .iter()
        .map(|row| -> Result<MutationRecord> {
            Ok(MutationRecord {
                sample_id: row[sample_col].clone(),
                gene: row[gene_col].clone(),
                is_driver: parse_flag(&row[driver_col], &schema.mutation_driver_column)?,
                is_likely_driver: parse_flag(&row[likely_col], &schema.mutation_likely_driver_column)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    log::info!("Read {} mutation records", records.len());
    Ok(MutationTable::new(records))
}

/// Empty, `NA` and `NaN` are undefined; anything else must parse as a number.
fn parse_optional(value: &str, column: &str, gene: &str) -> Result<Option<f64>> {
    if value.is_empty() || value.eq_ignore_ascii_case("na") || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    value.parse::<f64>().map(Some).map_err(|_| {
        DgeError::schema(format!("column '{}' has non-numeric value '{}' for gene '{}'", column, value, gene))
    })
}

/// Like [`parse_optional`], but a defined value must lie in `[0, 1]`
fn parse_probability(value: &str, column: &str, gene: &str) -> Result<Option<f64>> {
    match parse_optional(value, column, gene)? {
        Some(p) if !(0.0..=1.0).contains(&p) => Err(DgeError::schema(format!(
            "column '{}' has value '{}' outside [0, 1] for gene '{}'",
            column, value, gene
        ))),
        other => Ok(other),
    }
}

/// Read a result table written by this crate or by another DGE tool.
///
/// The first column holds gene identifiers. `log2FoldChange`, `pvalue` and
/// `padj` are required; `baseMean`, `lfcSE` and `stat` are optional; other
/// columns are ignored. Every row needs a finite `log2FoldChange`, and a
/// defined `pvalue` or `padj` must be a probability.
pub fn read_results<P: AsRef<Path>>(path: P) -> Result<DgeResults> {
    read_results_from(open(path.as_ref())?)
}

pub fn read_results_from<R: Read>(reader: R) -> Result<DgeResults> {
    let what = "result table";
    let raw = RawTable::parse(reader, what)?;
    let mut cols: HashMap<&str, usize> = HashMap::new();
    for name in ["log2FoldChange", "pvalue", "padj"] {
        cols.insert(name, raw.column(name, what)?);
    }
    for name in ["baseMean", "lfcSE", "stat"] {
        if let Some(c) = raw.optional_column(name) {
            cols.insert(name, c);
        }
    }

    let rows = raw
        .rows
        .iter()
        .map(|row| -> Result<DgeResult> {
            let gene = row[0].clone();
            let get = |name: &str| -> Result<Option<f64>> {
                match cols.get(name) {
                    Some(&c) if name == "pvalue" || name == "padj" => parse_probability(&row[c], name, &gene),
                    Some(&c) => parse_optional(&row[c], name, &gene),
                    None => Ok(None),
                }
            };
            let log2_fold_change = match get("log2FoldChange")? {
                Some(lfc) if lfc.is_finite() => lfc,
                _ => {
                    return Err(DgeError::schema(format!(
                        "column 'log2FoldChange' has no finite value for gene '{}'",
                        gene
                    )))
                }
            };
            Ok(DgeResult {
                base_mean: get("baseMean")?.unwrap_or(f64::NAN),
                log2_fold_change,
                lfc_se: get("lfcSE")?,
                stat: get("stat")?,
                pvalue: get("pvalue")?,
                padj: get("padj")?,
                gene,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DgeResults::new(rows, None))
}
