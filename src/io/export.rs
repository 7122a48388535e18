//! CSV export of row-oriented tables

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::io::{DgeResult, DgeResults};
use crate::volcano::VolcanoPoint;

/// A row that can be written as one CSV record.
///
/// The gene identifier is always the first field.
pub trait TableRecord {
    fn header() -> &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

/// Shortest representation that parses back to the same value.
///
/// Very small or very large magnitudes use exponent notation; undefined
/// values are empty cells.
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-5..1e16).contains(&magnitude) {
        format!("{:e}", value)
    } else {
        format!("{}", value)
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_float).unwrap_or_default()
}

impl TableRecord for DgeResult {
    fn header() -> &'static [&'static str] {
        &["gene", "baseMean", "log2FoldChange", "lfcSE", "stat", "pvalue", "padj"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.gene.clone(),
            format_float(self.base_mean),
            format_float(self.log2_fold_change),
            format_optional(self.lfc_se),
            format_optional(self.stat),
            format_optional(self.pvalue),
            format_optional(self.padj),
        ]
    }
}

impl TableRecord for VolcanoPoint {
    fn header() -> &'static [&'static str] {
        &["gene", "x", "y", "color", "color_hex"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.gene.clone(),
            format_float(self.x),
            format_float(self.y),
            format_float(self.color),
            self.color_hex.clone(),
        ]
    }
}

/// Write `rows` as CSV with a single header row.
pub fn write_table<'a, W, R, I>(writer: W, rows: I) -> Result<()>
where
    W: Write,
    R: TableRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut csv_writer = ::csv::Writer::from_writer(writer);
    csv_writer.write_record(R::header())?;
    for row in rows {
        csv_writer.write_record(row.fields())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the full result table to `path`
pub fn write_results<P: AsRef<Path>>(path: P, results: &DgeResults) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_table(file, results.iter())?;
    log::info!("Wrote {} result rows to {}", results.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_results;
    use tempfile::TempDir;

    #[test]
    fn test_format_float_round_trips() {
        for v in [0.1 + 0.2, 1e-300, 123456.789, -2.5e-7, 0.0, 3.0] {
            assert_eq!(format_float(v).parse::<f64>().unwrap(), v);
        }
        assert_eq!(format_float(f64::NAN), "");
        assert_eq!(format_float(3.0), "3");
    }

    #[test]
    fn test_export_import_round_trip() {
        let results = DgeResults::new(
            vec![
                DgeResult {
                    gene: "TP53".to_string(),
                    base_mean: 1234.5678901234,
                    log2_fold_change: -1.0000000000000002,
                    lfc_se: Some(0.123456789),
                    stat: Some(-8.1),
                    pvalue: Some(4.9e-16),
                    padj: Some(1.2e-13),
                },
                DgeResult {
                    gene: "ZERO".to_string(),
                    base_mean: 0.0,
                    log2_fold_change: 0.0,
                    lfc_se: None,
                    stat: None,
                    pvalue: None,
                    padj: None,
                },
            ],
            None,
        );
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        write_results(&path, &results).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("gene,baseMean,log2FoldChange,lfcSE,stat,pvalue,padj\n"));
        assert!(text.contains("ZERO,0,0,,,,"));

        let back = read_results(&path).unwrap();
        assert_eq!(back.rows(), results.rows());
    }

    #[test]
    fn test_volcano_points_as_csv() {
        let point = VolcanoPoint {
            gene: "KRAS".to_string(),
            x: 1.5,
            y: 2.0,
            color: 3.0,
            color_hex: "#ff0000".to_string(),
        };
        let mut buf = Vec::new();
        write_table(&mut buf, [&point]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "gene,x,y,color,color_hex\nKRAS,1.5,2,3,#ff0000\n");
    }
}
