//! Volcano plot coordinates from a result set
//!
//! x is log2 fold change, y is `-log10(padj)`, and the color metric is
//! `-log10(pvalue)`. P-values are floored at [`PVALUE_FLOOR`] so a reported
//! p-value of zero still maps to a finite height.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::io::{DgeResult, DgeResults};

/// Smallest p-value used before taking `-log10`
pub const PVALUE_FLOOR: f64 = 1e-300;

/// One plotted gene
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolcanoPoint {
    pub gene: String,
    pub x: f64,
    pub y: f64,
    pub color: f64,
    /// Position of `color` on a blue-to-red ramp over the plotted range
    pub color_hex: String,
}

/// Plot-ready points plus the genes that could not be placed
#[derive(Debug, Clone, Default, Serialize)]
pub struct VolcanoPlot {
    pub points: Vec<VolcanoPoint>,
    /// Genes with undefined pvalue or padj, or a non-finite fold change
    pub omitted: Vec<String>,
}

impl VolcanoPlot {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        writeln!(file)?;
        Ok(())
    }
}

fn neg_log10(p: f64) -> f64 {
    -p.max(PVALUE_FLOOR).log10()
}

/// Hex color for `value` on a linear #0000ff to #ff0000 ramp over `[lo, hi]`
pub fn ramp_color(value: f64, lo: f64, hi: f64) -> String {
    let t = if hi > lo { ((value - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.0 };
    let red = (255.0 * t).round() as u8;
    let blue = 255 - red;
    format!("#{:02x}00{:02x}", red, blue)
}

fn is_probability(p: f64) -> bool {
    (0.0..=1.0).contains(&p)
}

/// `(x, y, color)` for a row, or `None` unless the fold change is finite and
/// both p-values are probabilities
fn coordinates(row: &DgeResult) -> Option<(f64, f64, f64)> {
    match (row.pvalue, row.padj) {
        (Some(p), Some(q)) if row.log2_fold_change.is_finite() && is_probability(p) && is_probability(q) => {
            Some((row.log2_fold_change, neg_log10(q), neg_log10(p)))
        }
        _ => None,
    }
}

/// Map every row of `results` to a volcano point, in result order.
pub fn volcano_points(results: &DgeResults) -> VolcanoPlot {
    let mut placed = Vec::with_capacity(results.len());
    let mut omitted = Vec::new();
    for row in results {
        match coordinates(row) {
            Some(xyc) => placed.push((row.gene.as_str(), xyc)),
            None => omitted.push(row.gene.clone()),
        }
    }

    let lo = placed.iter().map(|(_, (_, _, c))| *c).fold(f64::INFINITY, f64::min);
    let hi = placed.iter().map(|(_, (_, _, c))| *c).fold(f64::NEG_INFINITY, f64::max);

    let points = placed
        .into_iter()
        .map(|(gene, (x, y, color))| VolcanoPoint {
            gene: gene.to_string(),
            x,
            y,
            color,
            color_hex: ramp_color(color, lo, hi),
        })
        .collect();

    VolcanoPlot { points, omitted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(gene: &str, lfc: f64, pvalue: Option<f64>, padj: Option<f64>) -> DgeResult {
        DgeResult {
            gene: gene.to_string(),
            base_mean: 100.0,
            log2_fold_change: lfc,
            lfc_se: Some(0.2),
            stat: Some(1.0),
            pvalue,
            padj,
        }
    }

    #[test]
    fn test_zero_pvalue_is_finite() {
        let results = DgeResults::new(vec![row("A", 2.0, Some(0.0), Some(0.0))], None);
        let plot = volcano_points(&results);
        let p = &plot.points[0];
        assert!(p.y.is_finite() && p.color.is_finite());
        assert_relative_eq!(p.y, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_coordinates() {
        let results = DgeResults::new(
            vec![row("A", -1.5, Some(0.001), Some(0.01)), row("B", 0.5, Some(0.1), Some(0.5))],
            None,
        );
        let plot = volcano_points(&results);
        assert_eq!(plot.points.len(), 2);
        assert_relative_eq!(plot.points[0].x, -1.5);
        assert_relative_eq!(plot.points[0].y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(plot.points[0].color, 3.0, epsilon = 1e-12);
        assert_eq!(plot.points[0].color_hex, "#ff0000");
        assert_eq!(plot.points[1].color_hex, "#0000ff");
    }

    #[test]
    fn test_undefined_rows_omitted() {
        let results = DgeResults::new(
            vec![
                row("A", 1.0, None, None),
                row("B", 1.0, Some(0.01), None),
                row("C", f64::NAN, Some(0.01), Some(0.02)),
                row("D", 1.0, Some(0.01), Some(0.02)),
            ],
            None,
        );
        let plot = volcano_points(&results);
        assert_eq!(plot.omitted, vec!["A", "B", "C"]);
        assert_eq!(plot.points.len(), 1);
        assert_eq!(plot.points[0].color_hex, "#0000ff");
    }

    #[test]
    fn test_out_of_range_pvalues_omitted() {
        let results = DgeResults::new(
            vec![
                row("A", 1.0, Some(f64::INFINITY), Some(0.5)),
                row("B", 1.0, Some(0.01), Some(1.7)),
                row("C", 0.5, Some(-0.2), Some(0.3)),
                row("D", f64::INFINITY, Some(0.01), Some(0.02)),
                row("E", -2.0, Some(0.0), Some(0.0)),
            ],
            None,
        );
        let plot = volcano_points(&results);
        assert_eq!(plot.omitted, vec!["A", "B", "C", "D"]);
        assert_eq!(plot.points.len(), 1);
        for p in &plot.points {
            assert!(p.x.is_finite() && p.y.is_finite() && p.color.is_finite());
        }
        assert_relative_eq!(plot.points[0].y, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ramp_midpoint() {
        assert_eq!(ramp_color(0.5, 0.0, 1.0), "#80007f");
    }

    #[test]
    fn test_json_output() {
        let results = DgeResults::new(vec![row("TP53", 1.0, Some(0.01), Some(0.02))], None);
        let json = volcano_points(&results).to_json_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["points"][0]["gene"], "TP53");
        assert_eq!(value["omitted"].as_array().unwrap().len(), 0);
    }
}
