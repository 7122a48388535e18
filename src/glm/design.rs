//! Design matrix for the two-group comparison

use ndarray::Array2;

use crate::data::GroupLabel;
use crate::error::{DgeError, Result};

/// Intercept plus a mutant indicator, one row per sample.
///
/// Coefficient 0 is the wild-type log mean, coefficient 1 the natural-log
/// mutant effect.
#[derive(Debug, Clone)]
pub struct GroupDesign {
    matrix: Array2<f64>,
    groups: Vec<GroupLabel>,
}

impl GroupDesign {
    /// Coefficient index of the group effect
    pub const GROUP_COEF: usize = 1;

    pub fn new(groups: &[GroupLabel]) -> Result<Self> {
        let n = groups.len();
        let mut matrix = Array2::zeros((n, 2));
        for (i, g) in groups.iter().enumerate() {
            matrix[[i, 0]] = 1.0;
            if *g == GroupLabel::Mutant {
                matrix[[i, 1]] = 1.0;
            }
        }
        check_full_rank(&matrix)?;
        Ok(Self {
            matrix,
            groups: groups.to_vec(),
        })
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn groups(&self) -> &[GroupLabel] {
        &self.groups
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_coefs(&self) -> usize {
        self.matrix.ncols()
    }

    /// Residual degrees of freedom
    pub fn df_residual(&self) -> usize {
        self.n_samples().saturating_sub(self.n_coefs())
    }

    pub fn group_size(&self, label: GroupLabel) -> usize {
        self.groups.iter().filter(|&&g| g == label).count()
    }
}

/// Check that a design matrix has full column rank.
///
/// Rank is computed by Householder QR with column pivoting, with tolerance
/// `max(nrow, ncol) * eps * max(|diag(R)|)`.
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let (nrow, ncol) = matrix.dim();
    if nrow == 0 || ncol == 0 {
        return Err(DgeError::model_fit("design matrix has no rows or columns"));
    }

    if qr_rank(matrix) < ncol {
        let zero_column = (0..ncol).any(|j| matrix.column(j).iter().all(|&v| v == 0.0));
        let reason = if zero_column {
            "design matrix is not full rank: a group has no samples"
        } else {
            "design matrix is not full rank: a covariate is a linear combination of the others"
        };
        return Err(DgeError::model_fit(reason));
    }
    if nrow <= ncol {
        return Err(DgeError::model_fit(format!(
            "{} samples for {} coefficients leaves no residual degrees of freedom",
            nrow, ncol
        )));
    }
    Ok(())
}

fn qr_rank(matrix: &Array2<f64>) -> usize {
    let (nrow, ncol) = matrix.dim();
    let k = nrow.min(ncol);
    let mut r = matrix.to_owned();
    let mut norms: Vec<f64> = (0..ncol).map(|j| r.column(j).iter().map(|v| v * v).sum()).collect();

    for step in 0..k {
        let best = (step..ncol)
            .max_by(|&a, &b| norms[a].total_cmp(&norms[b]))
            .unwrap_or(step);
        if best != step {
            for i in 0..nrow {
                r.swap([i, step], [i, best]);
            }
            norms.swap(step, best);
        }

        let mut alpha = (step..nrow).map(|i| r[[i, step]].powi(2)).sum::<f64>().sqrt();
        if alpha < f64::EPSILON * 1e3 {
            break;
        }
        if r[[step, step]] > 0.0 {
            alpha = -alpha;
        }
        let v0 = r[[step, step]] - alpha;
        r[[step, step]] = alpha;

        let v_norm_sq = v0 * v0 + ((step + 1)..nrow).map(|i| r[[i, step]].powi(2)).sum::<f64>();
        if v_norm_sq < f64::MIN_POSITIVE {
            continue;
        }
        let tau = 2.0 / v_norm_sq;

        for j in (step + 1)..ncol {
            let dot = v0 * r[[step, j]] + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, j]]).sum::<f64>();
            let scale = tau * dot;
            r[[step, j]] -= scale * v0;
            for i in (step + 1)..nrow {
                let v = r[[i, step]];
                r[[i, j]] -= scale * v;
            }
            norms[j] = (norms[j] - r[[step, j]].powi(2)).max(0.0);
        }
    }

    let max_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0f64, f64::max);
    let tol = nrow.max(ncol) as f64 * f64::EPSILON * max_diag;
    (0..k).filter(|&i| r[[i, i]].abs() > tol).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::array;
    use GroupLabel::{Mutant, WildType};

    #[test]
    fn test_two_group_design() {
        let design = GroupDesign::new(&[WildType, WildType, Mutant, Mutant]).unwrap();
        assert_eq!(design.matrix(), &array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(design.df_residual(), 2);
        assert_eq!(design.group_size(Mutant), 2);
    }

    #[test]
    fn test_empty_group_is_singular() {
        let err = GroupDesign::new(&[WildType, WildType, WildType]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFit);
    }

    #[test]
    fn test_confounded_columns_rejected() {
        let m = array![[1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 1.0], [1.0, 0.0, 1.0]];
        let err = check_full_rank(&m).unwrap_err();
        assert!(err.to_string().contains("linear combination"));
    }

    #[test]
    fn test_no_residual_df_rejected() {
        let err = GroupDesign::new(&[WildType, Mutant]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFit);
    }
}
