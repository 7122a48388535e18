//! Small dense solvers for p x p normal equations (row-major `Vec<f64>`)

/// Solve `A x = b` for symmetric positive (semi)definite `A` via Cholesky.
///
/// Non-positive pivots are replaced by 1e-12 so near-singular systems stay finite.
pub fn solve_symmetric(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let l = cholesky(a, n);

    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum = b[i] - (0..i).map(|j| l[i * n + j] * y[j]).sum::<f64>();
        y[i] = sum / l[i * n + i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum = y[i] - ((i + 1)..n).map(|j| l[j * n + i] * x[j]).sum::<f64>();
        x[i] = sum / l[i * n + i];
    }
    x
}

/// Inverse of a symmetric positive definite matrix
pub fn invert_symmetric(a: &[f64], n: usize) -> Vec<f64> {
    let mut inv = vec![0.0; n * n];
    for col in 0..n {
        let mut e = vec![0.0; n];
        e[col] = 1.0;
        for (row, v) in solve_symmetric(a, &e, n).into_iter().enumerate() {
            inv[row * n + col] = v;
        }
    }
    inv
}

/// `log |A|` for symmetric positive definite `A`; `None` if not positive definite
pub fn log_det_symmetric(a: &[f64], n: usize) -> Option<f64> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let sum = a[i * n + j] - (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum::<f64>();
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(2.0 * (0..n).map(|i| l[i * n + i].ln()).sum::<f64>())
}

fn cholesky(a: &[f64], n: usize) -> Vec<f64> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j] - (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum::<f64>();
            if i == j {
                if sum <= 0.0 {
                    sum = 1e-12;
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    l
}
