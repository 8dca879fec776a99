use thiserror::Error;

const SINGULAR_EPS: f64 = 1e-12;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum LinalgError {
    #[error("singular system (determinant {0:e})")]
    Singular(f64),
    #[error("no observations to fit")]
    Empty,
}

pub type Matrix3 = [[f64; 3]; 3];

pub fn det3(m: &Matrix3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Solves `a · x = b` by Cramer's rule.
pub fn solve3(a: &Matrix3, b: &[f64; 3]) -> Result<[f64; 3], LinalgError> {
    let d = det3(a);
    if !d.is_finite() || d.abs() < SINGULAR_EPS {
        return Err(LinalgError::Singular(d));
    }
    let mut out = [0.0_f64; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut replaced = *a;
        for row in 0..3 {
            replaced[row][col] = b[row];
        }
        *slot = det3(&replaced) / d;
    }
    Ok(out)
}

/// Coefficients of `z ≈ a·x + b·y + c`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TwoFactorFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub samples: usize,
}

impl TwoFactorFit {
    pub fn predict(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }

    /// `a * x + b * y + c` with the factor names filled in.
    pub fn equation(&self, x_name: &str, y_name: &str) -> String {
        format!(
            "{:.4} * {x_name} + {:.4} * {y_name} + {:.4}",
            self.a, self.b, self.c
        )
    }
}

/// Least squares via the normal equations
/// `[Σxx Σxy Σx; Σxy Σyy Σy; Σx Σy n] · [a b c]ᵀ = [Σxz Σyz Σz]ᵀ`.
pub fn fit_two_factor(xs: &[f64], ys: &[f64], zs: &[f64]) -> Result<TwoFactorFit, LinalgError> {
    let n = xs.len().min(ys.len()).min(zs.len());
    if n == 0 {
        return Err(LinalgError::Empty);
    }
    let (mut sx, mut sy, mut sz) = (0.0_f64, 0.0_f64, 0.0_f64);
    let (mut sxx, mut syy, mut sxy) = (0.0_f64, 0.0_f64, 0.0_f64);
    let (mut sxz, mut syz) = (0.0_f64, 0.0_f64);
    for i in 0..n {
        let (x, y, z) = (xs[i], ys[i], zs[i]);
        sx += x;
        sy += y;
        sz += z;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
        sxz += x * z;
        syz += y * z;
    }
    let a = [[sxx, sxy, sx], [sxy, syy, sy], [sx, sy, n as f64]];
    let [ca, cb, cc] = solve3(&a, &[sxz, syz, sz])?;
    Ok(TwoFactorFit {
        a: ca,
        b: cb,
        c: cc,
        samples: n,
    })
}
