// crates/df_physics/src/numerics/linear_algebra/preconditioner.rs

//! 预条件器

use super::csr::CsrMatrix;

/// 预条件器接口：z = M⁻¹ r
pub trait Preconditioner {
    /// 应用预条件
    fn apply(&self, r: &[f64], z: &mut [f64]);
}

/// 恒等预条件
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }
}

/// Jacobi（对角）预条件
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// 由矩阵对角线构建，零对角元按 1 处理
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let inv_diag = matrix
            .extract_diagonal()
            .into_iter()
            .map(|d| if d.abs() > f64::MIN_POSITIVE { 1.0 / d } else { 1.0 })
            .collect();
        Self { inv_diag }
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        for ((zi, ri), d) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * d;
        }
    }
}
