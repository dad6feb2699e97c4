// crates/df_physics/src/numerics/linear_algebra/solver.rs

//! BiCGStab 迭代求解器
//!
//! 有限面积输运矩阵非对称（迎风对流），使用预条件 BiCGStab。
//! 收敛判据与初始残差采用同一归一化：`Σ|r| / norm_factor`，
//! `norm_factor` 由调用方按方程计算并传入。
//!
//! # 使用示例
//!
//! ```ignore
//! let precond = JacobiPreconditioner::from_matrix(&matrix);
//! let mut solver = BiCgStabSolver::new(SolverConfig::default());
//! let result = solver.solve(&matrix, &b, &mut x, &precond, norm_factor);
//! ```

use df_config::LinearSolverSettings;

use super::csr::CsrMatrix;
use super::preconditioner::Preconditioner;
use super::vector_ops::{axpy, dot, norm1, norm2};

/// 判定 BiCGStab 中断的相对阈值：`|⟨a, b⟩| ≤ tol·‖a‖·‖b‖`
const BREAKDOWN_TOL: f64 = 1e-14;

/// 求解器配置
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// 归一化残差的绝对容差
    pub tolerance: f64,
    /// 相对初始残差的容差
    pub rel_tol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            rel_tol: 0.0,
            max_iter: 1000,
        }
    }
}

impl From<&LinearSolverSettings> for SolverConfig {
    fn from(s: &LinearSolverSettings) -> Self {
        Self {
            tolerance: s.tolerance,
            rel_tol: s.rel_tol,
            max_iter: s.max_iter,
        }
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散（残差增长或出现非有限值）
    Diverged,
    /// 停滞（重启后仍立即中断）
    Stagnated,
}

impl SolverStatus {
    /// 状态名
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::MaxIterationsReached => "max-iterations",
            Self::Diverged => "diverged",
            Self::Stagnated => "stagnated",
        }
    }
}

/// 求解结果
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// 状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 初始归一化残差
    pub initial_residual: f64,
    /// 最终归一化残差
    pub final_residual: f64,
}

impl SolverResult {
    /// 是否收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

/// 预条件 BiCGStab
pub struct BiCgStabSolver {
    config: SolverConfig,
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    z: Vec<f64>,
}

impl BiCgStabSolver {
    /// 创建求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            z: Vec::new(),
        }
    }

    /// 配置
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            for w in [
                &mut self.r,
                &mut self.r0,
                &mut self.p,
                &mut self.v,
                &mut self.s,
                &mut self.t,
                &mut self.z,
            ] {
                *w = vec![0.0; n];
            }
        }
    }

    /// 求解 Ax = b，x 为初值并写回结果
    ///
    /// 影子残差失效（`⟨r0, r⟩` 或 `⟨r0, v⟩` 近零）时以当前残差重启；
    /// 刚重启就再次中断才报告 `Stagnated`。
    pub fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
        norm_factor: f64,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let stag_tol = 1e-300;
        let div_factor = 1e6;
        let measure = |r: &[f64]| norm1(r) / norm_factor;

        matrix.mul_vec(x, &mut self.r);
        for i in 0..n {
            self.r[i] = b[i] - self.r[i];
        }

        let initial = measure(&self.r);
        let finish = |status, iterations, final_residual| SolverResult {
            status,
            iterations,
            initial_residual: initial,
            final_residual,
        };
        if !initial.is_finite() {
            return finish(SolverStatus::Diverged, 0, initial);
        }
        let target = self.config.tolerance.max(self.config.rel_tol * initial);
        if initial < target {
            return finish(SolverStatus::Converged, 0, initial);
        }

        // 影子残差与当前残差近乎正交时以当前残差重启
        let breakdown = |value: f64, u: &[f64], w: &[f64]| {
            value.abs() <= BREAKDOWN_TOL * norm2(u) * norm2(w) || value.abs() < stag_tol
        };
        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut fresh = true;
        let mut restarts = 0usize;

        for iter in 0..self.config.max_iter {
            let started = fresh;
            if fresh {
                self.r0.copy_from_slice(&self.r);
                self.v.fill(0.0);
                self.p.fill(0.0);
            }

            let rho = dot(&self.r0, &self.r);
            if breakdown(rho, &self.r0, &self.r) {
                if started {
                    return finish(SolverStatus::Stagnated, iter, measure(&self.r));
                }
                restarts += 1;
                fresh = true;
                continue;
            }

            let beta = if started {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;
            fresh = false;

            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            precond.apply(&self.p, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if breakdown(r0v, &self.r0, &self.v) {
                if started {
                    return finish(SolverStatus::Stagnated, iter, measure(&self.r));
                }
                restarts += 1;
                fresh = true;
                continue;
            }
            alpha = rho / r0v;

            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            // 半步已收敛：x += alpha·M⁻¹p
            let s_res = measure(&self.s);
            if s_res < target {
                axpy(alpha, &self.z, x);
                return finish(SolverStatus::Converged, iter + 1, s_res);
            }

            // 先累加 alpha 部分，z 随后被复用
            axpy(alpha, &self.z, x);

            precond.apply(&self.s, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt.abs() < stag_tol {
                0.0
            } else {
                dot(&self.t, &self.s) / tt
            };
            if omega.abs() < stag_tol {
                // 最小残差步退化：保留 alpha 部分，从 s 重启
                self.r.copy_from_slice(&self.s);
                restarts += 1;
                fresh = true;
                continue;
            }

            axpy(omega, &self.z, x);
            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res = measure(&self.r);
            tracing::trace!(iter = iter + 1, residual = res, restarts, "BiCGStab");

            if !res.is_finite() || res > initial * div_factor {
                return finish(SolverStatus::Diverged, iter + 1, res);
            }
            if res < target {
                return finish(SolverStatus::Converged, iter + 1, res);
            }
        }

        let res = measure(&self.r);
        finish(SolverStatus::MaxIterationsReached, self.config.max_iter, res)
    }
}
