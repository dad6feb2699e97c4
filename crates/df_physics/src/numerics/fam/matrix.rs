// crates/df_physics/src/numerics/fam/matrix.rs

//! 有限面积方程矩阵
//!
//! [`FaTopology`] 在网格上构建一次（地形修正只改几何、不改拓扑），
//! [`FaMatrix`] 每次组装时新建，多个分量（速度的 x/y/z）共用同一系数矩阵。
//!
//! # 迎风对流
//!
//! 内部边 e（owner P, neighbour N，通量 φ 由 P 指向 N）：
//!
//! - P 行：`φ > 0` 时 `diag_P += φ`，否则 `A[P,N] += φ`
//! - N 行：镜像，系数取 `-φ`
//!
//! 边界边：零梯度 `diag_P += φ`；固定值 `φ > 0` 时 `diag_P += φ`，否则 `b_P -= φ·x_b`。
//!
//! 组装同时记录每条边的通量系数，求解后由 [`FaMatrix::flux`] 得到与离散一致的边通量。

use df_foundation::{DfError, DfResult, SMALL};
use df_mesh::FaMesh;

use crate::numerics::linear_algebra::{
    BiCgStabSolver, CsrBuilder, CsrMatrix, CsrPattern, JacobiPreconditioner, SolverResult,
    SolverStatus,
};

/// 停止时残差超过容差的该倍数视为求解失败
pub const UNCONVERGED_FACTOR: f64 = 1e3;

// =============================================================================
// 拓扑
// =============================================================================

/// 有限面积矩阵的稀疏结构
#[derive(Debug, Clone)]
pub struct FaTopology {
    pattern: CsrPattern,
    diag: Vec<usize>,
    upper: Vec<usize>,
    lower: Vec<usize>,
    owners: Vec<usize>,
    neighbours: Vec<usize>,
    boundary_owners: Vec<usize>,
}

impl FaTopology {
    /// 由网格构建
    pub fn new(mesh: &FaMesh) -> DfResult<Self> {
        let n = mesh.n_faces();
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 0.0);
        }
        let n_internal = mesh.n_internal_edges();
        let mut owners = Vec::with_capacity(n_internal);
        let mut neighbours = Vec::with_capacity(n_internal);
        for e in &mesh.edges()[..n_internal] {
            let nb = e
                .neighbour
                .ok_or_else(|| DfError::internal("内部边缺少 neighbour"))?;
            builder.set(e.owner, nb, 0.0);
            builder.set(nb, e.owner, 0.0);
            owners.push(e.owner);
            neighbours.push(nb);
        }
        let pattern = builder.build_pattern();

        let find = |r: usize, c: usize| {
            pattern
                .find_index(r, c)
                .ok_or_else(|| DfError::internal(format!("稀疏模式缺少 ({r}, {c})")))
        };
        let diag = (0..n).map(|i| find(i, i)).collect::<DfResult<Vec<_>>>()?;
        let upper = owners
            .iter()
            .zip(&neighbours)
            .map(|(&o, &nb)| find(o, nb))
            .collect::<DfResult<Vec<_>>>()?;
        let lower = owners
            .iter()
            .zip(&neighbours)
            .map(|(&o, &nb)| find(nb, o))
            .collect::<DfResult<Vec<_>>>()?;
        let boundary_owners = mesh.edges()[n_internal..].iter().map(|e| e.owner).collect();

        Ok(Self {
            pattern,
            diag,
            upper,
            lower,
            owners,
            neighbours,
            boundary_owners,
        })
    }

    /// 面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.diag.len()
    }

    /// 内部边数
    #[inline]
    pub fn n_internal_edges(&self) -> usize {
        self.owners.len()
    }

    /// 边总数
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.owners.len() + self.boundary_owners.len()
    }
}

// =============================================================================
// 矩阵
// =============================================================================

/// 有限面积方程 `A x = b`（可多分量）
pub struct FaMatrix<'a> {
    name: String,
    topo: &'a FaTopology,
    matrix: CsrMatrix,
    source: Vec<Vec<f64>>,
    internal_coeffs: Vec<[f64; 2]>,
    boundary_coeffs: Vec<f64>,
    boundary_flux: Vec<Vec<f64>>,
}

impl<'a> FaMatrix<'a> {
    /// 创建空方程
    pub fn new(name: impl Into<String>, topo: &'a FaTopology, n_comp: usize) -> Self {
        let n_boundary = topo.boundary_owners.len();
        Self {
            name: name.into(),
            topo,
            matrix: CsrMatrix::from_pattern(topo.pattern.clone()),
            source: vec![vec![0.0; topo.n_faces()]; n_comp],
            internal_coeffs: vec![[0.0; 2]; topo.n_internal_edges()],
            boundary_coeffs: vec![0.0; n_boundary],
            boundary_flux: vec![vec![0.0; n_boundary]; n_comp],
        }
    }

    /// 方程名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 分量数
    pub fn n_comp(&self) -> usize {
        self.source.len()
    }

    /// 对角元
    pub fn diagonal(&self) -> Vec<f64> {
        let v = self.matrix.values();
        self.topo.diag.iter().map(|&k| v[k]).collect()
    }

    /// 右端项
    pub fn source(&self, comp: usize) -> &[f64] {
        &self.source[comp]
    }

    // =========================================================================
    // 组装
    // =========================================================================

    /// Euler 时间项 `ddt(x)`：`diag += A/Δt`，`b += x⁰·A⁰/Δt`（单分量）
    pub fn add_ddt(&mut self, dt: f64, areas: &[f64], areas_old: &[f64], old: &[f64]) {
        let inv_dt = 1.0 / dt;
        let values = self.matrix.values_mut();
        for (i, &k) in self.topo.diag.iter().enumerate() {
            values[k] += areas[i] * inv_dt;
        }
        for (i, b) in self.source[0].iter_mut().enumerate() {
            *b += old[i] * areas_old[i] * inv_dt;
        }
    }

    /// 带系数的 Euler 时间项 `ddt(ρ, x)`：`diag += ρ·A/Δt`，`b_c += ρ⁰·x⁰_c·A⁰/Δt`
    pub fn add_ddt_weighted(
        &mut self,
        dt: f64,
        areas: &[f64],
        coeff: &[f64],
        areas_old: &[f64],
        coeff_old: &[f64],
        old: &[&[f64]],
    ) {
        let inv_dt = 1.0 / dt;
        let values = self.matrix.values_mut();
        for (i, &k) in self.topo.diag.iter().enumerate() {
            values[k] += coeff[i] * areas[i] * inv_dt;
        }
        for (src, old_c) in self.source.iter_mut().zip(old) {
            for (i, b) in src.iter_mut().enumerate() {
                *b += coeff_old[i] * old_c[i] * areas_old[i] * inv_dt;
            }
        }
    }

    /// 隐式源 `Sp(coeff, x)`：`diag += coeff·A`
    pub fn add_sp(&mut self, coeff: &[f64], areas: &[f64]) {
        let values = self.matrix.values_mut();
        for (i, &k) in self.topo.diag.iter().enumerate() {
            values[k] += coeff[i] * areas[i];
        }
    }

    /// 显式源 `Su`：`b_c += su·A`
    pub fn add_su(&mut self, comp: usize, su: &[f64], areas: &[f64]) {
        for (i, b) in self.source[comp].iter_mut().enumerate() {
            *b += su[i] * areas[i];
        }
    }

    /// 已积分的显式源：`b_c += value`
    pub fn add_integrated_source(&mut self, comp: usize, value: &[f64]) {
        for (b, v) in self.source[comp].iter_mut().zip(value) {
            *b += v;
        }
    }

    /// 迎风对流 `div(φ, x)`
    ///
    /// `boundary(e, comp)` 给出边界边的取值，`None` 为零梯度。
    pub fn add_upwind_div<F>(&mut self, flux: &[f64], boundary: F)
    where
        F: Fn(usize, usize) -> Option<f64>,
    {
        let topo = self.topo;
        let n_internal = topo.n_internal_edges();
        let values = self.matrix.values_mut();

        for e in 0..n_internal {
            let phi = flux[e];
            let (o, nb) = (topo.owners[e], topo.neighbours[e]);
            let pos = phi.max(0.0);
            let neg = phi.min(0.0);
            values[topo.diag[o]] += pos;
            values[topo.upper[e]] += neg;
            values[topo.diag[nb]] -= neg;
            values[topo.lower[e]] -= pos;
            self.internal_coeffs[e][0] += pos;
            self.internal_coeffs[e][1] += neg;
        }

        for (slot, &o) in topo.boundary_owners.iter().enumerate() {
            let e = n_internal + slot;
            let phi = flux[e];
            // 零梯度只看第一个分量，各分量边界类型一致
            match boundary(e, 0) {
                None => {
                    values[topo.diag[o]] += phi;
                    self.boundary_coeffs[slot] += phi;
                }
                Some(_) => {
                    let pos = phi.max(0.0);
                    let neg = phi.min(0.0);
                    values[topo.diag[o]] += pos;
                    self.boundary_coeffs[slot] += pos;
                    for comp in 0..self.source.len() {
                        let xb = boundary(e, comp).unwrap_or(0.0);
                        self.source[comp][o] -= neg * xb;
                        self.boundary_flux[comp][slot] += neg * xb;
                    }
                }
            }
        }
    }

    /// 欠松弛：`D' = D/α`，`b += (D' - D)·x_prev`
    pub fn relax(&mut self, alpha: f64, prev: &[&[f64]]) {
        if alpha >= 1.0 {
            return;
        }
        let values = self.matrix.values_mut();
        for (i, &k) in self.topo.diag.iter().enumerate() {
            let d = values[k];
            let d_new = d / alpha;
            values[k] = d_new;
            for (src, x) in self.source.iter_mut().zip(prev) {
                src[i] += (d_new - d) * x[i];
            }
        }
    }

    // =========================================================================
    // 求解
    // =========================================================================

    /// 残差归一化因子 `Σ|Ax - wA·x̄| + Σ|b - wA·x̄| + SMALL`
    fn norm_factor(&self, comp: usize, x: &[f64], ax: &[f64]) -> f64 {
        let x_ref = crate::numerics::linear_algebra::mean(x);
        let p = self.matrix.pattern();
        let values = self.matrix.values();
        let mut offset = 0;
        let mut sum = 0.0;
        for (i, &axi) in ax.iter().enumerate() {
            let len = p.row_indices(i).len();
            let w_a: f64 = values[offset..offset + len].iter().sum();
            offset += len;
            sum += (axi - w_a * x_ref).abs() + (self.source[comp][i] - w_a * x_ref).abs();
        }
        sum + SMALL
    }

    /// 归一化初始残差 `Σ|b - Ax| / norm_factor`
    pub fn residual(&self, comp: usize, x: &[f64]) -> f64 {
        let mut ax = vec![0.0; x.len()];
        self.matrix.mul_vec(x, &mut ax);
        let num: f64 = ax
            .iter()
            .zip(&self.source[comp])
            .map(|(a, b)| (b - a).abs())
            .sum();
        num / self.norm_factor(comp, x, &ax)
    }

    /// 求解第 comp 个分量，x 为初值并写回
    ///
    /// 发散、出现非有限值，或停止时残差仍高于容差 `UNCONVERGED_FACTOR` 倍，
    /// 返回 `LinearSolve` 错误；停在容差附近时仅记录警告。
    pub fn solve(
        &self,
        solver: &mut BiCgStabSolver,
        comp: usize,
        x: &mut [f64],
    ) -> DfResult<SolverResult> {
        DfError::check_size("x", self.topo.n_faces(), x.len())?;
        let mut ax = vec![0.0; x.len()];
        self.matrix.mul_vec(x, &mut ax);
        let norm_factor = self.norm_factor(comp, x, &ax);

        let precond = JacobiPreconditioner::from_matrix(&self.matrix);
        let result = solver.solve(&self.matrix, &self.source[comp], x, &precond, norm_factor);
        let cfg = solver.config();
        let target = cfg.tolerance.max(cfg.rel_tol * result.initial_residual);

        let finite = x.iter().all(|v| v.is_finite());
        match result.status {
            SolverStatus::Diverged => {
                return Err(DfError::linear_solve(
                    self.component_name(comp),
                    result.status.as_str(),
                    result.iterations,
                    result.final_residual,
                ))
            }
            _ if !finite => {
                return Err(DfError::linear_solve(
                    self.component_name(comp),
                    "non-finite",
                    result.iterations,
                    result.final_residual,
                ))
            }
            SolverStatus::MaxIterationsReached | SolverStatus::Stagnated
                if result.final_residual > UNCONVERGED_FACTOR * target =>
            {
                return Err(DfError::linear_solve(
                    self.component_name(comp),
                    result.status.as_str(),
                    result.iterations,
                    result.final_residual,
                ))
            }
            SolverStatus::MaxIterationsReached | SolverStatus::Stagnated => {
                tracing::warn!(
                    equation = %self.component_name(comp),
                    status = result.status.as_str(),
                    iterations = result.iterations,
                    initial = result.initial_residual,
                    residual = result.final_residual,
                    "线性求解未达到容差"
                );
            }
            SolverStatus::Converged => {}
        }
        tracing::trace!(
            equation = %self.component_name(comp),
            iterations = result.iterations,
            initial = result.initial_residual,
            residual = result.final_residual,
            "线性求解完成"
        );
        Ok(result)
    }

    fn component_name(&self, comp: usize) -> String {
        if self.source.len() == 1 {
            self.name.clone()
        } else {
            let axis = ["x", "y", "z"].get(comp).copied().unwrap_or("?");
            format!("{}.{axis}", self.name)
        }
    }

    /// 与离散一致的边通量（求解后调用）
    pub fn flux(&self, comp: usize, x: &[f64]) -> Vec<f64> {
        let topo = self.topo;
        let n_internal = topo.n_internal_edges();
        let mut out = Vec::with_capacity(topo.n_edges());
        for (e, c) in self.internal_coeffs.iter().enumerate() {
            out.push(c[0] * x[topo.owners[e]] + c[1] * x[topo.neighbours[e]]);
        }
        for (slot, &o) in topo.boundary_owners.iter().enumerate() {
            out.push(self.boundary_coeffs[slot] * x[o] + self.boundary_flux[comp][slot]);
        }
        debug_assert_eq!(out.len(), n_internal + topo.boundary_owners.len());
        out
    }
}
