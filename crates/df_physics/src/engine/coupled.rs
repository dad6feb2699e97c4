// crates/df_physics/src/engine/coupled.rs

//! 耦合内迭代
//!
//! 每个时间步内反复执行一遍完整的耦合求解，直到三个初始残差都低于阈值
//! （且迭代次数不少于 `minCorrectors`）或达到 `nOuterCorrectors`，
//! 然后不做欠松弛再执行最后一遍：
//!
//! ```text
//! Iterating ──残差达标且 iCorr ≥ minCorr──▶ Converged ──┐
//!     │                                                   ├──▶ FinalPass ──▶ Done
//!     └──────────────iCorr ≥ nCorr──────────▶ MaxIterReached ┘
//! ```
//!
//! 一遍求解：
//!
//! 1. 交界 ghost 值；底部压力 `pb = -shi·ndiv(phi2s, Us) + rho·h·(g·n)`，
//!    可选 `pb -= ngrad(pb·h/2)`，截断 `pb ≥ 0`
//! 2. 动量 `ddt(rhoh, Us) + shi·div(phi2s, Us) + tauSc + Sp(tauSp, Us) = rho·gs·h - grad(pb·h/2)`，
//!    求解后投影到切平面
//! 3. `tau = tauSc + tauSp·Us`，`phis = Us_e·Le`
//! 4. 侵蚀 Sm、淤积 Sd
//! 5. `ddt(rhoh) + div(phis, rhoh) = rho_b·Sm - Sp(rho_b·Sd/rhoh)`，Cwh 同理
//! 6. `phi2s` 取 rhoh 方程的边通量，重新导出 h、Cw、rho、Cv
//! 7. `deltahh = (Sd - Sm)·Δt`，更新物理边界值
//!
//! 残差在各分区间取最大值，所有分区执行相同的遍数。
//! 线性求解发散直接返回错误，不做步长回退。

use std::fmt;

use df_config::SolutionControls;
use df_foundation::{DfResult, SMALL};
use df_mesh::{DVec3, FaMesh};
use serde::Serialize;

use crate::boundary::BoundaryConditions;
use crate::closure::{ClosureContext, ClosureSet};
use crate::numerics::fam::{
    gauss_grad, interpolate_scalar, interpolate_vector, ndiv, ngrad, BoundaryScalar,
    BoundaryVector, FaMatrix, FaTopology,
};
use crate::numerics::linear_algebra::{BiCgStabSolver, SolverConfig};
use crate::parallel::{DistributedSync, ReduceOp};
use crate::state::FlowState;
use crate::types::MaterialParams;

// =============================================================================
// 状态机
// =============================================================================

/// 内迭代所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// 带欠松弛的迭代
    Iterating,
    /// 残差达标
    Converged,
    /// 达到迭代上限
    MaxIterReached,
    /// 不做欠松弛的最后一遍
    FinalPass,
    /// 本步结束
    Done,
}

impl StepPhase {
    /// 阶段名
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Iterating => "iterating",
            Self::Converged => "converged",
            Self::MaxIterReached => "max-iter-reached",
            Self::FinalPass => "final-pass",
            Self::Done => "done",
        }
    }

    /// 完成第 `i_corr` 遍（从 0 计）后的下一阶段
    pub fn advance(self, i_corr: usize, below_tolerance: bool, controls: &SolutionControls) -> Self {
        match self {
            Self::Iterating if below_tolerance && i_corr >= controls.min_correctors => Self::Converged,
            Self::Iterating if i_corr >= controls.n_outer_correctors => Self::MaxIterReached,
            Self::Iterating => Self::Iterating,
            Self::Converged | Self::MaxIterReached => Self::FinalPass,
            Self::FinalPass | Self::Done => Self::Done,
        }
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 三个方程的归一化初始残差
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Residuals {
    /// rhoh 方程
    pub rhoh: f64,
    /// Cwh 方程
    pub cwh: f64,
    /// 动量方程（分量残差的模）
    pub us: f64,
}

impl Residuals {
    /// 是否全部低于阈值
    pub fn below(&self, controls: &SolutionControls) -> bool {
        self.rhoh < controls.rhoh_residual_max
            && self.cwh < controls.cwh_residual_max
            && self.us < controls.us_residual_max
    }
}

/// 单步内迭代的结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepReport {
    /// 总遍数（含最后一遍）
    pub passes: usize,
    /// 是否因残差达标结束
    pub converged: bool,
    /// 最后一遍之前的残差
    pub residuals: Residuals,
    /// 最后一遍的残差
    pub final_residuals: Residuals,
}

// =============================================================================
// 求解器
// =============================================================================

/// 一步求解所需的只读输入
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    /// 网格
    pub mesh: &'a FaMesh,
    /// 材料参数
    pub params: &'a MaterialParams,
    /// 闭合模型
    pub closures: &'a ClosureSet,
    /// 边界条件
    pub bcs: &'a BoundaryConditions,
    /// 重力法向分量 g·n
    pub gn: &'a [f64],
    /// 重力切向分量 g - (g·n)n
    pub gs: &'a [DVec3],
}

/// 耦合步求解器
pub struct CoupledStepSolver {
    controls: SolutionControls,
    topology: FaTopology,
    linear: BiCgStabSolver,
}

impl fmt::Debug for CoupledStepSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoupledStepSolver")
            .field("n_outer_correctors", &self.controls.n_outer_correctors)
            .field("min_correctors", &self.controls.min_correctors)
            .finish()
    }
}

impl CoupledStepSolver {
    /// 在网格拓扑上创建
    pub fn new(controls: SolutionControls, mesh: &FaMesh) -> DfResult<Self> {
        let topology = FaTopology::new(mesh)?;
        let linear = BiCgStabSolver::new(SolverConfig::from(&controls.linear_solver));
        Ok(Self {
            controls,
            topology,
            linear,
        })
    }

    /// 求解控制
    pub fn controls(&self) -> &SolutionControls {
        &self.controls
    }

    /// 推进一个时间步的耦合求解
    ///
    /// 调用前应已更新入流边界并保存旧时刻值。
    pub fn solve_step(
        &mut self,
        inputs: &StepInputs<'_>,
        state: &mut FlowState,
        sync: &mut DistributedSync,
        dt: f64,
    ) -> DfResult<StepReport> {
        let mut phase = StepPhase::Iterating;
        let mut converged = false;
        let mut residuals = Residuals::default();
        let mut i_corr = 0;

        loop {
            let final_pass = phase == StepPhase::FinalPass;
            let r = self.pass(inputs, state, sync, dt, final_pass)?;
            tracing::debug!(
                iteration = i_corr,
                phase = %phase,
                rhoh = r.rhoh,
                cwh = r.cwh,
                us = r.us,
                "内迭代残差"
            );

            if final_pass {
                let report = StepReport {
                    passes: i_corr + 1,
                    converged,
                    residuals,
                    final_residuals: r,
                };
                if converged {
                    tracing::info!(passes = report.passes, rhoh = residuals.rhoh, cwh = residuals.cwh, us = residuals.us, "内迭代收敛");
                } else {
                    tracing::warn!(
                        passes = report.passes,
                        rhoh = residuals.rhoh,
                        rhoh_max = self.controls.rhoh_residual_max,
                        cwh = residuals.cwh,
                        cwh_max = self.controls.cwh_residual_max,
                        us = residuals.us,
                        us_max = self.controls.us_residual_max,
                        "内迭代达到上限"
                    );
                }
                return Ok(report);
            }

            residuals = r;
            phase = match phase.advance(i_corr, r.below(&self.controls), &self.controls) {
                StepPhase::Converged => {
                    converged = true;
                    StepPhase::FinalPass
                }
                StepPhase::MaxIterReached => StepPhase::FinalPass,
                next => next,
            };
            i_corr += 1;
        }
    }

    /// 一遍耦合求解，返回全局归约后的初始残差
    fn pass(
        &mut self,
        inputs: &StepInputs<'_>,
        state: &mut FlowState,
        sync: &mut DistributedSync,
        dt: f64,
        final_pass: bool,
    ) -> DfResult<Residuals> {
        let Self {
            controls,
            topology,
            linear,
        } = self;
        let StepInputs {
            mesh,
            params,
            closures,
            bcs,
            gn,
            gs,
        } = *inputs;
        let nf = mesh.n_faces();
        let areas = mesh.areas();
        let normals = mesh.normals();
        let coupled = bcs.coupled();

        exchange_state(sync, state)?;

        // ===== 1. 底部压力 =====
        let us_e = interpolate_vector(
            mesh,
            &state.us,
            BoundaryVector {
                values: &state.boundary.us,
                coupled,
            },
        );
        let curvature = ndiv(mesh, &state.phi2s, &us_e);
        for i in 0..nf {
            state.pb[i] = -params.shi * curvature[i] + state.rho[i] * state.h[i] * gn[i];
        }
        if params.pressure_feedback {
            let pbh2_e = pbh2_edges(mesh, bcs, state, sync)?;
            let feedback = ngrad(mesh, &pbh2_e);
            for (pb, f) in state.pb.iter_mut().zip(feedback) {
                *pb -= f;
            }
        }
        for pb in &mut state.pb {
            *pb = pb.max(0.0);
        }
        let grad_pbh2 = gauss_grad(mesh, &pbh2_edges(mesh, bcs, state, sync)?);

        // ===== 2. 动量 =====
        let ctx = ClosureContext {
            mesh,
            state: &*state,
            params,
            gs,
            dt,
        };
        let tau_sp = closures.friction.tau_sp(&ctx);
        let tau_sc = closures.friction.tau_sc(&ctx);

        let old = components(&state.us_old);
        let cur = components(&state.us);
        let mut us_eqn = FaMatrix::new("Us", topology, 3);
        us_eqn.add_ddt_weighted(
            dt,
            areas,
            &state.rhoh,
            &state.area_old,
            &state.rhoh_old,
            &[&old[0], &old[1], &old[2]],
        );
        let convective: Vec<f64> = state.phi2s.iter().map(|p| params.shi * p).collect();
        let us_b = &state.boundary.us;
        us_eqn.add_upwind_div(&convective, |e, c| bcs.vector_value(e, us_b, c));
        us_eqn.add_sp(&tau_sp, areas);
        for c in 0..3 {
            let su: Vec<f64> = (0..nf)
                .map(|i| state.rho[i] * state.h[i] * gs[i][c] - grad_pbh2[i][c] - tau_sc[i][c])
                .collect();
            us_eqn.add_su(c, &su, areas);
        }
        if !final_pass {
            us_eqn.relax(controls.relaxation.us, &[&cur[0], &cur[1], &cur[2]]);
        }

        let mut solved = cur.clone();
        let mut us_res = DVec3::ZERO;
        for (c, x) in solved.iter_mut().enumerate() {
            us_res[c] = us_eqn.residual(c, x);
            us_eqn.solve(linear, c, x)?;
        }
        for i in 0..nf {
            let u = DVec3::new(solved[0][i], solved[1][i], solved[2][i]);
            let n = normals[i];
            state.us[i] = u - u.dot(n) * n;
        }
        sync.exchange_vectors(&state.us, &mut state.boundary.us)?;

        // ===== 3. 剪应力与体积通量 =====
        for i in 0..nf {
            state.tau[i] = tau_sc[i] + tau_sp[i] * state.us[i];
        }
        let us_e = interpolate_vector(
            mesh,
            &state.us,
            BoundaryVector {
                values: &state.boundary.us,
                coupled,
            },
        );
        for ((phi, u), le) in state.phis.iter_mut().zip(&us_e).zip(mesh.le()) {
            *phi = u.dot(*le);
        }

        // ===== 4. 侵蚀与淤积 =====
        let ctx = ClosureContext {
            mesh,
            state: &*state,
            params,
            gs,
            dt,
        };
        let sm = closures.entrainment.sm(&ctx);
        let sd = closures.deposition.sd(&ctx);

        // ===== 5. rhoh 与 Cwh =====
        let bnd = &state.boundary;
        let mut rhoh_eqn = FaMatrix::new("rhoh", topology, 1);
        rhoh_eqn.add_ddt(dt, areas, &state.area_old, &state.rhoh_old);
        rhoh_eqn.add_upwind_div(&state.phis, |e, _| bcs.scalar_value(e, &bnd.rhoh));
        let source: Vec<f64> = sm.iter().map(|s| params.rho_b * s).collect();
        rhoh_eqn.add_su(0, &source, areas);
        let sink: Vec<f64> = (0..nf)
            .map(|i| params.rho_b * sd[i] / (state.rhoh[i] + SMALL))
            .collect();
        rhoh_eqn.add_sp(&sink, areas);
        if !final_pass {
            rhoh_eqn.relax(controls.relaxation.rhoh, &[&state.rhoh]);
        }
        let mut rhoh = state.rhoh.clone();
        let rhoh_res = rhoh_eqn.residual(0, &rhoh);
        rhoh_eqn.solve(linear, 0, &mut rhoh)?;

        let cw_b = params.cw_b();
        let mut cwh_eqn = FaMatrix::new("Cwh", topology, 1);
        cwh_eqn.add_ddt(dt, areas, &state.area_old, &state.cwh_old);
        cwh_eqn.add_upwind_div(&state.phis, |e, _| bcs.scalar_value(e, &bnd.cwh));
        let source: Vec<f64> = sm.iter().map(|s| cw_b * s).collect();
        cwh_eqn.add_su(0, &source, areas);
        let sink: Vec<f64> = (0..nf)
            .map(|i| cw_b * sd[i] / (state.cwh[i] + SMALL))
            .collect();
        cwh_eqn.add_sp(&sink, areas);
        if !final_pass {
            cwh_eqn.relax(controls.relaxation.cwh, &[&state.cwh]);
        }
        let mut cwh = state.cwh.clone();
        let cwh_res = cwh_eqn.residual(0, &cwh);
        cwh_eqn.solve(linear, 0, &mut cwh)?;

        // ===== 6. 通量与导出量 =====
        state.phi2s = rhoh_eqn.flux(0, &rhoh);
        state.phi_cwh = cwh_eqn.flux(0, &cwh);
        state.rhoh = rhoh;
        state.cwh = cwh;
        state.rederive(params);
        let dr = params.rho_s - params.rho_w;
        for ((q, m), c) in state.q.iter_mut().zip(&state.phi2s).zip(&state.phi_cwh) {
            *q = (m + c * dr) / params.rho_s;
        }

        // ===== 7. 高程增量与边界值 =====
        for i in 0..nf {
            state.deltahh[i] = (sd[i] - sm[i]) * dt;
        }
        state.sm = sm;
        state.sd = sd;
        bcs.correct(mesh, state);

        let r = sync.all_reduce(&[rhoh_res, cwh_res, us_res.length()], ReduceOp::Max)?;
        Ok(Residuals {
            rhoh: r[0],
            cwh: r[1],
            us: r[2],
        })
    }
}

/// 交换主变量的交界 ghost 值
pub(crate) fn exchange_state(sync: &mut DistributedSync, state: &mut FlowState) -> DfResult<()> {
    let b = &mut state.boundary;
    sync.exchange_scalars(&mut [
        (&state.h[..], &mut b.h[..]),
        (&state.rho[..], &mut b.rho[..]),
        (&state.cw[..], &mut b.cw[..]),
        (&state.rhoh[..], &mut b.rhoh[..]),
        (&state.cwh[..], &mut b.cwh[..]),
    ])?;
    sync.exchange_vectors(&state.us, &mut b.us)
}

/// pb·h/2 的边值：物理边界零梯度，交界取 ghost 平均
fn pbh2_edges(
    mesh: &FaMesh,
    bcs: &BoundaryConditions,
    state: &mut FlowState,
    sync: &mut DistributedSync,
) -> DfResult<Vec<f64>> {
    let face: Vec<f64> = state.pb.iter().zip(&state.h).map(|(p, h)| p * h / 2.0).collect();
    let n_internal = mesh.n_internal_edges();
    let coupled = bcs.coupled();
    for (slot, edge) in mesh.edges()[n_internal..].iter().enumerate() {
        if !coupled[slot] {
            state.boundary.pbh2[slot] = face[edge.owner];
        }
    }
    sync.exchange_scalars(&mut [(&face[..], &mut state.boundary.pbh2[..])])?;
    Ok(interpolate_scalar(
        mesh,
        &face,
        BoundaryScalar {
            values: &state.boundary.pbh2,
            coupled,
        },
    ))
}

/// 向量场拆为三个分量
fn components(v: &[DVec3]) -> [Vec<f64>; 3] {
    [
        v.iter().map(|u| u.x).collect(),
        v.iter().map(|u| u.y).collect(),
        v.iter().map(|u| u.z).collect(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls(min: usize, max: usize) -> SolutionControls {
        SolutionControls::default()
            .with_correctors(min, max)
            .with_residual_max(1e-3, 1e-3, 1e-3)
    }

    #[test]
    fn test_converged_after_min_correctors() {
        let c = controls(2, 10);
        let p = StepPhase::Iterating;
        assert_eq!(p.advance(0, true, &c), StepPhase::Iterating);
        assert_eq!(p.advance(1, true, &c), StepPhase::Iterating);
        assert_eq!(p.advance(2, true, &c), StepPhase::Converged);
        assert_eq!(StepPhase::Converged.advance(2, true, &c), StepPhase::FinalPass);
        assert_eq!(StepPhase::FinalPass.advance(3, false, &c), StepPhase::Done);
    }

    #[test]
    fn test_max_iterations() {
        let c = controls(0, 3);
        let p = StepPhase::Iterating;
        assert_eq!(p.advance(2, false, &c), StepPhase::Iterating);
        assert_eq!(p.advance(3, false, &c), StepPhase::MaxIterReached);
        assert_eq!(StepPhase::MaxIterReached.advance(3, false, &c), StepPhase::FinalPass);
    }

    #[test]
    fn test_residual_thresholds_are_strict() {
        let c = controls(0, 3);
        let r = Residuals {
            rhoh: 1e-4,
            cwh: 1e-4,
            us: 1e-3,
        };
        assert!(!r.below(&c));
        let r = Residuals { us: 5e-4, ..r };
        assert!(r.below(&c));
        // 阈值为零时永不达标
        assert!(!Residuals::default().below(&SolutionControls::default()));
    }
}
