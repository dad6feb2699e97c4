// crates/df_physics/src/terrain/modifier.rs

//! 地形修正
//!
//! 输入为本步累计的高程变化 deltah（沿面法向），流程：
//!
//! 1. `deltavol = A·deltah`，`deltah /= nz` 转为竖直变化，先平滑一次
//! 2. 未收敛时循环（至多 `nTerrainIter` 轮）：
//!    - 收集邻居分区的 h 与 deltah，按点权插值到网格点
//!    - 插值流深大于 `hMinterrain` 的点竖直移动 `deltah_p·alpha_relax`
//!    - 扫掠体积计入 deltavol，由新几何重算 deltah，再平滑
//! 3. `deltah *= nz` 转回法向
//!
//! 收敛判据为 `max|deltah| ≤ deltahMin`。迭代用尽不是错误，记录警告后保留当前几何。

use df_config::TerrainModificationCoeffs;
use df_foundation::DfResult;
use df_mesh::{FaMesh, PointWeights};
use serde::Serialize;

use super::smoother::{smooth, vertical_change};
use crate::parallel::DistributedSync;

/// 一次地形修正的结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TerrainReport {
    /// 网格点移动轮数
    pub iterations: usize,
    /// 是否满足 deltahMin
    pub converged: bool,
    /// 平滑总遍数
    pub smoothing_passes: usize,
    /// 结束时全局 max|deltah|（竖直）
    pub max_abs_deltah: f64,
    /// 开始时全局 Σ deltavol
    pub initial_volume: f64,
    /// 结束时全局 Σ deltavol
    pub final_volume: f64,
    /// 全局扫掠体积
    pub swept_volume: f64,
}

impl TerrainReport {
    /// 未执行任何修正
    pub fn idle() -> Self {
        Self {
            iterations: 0,
            converged: true,
            smoothing_passes: 0,
            max_abs_deltah: 0.0,
            initial_volume: 0.0,
            final_volume: 0.0,
            swept_volume: 0.0,
        }
    }
}

/// 地形修正器：系数与点权在构建时确定
#[derive(Debug, Clone)]
pub struct TerrainModifier {
    coeffs: TerrainModificationCoeffs,
    weights: PointWeights,
}

impl TerrainModifier {
    /// 创建
    pub fn new(coeffs: TerrainModificationCoeffs, weights: PointWeights) -> Self {
        Self { coeffs, weights }
    }

    /// 系数
    pub fn coeffs(&self) -> &TerrainModificationCoeffs {
        &self.coeffs
    }

    /// 对网格施加高程变化
    ///
    /// `h` 为面心流深，`deltah` 进入时为待施加的法向高程变化，
    /// 返回时为未能施加的剩余部分。
    pub fn apply(
        &self,
        mesh: &mut FaMesh,
        sync: &mut DistributedSync,
        h: &[f64],
        deltah: &mut [f64],
    ) -> DfResult<TerrainReport> {
        let c = &self.coeffs;
        let nf = mesh.n_faces();

        let mut nz = mesh.nz();
        let mut deltavol: Vec<f64> = deltah.iter().zip(mesh.areas()).map(|(d, a)| d * a).collect();
        for (d, n) in deltah.iter_mut().zip(&nz) {
            *d /= n;
        }
        let initial_volume = sync.all_reduce_sum(deltavol.iter().sum())?;

        let mut outcome = smooth(mesh, sync, deltah, &mut deltavol, c)?;
        let mut smoothing_passes = outcome.passes;
        let outside = |min: f64, max: f64| max > c.deltah_min || min < -c.deltah_min;

        let mut iterations = 0;
        let mut swept_local = 0.0;
        while iterations < c.n_terrain_iter && outside(outcome.min, outcome.max) {
            iterations += 1;

            let gh = sync.gather_neighbours(h)?;
            let gd = sync.gather_neighbours(deltah)?;
            let dz: Vec<f64> = (0..mesh.n_points())
                .map(|p| {
                    if self.weights.interpolate(p, &gh) > c.h_min_terrain {
                        self.weights.interpolate(p, &gd) * c.alpha_relax
                    } else {
                        0.0
                    }
                })
                .collect();

            let swept = mesh.move_points_vertical(&dz)?;
            nz = mesh.nz();
            let areas = mesh.areas();
            for i in 0..nf {
                deltavol[i] += swept[i];
                deltah[i] = vertical_change(deltavol[i], areas[i], nz[i]);
            }
            swept_local += swept.iter().sum::<f64>();

            outcome = smooth(mesh, sync, deltah, &mut deltavol, c)?;
            smoothing_passes += outcome.passes;
            tracing::debug!(
                iteration = iterations,
                min = outcome.min,
                max = outcome.max,
                "地形修正迭代"
            );
        }

        let converged = !outside(outcome.min, outcome.max);
        let max_abs_deltah = outcome.max.abs().max(outcome.min.abs());
        if !converged {
            tracing::warn!(
                iterations,
                max_abs_deltah,
                deltah_min = c.deltah_min,
                "地形修正达到迭代上限"
            );
        }

        for (d, n) in deltah.iter_mut().zip(&nz) {
            *d *= n;
        }
        let final_volume = sync.all_reduce_sum(deltavol.iter().sum())?;
        let swept_volume = sync.all_reduce_sum(swept_local)?;

        Ok(TerrainReport {
            iterations,
            converged,
            smoothing_passes,
            max_abs_deltah,
            initial_volume,
            final_volume,
            swept_volume,
        })
    }
}
