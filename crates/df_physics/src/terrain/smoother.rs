// crates/df_physics/src/terrain/smoother.rs

//! 高程变化平滑
//!
//! 单遍平滑对每个面 i 取邻域（面邻居与跨分区 ghost，含自身）：
//!
//! ```text
//! avg_i = (d_i + Σ d_j) / (N + 1)
//! σ_i   = max(d) - min(d)
//! Γ_i   = 0 若 |d_i - avg_i| ≤ α_γ·σ_i，否则 1
//! ΔV_i  = (d_i - avg_i)·β_γ·Γ_i·A_i·nz_i
//! ```
//!
//! ΔV_i 按 `A_j / Σ_邻居 A` 分给位于平均值另一侧的邻居，
//! 转出与转入总量相等，Σ deltavol 不变。所有转移都基于本遍开始时的 d，
//! 结果与面的遍历顺序无关。

use df_config::TerrainModificationCoeffs;
use df_foundation::{DfResult, SMALL};
use df_mesh::FaMesh;

use crate::parallel::{DistributedSync, ReduceOp};

/// 一次平滑调用的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothOutcome {
    /// 实际执行的遍数
    pub passes: usize,
    /// 平滑后全局最小 deltah
    pub min: f64,
    /// 平滑后全局最大 deltah
    pub max: f64,
}

/// 由体积恢复竖直高程变化
#[inline]
pub(crate) fn vertical_change(volume: f64, area: f64, nz: f64) -> f64 {
    volume / (area + SMALL) / nz
}

/// deltah 的全局 (min, max)
pub(crate) fn global_range(sync: &mut DistributedSync, deltah: &[f64]) -> DfResult<(f64, f64)> {
    let hi = deltah.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lo = deltah.iter().copied().fold(f64::INFINITY, f64::min);
    let r = sync.all_reduce(&[hi, -lo], ReduceOp::Max)?;
    Ok((-r[1], r[0]))
}

/// 在阈值外时重复平滑，至多 `nSmoothPasses` 遍
///
/// 阈值为 `alpha_smooth·deltahMin`；某一遍没有任何转移时提前结束。
/// `deltah` 为竖直高程变化，`deltavol` 为对应体积，二者同时更新。
pub fn smooth(
    mesh: &FaMesh,
    sync: &mut DistributedSync,
    deltah: &mut [f64],
    deltavol: &mut [f64],
    coeffs: &TerrainModificationCoeffs,
) -> DfResult<SmoothOutcome> {
    let threshold = coeffs.alpha_smooth * coeffs.deltah_min;
    let (mut min, mut max) = global_range(sync, deltah)?;
    let mut passes = 0;

    while passes < coeffs.n_smooth_passes && (max > threshold || min < -threshold) {
        let moved = smooth_pass(mesh, sync, deltah, deltavol, coeffs)?;
        passes += 1;
        (min, max) = global_range(sync, deltah)?;
        tracing::debug!(pass = passes, min, max, moved, "deltah 平滑");
        if moved <= 0.0 {
            break;
        }
    }
    Ok(SmoothOutcome { passes, min, max })
}

/// 单遍平滑，返回全局转移体积 Σ|ΔV|
pub fn smooth_pass(
    mesh: &FaMesh,
    sync: &mut DistributedSync,
    deltah: &mut [f64],
    deltavol: &mut [f64],
    coeffs: &TerrainModificationCoeffs,
) -> DfResult<f64> {
    let nf = mesh.n_faces();
    let n_slots = mesh.n_edges() - mesh.n_internal_edges();
    let areas = mesh.areas();
    let nz = mesh.nz();

    let mut ghost_d = vec![0.0; n_slots];
    let mut ghost_a = vec![0.0; n_slots];
    sync.exchange_scalars(&mut [(&*deltah, &mut ghost_d[..]), (areas, &mut ghost_a[..])])?;

    // 面 -> 交界槽位
    let mut face_ghosts: Vec<Vec<usize>> = vec![Vec::new(); nf];
    for link in sync.links() {
        for (&slot, &owner) in link.slots.iter().zip(&link.owners) {
            face_ghosts[owner].push(slot);
        }
    }

    let d = deltah.to_vec();
    let mut outgoing = vec![0.0; n_slots];
    let mut moved = 0.0;

    for i in 0..nf {
        let faces = mesh.face_neighbours(i);
        let ghosts = &face_ghosts[i];
        let count = faces.len() + ghosts.len();
        if count == 0 {
            continue;
        }

        let neighbour_values = faces.iter().map(|&j| d[j]).chain(ghosts.iter().map(|&s| ghost_d[s]));
        let (mut lo, mut hi, mut sum) = (d[i], d[i], d[i]);
        for v in neighbour_values {
            lo = lo.min(v);
            hi = hi.max(v);
            sum += v;
        }
        let avg = sum / (count + 1) as f64;
        let sigma = hi - lo;
        let excess = d[i] - avg;
        if excess.abs() <= coeffs.alpha_gamma * sigma || excess == 0.0 {
            continue;
        }

        let catches = |v: f64| if excess > 0.0 { v < avg } else { v > avg };
        let sum_an: f64 =
            faces.iter().map(|&j| areas[j]).sum::<f64>() + ghosts.iter().map(|&s| ghost_a[s]).sum::<f64>();
        if sum_an <= 0.0 {
            continue;
        }
        let dv_max = excess * coeffs.beta_gamma * areas[i] * nz[i];

        for &j in faces.iter().filter(|&&j| catches(d[j])) {
            let share = dv_max * areas[j] / sum_an;
            deltavol[j] += share;
            deltavol[i] -= share;
            moved += share.abs();
        }
        for &s in ghosts.iter().filter(|&&s| catches(ghost_d[s])) {
            let share = dv_max * ghost_a[s] / sum_an;
            outgoing[s] += share;
            deltavol[i] -= share;
            moved += share.abs();
        }
    }

    let incoming = sync.exchange_edge_values(&outgoing)?;
    for link in sync.links() {
        for (&slot, &owner) in link.slots.iter().zip(&link.owners) {
            deltavol[owner] += incoming[slot];
        }
    }

    for i in 0..nf {
        deltah[i] = vertical_change(deltavol[i], areas[i], nz[i]);
    }
    sync.all_reduce_sum(moved)
}
