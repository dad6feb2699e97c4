// crates/df_physics/src/numerics/fam/operators.rs

//! 显式有限面积算子
//!
//! 边值由线性插值得到；边界边取调用方给出的边界值，
//! 分区交界边（`coupled`）取本侧面值与 ghost 值的平均。
//! 梯度与散度采用 Gauss 公式 `(1/A) Σ_e s_e·Le·v_e`，其中 s_e 为面对边的朝向。

use df_mesh::{DVec3, FaMesh};

/// 标量边界值（按边界槽位 `e - n_internal` 索引）
#[derive(Debug, Clone, Copy)]
pub struct BoundaryScalar<'a> {
    /// 边界值或 ghost 值
    pub values: &'a [f64],
    /// 是否为分区交界
    pub coupled: &'a [bool],
}

/// 向量边界值
#[derive(Debug, Clone, Copy)]
pub struct BoundaryVector<'a> {
    /// 边界值或 ghost 值
    pub values: &'a [DVec3],
    /// 是否为分区交界
    pub coupled: &'a [bool],
}

/// 标量线性插值到边
pub fn interpolate_scalar(mesh: &FaMesh, field: &[f64], bnd: BoundaryScalar<'_>) -> Vec<f64> {
    let n_internal = mesh.n_internal_edges();
    let w = mesh.weights();
    mesh.edges()
        .iter()
        .enumerate()
        .map(|(e, edge)| match edge.neighbour {
            Some(nb) => w[e] * field[edge.owner] + (1.0 - w[e]) * field[nb],
            None => {
                let slot = e - n_internal;
                if bnd.coupled[slot] {
                    0.5 * (field[edge.owner] + bnd.values[slot])
                } else {
                    bnd.values[slot]
                }
            }
        })
        .collect()
}

/// 向量线性插值到边
pub fn interpolate_vector(mesh: &FaMesh, field: &[DVec3], bnd: BoundaryVector<'_>) -> Vec<DVec3> {
    let n_internal = mesh.n_internal_edges();
    let w = mesh.weights();
    mesh.edges()
        .iter()
        .enumerate()
        .map(|(e, edge)| match edge.neighbour {
            Some(nb) => w[e] * field[edge.owner] + (1.0 - w[e]) * field[nb],
            None => {
                let slot = e - n_internal;
                if bnd.coupled[slot] {
                    0.5 * (field[edge.owner] + bnd.values[slot])
                } else {
                    bnd.values[slot]
                }
            }
        })
        .collect()
}

/// Σ_e s_e·Le·v_e（未除面积）
fn gauss_sum(mesh: &FaMesh, edge_values: &[f64]) -> Vec<DVec3> {
    let mut sum = vec![DVec3::ZERO; mesh.n_faces()];
    for (e, edge) in mesh.edges().iter().enumerate() {
        let contrib = mesh.le()[e] * edge_values[e];
        sum[edge.owner] += contrib;
        if let Some(nb) = edge.neighbour {
            sum[nb] -= contrib;
        }
    }
    sum
}

/// 切向 Gauss 梯度（去掉法向分量）
pub fn gauss_grad(mesh: &FaMesh, edge_values: &[f64]) -> Vec<DVec3> {
    gauss_sum(mesh, edge_values)
        .into_iter()
        .zip(mesh.areas())
        .zip(mesh.normals())
        .map(|((s, &a), &n)| {
            let g = s / a;
            g - g.dot(n) * n
        })
        .collect()
}

/// Gauss 梯度的法向分量
pub fn ngrad(mesh: &FaMesh, edge_values: &[f64]) -> Vec<f64> {
    gauss_sum(mesh, edge_values)
        .into_iter()
        .zip(mesh.areas())
        .zip(mesh.normals())
        .map(|((s, &a), &n)| (s / a).dot(n))
        .collect()
}

/// 对流散度 `div(φ, U)` 的法向分量
pub fn ndiv(mesh: &FaMesh, flux: &[f64], edge_vectors: &[DVec3]) -> Vec<f64> {
    let mut sum = vec![DVec3::ZERO; mesh.n_faces()];
    for (e, edge) in mesh.edges().iter().enumerate() {
        let contrib = flux[e] * edge_vectors[e];
        sum[edge.owner] += contrib;
        if let Some(nb) = edge.neighbour {
            sum[nb] -= contrib;
        }
    }
    sum.into_iter()
        .zip(mesh.areas())
        .zip(mesh.normals())
        .map(|((s, &a), &n)| (s / a).dot(n))
        .collect()
}

/// 本分区的面 Courant 数 `0.5·max_f(Σ_e |φ_e| / A_f)·Δt`
pub fn surface_courant(mesh: &FaMesh, flux: &[f64], dt: f64) -> f64 {
    let mut sum = vec![0.0; mesh.n_faces()];
    for (e, edge) in mesh.edges().iter().enumerate() {
        let mag = flux[e].abs();
        sum[edge.owner] += mag;
        if let Some(nb) = edge.neighbour {
            sum[nb] += mag;
        }
    }
    0.5 * sum
        .iter()
        .zip(mesh.areas())
        .map(|(s, a)| s / a)
        .fold(0.0, f64::max)
        * dt
}
