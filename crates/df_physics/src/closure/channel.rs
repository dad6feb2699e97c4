// crates/df_physics/src/closure/channel.rs

//! 入流边界的断面几何与流深分配
//!
//! 摩擦模型给出断面平均的均匀流解 (ut, htu)，再按边底高程把流深分配到各边：
//!
//! ```text
//! z_top = (q/ut + Σ_wet z_i·w_i) / Σ_wet w_i
//! ht_i  = max(z_top - z_i, 0)
//! ```
//!
//! 湿边集合随 `ht_i > 0` 更新，最多 5 次；不收敛时退回均匀流深并标记。

use df_foundation::{DfError, DfResult, SMALL};
use df_mesh::{DVec3, FaMesh};

/// 流深分配的最大迭代次数
pub const MAX_APPORTION_ITER: usize = 5;

/// 边界片的断面几何，构建后只读
#[derive(Debug, Clone)]
pub struct ChannelProfile {
    /// 局部边号
    pub edges: Vec<usize>,
    /// 边的所属面
    pub owners: Vec<usize>,
    /// 边宽 |Le|
    pub wide: Vec<f64>,
    /// 边中点高程
    pub height: Vec<f64>,
    /// 所属面的坡度 [deg]
    pub slope: Vec<f64>,
    /// 入流方向，边法向分量为 1
    pub direction: Vec<DVec3>,
}

impl ChannelProfile {
    /// 从边界片构建
    ///
    /// `axis·sign` 与边法向近乎垂直时无法给出入流方向，返回配置错误。
    pub fn new(mesh: &FaMesh, patch: usize, axis: DVec3, sign: f64) -> DfResult<Self> {
        let patch_ref = &mesh.patches()[patch];
        let n = patch_ref.size;
        let mut profile = Self {
            edges: Vec::with_capacity(n),
            owners: Vec::with_capacity(n),
            wide: Vec::with_capacity(n),
            height: Vec::with_capacity(n),
            slope: Vec::with_capacity(n),
            direction: Vec::with_capacity(n),
        };

        for e in patch_ref.edges() {
            let owner = mesh.edge(e).owner;
            let le = mesh.le()[e];
            let wide = mesh.mag_le()[e];
            let cos = (le / (wide + SMALL)).dot(axis).abs();
            if cos <= 1e-6 {
                return Err(DfError::invalid_config(
                    "hydrographs.direction",
                    format!("{axis:?}"),
                    format!("边界 '{}' 的边 {e} 与入流方向平行", patch_ref.name),
                ));
            }
            profile.edges.push(e);
            profile.owners.push(owner);
            profile.wide.push(wide);
            profile.height.push(mesh.edge_centres()[e].z);
            profile.slope.push(face_slope_deg(mesh.normals()[owner]));
            profile.direction.push(axis * sign / cos);
        }
        Ok(profile)
    }

    /// 边数
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// 是否为空（分区后本分区可能不含该边界）
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 总宽度 B = Σw
    pub fn total_width(&self) -> f64 {
        self.wide.iter().sum()
    }

    /// 面系数在所属面上的平均
    pub fn average(&self, field: &[f64]) -> f64 {
        if self.owners.is_empty() {
            return 0.0;
        }
        self.owners.iter().map(|&f| field[f]).sum::<f64>() / self.owners.len() as f64
    }

    /// 按宽度加权的平均坡度 [rad]
    pub fn mean_slope_rad(&self) -> f64 {
        let b = self.total_width();
        if b <= 0.0 {
            return 0.0;
        }
        self.wide
            .iter()
            .zip(&self.slope)
            .map(|(w, s)| w * s.to_radians())
            .sum::<f64>()
            / b
    }
}

/// 由面法向求坡度 [deg]
#[inline]
pub fn face_slope_deg(n: DVec3) -> f64 {
    (n.x.hypot(n.y) / n.z.abs().max(SMALL)).atan().to_degrees()
}

/// 断面均匀流解
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformFlow {
    /// 断面平均速度
    pub ut: f64,
    /// 均匀流深
    pub htu: f64,
    /// 是否退回临界流
    pub critical: bool,
}

impl UniformFlow {
    /// 无流量
    pub const ZERO: Self = Self {
        ut: 0.0,
        htu: 0.0,
        critical: false,
    };
}

/// 临界流解：坡度或阻力退化时使用
pub fn critical_flow(q: f64, width: f64, g: f64) -> UniformFlow {
    let unit_q = q / width.max(SMALL);
    let htu = unit_q.powf(2.0 / 3.0) / g.cbrt();
    UniformFlow {
        ut: (g * htu).sqrt(),
        htu,
        critical: true,
    }
}

/// 边界流动：每条边的流深与统一的断面速度
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFlow {
    /// 断面平均速度
    pub ut: f64,
    /// 各边流深
    pub ht: Vec<f64>,
    /// 流深分配未收敛，使用了均匀流深
    pub fallback: bool,
    /// 使用了临界流解
    pub critical: bool,
}

/// 按边底高程分配流深
///
/// 返回 `(ht, fallback)`。
pub fn apportion(profile: &ChannelProfile, q: f64, flow: UniformFlow) -> (Vec<f64>, bool) {
    let n = profile.len();
    if q <= 0.0 || flow.ut <= SMALL {
        return (vec![0.0; n], false);
    }

    let area = q / flow.ut;
    let mut wet = vec![true; n];
    for _ in 0..MAX_APPORTION_ITER {
        let (zw, w) = profile
            .height
            .iter()
            .zip(&profile.wide)
            .zip(&wet)
            .filter(|(_, &is_wet)| is_wet)
            .fold((0.0, 0.0), |(zw, w), ((z, wi), _)| (zw + z * wi, w + wi));
        if w <= SMALL {
            break;
        }
        let z_top = (area + zw) / w;
        let ht: Vec<f64> = profile
            .height
            .iter()
            .map(|z| (z_top - z).max(0.0))
            .collect();
        let new_wet: Vec<bool> = ht.iter().map(|&h| h > 0.0).collect();
        if new_wet == wet {
            return (ht, false);
        }
        wet = new_wet;
    }

    tracing::warn!(
        edges = n,
        q,
        htu = flow.htu,
        "入流边界流深分配未收敛, 使用均匀流深"
    );
    (vec![flow.htu; n], true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_mesh::RectMeshGenerator;

    fn flat_profile(heights: &[f64]) -> ChannelProfile {
        let n = heights.len();
        ChannelProfile {
            edges: (0..n).collect(),
            owners: vec![0; n],
            wide: vec![1.0; n],
            height: heights.to_vec(),
            slope: vec![0.0; n],
            direction: vec![DVec3::X; n],
        }
    }

    #[test]
    fn test_profile_from_mesh() {
        let mesh = RectMeshGenerator::new(2, 3, 1.0, 1.0).build_inclined(0.1, 0.0).unwrap();
        let left = mesh.patch_id("left").unwrap();
        let p = ChannelProfile::new(&mesh, left, DVec3::X, 1.0).unwrap();
        assert_eq!(p.len(), 3);
        assert!((p.total_width() - 3.0).abs() < 1e-12);
        let expected = 0.1f64.atan().to_degrees();
        assert!(p.slope.iter().all(|s| (s - expected).abs() < 1e-9));
        // 入流方向的边法向分量为 1
        for (k, &e) in p.edges.iter().enumerate() {
            let unit = mesh.le()[e] / mesh.mag_le()[e];
            assert!((p.direction[k].dot(unit).abs() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parallel_direction_rejected() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let left = mesh.patch_id("left").unwrap();
        assert!(ChannelProfile::new(&mesh, left, DVec3::Y, 1.0).is_err());
    }

    #[test]
    fn test_flat_apportion_is_uniform() {
        let p = flat_profile(&[0.0, 0.0, 0.0, 0.0]);
        let flow = UniformFlow {
            ut: 2.0,
            htu: 0.125,
            critical: false,
        };
        let (ht, fallback) = apportion(&p, 1.0, flow);
        assert!(!fallback);
        for h in ht {
            assert!((h - 0.125).abs() < 1e-12);
        }
    }

    #[test]
    fn test_apportion_fills_lowest_edges() {
        let p = flat_profile(&[0.0, 0.0, 5.0]);
        let flow = UniformFlow {
            ut: 1.0,
            htu: 0.1,
            critical: false,
        };
        let (ht, fallback) = apportion(&p, 1.0, flow);
        assert!(!fallback);
        assert!((ht[0] - 0.5).abs() < 1e-12);
        assert!((ht[1] - 0.5).abs() < 1e-12);
        assert_eq!(ht[2], 0.0);
        // 过流面积守恒
        let a: f64 = ht.iter().zip(&p.wide).map(|(h, w)| h * w).sum();
        assert!((a * flow.ut - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_apportion_falls_back_after_pass_limit() {
        // 湿边集合每轮减半，MAX_APPORTION_ITER 轮内无法稳定
        let heights: Vec<f64> = (0..100).map(f64::from).collect();
        let p = flat_profile(&heights);
        let flow = UniformFlow {
            ut: 1.0,
            htu: 0.02,
            critical: false,
        };
        let (ht, fallback) = apportion(&p, 1e-3, flow);
        assert!(fallback);
        assert_eq!(ht.len(), 100);
        assert!(ht.iter().all(|&h| h == flow.htu));
    }

    #[test]
    fn test_zero_discharge() {
        let p = flat_profile(&[0.0, 1.0]);
        let (ht, fallback) = apportion(&p, 0.0, UniformFlow::ZERO);
        assert_eq!(ht, vec![0.0, 0.0]);
        assert!(!fallback);
    }

    #[test]
    fn test_critical_flow() {
        let f = critical_flow(2.0, 2.0, 9.81);
        assert!(f.critical);
        // q = ut·htu
        assert!((f.ut * f.htu - 1.0).abs() < 1e-12);
    }
}
