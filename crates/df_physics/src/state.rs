// crates/df_physics/src/state.rs

//! 流动状态
//!
//! 面心场为主要未知量与导出量，边场为体积/质量通量，
//! 边界值按边界槽位（`e - n_internal`）存放，分区交界槽位保存 ghost 值。
//!
//! # 一致性
//!
//! 每次内迭代求解 rhoh、Cwh 后由 [`FlowState::rederive`] 重新导出
//! h、Cw、rho、Cv，并回写守恒量，保证：
//!
//! - `rho = rho_w·Cw + rho_s·(1 - Cw)`，`rho_w ≤ rho ≤ rho_s`
//! - `0 ≤ Cw ≤ 1`，`h ≥ hmin`
//! - `rhoh = rho·h`，`Cwh = Cw·h`

use df_foundation::SMALL;
use df_mesh::{DVec3, FaMesh};
use serde::Serialize;

use crate::types::MaterialParams;

/// 单个面由守恒量导出的状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    /// 流深
    pub h: f64,
    /// 含水率
    pub cw: f64,
    /// 密度
    pub rho: f64,
    /// rho·h
    pub rhoh: f64,
    /// Cw·h
    pub cwh: f64,
}

/// 由 (rhoh, Cwh) 导出 (h, Cw, rho) 并回写守恒量
///
/// 混合物体积 `h = (rhoh + (rho_s - rho_w)·Cwh) / rho_s`。
#[inline]
pub fn derive(rhoh: f64, cwh: f64, params: &MaterialParams) -> Derived {
    let h_raw = (rhoh + (params.rho_s - params.rho_w) * cwh) / params.rho_s;
    let cw = if h_raw > SMALL {
        (cwh / h_raw).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let h = h_raw.max(params.hmin);
    let rho = params.rho_w * cw + params.rho_s * (1.0 - cw);
    Derived {
        h,
        cw,
        rho,
        rhoh: rho * h,
        cwh: cw * h,
    }
}

/// 边界值
#[derive(Debug, Clone, Default)]
pub struct BoundaryValues {
    /// 流深
    pub h: Vec<f64>,
    /// 密度
    pub rho: Vec<f64>,
    /// 含水率
    pub cw: Vec<f64>,
    /// rho·h
    pub rhoh: Vec<f64>,
    /// Cw·h
    pub cwh: Vec<f64>,
    /// 速度
    pub us: Vec<DVec3>,
    /// pb·h/2
    pub pbh2: Vec<f64>,
}

impl BoundaryValues {
    /// 零初始化
    pub fn new(n_slots: usize) -> Self {
        Self {
            h: vec![0.0; n_slots],
            rho: vec![0.0; n_slots],
            cw: vec![0.0; n_slots],
            rhoh: vec![0.0; n_slots],
            cwh: vec![0.0; n_slots],
            us: vec![DVec3::ZERO; n_slots],
            pbh2: vec![0.0; n_slots],
        }
    }

    /// 槽位数
    pub fn len(&self) -> usize {
        self.h.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.h.is_empty()
    }
}

/// 有限面积流动状态
#[derive(Debug, Clone)]
pub struct FlowState {
    // ===== 面心主变量 =====
    /// 流深 [m]
    pub h: Vec<f64>,
    /// 深度平均速度 [m/s]
    pub us: Vec<DVec3>,
    /// 混合物密度 [kg/m³]
    pub rho: Vec<f64>,
    /// 含水率
    pub cw: Vec<f64>,
    /// 固体体积浓度 1 - Cw
    pub cv: Vec<f64>,
    /// rho·h [kg/m²]
    pub rhoh: Vec<f64>,
    /// Cw·h [m]
    pub cwh: Vec<f64>,

    // ===== 底部应力 =====
    /// 底部压力 [Pa]
    pub pb: Vec<f64>,
    /// 底部剪应力 [Pa]
    pub tau: Vec<DVec3>,

    // ===== 侵蚀/淤积与地形 =====
    /// 可侵蚀层厚度 [m]
    pub he: Vec<f64>,
    /// 初始可侵蚀层厚度 [m]
    pub he0: Vec<f64>,
    /// 待施加到网格的高程变化 [m]
    pub deltah: Vec<f64>,
    /// 累计可侵蚀层变化 he - he0 [m]
    pub deltah0: Vec<f64>,
    /// 面心高程相对初始值的变化 [m]
    pub deltac0: Vec<f64>,
    /// 初始面心高程 [m]
    pub c0z: Vec<f64>,
    /// 侵蚀速率 [m/s]
    pub sm: Vec<f64>,
    /// 淤积速率 [m/s]
    pub sd: Vec<f64>,
    /// 本步高程增量 (Sd - Sm)·Δt [m]
    pub deltahh: Vec<f64>,

    // ===== 旧时刻 =====
    /// 上一时刻 rhoh
    pub rhoh_old: Vec<f64>,
    /// 上一时刻 Cwh
    pub cwh_old: Vec<f64>,
    /// 上一时刻速度
    pub us_old: Vec<DVec3>,
    /// 上一时刻面积
    pub area_old: Vec<f64>,

    // ===== 边场 =====
    /// 体积通量 Us·Le [m²/s]
    pub phis: Vec<f64>,
    /// 质量通量（rhoh 方程的边通量）[kg/s]
    pub phi2s: Vec<f64>,
    /// Cwh 方程的边通量 [m³/s]
    pub phi_cwh: Vec<f64>,
    /// 混合物体积通量 [m³/s]
    pub q: Vec<f64>,

    /// 边界值
    pub boundary: BoundaryValues,
}

impl FlowState {
    /// 全零状态
    pub fn new(mesh: &FaMesh) -> Self {
        let nf = mesh.n_faces();
        let ne = mesh.n_edges();
        let zeros = || vec![0.0; nf];
        Self {
            h: zeros(),
            us: vec![DVec3::ZERO; nf],
            rho: zeros(),
            cw: zeros(),
            cv: zeros(),
            rhoh: zeros(),
            cwh: zeros(),
            pb: zeros(),
            tau: vec![DVec3::ZERO; nf],
            he: zeros(),
            he0: zeros(),
            deltah: zeros(),
            deltah0: zeros(),
            deltac0: zeros(),
            c0z: mesh.centres().iter().map(|c| c.z).collect(),
            sm: zeros(),
            sd: zeros(),
            deltahh: zeros(),
            rhoh_old: zeros(),
            cwh_old: zeros(),
            us_old: vec![DVec3::ZERO; nf],
            area_old: mesh.areas().to_vec(),
            phis: vec![0.0; ne],
            phi2s: vec![0.0; ne],
            phi_cwh: vec![0.0; ne],
            q: vec![0.0; ne],
            boundary: BoundaryValues::new(ne - mesh.n_internal_edges()),
        }
    }

    /// 面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.h.len()
    }

    /// 由守恒量重新导出 h、Cw、rho、Cv 并回写 rhoh、Cwh
    pub fn rederive(&mut self, params: &MaterialParams) {
        for i in 0..self.n_faces() {
            let d = derive(self.rhoh[i], self.cwh[i], params);
            self.h[i] = d.h;
            self.cw[i] = d.cw;
            self.rho[i] = d.rho;
            self.rhoh[i] = d.rhoh;
            self.cwh[i] = d.cwh;
            self.cv[i] = 1.0 - d.cw;
        }
    }

    /// 保存旧时刻值
    pub fn store_old(&mut self, mesh: &FaMesh) {
        self.rhoh_old.clone_from(&self.rhoh);
        self.cwh_old.clone_from(&self.cwh);
        self.us_old.clone_from(&self.us);
        self.area_old = mesh.areas().to_vec();
    }

    /// 速度模
    pub fn mag_us(&self) -> Vec<f64> {
        self.us.iter().map(|u| u.length()).collect()
    }

    /// 剪应力模
    pub fn mag_tau(&self) -> Vec<f64> {
        self.tau.iter().map(|t| t.length()).collect()
    }

    /// 本分区总质量 Σ rhoh·A [kg]
    pub fn total_mass(&self, areas: &[f64]) -> f64 {
        self.rhoh.iter().zip(areas).map(|(m, a)| m * a).sum()
    }

    /// 本分区混合物总体积 Σ (rhoh + (rho_s - rho_w)·Cwh)/rho_s·A [m³]
    pub fn total_volume(&self, areas: &[f64], params: &MaterialParams) -> f64 {
        self.rhoh
            .iter()
            .zip(&self.cwh)
            .zip(areas)
            .map(|((m, c), a)| (m + (params.rho_s - params.rho_w) * c) / params.rho_s * a)
            .sum()
    }

    /// 检查物理约束，返回第一处违反的说明
    pub fn check_bounds(&self, params: &MaterialParams) -> Option<String> {
        let tol = 1e-9;
        for i in 0..self.n_faces() {
            if self.h[i] < params.hmin * (1.0 - tol) {
                return Some(format!("face {i}: h = {} < hmin", self.h[i]));
            }
            if self.cw[i] < -tol || self.cw[i] > 1.0 + tol {
                return Some(format!("face {i}: Cw = {}", self.cw[i]));
            }
            if self.rho[i] < params.rho_w * (1.0 - tol) || self.rho[i] > params.rho_s * (1.0 + tol) {
                return Some(format!("face {i}: rho = {}", self.rho[i]));
            }
            if self.pb[i] < 0.0 {
                return Some(format!("face {i}: pb = {}", self.pb[i]));
            }
        }
        None
    }
}

/// 输出用的面心场快照
#[derive(Debug, Clone, Serialize)]
pub struct FieldSnapshot {
    /// 流深
    pub h: Vec<f64>,
    /// 速度
    #[serde(rename = "Us")]
    pub us: Vec<[f64; 3]>,
    /// 密度
    pub rho: Vec<f64>,
    /// 体积浓度
    #[serde(rename = "Cv")]
    pub cv: Vec<f64>,
    /// 底部压力
    pub pb: Vec<f64>,
    /// 可侵蚀层厚度
    pub he: Vec<f64>,
    /// 可侵蚀层变化（未启用地形修正时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deltah0: Option<Vec<f64>>,
    /// 面心高程变化（启用地形修正时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deltac0: Option<Vec<f64>>,
}

impl FieldSnapshot {
    /// 从状态提取
    pub fn capture(state: &FlowState, terrain_modification: bool) -> Self {
        Self {
            h: state.h.clone(),
            us: state.us.iter().map(|u| u.to_array()).collect(),
            rho: state.rho.clone(),
            cv: state.cv.clone(),
            pb: state.pb.clone(),
            he: state.he.clone(),
            deltah0: (!terrain_modification).then(|| state.deltah0.clone()),
            deltac0: terrain_modification.then(|| state.deltac0.clone()),
        }
    }
}
