// crates/df_physics/src/closure/mod.rs

//! 闭合模型
//!
//! 摩擦、侵蚀、淤积三类模型都是当前状态的纯函数，每次调用返回新的面场，
//! 不缓存中间结果。模型在构建求解器时按配置的封闭枚举一次性选定。
//!
//! # 约定
//!
//! - 摩擦：`tau = tauSc + tauSp·Us`，`tauSp ≥ 0` 作为隐式系数进入动量方程
//! - 侵蚀 `Sm`、淤积 `Sd` 为竖向速率 [m/s]，均非负
//! - 侵蚀不超过 `he/Δt`，淤积不超过 `h/Δt`
//! - `h < h0` 或 `|Us| < u0` 的面上侵蚀与淤积为零
//!
//! # 模块
//!
//! - [`friction`]: 摩擦模型与入流边界的均匀流解
//! - [`entrainment`]: 侵蚀模型
//! - [`deposition`]: 淤积模型
//! - [`channel`]: 入流断面几何与流深分配
//! - [`field`]: 面系数场与作用区域

pub mod channel;
pub mod deposition;
pub mod entrainment;
pub mod field;
pub mod friction;

use df_config::TransportProperties;
use df_foundation::DfResult;
use df_mesh::{DVec3, FaMesh};

use crate::state::FlowState;
use crate::types::MaterialParams;

pub use channel::{apportion, critical_flow, BoundaryFlow, ChannelProfile, UniformFlow};

/// 闭合模型的输入
#[derive(Debug, Clone, Copy)]
pub struct ClosureContext<'a> {
    /// 网格
    pub mesh: &'a FaMesh,
    /// 当前状态
    pub state: &'a FlowState,
    /// 材料参数
    pub params: &'a MaterialParams,
    /// 重力的切向分量
    pub gs: &'a [DVec3],
    /// 时间步长
    pub dt: f64,
}

impl ClosureContext<'_> {
    /// 面上流动是否足以产生侵蚀/淤积
    #[inline]
    pub fn is_active(&self, i: usize, mag_u: f64) -> bool {
        self.state.h[i] >= self.params.h0 && mag_u >= self.params.u0
    }
}

/// 入流边界某时刻的采样值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InflowSample {
    /// 流量 [m³/s]
    pub q: f64,
    /// 体积浓度
    pub cv: f64,
    /// 入流密度
    pub rho: f64,
}

/// 摩擦模型
pub trait FrictionModel: Send + Sync + std::fmt::Debug {
    /// 模型名
    fn name(&self) -> &'static str;

    /// 隐式摩擦系数 tauSp
    fn tau_sp(&self, ctx: &ClosureContext<'_>) -> Vec<f64>;

    /// 显式摩擦 tauSc，内置模型均为零
    fn tau_sc(&self, ctx: &ClosureContext<'_>) -> Vec<DVec3> {
        vec![DVec3::ZERO; ctx.state.n_faces()]
    }

    /// 断面均匀流解
    fn uniform_flow(
        &self,
        profile: &ChannelProfile,
        inflow: &InflowSample,
        params: &MaterialParams,
    ) -> UniformFlow;

    /// 入流边界的速度与各边流深
    fn boundary_flow(
        &self,
        profile: &ChannelProfile,
        inflow: &InflowSample,
        params: &MaterialParams,
    ) -> BoundaryFlow {
        if inflow.q <= 0.0 || profile.is_empty() {
            return BoundaryFlow {
                ut: 0.0,
                ht: vec![0.0; profile.len()],
                fallback: false,
                critical: false,
            };
        }
        let flow = self.uniform_flow(profile, inflow, params);
        let (ht, fallback) = apportion(profile, inflow.q, flow);
        BoundaryFlow {
            ut: flow.ut,
            ht,
            fallback,
            critical: flow.critical,
        }
    }
}

/// 侵蚀模型
pub trait EntrainmentModel: Send + Sync + std::fmt::Debug {
    /// 模型名
    fn name(&self) -> &'static str;

    /// 侵蚀速率 Sm
    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64>;
}

/// 淤积模型
pub trait DepositionModel: Send + Sync + std::fmt::Debug {
    /// 模型名
    fn name(&self) -> &'static str;

    /// 淤积速率 Sd
    fn sd(&self, ctx: &ClosureContext<'_>) -> Vec<f64>;
}

/// 一组选定的闭合模型
#[derive(Debug)]
pub struct ClosureSet {
    /// 摩擦
    pub friction: Box<dyn FrictionModel>,
    /// 侵蚀
    pub entrainment: Box<dyn EntrainmentModel>,
    /// 淤积
    pub deposition: Box<dyn DepositionModel>,
}

impl ClosureSet {
    /// 按配置构建，系数场落到本分区网格的面上
    pub fn from_config(transport: &TransportProperties, mesh: &FaMesh) -> DfResult<Self> {
        transport.friction.validate()?;
        transport.entrainment.validate()?;
        transport.deposition.validate()?;

        let set = Self {
            friction: friction::build(&transport.friction, mesh),
            entrainment: entrainment::build(&transport.entrainment, mesh),
            deposition: deposition::build(&transport.deposition, mesh),
        };
        tracing::info!(
            friction = set.friction.name(),
            entrainment = set.entrainment.name(),
            deposition = set.deposition.name(),
            "闭合模型已选定"
        );
        Ok(set)
    }
}

/// 侵蚀速率截断到 `[0, he/Δt]`
#[inline]
pub(crate) fn limit_entrainment(sm: f64, he: f64, dt: f64) -> f64 {
    sm.max(0.0).min(he.max(0.0) / dt)
}

/// 面法向对应的坡角 [rad]
#[inline]
pub(crate) fn inclination(n: DVec3) -> f64 {
    (n.x.hypot(n.y) / n.z.abs().max(df_foundation::SMALL)).atan()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! 闭合模型测试共用的网格与状态

    use super::*;
    use df_mesh::RectMeshGenerator;

    /// 3x3 坡面与均匀流动状态
    pub fn sloped_case(slope: f64, h: f64, u: f64, cv: f64) -> (FaMesh, FlowState, MaterialParams, Vec<DVec3>) {
        let mesh = RectMeshGenerator::new(3, 3, 1.0, 1.0).build_inclined(-slope, 0.0).unwrap();
        let params = MaterialParams::default();
        let mut state = FlowState::new(&mesh);
        let rho = params.density_from_cv(cv);
        for i in 0..mesh.n_faces() {
            state.h[i] = h;
            state.cv[i] = cv;
            state.cw[i] = 1.0 - cv;
            state.rho[i] = rho;
            state.rhoh[i] = rho * h;
            state.cwh[i] = (1.0 - cv) * h;
            state.us[i] = DVec3::new(u, 0.0, 0.0);
            state.us_old[i] = state.us[i];
            state.pb[i] = rho * h * 9.81;
            state.he[i] = 1.0;
            state.he0[i] = 1.0;
        }
        let gs = mesh
            .normals()
            .iter()
            .map(|&n| params.g - params.g.dot(n) * n)
            .collect();
        (mesh, state, params, gs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_config::{DepositionConfig, EntrainmentConfig};
    use df_mesh::RectMeshGenerator;

    #[test]
    fn test_default_set() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let transport = TransportProperties::default();
        let set = ClosureSet::from_config(&transport, &mesh).unwrap();
        assert_eq!(set.friction.name(), "Voellmy");
        assert_eq!(set.entrainment.name(), "entrainmentOff");
        assert_eq!(set.deposition.name(), "depositionOff");
        assert_eq!(transport.entrainment, EntrainmentConfig::Off);
        assert_eq!(transport.deposition, DepositionConfig::Off);
    }

    #[test]
    fn test_limit_entrainment() {
        assert_eq!(limit_entrainment(-1.0, 1.0, 0.1), 0.0);
        assert_eq!(limit_entrainment(20.0, 1.0, 0.1), 10.0);
        assert_eq!(limit_entrainment(5.0, -1.0, 0.1), 0.0);
        assert_eq!(limit_entrainment(f64::NAN, 1.0, 0.1), 0.0);
    }
}
