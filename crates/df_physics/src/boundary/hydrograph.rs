// crates/df_physics/src/boundary/hydrograph.rs

//! 水文过程线入流边界
//!
//! 过程线给出 (t, Q, Cv) 序列，按时间线性插值，晚于末点时取末点值，
//! 早于首点为配置错误。每步采样后由摩擦模型的边界求解器得到断面速度
//! 与各边流深，写入边界槽位：
//!
//! ```text
//! rho_t = (1 - Cv)·rho_w + Cv·rho_s,  Cw_t = 1 - Cv
//! h = ht_i,  Us = dir_i·ut,  rhoh = rho_t·ht_i,  Cwh = Cw_t·ht_i
//! ```
//!
//! 分区运行时同一边界可能分布在多个分区，流量按本分区边宽占全局边宽的比例分配。

use df_config::HydrographConfig;
use df_foundation::{DfError, DfResult};
use df_mesh::{DVec3, FaMesh};

use crate::closure::{BoundaryFlow, ChannelProfile, FrictionModel, InflowSample};
use crate::state::BoundaryValues;
use crate::types::MaterialParams;

/// 过程线查询时间的容差
const TIME_TOLERANCE: f64 = 1e-12;

/// 单条入流边界
#[derive(Debug, Clone)]
pub struct HydrographBoundary {
    name: String,
    patch: usize,
    profile: ChannelProfile,
    times: Vec<f64>,
    flows: Vec<f64>,
    cvs: Vec<f64>,
    wide: Option<f64>,
    global_width: f64,
}

impl HydrographBoundary {
    /// 在本分区网格上构建
    ///
    /// 边界片不存在时返回 [`DfError::UnknownBoundary`]。
    pub fn new(mesh: &FaMesh, config: &HydrographConfig) -> DfResult<Self> {
        config.validate()?;
        let patch = mesh
            .patch_id(&config.boundary)
            .filter(|&p| !mesh.patches()[p].is_processor())
            .ok_or_else(|| DfError::unknown_boundary(&config.boundary, mesh.physical_patch_names()))?;

        let profile = ChannelProfile::new(
            mesh,
            patch,
            DVec3::from_array(config.direction.unit()),
            config.sense.sign(),
        )?;
        let global_width = profile.total_width();

        tracing::info!(
            boundary = %config.boundary,
            edges = profile.len(),
            width = global_width,
            samples = config.times.len(),
            "入流边界已建立"
        );

        Ok(Self {
            name: config.boundary.clone(),
            patch,
            profile,
            times: config.times.clone(),
            flows: config.flows.clone(),
            cvs: config.cvs.clone(),
            wide: config.wide,
            global_width,
        })
    }

    /// 边界名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 边界片序号
    pub fn patch(&self) -> usize {
        self.patch
    }

    /// 断面几何
    pub fn profile(&self) -> &ChannelProfile {
        &self.profile
    }

    /// 本分区的边宽
    pub fn local_width(&self) -> f64 {
        self.profile.total_width()
    }

    /// 设置边界在所有分区上的总边宽
    pub fn set_global_width(&mut self, width: f64) {
        self.global_width = width;
    }

    /// 流量缩放 α = Σw/wide，未给出 wide 时为 1
    pub fn alpha(&self) -> f64 {
        match self.wide {
            Some(w) => self.global_width / w,
            None => 1.0,
        }
    }

    /// 按时间采样 (Q, Cv)
    pub fn sample(&self, t: f64) -> DfResult<(f64, f64)> {
        let t0 = self.times[0];
        if t < t0 - TIME_TOLERANCE {
            return Err(DfError::HydrographTime {
                boundary: self.name.clone(),
                time: t,
                start: t0,
            });
        }
        let last = self.times.len() - 1;
        if t >= self.times[last] {
            return Ok((self.flows[last], self.cvs[last]));
        }
        // times[k] ≤ t < times[k+1]
        let k = self.times.partition_point(|&ti| ti <= t).saturating_sub(1);
        let (ta, tb) = (self.times[k], self.times[k + 1]);
        let w = ((t - ta) / (tb - ta)).clamp(0.0, 1.0);
        let lerp = |v: &[f64]| v[k] + w * (v[k + 1] - v[k]);
        Ok((lerp(&self.flows), lerp(&self.cvs)))
    }

    /// 本分区承担的入流
    pub fn inflow(&self, t: f64, params: &MaterialParams) -> DfResult<InflowSample> {
        let (q, cv) = self.sample(t)?;
        let share = if self.global_width > 0.0 {
            self.local_width() / self.global_width
        } else {
            0.0
        };
        Ok(InflowSample {
            q: q * self.alpha() * share,
            cv,
            rho: params.density_from_cv(cv),
        })
    }

    /// 求解边界流动并写入边界槽位
    pub fn apply(
        &self,
        t: f64,
        mesh: &FaMesh,
        friction: &dyn FrictionModel,
        params: &MaterialParams,
        bnd: &mut BoundaryValues,
    ) -> DfResult<BoundaryFlow> {
        let inflow = self.inflow(t, params)?;
        let flow = friction.boundary_flow(&self.profile, &inflow, params);
        if flow.fallback {
            tracing::warn!(boundary = %self.name, t, q = inflow.q, "入流边界使用均匀流深");
        }

        let cw_t = 1.0 - inflow.cv;
        let n_internal = mesh.n_internal_edges();
        for (k, &e) in self.profile.edges.iter().enumerate() {
            let slot = e - n_internal;
            let ht = flow.ht[k];
            bnd.h[slot] = ht;
            bnd.us[slot] = self.profile.direction[k] * flow.ut;
            bnd.rho[slot] = inflow.rho;
            bnd.cw[slot] = cw_t;
            bnd.rhoh[slot] = inflow.rho * ht;
            bnd.cwh[slot] = cw_t * ht;
        }

        tracing::debug!(
            boundary = %self.name,
            t,
            q = inflow.q,
            cv = inflow.cv,
            ut = flow.ut,
            "入流边界已更新"
        );
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::friction::ManningStrickler;
    use df_config::{Axis, Sense};
    use df_mesh::RectMeshGenerator;

    fn config(times: Vec<f64>, flows: Vec<f64>, cvs: Vec<f64>) -> HydrographConfig {
        HydrographConfig {
            boundary: "left".into(),
            sense: Sense::Positive,
            direction: Axis::X,
            wide: None,
            times,
            flows,
            cvs,
        }
    }

    fn mesh() -> FaMesh {
        RectMeshGenerator::new(4, 4, 1.0, 1.0).build_inclined(-0.2, 0.0).unwrap()
    }

    #[test]
    fn test_linear_sampling() {
        let hb = HydrographBoundary::new(&mesh(), &config(vec![0.0, 10.0], vec![1.0, 3.0], vec![0.2, 0.6]))
            .unwrap();
        let (q, cv) = hb.sample(2.5).unwrap();
        assert!((q - 1.5).abs() < 1e-12);
        assert!((cv - 0.3).abs() < 1e-12);
        assert_eq!(hb.sample(0.0).unwrap(), (1.0, 0.2));
    }

    #[test]
    fn test_sampling_clamps_after_end() {
        let hb = HydrographBoundary::new(&mesh(), &config(vec![0.0, 10.0], vec![1.0, 3.0], vec![0.2, 0.6]))
            .unwrap();
        assert_eq!(hb.sample(100.0).unwrap(), (3.0, 0.6));
    }

    #[test]
    fn test_sampling_before_start_is_error() {
        let hb = HydrographBoundary::new(&mesh(), &config(vec![1.0, 10.0], vec![1.0, 3.0], vec![0.2, 0.6]))
            .unwrap();
        let err = hb.sample(0.5).unwrap_err();
        assert!(matches!(err, DfError::HydrographTime { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_step_hydrograph() {
        let hb = HydrographBoundary::new(
            &mesh(),
            &config(vec![0.0, 10.0, 10.001], vec![1.0, 1.0, 0.0], vec![0.4, 0.4, 0.4]),
        )
        .unwrap();
        assert_eq!(hb.sample(10.0).unwrap().0, 1.0);
        assert_eq!(hb.sample(20.0).unwrap().0, 0.0);
    }

    #[test]
    fn test_unknown_boundary() {
        let mut c = config(vec![0.0], vec![1.0], vec![0.3]);
        c.boundary = "inlet".into();
        let err = HydrographBoundary::new(&mesh(), &c).unwrap_err();
        assert!(matches!(err, DfError::UnknownBoundary { .. }));
    }

    #[test]
    fn test_wide_scales_discharge() {
        let mut c = config(vec![0.0], vec![2.0], vec![0.3]);
        c.wide = Some(8.0);
        let hb = HydrographBoundary::new(&mesh(), &c).unwrap();
        let inflow = hb.inflow(0.0, &MaterialParams::default()).unwrap();
        assert!((inflow.q - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_apply_sets_boundary_values() {
        let mesh = mesh();
        let hb = HydrographBoundary::new(&mesh, &config(vec![0.0], vec![1.0], vec![0.4])).unwrap();
        let params = MaterialParams::default();
        let friction = ManningStrickler {
            n: vec![0.05; mesh.n_faces()],
        };
        let mut bnd = BoundaryValues::new(mesh.n_edges() - mesh.n_internal_edges());
        let flow = hb.apply(0.0, &mesh, &friction, &params, &mut bnd).unwrap();
        assert!(flow.ut > 0.0);

        let rho_t = params.density_from_cv(0.4);
        let n_internal = mesh.n_internal_edges();
        let mut q = 0.0;
        for &e in &hb.profile().edges {
            let slot = e - n_internal;
            assert!(bnd.h[slot] > 0.0);
            assert!((bnd.rho[slot] - rho_t).abs() < 1e-9);
            assert!((bnd.rhoh[slot] - rho_t * bnd.h[slot]).abs() < 1e-9);
            assert!((bnd.cwh[slot] - 0.6 * bnd.h[slot]).abs() < 1e-12);
            // 速度指向域内（+x）
            assert!(bnd.us[slot].x > 0.0);
            q += -bnd.us[slot].dot(mesh.le()[e]) * bnd.h[slot];
        }
        // 入流流量 Σ h·(-Us·Le) = Q
        assert!((q - 1.0).abs() < 1e-9);
    }
}
