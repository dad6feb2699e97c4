// crates/df_physics/src/boundary/mod.rs

//! 边界条件
//!
//! 每个边界槽位（`e - n_internal`）有一种边界条件：
//!
//! | 条件 | 标量 | 速度 |
//! |------|------|------|
//! | `Outflow` | 零梯度 | 零梯度 |
//! | `Wall` | 零梯度 | 滑移，法向分量为零 |
//! | `Inflow` | 过程线给定 | 过程线给定 |
//! | `Processor` | 邻居分区 ghost 值 | 邻居分区 ghost 值 |
//!
//! 未在配置中列出的物理边界默认为 `Outflow`。

pub mod hydrograph;

use df_config::{BoundaryKind, BoundarySpec, HydrographConfig};
use df_foundation::{DfError, DfResult, SMALL};
use df_mesh::{DVec3, FaMesh};

use crate::closure::FrictionModel;
use crate::state::FlowState;
use crate::types::MaterialParams;

pub use hydrograph::HydrographBoundary;

/// 边界槽位的条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeCondition {
    /// 零梯度出流
    Outflow,
    /// 滑移壁面
    Wall,
    /// 水文过程线入流
    Inflow,
    /// 分区交界
    Processor,
}

impl EdgeCondition {
    /// 槽位值是否作为固定值进入矩阵（标量方程）
    #[inline]
    pub fn fixes_scalar(self) -> bool {
        matches!(self, Self::Inflow | Self::Processor)
    }

    /// 槽位值是否作为固定值进入矩阵（速度方程）
    #[inline]
    pub fn fixes_vector(self) -> bool {
        !matches!(self, Self::Outflow)
    }
}

/// 全部边界条件
#[derive(Debug, Clone)]
pub struct BoundaryConditions {
    n_internal: usize,
    slots: Vec<EdgeCondition>,
    coupled: Vec<bool>,
    hydrographs: Vec<HydrographBoundary>,
}

impl BoundaryConditions {
    /// 校验边界名并构建
    ///
    /// 配置中引用的边界必须是网格中的物理边界片，否则返回
    /// [`DfError::UnknownBoundary`]；同一边界不能既是入流又是其他类型。
    pub fn new(mesh: &FaMesh, specs: &[BoundarySpec], hydrographs: &[HydrographConfig]) -> DfResult<Self> {
        let n_internal = mesh.n_internal_edges();
        let mut slots = vec![EdgeCondition::Outflow; mesh.n_edges() - n_internal];

        for patch in mesh.patches().iter().filter(|p| p.is_processor()) {
            for e in patch.edges() {
                slots[e - n_internal] = EdgeCondition::Processor;
            }
        }

        let physical_patch = |name: &str| -> DfResult<usize> {
            mesh.patch_id(name)
                .filter(|&p| !mesh.patches()[p].is_processor())
                .ok_or_else(|| DfError::unknown_boundary(name, mesh.physical_patch_names()))
        };

        for spec in specs {
            let p = physical_patch(&spec.patch)?;
            if hydrographs.iter().any(|h| h.boundary == spec.patch) {
                return Err(DfError::invalid_config(
                    format!("boundaries.{}", spec.patch),
                    format!("{:?}", spec.kind),
                    "该边界已由水文过程线定义为入流",
                ));
            }
            let condition = match spec.kind {
                BoundaryKind::Outflow => EdgeCondition::Outflow,
                BoundaryKind::Wall => EdgeCondition::Wall,
            };
            for e in mesh.patches()[p].edges() {
                slots[e - n_internal] = condition;
            }
        }

        let hydrographs = hydrographs
            .iter()
            .map(|cfg| HydrographBoundary::new(mesh, cfg))
            .collect::<DfResult<Vec<_>>>()?;
        for hb in &hydrographs {
            for e in mesh.patches()[hb.patch()].edges() {
                slots[e - n_internal] = EdgeCondition::Inflow;
            }
        }

        let coupled = slots.iter().map(|&c| c == EdgeCondition::Processor).collect();
        Ok(Self {
            n_internal,
            slots,
            coupled,
            hydrographs,
        })
    }

    /// 槽位条件
    #[inline]
    pub fn condition(&self, slot: usize) -> EdgeCondition {
        self.slots[slot]
    }

    /// 全部槽位条件
    pub fn slots(&self) -> &[EdgeCondition] {
        &self.slots
    }

    /// 分区交界掩码
    pub fn coupled(&self) -> &[bool] {
        &self.coupled
    }

    /// 入流边界
    pub fn hydrographs(&self) -> &[HydrographBoundary] {
        &self.hydrographs
    }

    /// 入流边界（可写，用于设置全局边宽）
    pub fn hydrographs_mut(&mut self) -> &mut [HydrographBoundary] {
        &mut self.hydrographs
    }

    /// 标量方程的边界值：零梯度返回 `None`
    #[inline]
    pub fn scalar_value(&self, e: usize, values: &[f64]) -> Option<f64> {
        let slot = e - self.n_internal;
        self.slots[slot].fixes_scalar().then(|| values[slot])
    }

    /// 速度方程某一分量的边界值：零梯度返回 `None`
    #[inline]
    pub fn vector_value(&self, e: usize, values: &[DVec3], comp: usize) -> Option<f64> {
        let slot = e - self.n_internal;
        self.slots[slot].fixes_vector().then(|| values[slot][comp])
    }

    /// 按当前时刻更新入流边界槽位
    pub fn update_inflow(
        &self,
        t: f64,
        mesh: &FaMesh,
        friction: &dyn FrictionModel,
        params: &MaterialParams,
        state: &mut FlowState,
    ) -> DfResult<()> {
        for hb in &self.hydrographs {
            hb.apply(t, mesh, friction, params, &mut state.boundary)?;
        }
        Ok(())
    }

    /// 由面值更新出流与壁面槽位，入流与交界槽位保持不变
    pub fn correct(&self, mesh: &FaMesh, state: &mut FlowState) {
        let edges = &mesh.edges()[self.n_internal..];
        let le = &mesh.le()[self.n_internal..];
        let bnd = &mut state.boundary;
        for (slot, &condition) in self.slots.iter().enumerate() {
            if !matches!(condition, EdgeCondition::Outflow | EdgeCondition::Wall) {
                continue;
            }
            let i = edges[slot].owner;
            bnd.h[slot] = state.h[i];
            bnd.rho[slot] = state.rho[i];
            bnd.cw[slot] = state.cw[i];
            bnd.rhoh[slot] = state.rhoh[i];
            bnd.cwh[slot] = state.cwh[i];
            let u = state.us[i];
            bnd.us[slot] = match condition {
                EdgeCondition::Wall => {
                    let m = le[slot] / (le[slot].length() + SMALL);
                    u - u.dot(m) * m
                }
                _ => u,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_config::{Axis, Sense};
    use df_mesh::{decompose, RectMeshGenerator};

    fn inlet(boundary: &str) -> HydrographConfig {
        HydrographConfig {
            boundary: boundary.into(),
            sense: Sense::Positive,
            direction: Axis::X,
            wide: None,
            times: vec![0.0],
            flows: vec![1.0],
            cvs: vec![0.4],
        }
    }

    #[test]
    fn test_default_outflow_and_inflow() {
        let mesh = RectMeshGenerator::new(3, 2, 1.0, 1.0).build_flat().unwrap();
        let bc = BoundaryConditions::new(&mesh, &[], &[inlet("left")]).unwrap();
        let n_internal = mesh.n_internal_edges();
        let left = mesh.patch_id("left").unwrap();
        for e in mesh.patches()[left].edges() {
            assert_eq!(bc.condition(e - n_internal), EdgeCondition::Inflow);
        }
        let right = mesh.patch_id("right").unwrap();
        for e in mesh.patches()[right].edges() {
            assert_eq!(bc.condition(e - n_internal), EdgeCondition::Outflow);
        }
        assert!(bc.coupled().iter().all(|c| !c));
    }

    #[test]
    fn test_unknown_boundary_rejected() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let spec = BoundarySpec {
            patch: "outlet".into(),
            kind: BoundaryKind::Wall,
        };
        let err = BoundaryConditions::new(&mesh, &[spec], &[]).unwrap_err();
        match err {
            DfError::UnknownBoundary { name, available } => {
                assert_eq!(name, "outlet");
                assert!(available.contains(&"left".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_processor_slots_are_coupled() {
        let mesh = RectMeshGenerator::new(4, 2, 1.0, 1.0).build_flat().unwrap();
        let parts = decompose(&mesh, 2).unwrap();
        let local = &parts[0].mesh;
        let bc = BoundaryConditions::new(local, &[], &[]).unwrap();
        assert_eq!(bc.coupled().iter().filter(|&&c| c).count(), 2);
        // 分区后物理边界名仍然有效
        assert!(BoundaryConditions::new(&parts[1].mesh, &[], &[inlet("left")]).is_ok());
    }

    #[test]
    fn test_wall_slip() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let spec = BoundarySpec {
            patch: "right".into(),
            kind: BoundaryKind::Wall,
        };
        let bc = BoundaryConditions::new(&mesh, &[spec], &[]).unwrap();
        let mut state = FlowState::new(&mesh);
        state.us.iter_mut().for_each(|u| *u = DVec3::new(1.0, 2.0, 0.0));
        state.h.iter_mut().for_each(|h| *h = 0.5);
        bc.correct(&mesh, &mut state);

        let n_internal = mesh.n_internal_edges();
        let right = mesh.patch_id("right").unwrap();
        for e in mesh.patches()[right].edges() {
            let slot = e - n_internal;
            assert!(state.boundary.us[slot].dot(mesh.le()[e]).abs() < 1e-12);
            assert!((state.boundary.us[slot].y - 2.0).abs() < 1e-12);
            assert_eq!(state.boundary.h[slot], 0.5);
            assert_eq!(bc.vector_value(e, &state.boundary.us, 1), Some(2.0));
            assert_eq!(bc.scalar_value(e, &state.boundary.h), None);
        }
        let left = mesh.patch_id("left").unwrap();
        for e in mesh.patches()[left].edges() {
            assert_eq!(state.boundary.us[e - n_internal], DVec3::new(1.0, 2.0, 0.0));
            assert_eq!(bc.vector_value(e, &state.boundary.us, 0), None);
        }
    }

    #[test]
    fn test_boundary_used_twice() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let spec = BoundarySpec {
            patch: "left".into(),
            kind: BoundaryKind::Outflow,
        };
        assert!(BoundaryConditions::new(&mesh, &[spec], &[inlet("left")]).is_err());
    }
}
