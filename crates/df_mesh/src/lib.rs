// crates/df_mesh/src/lib.rs

//! DebrisFlow 网格模块
//!
//! 有限面积曲面网格：面是控制面积，边连接面或构成边界片。
//!
//! # 核心类型
//!
//! - [`FaMesh`]: SoA 布局的网格，几何量随网格点移动重算
//! - [`Partition`]: 分区网格及其全局编号
//! - [`PointWeights`]: 面心到网格点的面积加权映射
//!
//! # 模块结构
//!
//! - [`mesh`]: 拓扑、几何、网格点移动与扫掠体积
//! - [`generator`]: 矩形网格生成
//! - [`io`]: JSON 网格文件
//! - [`geometry`]: 多边形包含判断
//! - [`point_weights`]: 点权映射
//! - [`decompose`]: 条带区域分解

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decompose;
pub mod generator;
pub mod geometry;
pub mod io;
pub mod mesh;
pub mod point_weights;

pub use decompose::{decompose, processor_patch_name, Partition, PartitionInfo};
pub use generator::RectMeshGenerator;
pub use geometry::Polygon2D;
pub use io::{load_mesh, MeshFile};
pub use mesh::{Edge, FaMesh, Patch, PatchDef, PatchKind};
pub use point_weights::PointWeights;

/// 三维向量
pub use glam::DVec3;
