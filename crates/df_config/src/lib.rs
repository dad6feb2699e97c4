// crates/df_config/src/lib.rs

//! DebrisFlow Config Layer
//!
//! 配置层，负责算例 JSON 的解析与校验。
//!
//! # 模块概览
//!
//! - [`case`]: 顶层 `CaseConfig`、网格来源、边界、输出与分区
//! - [`transport`]: 材料参数、开关与地形修正系数
//! - [`closure`]: 摩擦/侵蚀/淤积模型的封闭枚举
//! - [`field`]: 分区参数场与作用区域
//! - [`controls`]: 内迭代控制与时间控制
//! - [`hydrograph`]: 入流水文过程线
//! - [`initial`]: 初始场与释放区
//! - [`error`]: 配置错误类型
//!
//! 依赖网格的检查（边界名是否存在等）在构建求解器时完成。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod case;
pub mod closure;
pub mod controls;
pub mod error;
pub mod field;
pub mod hydrograph;
pub mod initial;
pub mod transport;

pub use case::{BoundaryKind, BoundarySpec, CaseConfig, DecompositionConfig, MeshSource, OutputConfig};
pub use closure::{
    DepositionConfig, EntrainmentConfig, FrictionConfig, DEPOSITION_MODELS, ENTRAINMENT_MODELS,
    FRICTION_MODELS,
};
pub use controls::{LinearSolverSettings, RelaxationFactors, SolutionControls, TimeControls};
pub use error::ConfigError;
pub use field::{FieldSpec, PolygonSpec, RegionValue, ZoneSpec};
pub use hydrograph::{Axis, HydrographConfig, Sense};
pub use initial::{InitialConditions, InitialField, ReleaseRegion};
pub use transport::{TerrainModificationCoeffs, TransportProperties};
