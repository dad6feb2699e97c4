// crates/df_physics/src/lib.rs

//! DebrisFlow 求解核心
//!
//! 深度积分泥石流/雪崩模型的有限面积求解，包括：
//! - 流动状态与物理参数 (state, types)
//! - 闭合模型 (closure) - 摩擦、侵蚀、淤积
//! - 有限面积离散与线性求解 (numerics)
//! - 边界条件 (boundary) - 出流、壁面、入流过程线
//! - 初始场 (init)
//! - 引擎核心 (engine) - 耦合内迭代、时间步控制、时间推进
//! - 地形修正 (terrain)
//! - 分区同步 (parallel)
//! - 快照输出 (output)
//!
//! # 运行一个算例
//!
//! ```rust,ignore
//! use df_config::CaseConfig;
//!
//! let case = CaseConfig::from_file("case.json")?;
//! let summary = df_physics::run_case(&case)?;
//! println!("{} 步, 结束于 t = {}", summary.steps, summary.end_time);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod closure;
pub mod engine;
pub mod init;
pub mod numerics;
pub mod output;
pub mod parallel;
pub mod state;
pub mod terrain;
pub mod types;

// 重导出常用类型
pub use boundary::{BoundaryConditions, HydrographBoundary};
pub use closure::{ClosureContext, ClosureSet, DepositionModel, EntrainmentModel, FrictionModel};
pub use engine::{
    build_mesh, gravity_components, run_case, CoupledStepSolver, Residuals, RunSummary,
    Simulation, StepInputs, StepPhase, StepReport, StepSummary, TimeStepController,
    TimeStepStats,
};
pub use init::initialise;
pub use output::{time_label, SnapshotWriter};
pub use parallel::{ChannelComm, Communicator, DistributedSync, Phase, ReduceOp, SerialComm};
pub use state::{FieldSnapshot, FlowState};
pub use terrain::{TerrainModifier, TerrainReport};
pub use types::MaterialParams;
