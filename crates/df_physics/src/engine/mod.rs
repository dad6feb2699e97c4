// crates/df_physics/src/engine/mod.rs

//! 求解引擎
//!
//! # 模块结构
//!
//! - `coupled` - 单步耦合内迭代（动量、rhoh、Cwh）与收敛状态机
//! - `timestep` - Courant 数时间步控制
//! - `simulation` - 时间推进、地形修正调度、快照输出与多分区运行

pub mod coupled;
pub mod simulation;
pub mod timestep;

pub use coupled::{CoupledStepSolver, Residuals, StepInputs, StepPhase, StepReport};
pub use simulation::{build_mesh, gravity_components, run_case, RunSummary, Simulation, StepSummary};
pub use timestep::{TimeStepController, TimeStepStats};
