// crates/df_physics/src/parallel/mod.rs

//! 分区并行
//!
//! 每个分区独占自己的网格与场，跨分区的数据只通过显式消息复制。
//! 所有分区按同一固定顺序发起同步调用：
//!
//! | 阶段 | 时机 | 内容 |
//! |------|------|------|
//! | `Handshake` | 启动 | 面数与全局面号、交界边全局编号 |
//! | `Reduce` | 每步/每次内迭代 | Courant 数、残差、地形修正判据 |
//! | `Ghost` | 每次内迭代 4~5 次；每遍平滑 1 次 | 主变量、pb·h/2、求解后的速度；平滑的 deltah 与面积 |
//! | `Gather` | 地形修正每轮 | h 与 deltah 的邻居面值 |
//! | `Smoother` | 每次平滑 | 越过交界的体积转移 |

pub mod comm;
pub mod sync;

pub use comm::{ChannelComm, Communicator, Phase, ReduceOp, SerialComm};
pub use sync::{DistributedSync, ProcessorLink};
