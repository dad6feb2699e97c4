// crates/df_physics/src/terrain/mod.rs

//! 侵蚀/淤积引起的地形修正
//!
//! - [`smoother`]: 守恒的 deltah 平滑
//! - [`modifier`]: 网格点松弛移动与扫掠体积回收

pub mod modifier;
pub mod smoother;

pub use modifier::{TerrainModifier, TerrainReport};
pub use smoother::{smooth, smooth_pass, SmoothOutcome};
