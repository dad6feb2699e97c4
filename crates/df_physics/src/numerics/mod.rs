// crates/df_physics/src/numerics/mod.rs

//! 数值方法
//!
//! - [`linear_algebra`]: CSR 稀疏矩阵与 BiCGStab 求解器
//! - [`fam`]: 有限面积离散（矩阵组装、插值、梯度、法向散度）

pub mod fam;
pub mod linear_algebra;
