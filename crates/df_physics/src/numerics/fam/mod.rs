// crates/df_physics/src/numerics/fam/mod.rs

//! 有限面积离散
//!
//! 方程以积分形式组装：时间项 `A·x/Δt`、迎风对流 `Σ φ_e x_e`、
//! 隐式源 `Sp·A·x`、显式源 `Su·A`。边界边的取值由调用方通过闭包给出：
//! `None` 表示零梯度，`Some(v)` 表示固定值（入流边界或分区交界的 ghost 值）。

pub mod matrix;
pub mod operators;

pub use matrix::{FaMatrix, FaTopology};
pub use operators::{
    gauss_grad, interpolate_scalar, interpolate_vector, ndiv, ngrad, surface_courant,
    BoundaryScalar, BoundaryVector,
};
