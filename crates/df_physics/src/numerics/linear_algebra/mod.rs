// crates/df_physics/src/numerics/linear_algebra/mod.rs

//! 稀疏线性代数
//!
//! - [`csr`]: CSR 矩阵与构建器
//! - [`preconditioner`]: Jacobi / 恒等预条件
//! - [`solver`]: 预条件 BiCGStab
//! - [`vector_ops`]: 向量运算

pub mod csr;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern};
pub use preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner};
pub use solver::{BiCgStabSolver, SolverConfig, SolverResult, SolverStatus};
pub use vector_ops::{axpy, copy, dot, mean, norm1, norm2};
