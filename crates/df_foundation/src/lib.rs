// crates/df_foundation/src/lib.rs

//! DebrisFlow Foundation Layer
//!
//! 基础层，提供整个工作区共享的错误类型与数值常量。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `DfError` / `DfResult`
//! - [`float`]: 数值保护常量（`SMALL`、`VSMALL`）与安全除法
//!
//! # 示例
//!
//! ```
//! use df_foundation::{DfError, DfResult, SMALL};
//!
//! fn ratio(a: f64, b: f64) -> DfResult<f64> {
//!     DfError::check_range("b", b, 0.0, f64::MAX)?;
//!     Ok(a / (b + SMALL))
//! }
//!
//! assert!(ratio(1.0, -1.0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;

pub use error::{DfError, DfResult};
pub use float::{pos, pos0, safe_div, SMALL, VSMALL};
