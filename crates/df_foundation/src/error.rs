// crates/df_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `DfError` 枚举和 `DfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! 1. **配置错误**: 缺少必需项、未知模型、边界不存在、水文过程线查询越界，启动即终止
//! 2. **数值错误**: 线性求解发散，终止整个计算
//! 3. **同步错误**: 分区握手或消息阶段不一致，终止整个计算
//!
//! 内迭代未收敛、地形迭代达到上限等属于警告，不在此处建模。
//!
//! # 示例
//!
//! ```
//! use df_foundation::error::{DfError, DfResult};
//!
//! fn read_config() -> DfResult<()> {
//!     Err(DfError::config("配置文件格式错误"))
//! }
//! assert!(read_config().is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type DfResult<T> = Result<T, DfError>;

/// DebrisFlow 错误类型
#[derive(Error, Debug)]
pub enum DfError {
    // ========================================================================
    // IO 相关错误
    // ========================================================================
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },

    /// 文件不存在
    #[error("文件不存在: {path}")]
    FileNotFound {
        /// 未找到的路径
        path: PathBuf,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    // ========================================================================
    // 输入与网格
    // ========================================================================
    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // 配置错误（启动即终止）
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 缺少配置项
    #[error("缺少必需的配置项: {key}")]
    MissingConfig {
        /// 配置键名
        key: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 引用的边界不存在
    #[error("边界 '{name}' 不存在于网格中 (可用边界: {available:?})")]
    UnknownBoundary {
        /// 配置中引用的边界名
        name: String,
        /// 网格中实际存在的物理边界
        available: Vec<String>,
    },

    /// 水文过程线查询时间早于首个采样点
    #[error("边界 '{boundary}' 的水文过程线从 t={start} 开始, 无法查询 t={time}")]
    HydrographTime {
        /// 边界名
        boundary: String,
        /// 查询时间
        time: f64,
        /// 过程线起始时间
        start: f64,
    },

    // ========================================================================
    // 数值错误
    // ========================================================================
    /// 线性求解失败
    #[error("线性求解失败: 方程 {equation} 状态 {status} (迭代 {iterations} 次, 残差 {residual:.3e})")]
    LinearSolve {
        /// 方程名
        equation: String,
        /// 求解器状态描述
        status: String,
        /// 已执行迭代次数
        iterations: usize,
        /// 最终残差
        residual: f64,
    },

    // ========================================================================
    // 分区同步错误
    // ========================================================================
    /// 分区同步不一致
    #[error("分区同步不一致: 阶段 {phase}, 邻居分区 {neighbour}: 期望 {expected}, 实际 {actual}")]
    SyncMismatch {
        /// 同步阶段
        phase: String,
        /// 邻居分区编号
        neighbour: usize,
        /// 期望值描述
        expected: String,
        /// 实际值描述
        actual: String,
    },

    /// 分区通信失败（通道断开等）
    #[error("分区通信失败: {message}")]
    Communication {
        /// 具体错误信息
        message: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl DfError {
    /// 从描述创建 IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 从 IO 错误创建（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 文件不存在
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 缺少配置
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 边界不存在
    pub fn unknown_boundary(name: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownBoundary {
            name: name.into(),
            available,
        }
    }

    /// 线性求解失败
    pub fn linear_solve(
        equation: impl Into<String>,
        status: impl Into<String>,
        iterations: usize,
        residual: f64,
    ) -> Self {
        Self::LinearSolve {
            equation: equation.into(),
            status: status.into(),
            iterations,
            residual,
        }
    }

    /// 分区同步不一致
    pub fn sync_mismatch(
        phase: impl Into<String>,
        neighbour: usize,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::SyncMismatch {
            phase: phase.into(),
            neighbour,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// 通信失败
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 是否属于启动期配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::MissingConfig { .. }
                | Self::InvalidConfig { .. }
                | Self::UnknownBoundary { .. }
                | Self::HydrographTime { .. }
        )
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl DfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> DfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查值是否在范围内
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> DfResult<()> {
        if value < min || value > max || value.is_nan() {
            Err(Self::out_of_range(field, value, min, max))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for DfError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl<T> From<std::sync::mpsc::SendError<T>> for DfError {
    fn from(_: std::sync::mpsc::SendError<T>) -> Self {
        Self::communication("通道发送失败, 对端分区已退出")
    }
}

impl From<std::sync::mpsc::RecvError> for DfError {
    fn from(_: std::sync::mpsc::RecvError) -> Self {
        Self::communication("通道接收失败, 对端分区已退出")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DfError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_unknown_boundary_lists_available() {
        let err = DfError::unknown_boundary("inlet", vec!["left".into(), "right".into()]);
        let msg = err.to_string();
        assert!(msg.contains("inlet"));
        assert!(msg.contains("left"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_sync_mismatch_display() {
        let err = DfError::sync_mismatch("Handshake", 2, 10, 12);
        let msg = err.to_string();
        assert!(msg.contains("Handshake"));
        assert!(msg.contains("10"));
        assert!(msg.contains("12"));
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_check_size() {
        assert!(DfError::check_size("test", 10, 10).is_ok());
        assert!(DfError::check_size("test", 10, 5).is_err());
    }

    #[test]
    fn test_check_range_rejects_nan() {
        assert!(DfError::check_range("value", 5.0, 0.0, 10.0).is_ok());
        assert!(DfError::check_range("value", f64::NAN, 0.0, 10.0).is_err());
        assert!(DfError::check_range("value", 11.0, 0.0, 10.0).is_err());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: DfError = io_err.into();
        assert!(matches!(err, DfError::Io { .. }));
    }
}
