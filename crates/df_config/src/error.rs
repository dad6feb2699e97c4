// crates/df_config/src/error.rs

//! 配置层错误类型

use df_foundation::DfError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误（含未知模型名）
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid(key: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<ConfigError> for DfError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => DfError::io_with_source("读取配置失败", e),
            ConfigError::Parse(msg) => DfError::config(msg),
            ConfigError::InvalidValue { key, value, reason } => {
                DfError::invalid_config(key, value, reason)
            }
            ConfigError::Missing(key) => DfError::missing_config(key),
        }
    }
}

/// 检查严格为正
pub(crate) fn require_positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, value, "必须为正"))
    }
}

/// 检查非负
pub(crate) fn require_non_negative(key: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, value, "不能为负"))
    }
}

/// 检查位于闭区间
pub(crate) fn require_in(key: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            key,
            value,
            format!("必须位于 [{min}, {max}]"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("maxCo", -1, "必须为正");
        assert!(err.to_string().contains("maxCo"));
    }

    #[test]
    fn test_into_df_error_keeps_key() {
        let err: DfError = ConfigError::Missing("deltahMin".into()).into();
        assert!(err.to_string().contains("deltahMin"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_range_helpers() {
        assert!(require_positive("x", 1.0).is_ok());
        assert!(require_positive("x", 0.0).is_err());
        assert!(require_non_negative("x", 0.0).is_ok());
        assert!(require_in("x", 0.5, 0.0, 1.0).is_ok());
        assert!(require_in("x", 1.5, 0.0, 1.0).is_err());
    }
}
