// crates/df_config/src/hydrograph.rs

//! 入流水文过程线配置
//!
//! 每条过程线绑定一个物理边界，给出流向（坐标轴 + 正负）与
//! 时间-流量-体积浓度三元组序列。
//!
//! ```json
//! { "boundary": "inlet", "sense": "positive", "direction": "x",
//!   "times": [0, 10, 10.001], "flows": [1, 1, 0], "Cvs": [0.4, 0.4, 0.4] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{require_in, require_non_negative, ConfigError};

/// 流向正负
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    /// 沿坐标轴正向
    Positive,
    /// 沿坐标轴负向
    Negative,
}

impl Sense {
    /// 符号
    pub fn sign(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// 流向坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// x 轴
    X,
    /// y 轴
    Y,
    /// z 轴
    Z,
}

impl Axis {
    /// 单位向量
    pub fn unit(self) -> [f64; 3] {
        match self {
            Self::X => [1.0, 0.0, 0.0],
            Self::Y => [0.0, 1.0, 0.0],
            Self::Z => [0.0, 0.0, 1.0],
        }
    }
}

/// 一条边界过程线
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydrographConfig {
    /// 边界名（必须是网格中的物理边界）
    pub boundary: String,
    /// 流向正负
    pub sense: Sense,
    /// 流向坐标轴
    pub direction: Axis,
    /// 参考宽度 [m]；给出时流量按 (边界总宽 / wide) 缩放
    #[serde(default)]
    pub wide: Option<f64>,
    /// 采样时间 [s]（严格递增）
    pub times: Vec<f64>,
    /// 流量 [m³/s]
    pub flows: Vec<f64>,
    /// 体积浓度
    #[serde(rename = "Cvs")]
    pub cvs: Vec<f64>,
}

impl HydrographConfig {
    /// 校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = format!("hydrographs.{}", self.boundary);
        if self.times.is_empty() {
            return Err(ConfigError::Missing(format!("{key}.times")));
        }
        if self.flows.len() != self.times.len() || self.cvs.len() != self.times.len() {
            return Err(ConfigError::invalid(
                format!("{key}.flows"),
                format!("{}/{}", self.flows.len(), self.cvs.len()),
                format!("flows 与 Cvs 长度必须等于 times 长度 {}", self.times.len()),
            ));
        }
        if self.times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigError::invalid(
                format!("{key}.times"),
                format!("{:?}", self.times),
                "时间必须严格递增",
            ));
        }
        for &q in &self.flows {
            require_non_negative(&format!("{key}.flows"), q)?;
        }
        for &cv in &self.cvs {
            require_in(&format!("{key}.Cvs"), cv, 0.0, 1.0)?;
        }
        if let Some(w) = self.wide {
            crate::error::require_positive(&format!("{key}.wide"), w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HydrographConfig {
        serde_json::from_str(
            r#"{ "boundary": "inlet", "sense": "negative", "direction": "y",
                 "times": [0, 10], "flows": [1, 0], "Cvs": [0.3, 0.5] }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse() {
        let h = sample();
        assert_eq!(h.sense.sign(), -1.0);
        assert_eq!(h.direction.unit(), [0.0, 1.0, 0.0]);
        assert!(h.wide.is_none());
        assert!(h.validate().is_ok());
    }

    #[test]
    fn test_invalid_sense_is_parse_error() {
        let res = serde_json::from_str::<HydrographConfig>(
            r#"{ "boundary": "inlet", "sense": "up", "direction": "x",
                 "times": [0], "flows": [1], "Cvs": [0.3] }"#,
        );
        let msg = res.unwrap_err().to_string();
        assert!(msg.contains("up"));
        assert!(msg.contains("positive"));
    }

    #[test]
    fn test_non_monotonic_times() {
        let mut h = sample();
        h.times = vec![0.0, 0.0];
        assert!(h.validate().is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let mut h = sample();
        h.cvs.pop();
        assert!(h.validate().is_err());
    }
}
