// crates/df_config/src/controls.rs

//! 求解控制与时间控制
//!
//! - [`SolutionControls`]: 内迭代次数、残差阈值、欠松弛因子、线性求解器参数
//! - [`TimeControls`]: 起止时间、初始步长、Courant 数限制、输出间隔

use serde::{Deserialize, Serialize};

use crate::error::{require_in, require_non_negative, require_positive, ConfigError};

/// 耦合内迭代控制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionControls {
    /// 内迭代上限
    #[serde(rename = "nOuterCorrectors", default = "default_n_outer")]
    pub n_outer_correctors: usize,
    /// 判定收敛前的最少迭代次数
    #[serde(rename = "minCorrectors", default = "default_min_correctors")]
    pub min_correctors: usize,
    /// rhoh 方程初始残差阈值
    #[serde(rename = "rhohResidualMax", default)]
    pub rhoh_residual_max: f64,
    /// Cwh 方程初始残差阈值
    #[serde(rename = "CwhResidualMax", default)]
    pub cwh_residual_max: f64,
    /// Us 方程初始残差（模）阈值
    #[serde(rename = "UsResidualMax", default = "default_us_residual_max")]
    pub us_residual_max: f64,
    /// 欠松弛因子
    #[serde(rename = "relaxationFactors", default)]
    pub relaxation: RelaxationFactors,
    /// 线性求解器参数
    #[serde(rename = "linearSolver", default)]
    pub linear_solver: LinearSolverSettings,
}

fn default_n_outer() -> usize { 50 }
fn default_min_correctors() -> usize { 3 }
fn default_us_residual_max() -> f64 { 1.0 }

impl Default for SolutionControls {
    fn default() -> Self {
        Self {
            n_outer_correctors: default_n_outer(),
            min_correctors: default_min_correctors(),
            rhoh_residual_max: 0.0,
            cwh_residual_max: 0.0,
            us_residual_max: default_us_residual_max(),
            relaxation: RelaxationFactors::default(),
            linear_solver: LinearSolverSettings::default(),
        }
    }
}

impl SolutionControls {
    /// 设置迭代次数范围
    pub fn with_correctors(mut self, min: usize, max: usize) -> Self {
        self.min_correctors = min;
        self.n_outer_correctors = max;
        self
    }

    /// 设置三个残差阈值
    pub fn with_residual_max(mut self, rhoh: f64, cwh: f64, us: f64) -> Self {
        self.rhoh_residual_max = rhoh;
        self.cwh_residual_max = cwh;
        self.us_residual_max = us;
        self
    }

    /// 校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_outer_correctors == 0 {
            return Err(ConfigError::invalid("nOuterCorrectors", 0, "至少为 1"));
        }
        require_non_negative("rhohResidualMax", self.rhoh_residual_max)?;
        require_non_negative("CwhResidualMax", self.cwh_residual_max)?;
        require_non_negative("UsResidualMax", self.us_residual_max)?;
        self.relaxation.validate()?;
        self.linear_solver.validate()
    }
}

/// 方程欠松弛因子（1 表示不松弛）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaxationFactors {
    /// 动量方程
    #[serde(rename = "Us", default = "default_relax")]
    pub us: f64,
    /// rhoh 方程
    #[serde(default = "default_relax")]
    pub rhoh: f64,
    /// Cwh 方程
    #[serde(rename = "Cwh", default = "default_relax")]
    pub cwh: f64,
}

fn default_relax() -> f64 { 1.0 }

impl Default for RelaxationFactors {
    fn default() -> Self {
        Self {
            us: default_relax(),
            rhoh: default_relax(),
            cwh: default_relax(),
        }
    }
}

impl RelaxationFactors {
    /// 三个方程使用相同因子
    pub fn uniform(alpha: f64) -> Self {
        Self {
            us: alpha,
            rhoh: alpha,
            cwh: alpha,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, v) in [
            ("relaxationFactors.Us", self.us),
            ("relaxationFactors.rhoh", self.rhoh),
            ("relaxationFactors.Cwh", self.cwh),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(ConfigError::invalid(key, v, "必须位于 (0, 1]"));
            }
        }
        Ok(())
    }
}

/// 线性求解器参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSolverSettings {
    /// 绝对容差
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// 相对容差
    #[serde(rename = "relTol", default)]
    pub rel_tol: f64,
    /// 最大迭代次数
    #[serde(rename = "maxIter", default = "default_max_iter")]
    pub max_iter: usize,
}

fn default_tolerance() -> f64 { 1e-10 }
fn default_max_iter() -> usize { 1000 }

impl Default for LinearSolverSettings {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            rel_tol: 0.0,
            max_iter: default_max_iter(),
        }
    }
}

impl LinearSolverSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("linearSolver.tolerance", self.tolerance)?;
        require_in("linearSolver.relTol", self.rel_tol, 0.0, 1.0)?;
        if self.max_iter == 0 {
            return Err(ConfigError::invalid("linearSolver.maxIter", 0, "至少为 1"));
        }
        Ok(())
    }
}

/// 时间控制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeControls {
    /// 起始时间 [s]
    #[serde(rename = "startTime", default)]
    pub start_time: f64,
    /// 结束时间 [s]
    #[serde(rename = "endTime")]
    pub end_time: f64,
    /// 初始时间步长 [s]
    #[serde(rename = "deltaT")]
    pub delta_t: f64,
    /// 输出间隔 [s]
    #[serde(rename = "writeInterval", default = "default_write_interval")]
    pub write_interval: f64,
    /// 是否自适应调整步长
    #[serde(rename = "adjustTimeStep", default = "default_true")]
    pub adjust_time_step: bool,
    /// 目标 Courant 数
    #[serde(rename = "maxCo", default = "default_max_co")]
    pub max_co: f64,
    /// 最大步长 [s]
    #[serde(rename = "maxDeltaT", default = "default_max_delta_t")]
    pub max_delta_t: f64,
    /// 最小步长 [s]
    #[serde(rename = "minDeltaT", default)]
    pub min_delta_t: f64,
}

fn default_write_interval() -> f64 { 1.0 }
fn default_true() -> bool { true }
fn default_max_co() -> f64 { 0.5 }
fn default_max_delta_t() -> f64 { 1.0 }

impl Default for TimeControls {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 10.0,
            delta_t: 0.01,
            write_interval: default_write_interval(),
            adjust_time_step: true,
            max_co: default_max_co(),
            max_delta_t: default_max_delta_t(),
            min_delta_t: 0.0,
        }
    }
}

impl TimeControls {
    /// 校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_time <= self.start_time {
            return Err(ConfigError::invalid(
                "endTime",
                self.end_time,
                "必须大于 startTime",
            ));
        }
        require_positive("deltaT", self.delta_t)?;
        require_positive("writeInterval", self.write_interval)?;
        require_positive("maxCo", self.max_co)?;
        require_positive("maxDeltaT", self.max_delta_t)?;
        require_non_negative("minDeltaT", self.min_delta_t)?;
        if self.min_delta_t > self.max_delta_t {
            return Err(ConfigError::invalid(
                "minDeltaT",
                self.min_delta_t,
                "不能大于 maxDeltaT",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_defaults() {
        let s: SolutionControls = serde_json::from_str("{}").unwrap();
        assert_eq!(s.n_outer_correctors, 50);
        assert_eq!(s.min_correctors, 3);
        assert_eq!(s.rhoh_residual_max, 0.0);
        assert_eq!(s.cwh_residual_max, 0.0);
        assert_eq!(s.us_residual_max, 1.0);
        assert_eq!(s.relaxation.us, 1.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_relaxation_out_of_range() {
        let mut s = SolutionControls::default();
        s.relaxation = RelaxationFactors::uniform(0.0);
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_time_controls() {
        let t: TimeControls =
            serde_json::from_str(r#"{ "endTime": 20, "deltaT": 0.1, "maxCo": 0.8 }"#).unwrap();
        assert!(t.adjust_time_step);
        assert_eq!(t.max_co, 0.8);
        assert!(t.validate().is_ok());

        let bad = TimeControls {
            end_time: -1.0,
            ..TimeControls::default()
        };
        assert!(bad.validate().is_err());
    }
}
