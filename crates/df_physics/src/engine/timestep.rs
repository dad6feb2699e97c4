// crates/df_physics/src/engine/timestep.rs

//! 时间步长控制
//!
//! 面 Courant 数 `Co = 0.5·max_f(Σ_e |φ_e| / A_f)·Δt` 由调用方按当前步长计算并全局归约。
//!
//! - 初始：`Δt = min(maxCo/(Co + SMALL)·Δt, maxDeltaT)`
//! - 每步：`f = min(min(maxCo/(Co + SMALL), 1 + 0.1·maxCo/(Co + SMALL)), 1.2)`，
//!   `Δt = clamp(f·Δt, minDeltaT, maxDeltaT)`
//!
//! 控制器只保存上一步长；为了落在输出时刻与结束时刻而缩短的步长
//! 由 [`TimeStepController::step_size`] 单独给出，不影响下一步的基准。

use df_config::TimeControls;
use df_foundation::SMALL;
use serde::Serialize;

/// 单步增长上限
const MAX_GROWTH: f64 = 1.2;

/// 视为已到达目标时刻的相对容差
const TIME_EPS: f64 = 1e-9;

/// 时间步长统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeStepStats {
    /// 当前基准步长
    pub current_dt: f64,
    /// 最近一次的 Courant 数
    pub last_courant: f64,
    /// 调整次数
    pub adjustments: usize,
    /// 被 minDeltaT 截断的次数
    pub clamped_min: usize,
    /// 被 maxDeltaT 截断的次数
    pub clamped_max: usize,
}

/// 时间步长控制器
#[derive(Debug, Clone)]
pub struct TimeStepController {
    adjust: bool,
    max_co: f64,
    min_dt: f64,
    max_dt: f64,
    dt: f64,
    last_courant: f64,
    adjustments: usize,
    clamped_min: usize,
    clamped_max: usize,
}

impl TimeStepController {
    /// 由时间控制创建，基准步长取 `deltaT`
    pub fn new(controls: &TimeControls) -> Self {
        Self {
            adjust: controls.adjust_time_step,
            max_co: controls.max_co,
            min_dt: controls.min_delta_t,
            max_dt: controls.max_delta_t,
            dt: controls.delta_t,
            last_courant: 0.0,
            adjustments: 0,
            clamped_min: 0,
            clamped_max: 0,
        }
    }

    /// 当前基准步长
    #[inline]
    pub fn current_dt(&self) -> f64 {
        self.dt
    }

    /// 是否自适应
    #[inline]
    pub fn is_adaptive(&self) -> bool {
        self.adjust
    }

    /// 由初始 Courant 数设定第一个步长
    pub fn initialise(&mut self, courant: f64) -> f64 {
        self.last_courant = courant;
        if self.adjust {
            self.dt = (self.max_co / (courant + SMALL) * self.dt).min(self.max_dt);
            tracing::info!(courant, dt = self.dt, "初始时间步长");
        }
        self.dt
    }

    /// 按上一步的 Courant 数调整步长
    pub fn adjust(&mut self, courant: f64) -> f64 {
        self.last_courant = courant;
        if !self.adjust {
            return self.dt;
        }
        let ratio = self.max_co / (courant + SMALL);
        let factor = ratio.min(1.0 + 0.1 * ratio).min(MAX_GROWTH);
        let proposed = factor * self.dt;
        if proposed > self.max_dt {
            self.clamped_max += 1;
        } else if proposed < self.min_dt {
            self.clamped_min += 1;
            tracing::warn!(
                courant,
                proposed,
                min_dt = self.min_dt,
                "时间步长低于 minDeltaT，Courant 数可能超过 maxCo"
            );
        }
        self.dt = proposed.clamp(self.min_dt, self.max_dt);
        self.adjustments += 1;
        self.dt
    }

    /// 从时刻 t 出发的实际步长，不越过下一输出时刻与结束时刻
    pub fn step_size(&self, t: f64, next_write: f64, end: f64) -> f64 {
        let mut dt = self.dt;
        for target in [next_write, end] {
            let remaining = target - t;
            if remaining > TIME_EPS * target.abs().max(1.0) && remaining <= dt * (1.0 + TIME_EPS) {
                dt = remaining;
            }
        }
        dt
    }

    /// 统计
    pub fn stats(&self) -> TimeStepStats {
        TimeStepStats {
            current_dt: self.dt,
            last_courant: self.last_courant,
            adjustments: self.adjustments,
            clamped_min: self.clamped_min,
            clamped_max: self.clamped_max,
        }
    }
}

/// t 是否已到达目标时刻
#[inline]
pub(crate) fn reached(t: f64, target: f64) -> bool {
    t >= target - TIME_EPS * target.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> TimeControls {
        TimeControls {
            start_time: 0.0,
            end_time: 10.0,
            delta_t: 0.1,
            write_interval: 1.0,
            adjust_time_step: true,
            max_co: 0.5,
            max_delta_t: 1.0,
            min_delta_t: 1e-4,
        }
    }

    #[test]
    fn test_initial_step_from_courant() {
        let mut c = TimeStepController::new(&controls());
        // Co = 1 在 Δt = 0.1 下 -> Δt = 0.05
        assert!((c.initialise(1.0) - 0.05).abs() < 1e-12);
        // 静止流场取 maxDeltaT
        let mut c = TimeStepController::new(&controls());
        assert_eq!(c.initialise(0.0), 1.0);
    }

    #[test]
    fn test_growth_is_limited() {
        let mut c = TimeStepController::new(&controls());
        let dt = c.adjust(0.01);
        assert!((dt - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_shrinks_when_courant_high() {
        let mut c = TimeStepController::new(&controls());
        let dt = c.adjust(1.0);
        assert!((dt - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let mut cfg = controls();
        cfg.delta_t = 0.9;
        let mut c = TimeStepController::new(&cfg);
        assert_eq!(c.adjust(0.0), 1.0);
        assert_eq!(c.stats().clamped_max, 1);

        cfg.delta_t = 1e-4;
        let mut c = TimeStepController::new(&cfg);
        assert_eq!(c.adjust(100.0), 1e-4);
        assert_eq!(c.stats().clamped_min, 1);
    }

    #[test]
    fn test_fixed_step() {
        let mut cfg = controls();
        cfg.adjust_time_step = false;
        let mut c = TimeStepController::new(&cfg);
        assert_eq!(c.initialise(10.0), 0.1);
        assert_eq!(c.adjust(10.0), 0.1);
    }

    #[test]
    fn test_step_hits_write_and_end_time() {
        let c = TimeStepController::new(&controls());
        assert!((c.step_size(0.95, 1.0, 10.0) - 0.05).abs() < 1e-12);
        assert!((c.step_size(9.97, 11.0, 10.0) - 0.03).abs() < 1e-12);
        assert_eq!(c.step_size(0.5, 1.0, 10.0), 0.1);
        assert!(reached(1.0 - 1e-12, 1.0));
        assert!(!reached(0.99, 1.0));
    }
}
