// crates/df_physics/src/types.rs

//! 物理参数
//!
//! 由 `transportProperties` 与重力向量整理出的只读参数，求解期间不变。

use df_config::{CaseConfig, TransportProperties};
use glam::DVec3;

/// 材料与数值容差参数
#[derive(Debug, Clone)]
pub struct MaterialParams {
    /// 水密度 [kg/m³]
    pub rho_w: f64,
    /// 固体密度 [kg/m³]
    pub rho_s: f64,
    /// 床面物质密度 [kg/m³]
    pub rho_b: f64,
    /// 最小流深 [m]
    pub hmin: f64,
    /// 曲率项系数
    pub shi: f64,
    /// 速度容差 [m/s]
    pub u0: f64,
    /// 流深容差 [m]
    pub h0: f64,
    /// 重力向量 [m/s²]
    pub g: DVec3,
    /// 压力反馈修正
    pub pressure_feedback: bool,
}

impl MaterialParams {
    /// 由输运参数与重力构建
    pub fn new(transport: &TransportProperties, gravity: [f64; 3]) -> Self {
        Self {
            rho_w: transport.rho_w,
            rho_s: transport.rho_s,
            rho_b: transport.rho_b,
            hmin: transport.hmin,
            shi: transport.shi,
            u0: transport.u0,
            h0: transport.h0,
            g: DVec3::from_array(gravity),
            pressure_feedback: transport.pressure_feedback,
        }
    }

    /// 由算例配置构建
    pub fn from_case(case: &CaseConfig) -> Self {
        Self::new(&case.transport, case.gravity)
    }

    /// 重力模长
    #[inline]
    pub fn g_mag(&self) -> f64 {
        self.g.length()
    }

    /// 床面物质含水率
    #[inline]
    pub fn cw_b(&self) -> f64 {
        (self.rho_s - self.rho_b) / (self.rho_s - self.rho_w)
    }

    /// 床面物质体积浓度
    #[inline]
    pub fn cv_b(&self) -> f64 {
        (self.rho_b - self.rho_w) / (self.rho_s - self.rho_w)
    }

    /// 由体积浓度求混合密度
    #[inline]
    pub fn density_from_cv(&self, cv: f64) -> f64 {
        (1.0 - cv) * self.rho_w + cv * self.rho_s
    }
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self::new(&TransportProperties::default(), [0.0, 0.0, -9.81])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bed_fractions() {
        let p = MaterialParams::default();
        assert!((p.cw_b() + p.cv_b() - 1.0).abs() < 1e-12);
        assert!((p.density_from_cv(p.cv_b()) - p.rho_b).abs() < 1e-9);
        assert!((p.g_mag() - 9.81).abs() < 1e-12);
    }
}
