// crates/df_config/src/transport.rs

//! 输运与材料参数
//!
//! 对应算例中的 `transportProperties`：材料密度、最小流深、曲率项系数、
//! 压力反馈与地形修正开关，以及三类闭合模型的选择。

use serde::{Deserialize, Serialize};

use crate::closure::{DepositionConfig, EntrainmentConfig, FrictionConfig};
use crate::error::{require_in, require_non_negative, require_positive, ConfigError};

/// 输运与材料参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportProperties {
    /// 最小流深 [m]
    pub hmin: f64,
    /// 曲率（离心）项系数
    #[serde(default = "default_shi")]
    pub shi: f64,
    /// 水密度 [kg/m³]
    pub rho_w: f64,
    /// 固体颗粒密度 [kg/m³]
    pub rho_s: f64,
    /// 床面物质密度 [kg/m³]
    pub rho_b: f64,
    /// 是否启用二阶压力反馈修正
    #[serde(rename = "pressureFeedback", default = "default_true")]
    pub pressure_feedback: bool,
    /// 是否启用地形修正（移动网格）
    #[serde(rename = "terrainModification", default)]
    pub terrain_modification: bool,
    /// 速度容差 [m/s]
    #[serde(default = "default_tolerance")]
    pub u0: f64,
    /// 流深容差 [m]
    #[serde(default = "default_tolerance")]
    pub h0: f64,
    /// 摩擦模型
    #[serde(default)]
    pub friction: FrictionConfig,
    /// 侵蚀模型
    #[serde(default)]
    pub entrainment: EntrainmentConfig,
    /// 淤积模型
    #[serde(default)]
    pub deposition: DepositionConfig,
    /// 地形修正系数（启用地形修正时必需）
    #[serde(rename = "terrainModificationCoeffs", default)]
    pub terrain_modification_coeffs: Option<TerrainModificationCoeffs>,
}

fn default_shi() -> f64 { 1.0 }
fn default_true() -> bool { true }
fn default_tolerance() -> f64 { 1e-7 }

impl Default for TransportProperties {
    fn default() -> Self {
        Self {
            hmin: 1e-4,
            shi: default_shi(),
            rho_w: 1000.0,
            rho_s: 2700.0,
            rho_b: 2000.0,
            pressure_feedback: true,
            terrain_modification: false,
            u0: default_tolerance(),
            h0: default_tolerance(),
            friction: FrictionConfig::default(),
            entrainment: EntrainmentConfig::default(),
            deposition: DepositionConfig::default(),
            terrain_modification_coeffs: None,
        }
    }
}

impl TransportProperties {
    /// 床面物质的含水率 Cw_b = (rho_s - rho_b)/(rho_s - rho_w)
    pub fn cw_b(&self) -> f64 {
        (self.rho_s - self.rho_b) / (self.rho_s - self.rho_w)
    }

    /// 床面物质的体积浓度 Cv_b = (rho_b - rho_w)/(rho_s - rho_w)
    pub fn cv_b(&self) -> f64 {
        (self.rho_b - self.rho_w) / (self.rho_s - self.rho_w)
    }

    /// 启用地形修正时的系数
    pub fn terrain_coeffs(&self) -> Result<Option<&TerrainModificationCoeffs>, ConfigError> {
        if !self.terrain_modification {
            return Ok(None);
        }
        self.terrain_modification_coeffs
            .as_ref()
            .map(Some)
            .ok_or_else(|| ConfigError::Missing("transportProperties.terrainModificationCoeffs".into()))
    }

    /// 校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("transportProperties.hmin", self.hmin)?;
        require_non_negative("transportProperties.shi", self.shi)?;
        require_positive("transportProperties.rho_w", self.rho_w)?;
        if self.rho_s <= self.rho_w {
            return Err(ConfigError::invalid(
                "transportProperties.rho_s",
                self.rho_s,
                "固体密度必须大于水密度",
            ));
        }
        require_in("transportProperties.rho_b", self.rho_b, self.rho_w, self.rho_s)?;
        require_positive("transportProperties.u0", self.u0)?;
        require_positive("transportProperties.h0", self.h0)?;

        self.friction.validate()?;
        self.entrainment.validate()?;
        self.deposition.validate()?;

        if let Some(coeffs) = self.terrain_coeffs()? {
            coeffs.validate()?;
        }
        Ok(())
    }
}

/// 地形修正系数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainModificationCoeffs {
    /// 地形迭代上限
    #[serde(rename = "nTerrainIter", default = "default_n_terrain_iter")]
    pub n_terrain_iter: usize,
    /// 允许残留的高程变化 [m]（必需）
    #[serde(rename = "deltahMin")]
    pub deltah_min: f64,
    /// 低于此流深的网格点不移动 [m]（必需）
    #[serde(rename = "hMinterrain")]
    pub h_min_terrain: f64,
    /// 网格点位移松弛系数
    #[serde(default = "default_alpha_relax")]
    pub alpha_relax: f64,
    /// 触发平滑的阈值系数（相对 deltahMin）
    #[serde(default = "default_alpha_smooth")]
    pub alpha_smooth: f64,
    /// 局部一致性判据系数
    #[serde(default = "default_alpha_gamma")]
    pub alpha_gamma: f64,
    /// 单次可转移量系数
    #[serde(default = "default_beta_gamma")]
    pub beta_gamma: f64,
    /// 每次调用的平滑遍数上限
    #[serde(rename = "nSmoothPasses", default = "default_n_smooth_passes")]
    pub n_smooth_passes: usize,
}

fn default_n_terrain_iter() -> usize { 5 }
fn default_alpha_relax() -> f64 { 0.85 }
fn default_alpha_smooth() -> f64 { 0.7 }
fn default_alpha_gamma() -> f64 { 0.1 }
fn default_beta_gamma() -> f64 { 0.6 }
fn default_n_smooth_passes() -> usize { 1 }

impl TerrainModificationCoeffs {
    /// 以两个必需参数创建，其余取默认值
    pub fn new(deltah_min: f64, h_min_terrain: f64) -> Self {
        Self {
            n_terrain_iter: default_n_terrain_iter(),
            deltah_min,
            h_min_terrain,
            alpha_relax: default_alpha_relax(),
            alpha_smooth: default_alpha_smooth(),
            alpha_gamma: default_alpha_gamma(),
            beta_gamma: default_beta_gamma(),
            n_smooth_passes: default_n_smooth_passes(),
        }
    }

    /// 设置地形迭代上限
    pub fn with_n_terrain_iter(mut self, n: usize) -> Self {
        self.n_terrain_iter = n;
        self
    }

    /// 设置平滑遍数
    pub fn with_smooth_passes(mut self, n: usize) -> Self {
        self.n_smooth_passes = n;
        self
    }

    /// 校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("terrainModificationCoeffs.deltahMin", self.deltah_min)?;
        require_non_negative("terrainModificationCoeffs.hMinterrain", self.h_min_terrain)?;
        require_in("terrainModificationCoeffs.alpha_relax", self.alpha_relax, 0.0, 1.0)?;
        require_non_negative("terrainModificationCoeffs.alpha_smooth", self.alpha_smooth)?;
        require_in("terrainModificationCoeffs.alpha_gamma", self.alpha_gamma, 0.0, 1.0)?;
        require_in("terrainModificationCoeffs.beta_gamma", self.beta_gamma, 0.0, 1.0)?;
        Ok(())
    }
}
