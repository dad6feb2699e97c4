// crates/df_config/src/initial.rs

//! 初始场（释放区）配置
//!
//! 每个标量场由默认值和按顺序应用的区域组成，后面的区域覆盖前面的结果：
//!
//! - `polygon`: 多边形内取常数，可选除以面法向竖直分量（`projectToNormal`）
//! - `polygonlinear`: 多边形内取线性函数
//! - `sphere`: 球冠形堆积体

use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_positive, ConfigError};
use crate::field::PolygonSpec;

/// 释放区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReleaseRegion {
    /// 多边形常数
    Polygon {
        /// 区域名
        #[serde(default)]
        name: String,
        /// 顶点平移量
        #[serde(default)]
        offset: [f64; 2],
        /// 顶点
        vertices: Vec<[f64; 2]>,
        /// 取值
        value: f64,
        /// 是否投影到面法向
        #[serde(rename = "projectToNormal", default)]
        project_to_normal: bool,
    },
    /// 多边形线性函数 f = f0 + dfdx(x-x0) + dfdy(y-y0) + dfdz(z-z0)
    Polygonlinear {
        /// 区域名
        #[serde(default)]
        name: String,
        /// 顶点平移量
        #[serde(default)]
        offset: [f64; 2],
        /// 顶点
        vertices: Vec<[f64; 2]>,
        /// 参考点处取值
        #[serde(rename = "valueAtZero")]
        value_at_zero: f64,
        /// 参考点 x
        #[serde(default)]
        x0: f64,
        /// 参考点 y
        #[serde(default)]
        y0: f64,
        /// 参考点 z
        #[serde(default)]
        z0: f64,
        /// x 方向梯度
        #[serde(default)]
        dfdx: f64,
        /// y 方向梯度
        #[serde(default)]
        dfdy: f64,
        /// z 方向梯度
        #[serde(default)]
        dfdz: f64,
        /// 是否投影到面法向
        #[serde(rename = "projectToNormal", default)]
        project_to_normal: bool,
    },
    /// 球冠
    Sphere {
        /// 球心
        center: [f64; 3],
        /// 半径
        r: f64,
        /// 缩放系数
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

fn default_scale() -> f64 { 1.0 }

impl ReleaseRegion {
    /// 多边形类区域的几何
    pub fn polygon(&self) -> Option<PolygonSpec> {
        match self {
            Self::Polygon {
                name,
                offset,
                vertices,
                ..
            }
            | Self::Polygonlinear {
                name,
                offset,
                vertices,
                ..
            } => Some(PolygonSpec {
                name: name.clone(),
                offset: *offset,
                vertices: vertices.clone(),
            }),
            Self::Sphere { .. } => None,
        }
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        match self {
            Self::Sphere { r, .. } => require_positive(&format!("{key}.r"), *r),
            _ => match self.polygon() {
                Some(p) if p.vertices.len() < 3 => Err(ConfigError::invalid(
                    format!("{key}.vertices"),
                    p.vertices.len(),
                    "多边形至少需要 3 个顶点",
                )),
                _ => Ok(()),
            },
        }
    }
}

/// 单个标量初始场
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialField {
    /// 默认值
    #[serde(default)]
    pub default: f64,
    /// 区域（按顺序覆盖）
    #[serde(default)]
    pub regions: Vec<ReleaseRegion>,
}

impl InitialField {
    /// 全场常数
    pub fn uniform(value: f64) -> Self {
        Self {
            default: value,
            regions: Vec::new(),
        }
    }
}

/// 初始条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitialConditions {
    /// 流深 [m]
    #[serde(default)]
    pub h: InitialField,
    /// 可侵蚀层厚度 [m]
    #[serde(default)]
    pub he: InitialField,
    /// 体积浓度
    #[serde(rename = "Cv", default)]
    pub cv: InitialField,
    /// 初始速度 [m/s]
    #[serde(rename = "Us", default)]
    pub us: [f64; 3],
}

impl InitialConditions {
    /// 校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("initialConditions.h.default", self.h.default)?;
        require_non_negative("initialConditions.he.default", self.he.default)?;
        crate::error::require_in("initialConditions.Cv.default", self.cv.default, 0.0, 1.0)?;
        for (name, field) in [("h", &self.h), ("he", &self.he), ("Cv", &self.cv)] {
            for r in &field.regions {
                r.validate(&format!("initialConditions.{name}"))?;
            }
        }
        Ok(())
    }
}
