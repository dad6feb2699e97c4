// crates/df_config/src/field.rs

//! 分区参数场配置
//!
//! 闭合模型的系数可以是全场常数，也可以是"默认值 + 多边形区域覆盖"。
//! 侵蚀/淤积区域（zones）只区分区域内外。
//!
//! ```json
//! { "mu": 0.2 }
//! { "mu": { "default": 0.2, "regions": [
//!     { "name": "fan", "vertices": [[0,0],[10,0],[10,10]], "value": 0.3 } ] } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 平面多边形（按质心的 x/y 判断包含关系）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonSpec {
    /// 区域名（仅用于日志）
    #[serde(default)]
    pub name: String,
    /// 顶点平移量
    #[serde(default)]
    pub offset: [f64; 2],
    /// 多边形顶点 (x, y)
    pub vertices: Vec<[f64; 2]>,
}

impl PolygonSpec {
    /// 平移后的顶点
    pub fn shifted_vertices(&self) -> Vec<[f64; 2]> {
        self.vertices
            .iter()
            .map(|v| [v[0] + self.offset[0], v[1] + self.offset[1]])
            .collect()
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if self.vertices.len() < 3 {
            return Err(ConfigError::invalid(
                format!("{key}.vertices"),
                self.vertices.len(),
                "多边形至少需要 3 个顶点",
            ));
        }
        Ok(())
    }
}

/// 带值的多边形区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionValue {
    /// 区域名
    #[serde(default)]
    pub name: String,
    /// 顶点平移量
    #[serde(default)]
    pub offset: [f64; 2],
    /// 多边形顶点
    pub vertices: Vec<[f64; 2]>,
    /// 区域内的取值
    pub value: f64,
}

impl RegionValue {
    /// 区域的几何部分
    pub fn polygon(&self) -> PolygonSpec {
        PolygonSpec {
            name: self.name.clone(),
            offset: self.offset,
            vertices: self.vertices.clone(),
        }
    }
}

/// 面参数场
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// 全场常数
    Uniform(f64),
    /// 默认值 + 有序区域覆盖（后出现的区域优先）
    Regional {
        /// 区域外的默认值
        default: f64,
        /// 多边形区域
        #[serde(default)]
        regions: Vec<RegionValue>,
    },
}

impl FieldSpec {
    /// 默认值
    pub fn default_value(&self) -> f64 {
        match self {
            Self::Uniform(v) => *v,
            Self::Regional { default, .. } => *default,
        }
    }

    /// 区域列表
    pub fn regions(&self) -> &[RegionValue] {
        match self {
            Self::Uniform(_) => &[],
            Self::Regional { regions, .. } => regions,
        }
    }

    /// 所有可能的取值（默认值与区域值）
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::once(self.default_value()).chain(self.regions().iter().map(|r| r.value))
    }

    /// 检查所有取值非负
    pub fn validate_non_negative(&self, key: &str) -> Result<(), ConfigError> {
        for v in self.values() {
            crate::error::require_non_negative(key, v)?;
        }
        for r in self.regions() {
            r.polygon().validate(key)?;
        }
        Ok(())
    }

    /// 检查所有取值为正
    pub fn validate_positive(&self, key: &str) -> Result<(), ConfigError> {
        for v in self.values() {
            crate::error::require_positive(key, v)?;
        }
        for r in self.regions() {
            r.polygon().validate(key)?;
        }
        Ok(())
    }
}

impl From<f64> for FieldSpec {
    fn from(v: f64) -> Self {
        Self::Uniform(v)
    }
}

/// 侵蚀/淤积作用区域
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ZoneSpec {
    /// 全场有效
    #[default]
    Uniform,
    /// 仅多边形内有效
    Nonuniform {
        /// 作用区域
        zones: Vec<PolygonSpec>,
    },
}

impl ZoneSpec {
    /// 校验
    pub fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if let Self::Nonuniform { zones } = self {
            for z in zones {
                z.validate(key)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_from_number() {
        let f: FieldSpec = serde_json::from_str("0.25").unwrap();
        assert_eq!(f, FieldSpec::Uniform(0.25));
        assert!(f.regions().is_empty());
    }

    #[test]
    fn test_regional_field() {
        let json = r#"{ "default": 0.2, "regions": [
            { "name": "fan", "offset": [1, 0], "vertices": [[0,0],[1,0],[1,1]], "value": 0.4 } ] }"#;
        let f: FieldSpec = serde_json::from_str(json).unwrap();
        assert_eq!(f.default_value(), 0.2);
        assert_eq!(f.regions().len(), 1);
        assert_eq!(f.regions()[0].polygon().shifted_vertices()[0], [1.0, 0.0]);
        assert!(f.validate_positive("mu").is_ok());
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let f = FieldSpec::Regional {
            default: 1.0,
            regions: vec![RegionValue {
                name: "line".into(),
                offset: [0.0, 0.0],
                vertices: vec![[0.0, 0.0], [1.0, 0.0]],
                value: 1.0,
            }],
        };
        assert!(f.validate_non_negative("n").is_err());
    }

    #[test]
    fn test_zone_default_uniform() {
        let z: ZoneSpec = serde_json::from_str(r#"{ "type": "uniform" }"#).unwrap();
        assert_eq!(z, ZoneSpec::Uniform);
        let z: ZoneSpec = serde_json::from_str(
            r#"{ "type": "nonuniform", "zones": [ { "vertices": [[0,0],[1,0],[0,1]] } ] }"#,
        )
        .unwrap();
        assert!(z.validate("eZ").is_ok());
    }
}
