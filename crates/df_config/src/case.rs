// crates/df_config/src/case.rs

//! 算例配置（顶层）
//!
//! 一个 JSON 文件描述完整算例：网格来源、重力、输运参数、求解控制、
//! 时间控制、边界、水文过程线、初始条件、输出与分区。
//!
//! # 使用示例
//!
//! ```ignore
//! use df_config::CaseConfig;
//!
//! let case = CaseConfig::from_file("case.json")?;
//! println!("摩擦模型: {}", case.transport.friction.name());
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::controls::{SolutionControls, TimeControls};
use crate::error::{require_positive, ConfigError};
use crate::hydrograph::HydrographConfig;
use crate::initial::InitialConditions;
use crate::transport::TransportProperties;

/// 网格来源
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MeshSource {
    /// 矩形结构网格（边界名 left/right/bottom/top）
    Rectangle {
        /// x 方向单元数
        nx: usize,
        /// y 方向单元数
        ny: usize,
        /// x 方向单元尺寸 [m]
        dx: f64,
        /// y 方向单元尺寸 [m]
        dy: f64,
        /// 原点
        #[serde(default)]
        origin: [f64; 3],
        /// 地面高程沿 x 的坡度 dz/dx
        #[serde(default)]
        slope_x: f64,
        /// 地面高程沿 y 的坡度 dz/dy
        #[serde(default)]
        slope_y: f64,
    },
    /// JSON 网格文件（points / faces / patches）
    File {
        /// 文件路径（相对于算例文件所在目录）
        path: PathBuf,
    },
}

impl Default for MeshSource {
    fn default() -> Self {
        Self::Rectangle {
            nx: 20,
            ny: 20,
            dx: 1.0,
            dy: 1.0,
            origin: [0.0; 3],
            slope_x: 0.0,
            slope_y: 0.0,
        }
    }
}

impl MeshSource {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Rectangle { nx, ny, dx, dy, .. } => {
                if *nx == 0 || *ny == 0 {
                    return Err(ConfigError::invalid(
                        "mesh.nx/ny",
                        format!("{nx}x{ny}"),
                        "单元数必须为正",
                    ));
                }
                require_positive("mesh.dx", *dx)?;
                require_positive("mesh.dy", *dy)
            }
            Self::File { path } => {
                if path.as_os_str().is_empty() {
                    Err(ConfigError::Missing("mesh.path".into()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// 物理边界类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    /// 零梯度出流
    #[default]
    Outflow,
    /// 滑移固壁（法向速度为零）
    Wall,
}

/// 物理边界设置（未列出的边界按出流处理）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySpec {
    /// 边界名
    pub patch: String,
    /// 边界类型
    #[serde(rename = "type", default)]
    pub kind: BoundaryKind,
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 输出目录
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    /// 是否输出初始时刻
    #[serde(rename = "writeInitial", default = "default_true")]
    pub write_initial: bool,
}

fn default_output_dir() -> PathBuf { PathBuf::from("output") }
fn default_true() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            write_initial: true,
        }
    }
}

/// 分区配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionConfig {
    /// 分区数（沿 x 方向条带划分）
    #[serde(rename = "numberOfSubdomains", default = "default_partitions")]
    pub partitions: usize,
}

fn default_partitions() -> usize { 1 }

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
        }
    }
}

/// 顶层算例配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    /// 网格来源
    #[serde(default)]
    pub mesh: MeshSource,
    /// 重力加速度向量 [m/s²]
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],
    /// 输运与材料参数
    #[serde(rename = "transportProperties")]
    pub transport: TransportProperties,
    /// 求解控制
    #[serde(default)]
    pub solution: SolutionControls,
    /// 时间控制
    pub time: TimeControls,
    /// 物理边界
    #[serde(default)]
    pub boundaries: Vec<BoundarySpec>,
    /// 入流过程线
    #[serde(default)]
    pub hydrographs: Vec<HydrographConfig>,
    /// 初始条件
    #[serde(rename = "initialConditions", default)]
    pub initial: InitialConditions,
    /// 输出
    #[serde(default)]
    pub output: OutputConfig,
    /// 分区
    #[serde(default)]
    pub decomposition: DecompositionConfig,
}

fn default_gravity() -> [f64; 3] { [0.0, 0.0, -9.81] }

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            mesh: MeshSource::default(),
            gravity: default_gravity(),
            transport: TransportProperties::default(),
            solution: SolutionControls::default(),
            time: TimeControls::default(),
            boundaries: Vec::new(),
            hydrographs: Vec::new(),
            initial: InitialConditions::default(),
            output: OutputConfig::default(),
            decomposition: DecompositionConfig::default(),
        }
    }
}

impl CaseConfig {
    /// 从文件加载并校验；网格文件路径按算例文件目录解析
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&content)?;
        if let MeshSource::File { path: mesh_path } = &mut config.mesh {
            if mesh_path.is_relative() {
                if let Some(dir) = path.parent() {
                    *mesh_path = dir.join(&*mesh_path);
                }
            }
        }
        Ok(config)
    }

    /// 从 JSON 字符串解析并校验
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: CaseConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 校验（不含依赖网格的检查，如边界名是否存在）
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mesh.validate()?;
        let g = self.gravity;
        if (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt() <= 0.0 {
            return Err(ConfigError::invalid(
                "gravity",
                format!("{g:?}"),
                "重力不能为零向量",
            ));
        }
        self.transport.validate()?;
        self.solution.validate()?;
        self.time.validate()?;
        self.initial.validate()?;
        for h in &self.hydrographs {
            h.validate()?;
        }
        let mut seen = std::collections::HashSet::new();
        for b in self
            .boundaries
            .iter()
            .map(|b| b.patch.as_str())
            .chain(self.hydrographs.iter().map(|h| h.boundary.as_str()))
        {
            if !seen.insert(b) {
                return Err(ConfigError::invalid(
                    "boundaries",
                    b,
                    "同一边界被重复指定",
                ));
            }
        }
        if self.decomposition.partitions == 0 {
            return Err(ConfigError::invalid(
                "decomposition.numberOfSubdomains",
                0,
                "至少为 1",
            ));
        }
        Ok(())
    }

    /// 重力模长
    pub fn gravity_magnitude(&self) -> f64 {
        let g = self.gravity;
        (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CaseConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.gravity_magnitude() - 9.81).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_boundary() {
        let mut config = CaseConfig::default();
        config.boundaries.push(BoundarySpec {
            patch: "left".into(),
            kind: BoundaryKind::Wall,
        });
        config.boundaries.push(BoundarySpec {
            patch: "left".into(),
            kind: BoundaryKind::Outflow,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = CaseConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = CaseConfig::from_json(&json).unwrap();
        assert_eq!(parsed.transport.friction.name(), config.transport.friction.name());
        assert_eq!(parsed.solution.n_outer_correctors, 50);
    }
}
