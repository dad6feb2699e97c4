// crates/df_config/src/closure.rs

//! 闭合模型选择与系数
//!
//! 摩擦、侵蚀、淤积三类模型各自是一个封闭的标签枚举，通过 `"model"` 字段选择。
//! 未知模型名在解析阶段即失败，错误信息列出全部可用名称。
//!
//! ```json
//! "friction":    { "model": "Voellmy", "mu": 0.2, "xi": 500 },
//! "entrainment": { "model": "Takahashi", "phi": 0.6, "deltae": 0.0007, "d": 0.1, "tauc": 0 },
//! "deposition":  { "model": "depositionOff" }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{require_in, require_non_negative, require_positive, ConfigError};
use crate::field::{FieldSpec, ZoneSpec};

// ============================================================================
// 摩擦
// ============================================================================

/// 摩擦模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum FrictionConfig {
    /// Manning-Strickler 糙率公式
    ManningStrickler(ManningStricklerCoeffs),
    /// Voellmy 库仑 + 湍流摩擦
    Voellmy(VoellmyCoeffs),
    /// 按体积浓度在 Voellmy 与 Manning 之间切换
    VoellmyManning(VoellmyManningCoeffs),
    /// 二次流变（屈服应力 + 粘性 + 紊动）
    Quadratic(QuadraticCoeffs),
}

/// 摩擦模型名称
pub const FRICTION_MODELS: &[&str] = &["ManningStrickler", "Voellmy", "VoellmyManning", "Quadratic"];

/// Manning-Strickler 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManningStricklerCoeffs {
    /// Manning 糙率 n [s/m^(1/3)]
    pub n: FieldSpec,
}

/// Voellmy 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoellmyCoeffs {
    /// 库仑摩擦系数
    pub mu: FieldSpec,
    /// 湍流系数 [m/s²]
    pub xi: FieldSpec,
}

/// Voellmy-Manning 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoellmyManningCoeffs {
    /// 库仑摩擦系数
    pub mu: FieldSpec,
    /// 湍流系数
    pub xi: FieldSpec,
    /// Manning 糙率
    pub n: FieldSpec,
    /// 切换浓度：Cv 高于此值使用 Voellmy
    #[serde(rename = "Cvlim")]
    pub cv_lim: f64,
}

/// 二次流变系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticCoeffs {
    /// 层流阻力系数
    #[serde(rename = "K")]
    pub k: FieldSpec,
    /// 紊动项的 Manning 糙率
    pub n: FieldSpec,
    /// 低浓度时使用的 Manning 糙率
    #[serde(rename = "nM")]
    pub n_m: FieldSpec,
    /// 粘度系数 eta = alpha1·exp(beta1·Cv)
    pub alpha1: f64,
    /// 屈服应力系数 Ty = alpha2·exp(beta2·Cv)
    pub alpha2: f64,
    /// 粘度指数
    pub beta1: f64,
    /// 屈服应力指数
    pub beta2: f64,
    /// 切换浓度
    #[serde(rename = "Cvlim")]
    pub cv_lim: f64,
}

impl FrictionConfig {
    /// 模型名
    pub fn name(&self) -> &'static str {
        match self {
            Self::ManningStrickler(_) => "ManningStrickler",
            Self::Voellmy(_) => "Voellmy",
            Self::VoellmyManning(_) => "VoellmyManning",
            Self::Quadratic(_) => "Quadratic",
        }
    }

    /// 校验系数
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::ManningStrickler(c) => c.n.validate_positive("friction.n"),
            Self::Voellmy(c) => {
                c.mu.validate_non_negative("friction.mu")?;
                c.xi.validate_positive("friction.xi")
            }
            Self::VoellmyManning(c) => {
                c.mu.validate_non_negative("friction.mu")?;
                c.xi.validate_positive("friction.xi")?;
                c.n.validate_positive("friction.n")?;
                require_in("friction.Cvlim", c.cv_lim, 0.0, 1.0)
            }
            Self::Quadratic(c) => {
                c.k.validate_non_negative("friction.K")?;
                c.n.validate_positive("friction.n")?;
                c.n_m.validate_positive("friction.nM")?;
                require_non_negative("friction.alpha1", c.alpha1)?;
                require_non_negative("friction.alpha2", c.alpha2)?;
                require_in("friction.Cvlim", c.cv_lim, 0.0, 1.0)
            }
        }
    }
}

impl Default for FrictionConfig {
    fn default() -> Self {
        Self::Voellmy(VoellmyCoeffs {
            mu: FieldSpec::Uniform(0.2),
            xi: FieldSpec::Uniform(500.0),
        })
    }
}

// ============================================================================
// 侵蚀
// ============================================================================

/// 侵蚀（卷入）模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum EntrainmentConfig {
    /// 关闭侵蚀
    #[serde(rename = "entrainmentOff")]
    Off,
    /// Takahashi 平衡浓度公式
    Takahashi(TakahashiCoeffs),
    /// Egashira 平衡坡度公式
    Egashira(EgashiraCoeffs),
    /// Cao 无量纲剪应力公式
    Cao(CaoCoeffs),
    /// 与 h·|U| 成正比的经验公式
    Exponential(ExponentialCoeffs),
    /// 侵蚀能公式
    Erosionenergy(ErosionEnergyCoeffs),
    /// 经验侵蚀速率 + 最大侵蚀深度
    #[serde(rename = "RAMMS")]
    Ramms(RammsCoeffs),
}

/// 侵蚀模型名称
pub const ENTRAINMENT_MODELS: &[&str] = &[
    "entrainmentOff",
    "Takahashi",
    "Egashira",
    "Cao",
    "Exponential",
    "Erosionenergy",
    "RAMMS",
];

/// Takahashi 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakahashiCoeffs {
    /// 内摩擦角 [rad]
    pub phi: f64,
    /// 侵蚀速率系数
    pub deltae: f64,
    /// 代表粒径 [m]
    pub d: f64,
    /// 临界剪应力 [Pa]
    #[serde(default)]
    pub tauc: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

/// Egashira 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgashiraCoeffs {
    /// 内摩擦角 [deg]
    pub phi: f64,
    /// 临界剪应力 [Pa]
    #[serde(default)]
    pub tauc: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

/// Cao 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaoCoeffs {
    /// 代表粒径 [m]
    pub d: f64,
    /// 经验系数
    pub beta: f64,
    /// 临界剪应力 [Pa]
    #[serde(default)]
    pub tauc: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

/// Exponential 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialCoeffs {
    /// 侵蚀系数 [1/m]
    #[serde(rename = "E")]
    pub e: f64,
    /// 临界剪应力 [Pa]
    #[serde(default)]
    pub tauc: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

/// 侵蚀能系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErosionEnergyCoeffs {
    /// 比侵蚀能 [m²/s²]
    pub eb: f64,
    /// 临界剪应力 [Pa]
    #[serde(default)]
    pub tauc: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

/// RAMMS 经验系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RammsCoeffs {
    /// 侵蚀速率 [m/s]
    pub dzdt: f64,
    /// 单位剪应力超量对应的最大侵蚀深度 [m/Pa]
    pub dzdtau: f64,
    /// 临界剪应力 [Pa]
    #[serde(default)]
    pub tauc: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

impl EntrainmentConfig {
    /// 模型名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "entrainmentOff",
            Self::Takahashi(_) => "Takahashi",
            Self::Egashira(_) => "Egashira",
            Self::Cao(_) => "Cao",
            Self::Exponential(_) => "Exponential",
            Self::Erosionenergy(_) => "Erosionenergy",
            Self::Ramms(_) => "RAMMS",
        }
    }

    /// 校验系数
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Off => Ok(()),
            Self::Takahashi(c) => {
                require_in("entrainment.phi", c.phi, 0.0, std::f64::consts::FRAC_PI_2)?;
                require_non_negative("entrainment.deltae", c.deltae)?;
                require_positive("entrainment.d", c.d)?;
                require_non_negative("entrainment.tauc", c.tauc)?;
                c.zones.validate("entrainment.zones")
            }
            Self::Egashira(c) => {
                require_in("entrainment.phi", c.phi, 0.0, 90.0)?;
                require_non_negative("entrainment.tauc", c.tauc)?;
                c.zones.validate("entrainment.zones")
            }
            Self::Cao(c) => {
                require_positive("entrainment.d", c.d)?;
                require_non_negative("entrainment.beta", c.beta)?;
                require_non_negative("entrainment.tauc", c.tauc)?;
                c.zones.validate("entrainment.zones")
            }
            Self::Exponential(c) => {
                require_non_negative("entrainment.E", c.e)?;
                require_non_negative("entrainment.tauc", c.tauc)?;
                c.zones.validate("entrainment.zones")
            }
            Self::Erosionenergy(c) => {
                require_positive("entrainment.eb", c.eb)?;
                require_non_negative("entrainment.tauc", c.tauc)?;
                c.zones.validate("entrainment.zones")
            }
            Self::Ramms(c) => {
                require_non_negative("entrainment.dzdt", c.dzdt)?;
                require_non_negative("entrainment.dzdtau", c.dzdtau)?;
                require_non_negative("entrainment.tauc", c.tauc)?;
                c.zones.validate("entrainment.zones")
            }
        }
    }
}

impl Default for EntrainmentConfig {
    fn default() -> Self {
        Self::Off
    }
}

// ============================================================================
// 淤积
// ============================================================================

/// 淤积模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum DepositionConfig {
    /// 关闭淤积
    #[serde(rename = "depositionOff")]
    Off,
    /// Uchida 平衡浓度公式
    Uchida(UchidaCoeffs),
    /// 停积剖面模型
    Stoppingprofile(StoppingProfileCoeffs),
}

/// 淤积模型名称
pub const DEPOSITION_MODELS: &[&str] = &["depositionOff", "Uchida", "Stoppingprofile"];

/// Uchida 系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UchidaCoeffs {
    /// 内摩擦角 [rad]
    pub phi: f64,
    /// 淤积速率系数
    pub deltad: f64,
    /// 代表粒径 [m]
    pub d: f64,
    /// 低于此流深不淤积 [m]
    pub hmin: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

/// 停积剖面系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppingProfileCoeffs {
    /// 开始淤积的速度 [m/s]
    pub ud: f64,
    /// 剖面指数
    pub ad: f64,
    /// 低于此流深不淤积 [m]
    pub hmin: f64,
    /// 作用区域
    #[serde(default)]
    pub zones: ZoneSpec,
}

impl DepositionConfig {
    /// 模型名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "depositionOff",
            Self::Uchida(_) => "Uchida",
            Self::Stoppingprofile(_) => "Stoppingprofile",
        }
    }

    /// 校验系数
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Off => Ok(()),
            Self::Uchida(c) => {
                require_in("deposition.phi", c.phi, 0.0, std::f64::consts::FRAC_PI_2)?;
                require_non_negative("deposition.deltad", c.deltad)?;
                require_positive("deposition.d", c.d)?;
                require_non_negative("deposition.hmin", c.hmin)?;
                c.zones.validate("deposition.zones")
            }
            Self::Stoppingprofile(c) => {
                require_positive("deposition.ud", c.ud)?;
                require_non_negative("deposition.ad", c.ad)?;
                require_non_negative("deposition.hmin", c.hmin)?;
                c.zones.validate("deposition.zones")
            }
        }
    }
}

impl Default for DepositionConfig {
    fn default() -> Self {
        Self::Off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voellmy() {
        let f: FrictionConfig =
            serde_json::from_str(r#"{ "model": "Voellmy", "mu": 0.2, "xi": 500 }"#).unwrap();
        assert_eq!(f.name(), "Voellmy");
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_unknown_friction_lists_valid_names() {
        let err = serde_json::from_str::<FrictionConfig>(r#"{ "model": "Bingham", "mu": 0.2 }"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("Bingham"));
        for name in FRICTION_MODELS {
            assert!(err.contains(name), "{err} 应包含 {name}");
        }
    }

    #[test]
    fn test_unknown_entrainment_rejected() {
        let err = serde_json::from_str::<EntrainmentConfig>(r#"{ "model": "Hungr" }"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("RAMMS"));
        assert!(err.contains("Takahashi"));
    }

    #[test]
    fn test_off_variants() {
        let e: EntrainmentConfig = serde_json::from_str(r#"{ "model": "entrainmentOff" }"#).unwrap();
        assert_eq!(e, EntrainmentConfig::Off);
        let d: DepositionConfig = serde_json::from_str(r#"{ "model": "depositionOff" }"#).unwrap();
        assert_eq!(d.name(), "depositionOff");
    }

    #[test]
    fn test_ramms_name_roundtrip() {
        let e: EntrainmentConfig = serde_json::from_str(
            r#"{ "model": "RAMMS", "dzdt": 0.01, "dzdtau": 0.1, "tauc": 1000 }"#,
        )
        .unwrap();
        assert_eq!(e.name(), "RAMMS");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"RAMMS\""));
    }

    #[test]
    fn test_invalid_coefficients() {
        let f = FrictionConfig::VoellmyManning(VoellmyManningCoeffs {
            mu: 0.2.into(),
            xi: 500.0.into(),
            n: 0.03.into(),
            cv_lim: 1.5,
        });
        assert!(f.validate().is_err());

        let d = DepositionConfig::Stoppingprofile(StoppingProfileCoeffs {
            ud: 0.0,
            ad: 1.0,
            hmin: 0.01,
            zones: ZoneSpec::Uniform,
        });
        assert!(d.validate().is_err());
    }
}
