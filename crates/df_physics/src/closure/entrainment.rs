// crates/df_physics/src/closure/entrainment.rs

//! 侵蚀模型
//!
//! 侵蚀速率 Sm [m/s] 为床面厚度的减小速率，乘以作用区域掩码 eZ。
//! 共同的截断规则：
//!
//! - `0 ≤ Sm ≤ he/Δt`
//! - `h < h0` 或 `|Us| < u0` 时为零
//! - 剪应力低于临界值 tauc 时为零（Cao 通过无量纲剪应力超量体现）

use df_config::closure::{
    CaoCoeffs, EgashiraCoeffs, ErosionEnergyCoeffs, ExponentialCoeffs, RammsCoeffs, TakahashiCoeffs,
};
use df_config::EntrainmentConfig;
use df_mesh::FaMesh;

use super::field::zone_mask;
use super::{inclination, limit_entrainment, ClosureContext, EntrainmentModel};

/// 按配置构建侵蚀模型
pub fn build(config: &EntrainmentConfig, mesh: &FaMesh) -> Box<dyn EntrainmentModel> {
    match config {
        EntrainmentConfig::Off => Box::new(EntrainmentOff),
        EntrainmentConfig::Takahashi(c) => Box::new(Takahashi::new(c, mesh)),
        EntrainmentConfig::Egashira(c) => Box::new(Egashira::new(c, mesh)),
        EntrainmentConfig::Cao(c) => Box::new(Cao::new(c, mesh)),
        EntrainmentConfig::Exponential(c) => Box::new(Exponential::new(c, mesh)),
        EntrainmentConfig::Erosionenergy(c) => Box::new(ErosionEnergy::new(c, mesh)),
        EntrainmentConfig::Ramms(c) => Box::new(Ramms::new(c, mesh)),
    }
}

/// Takahashi/Uchida 平衡浓度 `Ce = rho_w·tanθ / ((rho_s - rho_w)(tanφ - tanθ))`，截断到 [0, 1]
#[inline]
pub(crate) fn equilibrium_concentration(theta: f64, phi: f64, rho_w: f64, rho_s: f64) -> f64 {
    let ce = rho_w * theta.tan() / ((rho_s - rho_w) * (phi.tan() - theta.tan()));
    ce.max(0.0).min(1.0)
}

/// 逐面计算侵蚀速率并截断
///
/// `rate(i, |U|, |tau|)` 给出未截断的速率，不含 eZ。
fn entrainment_field<F>(ctx: &ClosureContext<'_>, zones: &[f64], tauc: f64, rate: F) -> Vec<f64>
where
    F: Fn(usize, f64, f64) -> f64,
{
    let s = ctx.state;
    (0..s.n_faces())
        .map(|i| {
            let mag_u = s.us[i].length();
            let mag_tau = s.tau[i].length();
            if !ctx.is_active(i, mag_u) || mag_tau < tauc {
                return 0.0;
            }
            limit_entrainment(rate(i, mag_u, mag_tau) * zones[i], s.he[i], ctx.dt)
        })
        .collect()
}

// ============================================================================
// entrainmentOff
// ============================================================================

/// 关闭侵蚀
#[derive(Debug, Clone, Copy)]
pub struct EntrainmentOff;

impl EntrainmentModel for EntrainmentOff {
    fn name(&self) -> &'static str {
        "entrainmentOff"
    }

    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        vec![0.0; ctx.state.n_faces()]
    }
}

// ============================================================================
// Takahashi
// ============================================================================

/// Takahashi 平衡浓度侵蚀
///
/// `Sm = deltae·(Ce - Cv)/Cvb·|U|·h/d`
#[derive(Debug, Clone)]
pub struct Takahashi {
    coeffs: TakahashiCoeffs,
    zones: Vec<f64>,
}

impl Takahashi {
    fn new(c: &TakahashiCoeffs, mesh: &FaMesh) -> Self {
        Self {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }
    }
}

impl EntrainmentModel for Takahashi {
    fn name(&self) -> &'static str {
        "Takahashi"
    }

    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        let p = ctx.params;
        let cv_b = p.cv_b();
        let normals = ctx.mesh.normals();
        entrainment_field(ctx, &self.zones, c.tauc, |i, mag_u, _| {
            let ce = equilibrium_concentration(inclination(normals[i]), c.phi, p.rho_w, p.rho_s);
            c.deltae * (ce - ctx.state.cv[i]) / cv_b * mag_u * ctx.state.h[i] / c.d
        })
    }
}

// ============================================================================
// Egashira
// ============================================================================

/// Egashira 平衡坡度侵蚀
///
/// `θe = atan(Cv(ρs-ρw)/(Cv(ρs-ρw)+ρw)·tanφ)`，`Sm = |U|·tan(θ - θe)`，φ 以度给出。
#[derive(Debug, Clone)]
pub struct Egashira {
    coeffs: EgashiraCoeffs,
    zones: Vec<f64>,
}

impl Egashira {
    fn new(c: &EgashiraCoeffs, mesh: &FaMesh) -> Self {
        Self {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }
    }
}

impl EntrainmentModel for Egashira {
    fn name(&self) -> &'static str {
        "Egashira"
    }

    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        let p = ctx.params;
        let tan_phi = c.phi.to_radians().tan();
        let normals = ctx.mesh.normals();
        entrainment_field(ctx, &self.zones, c.tauc, |i, mag_u, _| {
            let solid = ctx.state.cv[i] * (p.rho_s - p.rho_w);
            let theta_e = (solid / (solid + p.rho_w) * tan_phi).atan();
            mag_u * (inclination(normals[i]) - theta_e).tan()
        })
    }
}

// ============================================================================
// Cao
// ============================================================================

/// Cao 无量纲剪应力侵蚀
///
/// `Sm = β·(θ - θc)·|U|/(h + h0)·d^-0.2`，`θ = |tau|/(ρ·g·s·d)`，`s = (ρs - ρw)/ρw`
#[derive(Debug, Clone)]
pub struct Cao {
    coeffs: CaoCoeffs,
    zones: Vec<f64>,
}

impl Cao {
    fn new(c: &CaoCoeffs, mesh: &FaMesh) -> Self {
        Self {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }
    }
}

impl EntrainmentModel for Cao {
    fn name(&self) -> &'static str {
        "Cao"
    }

    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        let p = ctx.params;
        let g = p.g_mag();
        let s = (p.rho_s - p.rho_w) / p.rho_w;
        let d_factor = c.d.powf(-0.2);
        entrainment_field(ctx, &self.zones, 0.0, |i, mag_u, mag_tau| {
            let scale = ctx.state.rho[i] * g * s * c.d;
            let excess = (mag_tau - c.tauc) / scale;
            c.beta * excess * mag_u / (ctx.state.h[i] + p.h0) * d_factor
        })
    }
}

// ============================================================================
// Exponential
// ============================================================================

/// 与 h·|U| 成正比的经验侵蚀 `Sm = E·h·|U|`
#[derive(Debug, Clone)]
pub struct Exponential {
    coeffs: ExponentialCoeffs,
    zones: Vec<f64>,
}

impl Exponential {
    fn new(c: &ExponentialCoeffs, mesh: &FaMesh) -> Self {
        Self {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }
    }
}

impl EntrainmentModel for Exponential {
    fn name(&self) -> &'static str {
        "Exponential"
    }

    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        entrainment_field(ctx, &self.zones, c.tauc, |i, mag_u, _| {
            c.e * ctx.state.h[i] * mag_u
        })
    }
}

// ============================================================================
// Erosionenergy
// ============================================================================

/// 侵蚀能 `Sm = (tau·Us)/(eb·ρ)`
#[derive(Debug, Clone)]
pub struct ErosionEnergy {
    coeffs: ErosionEnergyCoeffs,
    zones: Vec<f64>,
}

impl ErosionEnergy {
    fn new(c: &ErosionEnergyCoeffs, mesh: &FaMesh) -> Self {
        Self {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }
    }
}

impl EntrainmentModel for ErosionEnergy {
    fn name(&self) -> &'static str {
        "Erosionenergy"
    }

    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        let s = ctx.state;
        entrainment_field(ctx, &self.zones, c.tauc, |i, _, _| {
            s.tau[i].dot(s.us[i]) / c.eb / s.rho[i]
        })
    }
}

// ============================================================================
// RAMMS
// ============================================================================

/// 经验侵蚀速率，累计侵蚀深度受剪应力超量限制
///
/// `Sm = dzdt`；`|tau| ≤ tauc` 或 `he0 - he > (|tau| - tauc)·dzdtau` 时为零。
#[derive(Debug, Clone)]
pub struct Ramms {
    coeffs: RammsCoeffs,
    zones: Vec<f64>,
}

impl Ramms {
    fn new(c: &RammsCoeffs, mesh: &FaMesh) -> Self {
        Self {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }
    }
}

impl EntrainmentModel for Ramms {
    fn name(&self) -> &'static str {
        "RAMMS"
    }

    fn sm(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        let s = ctx.state;
        entrainment_field(ctx, &self.zones, 0.0, |i, _, mag_tau| {
            if mag_tau <= c.tauc {
                return 0.0;
            }
            let eroded = s.he0[i] - s.he[i];
            let max_depth = (mag_tau - c.tauc) * c.dzdtau;
            if eroded > max_depth {
                0.0
            } else {
                c.dzdt
            }
        })
    }
}
