// crates/df_physics/src/closure/friction.rs

//! 摩擦模型
//!
//! 所有模型只给出隐式系数 tauSp，底部摩擦 `tau = tauSp·Us`：
//!
//! ```text
//! ManningStrickler: rho·n²·g·(|u|+u0) / (h+h0)^(1/3)
//! Voellmy:          pb·mu/(|u|+u0) + rho·g/xi·|u|
//! VoellmyManning:   a·Voellmy + (1-a)·Manning,           a = [Cv > Cvlim]
//! Quadratic:        a·[Ty/(|u|+u0) + K·eta/(8(h+h0)) + rho·n²·g·|u|/(h+h0)^(1/3)]
//!                   + (1-a)·Manning(nM)
//! ```
//!
//! 入流边界的均匀流解按各模型的阻力律反解，坡度或阻力退化时退回临界流。

use df_config::closure::{QuadraticCoeffs, VoellmyManningCoeffs};
use df_config::FrictionConfig;
use df_foundation::{pos, SMALL};
use df_mesh::FaMesh;

use super::channel::{critical_flow, ChannelProfile, UniformFlow};
use super::field::face_field;
use super::{ClosureContext, FrictionModel, InflowSample};
use crate::types::MaterialParams;

/// 二次流变均匀流迭代上限
const MAX_QUADRATIC_ITER: usize = 100;

/// 二次流变均匀流迭代的相对收敛容差
const QUADRATIC_TOLERANCE: f64 = 0.01;

/// 按配置构建摩擦模型
pub fn build(config: &FrictionConfig, mesh: &FaMesh) -> Box<dyn FrictionModel> {
    match config {
        FrictionConfig::ManningStrickler(c) => Box::new(ManningStrickler {
            n: face_field(mesh, &c.n),
        }),
        FrictionConfig::Voellmy(c) => Box::new(Voellmy {
            mu: face_field(mesh, &c.mu),
            xi: face_field(mesh, &c.xi),
        }),
        FrictionConfig::VoellmyManning(c) => Box::new(VoellmyManning::new(c, mesh)),
        FrictionConfig::Quadratic(c) => Box::new(Quadratic::new(c, mesh)),
    }
}

// ============================================================================
// 单点公式
// ============================================================================

#[inline]
fn manning_sp(rho: f64, n: f64, g: f64, mag_u: f64, h: f64, p: &MaterialParams) -> f64 {
    rho * n * n * g * (mag_u + p.u0) / (h + p.h0).cbrt()
}

#[inline]
fn voellmy_sp(pb: f64, rho: f64, mu: f64, xi: f64, g: f64, mag_u: f64, p: &MaterialParams) -> f64 {
    pb * mu / (mag_u + p.u0) + rho * g / (xi + SMALL) * mag_u
}

fn manning_uniform(profile: &ChannelProfile, q: f64, n: f64, g: f64) -> UniformFlow {
    let b = profile.total_width();
    let sum: f64 = profile
        .wide
        .iter()
        .zip(&profile.slope)
        .map(|(w, s)| w * s.to_radians().tan().max(0.0).sqrt())
        .sum();
    let lambda = sum.powf(0.6);
    if lambda <= SMALL || b <= SMALL {
        tracing::warn!(q, "入流断面坡度为零, Manning 均匀流退回临界流");
        return critical_flow(q, b, g);
    }
    UniformFlow {
        ut: q.powf(0.4) / n.powf(0.6) * lambda / b,
        htu: (q * n).powf(0.6) / lambda,
        critical: false,
    }
}

fn voellmy_uniform(profile: &ChannelProfile, q: f64, mu: f64, xi: f64, g: f64) -> UniformFlow {
    let b = profile.total_width();
    let sum: f64 = profile
        .wide
        .iter()
        .zip(&profile.slope)
        .map(|(w, s)| {
            let s = s.to_radians();
            w * (s.sin() - mu * s.cos()).max(0.0).sqrt()
        })
        .sum();
    let lambda = sum.powf(2.0 / 3.0);
    if lambda <= SMALL || b <= SMALL {
        tracing::warn!(q, mu, "入流断面坡度不足以克服库仑摩擦, Voellmy 均匀流退回临界流");
        return critical_flow(q, b, g);
    }
    UniformFlow {
        ut: (q * xi).cbrt() / b * lambda,
        htu: (q / xi.sqrt()).powf(2.0 / 3.0) / lambda,
        critical: false,
    }
}

// ============================================================================
// Manning-Strickler
// ============================================================================

/// Manning-Strickler 摩擦
#[derive(Debug, Clone)]
pub struct ManningStrickler {
    /// 糙率场
    pub n: Vec<f64>,
}

impl FrictionModel for ManningStrickler {
    fn name(&self) -> &'static str {
        "ManningStrickler"
    }

    fn tau_sp(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let g = ctx.params.g_mag();
        let s = ctx.state;
        (0..s.n_faces())
            .map(|i| manning_sp(s.rho[i], self.n[i], g, s.us[i].length(), s.h[i], ctx.params))
            .collect()
    }

    fn uniform_flow(&self, profile: &ChannelProfile, inflow: &InflowSample, params: &MaterialParams) -> UniformFlow {
        manning_uniform(profile, inflow.q, profile.average(&self.n), params.g_mag())
    }
}

// ============================================================================
// Voellmy
// ============================================================================

/// Voellmy 摩擦
#[derive(Debug, Clone)]
pub struct Voellmy {
    /// 库仑摩擦系数场
    pub mu: Vec<f64>,
    /// 湍流系数场
    pub xi: Vec<f64>,
}

impl FrictionModel for Voellmy {
    fn name(&self) -> &'static str {
        "Voellmy"
    }

    fn tau_sp(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let g = ctx.params.g_mag();
        let s = ctx.state;
        (0..s.n_faces())
            .map(|i| {
                voellmy_sp(s.pb[i], s.rho[i], self.mu[i], self.xi[i], g, s.us[i].length(), ctx.params)
            })
            .collect()
    }

    fn uniform_flow(&self, profile: &ChannelProfile, inflow: &InflowSample, params: &MaterialParams) -> UniformFlow {
        voellmy_uniform(
            profile,
            inflow.q,
            profile.average(&self.mu),
            profile.average(&self.xi),
            params.g_mag(),
        )
    }
}

// ============================================================================
// Voellmy-Manning
// ============================================================================

/// 按体积浓度在 Voellmy 与 Manning 之间切换
#[derive(Debug, Clone)]
pub struct VoellmyManning {
    voellmy: Voellmy,
    manning: ManningStrickler,
    cv_lim: f64,
}

impl VoellmyManning {
    fn new(c: &VoellmyManningCoeffs, mesh: &FaMesh) -> Self {
        Self {
            voellmy: Voellmy {
                mu: face_field(mesh, &c.mu),
                xi: face_field(mesh, &c.xi),
            },
            manning: ManningStrickler {
                n: face_field(mesh, &c.n),
            },
            cv_lim: c.cv_lim,
        }
    }
}

impl FrictionModel for VoellmyManning {
    fn name(&self) -> &'static str {
        "VoellmyManning"
    }

    fn tau_sp(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let tv = self.voellmy.tau_sp(ctx);
        let tm = self.manning.tau_sp(ctx);
        ctx.state
            .cv
            .iter()
            .zip(tv.iter().zip(&tm))
            .map(|(&cv, (v, m))| {
                let a = pos(cv - self.cv_lim);
                a * v + (1.0 - a) * m
            })
            .collect()
    }

    fn uniform_flow(&self, profile: &ChannelProfile, inflow: &InflowSample, params: &MaterialParams) -> UniformFlow {
        self.voellmy.uniform_flow(profile, inflow, params)
    }
}

// ============================================================================
// 二次流变
// ============================================================================

/// 二次流变摩擦（屈服应力 + 粘性 + 紊动）
#[derive(Debug, Clone)]
pub struct Quadratic {
    k: Vec<f64>,
    n: Vec<f64>,
    manning: ManningStrickler,
    alpha1: f64,
    alpha2: f64,
    beta1: f64,
    beta2: f64,
    cv_lim: f64,
}

impl Quadratic {
    fn new(c: &QuadraticCoeffs, mesh: &FaMesh) -> Self {
        Self {
            k: face_field(mesh, &c.k),
            n: face_field(mesh, &c.n),
            manning: ManningStrickler {
                n: face_field(mesh, &c.n_m),
            },
            alpha1: c.alpha1,
            alpha2: c.alpha2,
            beta1: c.beta1,
            beta2: c.beta2,
            cv_lim: c.cv_lim,
        }
    }

    /// 粘度 eta = alpha1·exp(beta1·Cv)
    #[inline]
    fn viscosity(&self, cv: f64) -> f64 {
        self.alpha1 * (self.beta1 * cv).exp()
    }

    /// 屈服应力 Ty = alpha2·exp(beta2·Cv)
    #[inline]
    fn yield_stress(&self, cv: f64) -> f64 {
        self.alpha2 * (self.beta2 * cv).exp()
    }
}

impl FrictionModel for Quadratic {
    fn name(&self) -> &'static str {
        "Quadratic"
    }

    fn tau_sp(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let g = ctx.params.g_mag();
        let p = ctx.params;
        let s = ctx.state;
        let tm = self.manning.tau_sp(ctx);
        (0..s.n_faces())
            .map(|i| {
                let a = pos(s.cv[i] - self.cv_lim);
                let mag_u = s.us[i].length();
                let hh = s.h[i] + p.h0;
                let quad = self.yield_stress(s.cv[i]) / (mag_u + p.u0)
                    + self.k[i] * self.viscosity(s.cv[i]) / (8.0 * hh)
                    + s.rho[i] * self.n[i] * self.n[i] * g * mag_u / hh.cbrt();
                a * quad + (1.0 - a) * tm[i]
            })
            .collect()
    }

    fn uniform_flow(&self, profile: &ChannelProfile, inflow: &InflowSample, params: &MaterialParams) -> UniformFlow {
        let g = params.g_mag();
        let q = inflow.q;
        if pos(inflow.cv - self.cv_lim) == 0.0 {
            return manning_uniform(profile, q, profile.average(&self.manning.n), g);
        }

        let b = profile.total_width();
        let sin = profile.mean_slope_rad().sin();
        if sin <= SMALL || b <= SMALL {
            tracing::warn!(q, "入流断面坡度为零, 二次流变均匀流退回临界流");
            return critical_flow(q, b, g);
        }

        let n = profile.average(&self.n);
        let k = profile.average(&self.k);
        let eta = self.viscosity(inflow.cv);

        let mut htu = (q * n / (b * sin.sqrt())).powf(0.6);
        let mut utu = q / (b * htu);
        let mut converged = false;
        for _ in 0..MAX_QUADRATIC_ITER {
            let resist = n * n * g / htu.cbrt() + k * eta * b / (8.0 * q * inflow.rho);
            let new = (q / b * g * sin / resist).cbrt();
            if (new - utu).abs() / (SMALL + utu) < QUADRATIC_TOLERANCE {
                utu = new;
                htu = q / (b * utu);
                converged = true;
                break;
            }
            utu = 0.5 * (utu + new);
            htu = q / (b * utu);
        }
        if !converged {
            tracing::warn!(q, utu, htu, "二次流变均匀流迭代未收敛, 使用最后一次迭代值");
        }
        UniformFlow {
            ut: utu,
            htu,
            critical: false,
        }
    }
}
