// crates/df_physics/src/closure/deposition.rs

//! 淤积模型
//!
//! 淤积速率 Sd [m/s] 为床面厚度的增加速率，乘以作用区域掩码 dZ，
//! 非负且不超过可用流深对应的速率。`h < h0` 或 `|Us| < u0` 时为零。

use df_config::closure::{StoppingProfileCoeffs, UchidaCoeffs};
use df_config::DepositionConfig;
use df_foundation::VSMALL;
use df_mesh::FaMesh;

use super::entrainment::equilibrium_concentration;
use super::field::zone_mask;
use super::{inclination, ClosureContext, DepositionModel};

/// 按配置构建淤积模型
pub fn build(config: &DepositionConfig, mesh: &FaMesh) -> Box<dyn DepositionModel> {
    match config {
        DepositionConfig::Off => Box::new(DepositionOff),
        DepositionConfig::Uchida(c) => Box::new(Uchida {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }),
        DepositionConfig::Stoppingprofile(c) => Box::new(StoppingProfile {
            coeffs: c.clone(),
            zones: zone_mask(mesh, &c.zones),
        }),
    }
}

/// 关闭淤积
#[derive(Debug, Clone, Copy)]
pub struct DepositionOff;

impl DepositionModel for DepositionOff {
    fn name(&self) -> &'static str {
        "depositionOff"
    }

    fn sd(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        vec![0.0; ctx.state.n_faces()]
    }
}

/// Uchida 平衡浓度淤积
///
/// ```text
/// Sd = deltad·(Cv - Ce)/Cvb·|U|·h/d
/// 0 ≤ Sd ≤ h·Cv/(Δt·Cvb)
/// ```
///
/// 上一时刻静止（`|Us_old| < VSMALL`）或 `h ≤ hmin` 时不淤积。
#[derive(Debug, Clone)]
pub struct Uchida {
    coeffs: UchidaCoeffs,
    zones: Vec<f64>,
}

impl DepositionModel for Uchida {
    fn name(&self) -> &'static str {
        "Uchida"
    }

    fn sd(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        let p = ctx.params;
        let s = ctx.state;
        let cv_b = p.cv_b();
        let normals = ctx.mesh.normals();
        (0..s.n_faces())
            .map(|i| {
                let mag_u = s.us[i].length();
                if !ctx.is_active(i, mag_u) || s.us_old[i].length() < VSMALL || s.h[i] <= c.hmin {
                    return 0.0;
                }
                let ce = equilibrium_concentration(inclination(normals[i]), c.phi, p.rho_w, p.rho_s);
                let sd = c.deltad * (s.cv[i] - ce) / cv_b * mag_u * s.h[i] / c.d * self.zones[i];
                let limit = s.h[i] * s.cv[i] / (ctx.dt * cv_b);
                sd.max(0.0).min(limit.max(0.0))
            })
            .collect()
    }
}

/// 停积剖面淤积
///
/// 速度低于 ud 时按剖面形状淤积，时间尺度为 `ud/|gs|`：
///
/// ```text
/// Sd = h·|gs|/ud·(1 - |U|/ud)^ad,   |U| < ud, h > hmin
/// ```
#[derive(Debug, Clone)]
pub struct StoppingProfile {
    coeffs: StoppingProfileCoeffs,
    zones: Vec<f64>,
}

impl DepositionModel for StoppingProfile {
    fn name(&self) -> &'static str {
        "Stoppingprofile"
    }

    fn sd(&self, ctx: &ClosureContext<'_>) -> Vec<f64> {
        let c = &self.coeffs;
        let s = ctx.state;
        (0..s.n_faces())
            .map(|i| {
                let mag_u = s.us[i].length();
                if !ctx.is_active(i, mag_u) || mag_u >= c.ud || s.h[i] <= c.hmin {
                    return 0.0;
                }
                let shape = (1.0 - mag_u / c.ud).powf(c.ad);
                let sd = s.h[i] * ctx.gs[i].length() / c.ud * shape * self.zones[i];
                sd.max(0.0).min(s.h[i] / ctx.dt)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::sloped_case;
    use super::*;
    use df_config::ZoneSpec;
    use df_mesh::DVec3;

    fn uchida() -> DepositionConfig {
        DepositionConfig::Uchida(UchidaCoeffs {
            phi: 0.6,
            deltad: 0.01,
            d: 0.1,
            hmin: 0.01,
            zones: ZoneSpec::Uniform,
        })
    }

    #[test]
    fn test_off_is_zero() {
        let (mesh, state, params, gs) = sloped_case(0.1, 1.0, 1.0, 0.5);
        let ctx = ClosureContext {
            mesh: &mesh,
            state: &state,
            params: &params,
            gs: &gs,
            dt: 0.1,
        };
        assert!(build(&DepositionConfig::Off, &mesh).sd(&ctx).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_uchida_deposits_oversaturated_flow() {
        // 缓坡上 Cv 高于平衡浓度
        let (mesh, state, params, gs) = sloped_case(0.05, 1.0, 1.0, 0.5);
        let ctx = ClosureContext {
            mesh: &mesh,
            state: &state,
            params: &params,
            gs: &gs,
            dt: 0.1,
        };
        let sd = build(&uchida(), &mesh).sd(&ctx);
        let limit = 1.0 * 0.5 / (0.1 * params.cv_b());
        assert!(sd.iter().all(|&v| v > 0.0 && v <= limit));
    }

    #[test]
    fn test_uchida_zero_when_previously_at_rest() {
        let (mesh, mut state, params, gs) = sloped_case(0.05, 1.0, 1.0, 0.5);
        state.us_old.iter_mut().for_each(|u| *u = DVec3::ZERO);
        let ctx = ClosureContext {
            mesh: &mesh,
            state: &state,
            params: &params,
            gs: &gs,
            dt: 0.1,
        };
        assert!(build(&uchida(), &mesh).sd(&ctx).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_stopping_profile() {
        let config = DepositionConfig::Stoppingprofile(StoppingProfileCoeffs {
            ud: 2.0,
            ad: 1.0,
            hmin: 0.01,
            zones: ZoneSpec::Uniform,
        });
        let (mesh, state, params, gs) = sloped_case(0.2, 0.5, 1.0, 0.4);
        let ctx = ClosureContext {
            mesh: &mesh,
            state: &state,
            params: &params,
            gs: &gs,
            dt: 0.01,
        };
        let model = build(&config, &mesh);
        let sd = model.sd(&ctx);
        for (i, v) in sd.iter().enumerate() {
            let expected = 0.5 * gs[i].length() / 2.0 * 0.5;
            assert!((v - expected).abs() < 1e-12);
        }

        // 速度超过 ud 不淤积
        let (mesh, state, params, gs) = sloped_case(0.2, 0.5, 3.0, 0.4);
        let ctx = ClosureContext {
            mesh: &mesh,
            state: &state,
            params: &params,
            gs: &gs,
            dt: 0.01,
        };
        assert!(model.sd(&ctx).iter().all(|&v| v == 0.0));
    }
}
