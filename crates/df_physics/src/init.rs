// crates/df_physics/src/init.rs

//! 初始场
//!
//! h、he、Cv 由默认值加按顺序覆盖的释放区给出，之后截断并导出守恒量：
//!
//! ```text
//! h    = max(h, hmin)
//! rho  = max((1 - Cv)·rho_w + Cv·rho_s, rho_w)
//! Cw   = clamp((rho_s - rho)/(rho_s - rho_w), 0, 1)
//! rhoh = rho·h,  Cwh = Cw·h
//! ```

use df_config::{InitialConditions, InitialField, ReleaseRegion};
use df_mesh::{DVec3, FaMesh};

use crate::closure::field::polygon;
use crate::state::FlowState;
use crate::types::MaterialParams;

/// 按释放区构建面场
pub fn initial_field(mesh: &FaMesh, field: &InitialField) -> Vec<f64> {
    let mut values = vec![field.default; mesh.n_faces()];
    let nz = mesh.nz();
    let centres = mesh.centres();

    for region in &field.regions {
        match region {
            ReleaseRegion::Polygon {
                value,
                project_to_normal,
                ..
            } => {
                let Some(spec) = region.polygon() else { continue };
                let poly = polygon(&spec);
                for (i, c) in centres.iter().enumerate() {
                    if poly.contains(c.x, c.y) {
                        values[i] = project(*value, nz[i], *project_to_normal);
                    }
                }
            }
            ReleaseRegion::Polygonlinear {
                value_at_zero,
                x0,
                y0,
                z0,
                dfdx,
                dfdy,
                dfdz,
                project_to_normal,
                ..
            } => {
                let Some(spec) = region.polygon() else { continue };
                let poly = polygon(&spec);
                for (i, c) in centres.iter().enumerate() {
                    if poly.contains(c.x, c.y) {
                        let v = value_at_zero + dfdx * (c.x - x0) + dfdy * (c.y - y0) + dfdz * (c.z - z0);
                        values[i] = project(v, nz[i], *project_to_normal);
                    }
                }
            }
            ReleaseRegion::Sphere { center, r, scale } => {
                let centre = DVec3::from_array(*center);
                for (i, c) in centres.iter().enumerate() {
                    let dx = c.x - centre.x;
                    let dy = c.y - centre.y;
                    let rr = r * r - dx * dx - dy * dy;
                    if rr > 0.0 {
                        let dz = c.z - centre.z;
                        values[i] = (scale * (rr.sqrt() - dz)).max(0.0);
                    }
                }
            }
        }
    }
    values
}

#[inline]
fn project(value: f64, nz: f64, enabled: bool) -> f64 {
    if enabled && nz.abs() > 0.0 {
        value / nz
    } else {
        value
    }
}

/// 构建初始状态
pub fn initialise(mesh: &FaMesh, ic: &InitialConditions, params: &MaterialParams) -> FlowState {
    let mut state = FlowState::new(mesh);
    let h = initial_field(mesh, &ic.h);
    let he = initial_field(mesh, &ic.he);
    let cv = initial_field(mesh, &ic.cv);
    let u0 = DVec3::from_array(ic.us);

    for (i, &n) in mesh.normals().iter().enumerate() {
        let h_i = h[i].max(params.hmin);
        let rho = params.density_from_cv(cv[i]).max(params.rho_w);
        let cw = ((params.rho_s - rho) / (params.rho_s - params.rho_w)).clamp(0.0, 1.0);
        state.h[i] = h_i;
        state.rho[i] = rho;
        state.cw[i] = cw;
        state.cv[i] = 1.0 - cw;
        state.rhoh[i] = rho * h_i;
        state.cwh[i] = cw * h_i;
        state.us[i] = u0 - u0.dot(n) * n;
        state.pb[i] = (rho * h_i * params.g.dot(n)).max(0.0);
        state.he[i] = he[i].max(0.0);
    }
    state.he0.clone_from(&state.he);
    state.store_old(mesh);

    let volume: f64 = h.iter().zip(mesh.areas()).map(|(h, a)| h.max(0.0) * a).sum();
    tracing::info!(
        faces = mesh.n_faces(),
        release_volume = volume,
        "初始场已建立"
    );
    state
}
