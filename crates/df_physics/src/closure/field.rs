// crates/df_physics/src/closure/field.rs

//! 闭合模型的面系数场与作用区域
//!
//! 系数场先取默认值，再按区域声明顺序覆盖，后声明的区域优先。
//! 作用区域用 0/1 掩码表示：`uniform` 全为 1，`nonuniform` 仅多边形内为 1。

use df_config::{FieldSpec, PolygonSpec, ZoneSpec};
use df_mesh::{FaMesh, Polygon2D};

/// 多边形包含判断的容差
const POLYGON_TOLERANCE: f64 = 1e-3;

/// 由配置构造多边形（顶点已加偏移）
pub fn polygon(spec: &PolygonSpec) -> Polygon2D {
    Polygon2D::new(spec.shifted_vertices()).with_tolerance(POLYGON_TOLERANCE)
}

/// 按面心构建系数场
pub fn face_field(mesh: &FaMesh, spec: &FieldSpec) -> Vec<f64> {
    let mut values = vec![spec.default_value(); mesh.n_faces()];
    for region in spec.regions() {
        let poly = polygon(&region.polygon());
        for (v, c) in values.iter_mut().zip(mesh.centres()) {
            if poly.contains(c.x, c.y) {
                *v = region.value;
            }
        }
    }
    values
}

/// 作用区域掩码
pub fn zone_mask(mesh: &FaMesh, spec: &ZoneSpec) -> Vec<f64> {
    match spec {
        ZoneSpec::Uniform => vec![1.0; mesh.n_faces()],
        ZoneSpec::Nonuniform { zones } => {
            let polys: Vec<Polygon2D> = zones.iter().map(polygon).collect();
            mesh.centres()
                .iter()
                .map(|c| {
                    if polys.iter().any(|p| p.contains(c.x, c.y)) {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_config::RegionValue;
    use df_mesh::RectMeshGenerator;

    fn square(x0: f64, x1: f64) -> Vec<[f64; 2]> {
        vec![[x0, -1.0], [x1, -1.0], [x1, 10.0], [x0, 10.0]]
    }

    #[test]
    fn test_uniform_field() {
        let mesh = RectMeshGenerator::new(3, 2, 1.0, 1.0).build_flat().unwrap();
        let f = face_field(&mesh, &FieldSpec::Uniform(0.3));
        assert_eq!(f, vec![0.3; 6]);
    }

    #[test]
    fn test_later_region_wins() {
        let mesh = RectMeshGenerator::new(3, 1, 1.0, 1.0).build_flat().unwrap();
        let spec = FieldSpec::Regional {
            default: 0.1,
            regions: vec![
                RegionValue {
                    name: "a".into(),
                    offset: [0.0, 0.0],
                    vertices: square(0.0, 2.0),
                    value: 0.2,
                },
                RegionValue {
                    name: "b".into(),
                    offset: [1.0, 0.0],
                    vertices: square(0.0, 1.0),
                    value: 0.5,
                },
            ],
        };
        let f = face_field(&mesh, &spec);
        assert_eq!(f, vec![0.2, 0.5, 0.1]);
    }

    #[test]
    fn test_zone_mask() {
        let mesh = RectMeshGenerator::new(4, 1, 1.0, 1.0).build_flat().unwrap();
        assert_eq!(zone_mask(&mesh, &ZoneSpec::Uniform), vec![1.0; 4]);
        let spec = ZoneSpec::Nonuniform {
            zones: vec![PolygonSpec {
                name: "fan".into(),
                offset: [0.0, 0.0],
                vertices: square(2.0, 4.0),
            }],
        };
        assert_eq!(zone_mask(&mesh, &spec), vec![0.0, 0.0, 1.0, 1.0]);
    }
}
