// crates/df_mesh/src/geometry.rs

//! 平面几何工具
//!
//! 多边形包含判断：射线法，顶点/边上容差范围内的点视为在多边形内。

use glam::DVec2;

/// 带容差的多边形
#[derive(Debug, Clone)]
pub struct Polygon2D {
    vertices: Vec<DVec2>,
    tolerance: f64,
}

impl Polygon2D {
    /// 默认容差
    pub const DEFAULT_TOLERANCE: f64 = 1e-3;

    /// 从顶点创建
    pub fn new(vertices: impl IntoIterator<Item = [f64; 2]>) -> Self {
        Self {
            vertices: vertices.into_iter().map(|v| DVec2::new(v[0], v[1])).collect(),
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }

    /// 设置边界容差
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// 顶点数
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// 点是否在多边形内（含边界）
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let p = DVec2::new(x, y);
        if self.on_boundary(p) {
            return true;
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = self.vertices[i];
            let vj = self.vertices[j];
            if ((vi.y > y) != (vj.y > y)) && (x < (vj.x - vi.x) * (y - vi.y) / (vj.y - vi.y) + vi.x)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn on_boundary(&self, p: DVec2) -> bool {
        let n = self.vertices.len();
        (0..n).any(|i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            distance_to_segment(p, a, b) <= self.tolerance
        })
    }
}

/// 点到线段距离
pub fn distance_to_segment(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}
