// crates/df_mesh/src/generator.rs

//! 网格生成
//!
//! [`RectMeshGenerator`] 生成矩形结构化四边形网格，顶点按行主序排列，
//! 高程由给定函数 z(x, y) 决定。四条物理边界命名为
//! `left`（x 最小）、`right`、`bottom`（y 最小）、`top`。
//!
//! # 使用示例
//!
//! ```rust
//! use df_mesh::generator::RectMeshGenerator;
//!
//! let mesh = RectMeshGenerator::new(10, 5, 1.0, 1.0)
//!     .build(|x, _y| -0.3 * x)
//!     .unwrap();
//! assert_eq!(mesh.n_faces(), 50);
//! ```

use df_foundation::{DfError, DfResult};
use glam::DVec3;

use crate::mesh::{FaMesh, PatchDef};

/// 矩形结构化网格生成器
#[derive(Debug, Clone)]
pub struct RectMeshGenerator {
    /// x 方向单元数
    nx: usize,
    /// y 方向单元数
    ny: usize,
    /// x 方向单元尺寸 [m]
    dx: f64,
    /// y 方向单元尺寸 [m]
    dy: f64,
    /// 原点
    origin: DVec3,
}

impl RectMeshGenerator {
    /// 创建生成器
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            origin: DVec3::ZERO,
        }
    }

    /// 方形网格
    pub fn square(n: usize, dx: f64) -> Self {
        Self::new(n, n, dx, dx)
    }

    /// 设置原点
    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = DVec3::from_array(origin);
        self
    }

    /// 顶点总数
    pub fn n_vertices(&self) -> usize {
        (self.nx + 1) * (self.ny + 1)
    }

    /// 单元总数
    pub fn n_cells(&self) -> usize {
        self.nx * self.ny
    }

    /// 平坦网格
    pub fn build_flat(&self) -> DfResult<FaMesh> {
        self.build(|_, _| 0.0)
    }

    /// 均匀坡面：高程增量 slope_x·x + slope_y·y（相对原点）
    pub fn build_inclined(&self, slope_x: f64, slope_y: f64) -> DfResult<FaMesh> {
        self.build(|x, y| slope_x * x + slope_y * y)
    }

    /// 构建网格，`z_fn` 以相对原点的坐标给出高程增量
    pub fn build<F>(&self, z_fn: F) -> DfResult<FaMesh>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.nx == 0 || self.ny == 0 {
            return Err(DfError::invalid_mesh(format!(
                "矩形网格单元数必须为正: {}x{}",
                self.nx, self.ny
            )));
        }
        if !(self.dx > 0.0 && self.dy > 0.0) {
            return Err(DfError::invalid_mesh(format!(
                "矩形网格尺寸必须为正: dx={}, dy={}",
                self.dx, self.dy
            )));
        }

        let (nx, ny) = (self.nx, self.ny);
        let vid = |i: usize, j: usize| -> usize { j * (nx + 1) + i };

        let mut points = Vec::with_capacity(self.n_vertices());
        for j in 0..=ny {
            for i in 0..=nx {
                let x = i as f64 * self.dx;
                let y = j as f64 * self.dy;
                points.push(self.origin + DVec3::new(x, y, z_fn(x, y)));
            }
        }

        let mut faces = Vec::with_capacity(self.n_cells());
        for j in 0..ny {
            for i in 0..nx {
                faces.push(vec![vid(i, j), vid(i + 1, j), vid(i + 1, j + 1), vid(i, j + 1)]);
            }
        }

        let patches = vec![
            PatchDef::physical("left", (0..ny).map(|j| [vid(0, j), vid(0, j + 1)]).collect()),
            PatchDef::physical("right", (0..ny).map(|j| [vid(nx, j), vid(nx, j + 1)]).collect()),
            PatchDef::physical("bottom", (0..nx).map(|i| [vid(i, 0), vid(i + 1, 0)]).collect()),
            PatchDef::physical("top", (0..nx).map(|i| [vid(i, ny), vid(i + 1, ny)]).collect()),
        ];

        FaMesh::from_faces(points, faces, patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_counts() {
        let mesh = RectMeshGenerator::new(4, 3, 2.0, 1.0).build_flat().unwrap();
        assert_eq!(mesh.n_faces(), 12);
        assert_eq!(mesh.n_points(), 20);
        assert!((mesh.total_area() - 24.0).abs() < 1e-10);
        let left = mesh.patch_id("left").unwrap();
        assert_eq!(mesh.patches()[left].size, 3);
        let top = mesh.patch_id("top").unwrap();
        assert_eq!(mesh.patches()[top].size, 4);
    }

    #[test]
    fn test_origin_and_slope() {
        let mesh = RectMeshGenerator::square(2, 1.0)
            .with_origin([10.0, 0.0, 5.0])
            .build_inclined(-0.5, 0.0)
            .unwrap();
        let last = mesh.points()[mesh.n_points() - 1];
        assert!((last.x - 12.0).abs() < 1e-12);
        assert!((last.z - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_cells_rejected() {
        assert!(RectMeshGenerator::new(0, 3, 1.0, 1.0).build_flat().is_err());
        assert!(RectMeshGenerator::new(2, 3, 0.0, 1.0).build_flat().is_err());
    }
}
