// crates/df_mesh/src/point_weights.rs

//! 面心到网格点的面积加权映射
//!
//! 每个网格点保存相邻面的（全局面号, 面积）以及面积和，
//! 用于把面心值插值到点：`v_p = Σ A_f / N_A(p) · v_f`。
//! 映射在全局网格上构建一次，分区后按点编号截取。

use crate::mesh::FaMesh;

/// 点权映射
#[derive(Debug, Clone, Default)]
pub struct PointWeights {
    /// 每个点的相邻面面积和
    total_area: Vec<f64>,
    /// 每个点的 (全局面号, 面积)
    entries: Vec<Vec<(usize, f64)>>,
}

impl PointWeights {
    /// 在（全局）网格上构建
    pub fn build(mesh: &FaMesh) -> Self {
        let areas = mesh.areas();
        let entries: Vec<Vec<(usize, f64)>> = (0..mesh.n_points())
            .map(|p| mesh.point_faces(p).iter().map(|&f| (f, areas[f])).collect())
            .collect();
        let total_area = entries
            .iter()
            .map(|e| e.iter().map(|(_, a)| a).sum())
            .collect();
        Self {
            total_area,
            entries,
        }
    }

    /// 按点编号截取（分区用）
    pub fn restrict(&self, point_addressing: &[usize]) -> Self {
        Self {
            total_area: point_addressing.iter().map(|&p| self.total_area[p]).collect(),
            entries: point_addressing.iter().map(|&p| self.entries[p].clone()).collect(),
        }
    }

    /// 点数
    pub fn n_points(&self) -> usize {
        self.entries.len()
    }

    /// 点的相邻面
    pub fn entries(&self, p: usize) -> &[(usize, f64)] {
        &self.entries[p]
    }

    /// 点的相邻面面积和
    pub fn total_area(&self, p: usize) -> f64 {
        self.total_area[p]
    }

    /// 插值到点，`value` 以全局面号索引
    pub fn interpolate(&self, p: usize, value: &[f64]) -> f64 {
        let n_a = self.total_area[p];
        if n_a <= 0.0 {
            return 0.0;
        }
        self.entries[p].iter().map(|&(f, a)| a / n_a * value[f]).sum()
    }

    /// 插值全部点
    pub fn interpolate_all(&self, value: &[f64]) -> Vec<f64> {
        (0..self.n_points()).map(|p| self.interpolate(p, value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RectMeshGenerator;

    #[test]
    fn test_corner_and_centre_points() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let w = PointWeights::build(&mesh);
        assert_eq!(w.entries(0).len(), 1);
        assert_eq!(w.entries(4).len(), 4);
        assert!((w.total_area(4) - 4.0).abs() < 1e-12);

        let value = [1.0, 2.0, 3.0, 4.0];
        assert!((w.interpolate(4, &value) - 2.5).abs() < 1e-12);
        assert!((w.interpolate(0, &value) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_field_is_preserved() {
        let mesh = RectMeshGenerator::new(3, 2, 1.0, 2.0)
            .build(|x, y| 0.1 * x * y)
            .unwrap();
        let w = PointWeights::build(&mesh);
        let value = vec![0.7; mesh.n_faces()];
        for v in w.interpolate_all(&value) {
            assert!((v - 0.7).abs() < 1e-12);
        }
    }

    #[test]
    fn test_restrict() {
        let mesh = RectMeshGenerator::new(2, 1, 1.0, 1.0).build_flat().unwrap();
        let w = PointWeights::build(&mesh).restrict(&[1, 4]);
        assert_eq!(w.n_points(), 2);
        assert_eq!(w.entries(0).len(), 2);
        assert_eq!(w.entries(1).len(), 2);
    }
}
