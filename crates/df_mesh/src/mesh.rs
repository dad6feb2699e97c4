// crates/df_mesh/src/mesh.rs

//! 有限面积曲面网格
//!
//! 面（控制面积）是流动状态的载体，边连接两个面（内部边）或属于某个边界片。
//! 数据采用 SoA 布局，几何量在网格点移动后整体重算。
//!
//! # 约定
//!
//! 1. **边排序**: 内部边在前，按 (owner, neighbour) 升序；边界边按边界片顺序排列
//! 2. **owner**: 内部边的 owner 总是编号较小的面
//! 3. **面法向**: 指向地形内部（竖直分量 ≤ 0），因此 `nz = n·(0,0,-1) ≥ 0`
//! 4. **边长度向量 Le**: 位于切平面内、垂直于边、由 owner 指向外侧，模为边长

use std::collections::HashMap;

use df_foundation::{DfError, DfResult, SMALL};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// 边界片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchKind {
    /// 物理边界
    Physical,
    /// 分区交界（对方分区号）
    Processor {
        /// 相邻分区
        neighbour: usize,
    },
}

/// 边界片
#[derive(Debug, Clone)]
pub struct Patch {
    /// 名称
    pub name: String,
    /// 类型
    pub kind: PatchKind,
    /// 首条边的全局编号
    pub start: usize,
    /// 边数
    pub size: usize,
}

impl Patch {
    /// 边编号范围
    #[inline]
    pub fn edges(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.size
    }

    /// 是否为分区交界
    #[inline]
    pub fn is_processor(&self) -> bool {
        matches!(self.kind, PatchKind::Processor { .. })
    }
}

/// 构建网格时的边界片定义（边以端点对给出）
#[derive(Debug, Clone)]
pub struct PatchDef {
    /// 名称
    pub name: String,
    /// 类型
    pub kind: PatchKind,
    /// 边端点
    pub edges: Vec<[usize; 2]>,
}

impl PatchDef {
    /// 物理边界
    pub fn physical(name: impl Into<String>, edges: Vec<[usize; 2]>) -> Self {
        Self {
            name: name.into(),
            kind: PatchKind::Physical,
            edges,
        }
    }
}

/// 边拓扑
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// 端点
    pub points: [usize; 2],
    /// owner 面
    pub owner: usize,
    /// neighbour 面（边界边为 None）
    pub neighbour: Option<usize>,
}

/// 有限面积网格
#[derive(Debug, Clone)]
pub struct FaMesh {
    // ===== 拓扑 =====
    points: Vec<DVec3>,
    faces: Vec<Vec<usize>>,
    edges: Vec<Edge>,
    n_internal_edges: usize,
    patches: Vec<Patch>,
    edge_patch: Vec<Option<usize>>,
    face_edges: Vec<Vec<usize>>,
    face_neighbours: Vec<Vec<usize>>,
    point_faces: Vec<Vec<usize>>,

    // ===== 几何 =====
    areas: Vec<f64>,
    normals: Vec<DVec3>,
    centres: Vec<DVec3>,
    orientation: Vec<f64>,
    edge_centres: Vec<DVec3>,
    edge_normals: Vec<DVec3>,
    le: Vec<DVec3>,
    mag_le: Vec<f64>,
    weights: Vec<f64>,
}

type EdgeKey = (usize, usize);

#[inline]
fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b { (a, b) } else { (b, a) }
}

impl FaMesh {
    /// 从点、面（顶点环）与边界片定义构建网格
    ///
    /// 所有边界边必须恰好属于一个边界片。
    pub fn from_faces(
        points: Vec<DVec3>,
        faces: Vec<Vec<usize>>,
        patch_defs: Vec<PatchDef>,
    ) -> DfResult<Self> {
        if faces.is_empty() {
            return Err(DfError::invalid_mesh("网格没有面"));
        }
        for (fi, f) in faces.iter().enumerate() {
            if f.len() < 3 {
                return Err(DfError::invalid_mesh(format!("面 {fi} 顶点数不足 3")));
            }
            if let Some(&p) = f.iter().find(|&&p| p >= points.len()) {
                return Err(DfError::invalid_mesh(format!(
                    "面 {fi} 引用不存在的点 {p}（共 {} 个点）",
                    points.len()
                )));
            }
        }

        // 收集边：(端点, owner, neighbour)
        let mut lookup: HashMap<EdgeKey, usize> = HashMap::new();
        let mut raw: Vec<Edge> = Vec::new();
        for (fi, f) in faces.iter().enumerate() {
            for k in 0..f.len() {
                let a = f[k];
                let b = f[(k + 1) % f.len()];
                if a == b {
                    return Err(DfError::invalid_mesh(format!("面 {fi} 含退化边")));
                }
                match lookup.get(&edge_key(a, b)) {
                    Some(&ei) => {
                        let e = &mut raw[ei];
                        if e.neighbour.is_some() || e.owner == fi {
                            return Err(DfError::invalid_mesh(format!(
                                "边 ({a}, {b}) 被两个以上的面共享"
                            )));
                        }
                        e.neighbour = Some(fi);
                    }
                    None => {
                        lookup.insert(edge_key(a, b), raw.len());
                        raw.push(Edge {
                            points: [a, b],
                            owner: fi,
                            neighbour: None,
                        });
                    }
                }
            }
        }

        let mut edges: Vec<Edge> = raw.iter().filter(|e| e.neighbour.is_some()).copied().collect();
        edges.sort_by_key(|e| (e.owner, e.neighbour));
        let n_internal_edges = edges.len();

        // 边界边按边界片顺序排列
        let mut assigned = vec![false; raw.len()];
        let mut patches = Vec::with_capacity(patch_defs.len());
        let mut edge_patch = vec![None; n_internal_edges];
        for (pi, def) in patch_defs.into_iter().enumerate() {
            let start = edges.len();
            for [a, b] in &def.edges {
                let ei = lookup.get(&edge_key(*a, *b)).copied().ok_or_else(|| {
                    DfError::invalid_mesh(format!("边界片 {} 的边 ({a}, {b}) 不存在", def.name))
                })?;
                let e = raw[ei];
                if e.neighbour.is_some() {
                    return Err(DfError::invalid_mesh(format!(
                        "边界片 {} 的边 ({a}, {b}) 是内部边",
                        def.name
                    )));
                }
                if assigned[ei] {
                    return Err(DfError::invalid_mesh(format!(
                        "边 ({a}, {b}) 被重复分配到边界片"
                    )));
                }
                assigned[ei] = true;
                edges.push(e);
                edge_patch.push(Some(pi));
            }
            patches.push(Patch {
                name: def.name,
                kind: def.kind,
                start,
                size: edges.len() - start,
            });
        }

        let unassigned = raw
            .iter()
            .zip(&assigned)
            .filter(|(e, done)| e.neighbour.is_none() && !**done)
            .count();
        if unassigned > 0 {
            return Err(DfError::invalid_mesh(format!(
                "{unassigned} 条边界边未分配到任何边界片"
            )));
        }

        let n_faces = faces.len();
        let mut face_edges = vec![Vec::new(); n_faces];
        let mut face_neighbours = vec![Vec::new(); n_faces];
        for (ei, e) in edges.iter().enumerate() {
            face_edges[e.owner].push(ei);
            if let Some(n) = e.neighbour {
                face_edges[n].push(ei);
                face_neighbours[e.owner].push(n);
                face_neighbours[n].push(e.owner);
            }
        }
        let mut point_faces = vec![Vec::new(); points.len()];
        for (fi, f) in faces.iter().enumerate() {
            for &p in f {
                point_faces[p].push(fi);
            }
        }

        let mut mesh = Self {
            points,
            faces,
            edges,
            n_internal_edges,
            patches,
            edge_patch,
            face_edges,
            face_neighbours,
            point_faces,
            areas: Vec::new(),
            normals: Vec::new(),
            centres: Vec::new(),
            orientation: Vec::new(),
            edge_centres: Vec::new(),
            edge_normals: Vec::new(),
            le: Vec::new(),
            mag_le: Vec::new(),
            weights: Vec::new(),
        };
        mesh.update_geometry()?;

        tracing::debug!(
            faces = mesh.n_faces(),
            edges = mesh.n_edges(),
            internal = mesh.n_internal_edges,
            patches = mesh.patches.len(),
            "有限面积网格构建完成"
        );
        Ok(mesh)
    }

    // =========================================================================
    // 几何
    // =========================================================================

    /// 由当前点坐标重算全部几何量
    pub fn update_geometry(&mut self) -> DfResult<()> {
        let nf = self.faces.len();
        self.areas = Vec::with_capacity(nf);
        self.normals = Vec::with_capacity(nf);
        self.centres = Vec::with_capacity(nf);
        self.orientation = Vec::with_capacity(nf);

        for (fi, f) in self.faces.iter().enumerate() {
            let pts: Vec<DVec3> = f.iter().map(|&p| self.points[p]).collect();
            let n = pts.len();

            // Newell 面积向量
            let mut s = DVec3::ZERO;
            for k in 0..n {
                s += pts[k].cross(pts[(k + 1) % n]);
            }
            s *= 0.5;
            let area = s.length();
            if area <= SMALL {
                return Err(DfError::invalid_mesh(format!("面 {fi} 面积为零")));
            }
            let mut normal = s / area;
            if normal.z > 0.0 {
                normal = -normal;
            }

            // 以顶点平均为中心做扇形剖分求质心
            let pc = pts.iter().copied().sum::<DVec3>() / n as f64;
            let mut sum_a = 0.0;
            let mut sum_ac = DVec3::ZERO;
            for k in 0..n {
                let a = pts[k];
                let b = pts[(k + 1) % n];
                let ta = 0.5 * (a - pc).cross(b - pc).length();
                sum_a += ta;
                sum_ac += ta * (pc + a + b) / 3.0;
            }
            let centre = if sum_a > SMALL { sum_ac / sum_a } else { pc };

            self.areas.push(area);
            self.normals.push(normal);
            self.centres.push(centre);
            self.orientation.push(if s.z >= 0.0 { 1.0 } else { -1.0 });
        }

        let ne = self.edges.len();
        self.edge_centres = Vec::with_capacity(ne);
        self.edge_normals = Vec::with_capacity(ne);
        self.le = Vec::with_capacity(ne);
        self.mag_le = Vec::with_capacity(ne);
        self.weights = Vec::with_capacity(ne);

        for e in &self.edges {
            let p0 = self.points[e.points[0]];
            let p1 = self.points[e.points[1]];
            let centre = 0.5 * (p0 + p1);
            let t = p1 - p0;
            let length = t.length();

            let n_e = match e.neighbour {
                Some(nb) => (self.normals[e.owner] + self.normals[nb]).normalize_or_zero(),
                None => self.normals[e.owner],
            };
            let mut dir = t.cross(n_e).normalize_or_zero();
            if dir.dot(centre - self.centres[e.owner]) < 0.0 {
                dir = -dir;
            }

            let weight = match e.neighbour {
                Some(nb) => {
                    let d_p = (centre - self.centres[e.owner]).length();
                    let d_n = (centre - self.centres[nb]).length();
                    if d_p + d_n > SMALL { d_n / (d_p + d_n) } else { 0.5 }
                }
                None => 1.0,
            };

            self.edge_centres.push(centre);
            self.edge_normals.push(n_e);
            self.le.push(dir * length);
            self.mag_le.push(length);
            self.weights.push(weight);
        }
        Ok(())
    }

    /// 竖直移动网格点并重算几何
    ///
    /// 返回每个面扫过的体积，沿面法向（指向地形内部）度量：
    /// 地面抬升时为负，下降时为正。
    pub fn move_points_vertical(&mut self, dz: &[f64]) -> DfResult<Vec<f64>> {
        DfError::check_size("dz", self.points.len(), dz.len())?;

        let swept: Vec<f64> = self
            .faces
            .iter()
            .enumerate()
            .map(|(fi, f)| {
                let n = f.len();
                let pc = f.iter().map(|&p| self.points[p]).sum::<DVec3>() / n as f64;
                let dzc = f.iter().map(|&p| dz[p]).sum::<f64>() / n as f64;
                let mut vol = 0.0;
                for k in 0..n {
                    let ia = f[k];
                    let ib = f[(k + 1) % n];
                    let a = self.points[ia] - pc;
                    let b = self.points[ib] - pc;
                    let area_xy = 0.5 * (a.x * b.y - a.y * b.x) * self.orientation[fi];
                    vol += area_xy * (dzc + dz[ia] + dz[ib]) / 3.0;
                }
                -vol
            })
            .collect();

        for (p, d) in self.points.iter_mut().zip(dz) {
            p.z += d;
        }
        self.update_geometry()?;
        Ok(swept)
    }

    // =========================================================================
    // 访问
    // =========================================================================

    /// 面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// 点数
    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// 边数
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// 内部边数
    #[inline]
    pub fn n_internal_edges(&self) -> usize {
        self.n_internal_edges
    }

    /// 点坐标
    #[inline]
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 面的顶点环
    #[inline]
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// 全部边
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// 单条边
    #[inline]
    pub fn edge(&self, e: usize) -> &Edge {
        &self.edges[e]
    }

    /// 边界片
    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// 按名称查找边界片
    pub fn patch_id(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// 物理边界名称
    pub fn physical_patch_names(&self) -> Vec<String> {
        self.patches
            .iter()
            .filter(|p| !p.is_processor())
            .map(|p| p.name.clone())
            .collect()
    }

    /// 边所属边界片（内部边为 None）
    #[inline]
    pub fn edge_patch(&self, e: usize) -> Option<usize> {
        self.edge_patch[e]
    }

    /// 面的边
    #[inline]
    pub fn face_edges(&self, f: usize) -> &[usize] {
        &self.face_edges[f]
    }

    /// 面的面邻居（本分区内）
    #[inline]
    pub fn face_neighbours(&self, f: usize) -> &[usize] {
        &self.face_neighbours[f]
    }

    /// 点的相邻面
    #[inline]
    pub fn point_faces(&self, p: usize) -> &[usize] {
        &self.point_faces[p]
    }

    /// 面积
    #[inline]
    pub fn areas(&self) -> &[f64] {
        &self.areas
    }

    /// 面单位法向（指向地形内部）
    #[inline]
    pub fn normals(&self) -> &[DVec3] {
        &self.normals
    }

    /// 面质心
    #[inline]
    pub fn centres(&self) -> &[DVec3] {
        &self.centres
    }

    /// 面法向的竖直分量 nz = n·(0,0,-1)
    pub fn nz(&self) -> Vec<f64> {
        self.normals.iter().map(|n| -n.z).collect()
    }

    /// 边中点
    #[inline]
    pub fn edge_centres(&self) -> &[DVec3] {
        &self.edge_centres
    }

    /// 边处法向（两侧面法向平均）
    #[inline]
    pub fn edge_normals(&self) -> &[DVec3] {
        &self.edge_normals
    }

    /// 边长度向量
    #[inline]
    pub fn le(&self) -> &[DVec3] {
        &self.le
    }

    /// 边长
    #[inline]
    pub fn mag_le(&self) -> &[f64] {
        &self.mag_le
    }

    /// 线性插值权重（owner 侧）
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// 面对边的朝向：owner 为 +1，neighbour 为 -1
    #[inline]
    pub fn edge_sign(&self, f: usize, e: usize) -> f64 {
        if self.edges[e].owner == f { 1.0 } else { -1.0 }
    }

    /// 总面积
    pub fn total_area(&self) -> f64 {
        self.areas.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RectMeshGenerator;

    #[test]
    fn test_rect_topology() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        assert_eq!(mesh.n_faces(), 4);
        assert_eq!(mesh.n_points(), 9);
        assert_eq!(mesh.n_internal_edges(), 4);
        assert_eq!(mesh.n_edges(), 12);
        assert_eq!(mesh.patches().len(), 4);
        for e in &mesh.edges()[..mesh.n_internal_edges()] {
            assert!(e.owner < e.neighbour.unwrap());
        }
        for e in mesh.n_internal_edges()..mesh.n_edges() {
            assert!(mesh.edge_patch(e).is_some());
        }
    }

    #[test]
    fn test_normals_point_down() {
        let mesh = RectMeshGenerator::new(3, 2, 1.0, 1.0)
            .build(|x, _| 0.2 * x)
            .unwrap();
        for n in mesh.normals() {
            assert!(n.z < 0.0);
            assert!((n.length() - 1.0).abs() < 1e-12);
        }
        let nz = mesh.nz();
        let expected = 1.0 / (1.0f64 + 0.04).sqrt();
        assert!(nz.iter().all(|v| (v - expected).abs() < 1e-12));
    }

    #[test]
    fn test_le_closes_around_face() {
        let mesh = RectMeshGenerator::new(3, 3, 1.0, 2.0).build_flat().unwrap();
        for f in 0..mesh.n_faces() {
            let sum: DVec3 = mesh
                .face_edges(f)
                .iter()
                .map(|&e| mesh.le()[e] * mesh.edge_sign(f, e))
                .sum();
            assert!(sum.length() < 1e-12);
            assert!((mesh.areas()[f] - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_le_points_away_from_owner() {
        let mesh = RectMeshGenerator::new(2, 1, 1.0, 1.0).build_flat().unwrap();
        let e = &mesh.edges()[0];
        let d = mesh.centres()[e.neighbour.unwrap()] - mesh.centres()[e.owner];
        assert!(mesh.le()[0].dot(d) > 0.0);
        assert!((mesh.weights()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_swept_volume_of_raised_point() {
        let mut mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let mut dz = vec![0.0; mesh.n_points()];
        dz[4] = 1.0;
        let swept = mesh.move_points_vertical(&dz).unwrap();
        for v in &swept {
            assert!((v + 0.25).abs() < 1e-12);
        }
        assert!((mesh.points()[4].z - 1.0).abs() < 1e-12);
        assert!(mesh.areas()[0] > 1.0);
    }

    #[test]
    fn test_unassigned_boundary_rejected() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let res = FaMesh::from_faces(
            points,
            vec![vec![0, 1, 2]],
            vec![PatchDef::physical("a", vec![[0, 1]])],
        );
        assert!(matches!(res, Err(DfError::InvalidMesh { .. })));
    }

    #[test]
    fn test_bad_point_index() {
        let res = FaMesh::from_faces(vec![DVec3::ZERO], vec![vec![0, 1, 2]], vec![]);
        assert!(res.is_err());
    }
}
