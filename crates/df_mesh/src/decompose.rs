// crates/df_mesh/src/decompose.rs

//! 区域分解
//!
//! 按面质心 x 坐标把网格切成 n 个条带（simple 方法），每个分区得到：
//!
//! - 局部网格：物理边界片保留全部名称（可能为空），分区交界边
//!   按相邻分区组成 `procAtoB` 边界片，片内按全局边号排序
//! - 全局编号：面、点、边
//! - 相邻分区：与本分区共享至少一个网格点的分区
//! - 点权映射：全局构建后按点截取
//!
//! 两侧交界片都按全局边号排序，因此局部边序号与对方的一一对应。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use df_foundation::{DfError, DfResult};

use crate::mesh::{FaMesh, PatchDef, PatchKind};
use crate::point_weights::PointWeights;

/// 分区信息
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    /// 分区号
    pub rank: usize,
    /// 分区总数
    pub n_partitions: usize,
    /// 局部面 -> 全局面
    pub face_addressing: Vec<usize>,
    /// 局部点 -> 全局点
    pub point_addressing: Vec<usize>,
    /// 局部边 -> 全局边
    pub edge_addressing: Vec<usize>,
    /// 共享网格点的相邻分区（升序）
    pub neighbours: Vec<usize>,
    /// 全局面数
    pub n_global_faces: usize,
}

impl PartitionInfo {
    /// 单分区：全局编号即局部编号
    pub fn serial(mesh: &FaMesh) -> Self {
        Self {
            rank: 0,
            n_partitions: 1,
            face_addressing: (0..mesh.n_faces()).collect(),
            point_addressing: (0..mesh.n_points()).collect(),
            edge_addressing: (0..mesh.n_edges()).collect(),
            neighbours: Vec::new(),
            n_global_faces: mesh.n_faces(),
        }
    }
}

/// 一个分区
#[derive(Debug, Clone)]
pub struct Partition {
    /// 局部网格
    pub mesh: FaMesh,
    /// 编号与邻接信息
    pub info: PartitionInfo,
    /// 点权映射（面号为全局编号）
    pub point_weights: PointWeights,
}

impl Partition {
    /// 不分解的整体网格
    pub fn serial(mesh: FaMesh) -> Self {
        let info = PartitionInfo::serial(&mesh);
        let point_weights = PointWeights::build(&mesh);
        Self {
            mesh,
            info,
            point_weights,
        }
    }
}

/// 交界边界片名称
pub fn processor_patch_name(rank: usize, neighbour: usize) -> String {
    format!("proc{rank}to{neighbour}")
}

/// 按面质心 x 坐标切分为 n 个条带
pub fn decompose(mesh: &FaMesh, n: usize) -> DfResult<Vec<Partition>> {
    if n == 0 {
        return Err(DfError::invalid_input("分区数至少为 1"));
    }
    if n > mesh.n_faces() {
        return Err(DfError::invalid_input(format!(
            "分区数 {n} 超过面数 {}",
            mesh.n_faces()
        )));
    }
    if n == 1 {
        return Ok(vec![Partition::serial(mesh.clone())]);
    }

    let face_rank = slab_assignment(mesh, n);
    let global_weights = PointWeights::build(mesh);

    // 全局边端点 -> 全局边号
    let edge_lookup: HashMap<(usize, usize), usize> = mesh
        .edges()
        .iter()
        .enumerate()
        .map(|(ei, e)| {
            let [a, b] = e.points;
            ((a.min(b), a.max(b)), ei)
        })
        .collect();

    // 每个点涉及的分区
    let point_ranks: Vec<BTreeSet<usize>> = (0..mesh.n_points())
        .map(|p| mesh.point_faces(p).iter().map(|&f| face_rank[f]).collect())
        .collect();

    let mut partitions = Vec::with_capacity(n);
    for rank in 0..n {
        let face_addressing: Vec<usize> = (0..mesh.n_faces())
            .filter(|&f| face_rank[f] == rank)
            .collect();

        let point_set: BTreeSet<usize> = face_addressing
            .iter()
            .flat_map(|&f| mesh.faces()[f].iter().copied())
            .collect();
        let point_addressing: Vec<usize> = point_set.into_iter().collect();
        let local_point: HashMap<usize, usize> = point_addressing
            .iter()
            .enumerate()
            .map(|(l, &g)| (g, l))
            .collect();
        let to_local = |g: usize| -> DfResult<usize> {
            local_point
                .get(&g)
                .copied()
                .ok_or_else(|| DfError::internal(format!("点 {g} 不在分区 {rank} 内")))
        };

        let points = point_addressing.iter().map(|&g| mesh.points()[g]).collect();
        let faces = face_addressing
            .iter()
            .map(|&f| mesh.faces()[f].iter().map(|&g| to_local(g)).collect())
            .collect::<DfResult<Vec<Vec<usize>>>>()?;

        let mut patch_defs = Vec::new();
        for patch in mesh.patches() {
            let edges = patch
                .edges()
                .filter(|&e| face_rank[mesh.edge(e).owner] == rank)
                .map(|e| {
                    let [a, b] = mesh.edge(e).points;
                    Ok([to_local(a)?, to_local(b)?])
                })
                .collect::<DfResult<Vec<_>>>()?;
            patch_defs.push(PatchDef {
                name: patch.name.clone(),
                kind: patch.kind,
                edges,
            });
        }

        // 交界边按相邻分区归组，组内按全局边号升序
        let mut proc_edges: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (ei, e) in mesh.edges()[..mesh.n_internal_edges()].iter().enumerate() {
            let Some(nb) = e.neighbour else { continue };
            let (ro, rn) = (face_rank[e.owner], face_rank[nb]);
            if ro == rn {
                continue;
            }
            if ro == rank {
                proc_edges.entry(rn).or_default().push(ei);
            } else if rn == rank {
                proc_edges.entry(ro).or_default().push(ei);
            }
        }
        for (nb_rank, edges) in &proc_edges {
            let edges = edges
                .iter()
                .map(|&e| {
                    let [a, b] = mesh.edge(e).points;
                    Ok([to_local(a)?, to_local(b)?])
                })
                .collect::<DfResult<Vec<_>>>()?;
            patch_defs.push(PatchDef {
                name: processor_patch_name(rank, *nb_rank),
                kind: PatchKind::Processor {
                    neighbour: *nb_rank,
                },
                edges,
            });
        }

        let local = FaMesh::from_faces(points, faces, patch_defs)?;

        let edge_addressing = local
            .edges()
            .iter()
            .map(|e| {
                let a = point_addressing[e.points[0]];
                let b = point_addressing[e.points[1]];
                edge_lookup
                    .get(&(a.min(b), a.max(b)))
                    .copied()
                    .ok_or_else(|| DfError::internal(format!("局部边 ({a}, {b}) 在全局网格中不存在")))
            })
            .collect::<DfResult<Vec<_>>>()?;

        let neighbours: Vec<usize> = point_addressing
            .iter()
            .flat_map(|&p| point_ranks[p].iter().copied())
            .filter(|&r| r != rank)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let point_weights = global_weights.restrict(&point_addressing);

        tracing::debug!(
            rank,
            faces = face_addressing.len(),
            neighbours = ?neighbours,
            "分区构建完成"
        );

        partitions.push(Partition {
            mesh: local,
            info: PartitionInfo {
                rank,
                n_partitions: n,
                face_addressing,
                point_addressing,
                edge_addressing,
                neighbours,
                n_global_faces: mesh.n_faces(),
            },
            point_weights,
        });
    }

    tracing::info!(partitions = n, faces = mesh.n_faces(), "网格分解完成");
    Ok(partitions)
}

/// 按质心 (x, y, 面号) 排序后均分
fn slab_assignment(mesh: &FaMesh, n: usize) -> Vec<usize> {
    let centres = mesh.centres();
    let mut order: Vec<usize> = (0..mesh.n_faces()).collect();
    order.sort_by(|&a, &b| {
        centres[a]
            .x
            .total_cmp(&centres[b].x)
            .then(centres[a].y.total_cmp(&centres[b].y))
            .then(a.cmp(&b))
    });

    let nf = mesh.n_faces();
    let mut rank = vec![0; nf];
    for (k, &f) in order.iter().enumerate() {
        rank[f] = k * n / nf;
    }
    rank
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RectMeshGenerator;

    #[test]
    fn test_two_slabs() {
        let mesh = RectMeshGenerator::new(4, 2, 1.0, 1.0).build_flat().unwrap();
        let parts = decompose(&mesh, 2).unwrap();
        assert_eq!(parts.len(), 2);
        for (r, p) in parts.iter().enumerate() {
            assert_eq!(p.mesh.n_faces(), 4);
            assert_eq!(p.info.neighbours, vec![1 - r]);
            let proc = p
                .mesh
                .patches()
                .iter()
                .find(|pt| pt.is_processor())
                .unwrap();
            assert_eq!(proc.size, 2);
            assert_eq!(proc.name, processor_patch_name(r, 1 - r));
            // 物理边界名称在每个分区都存在
            assert!(p.mesh.patch_id("left").is_some());
            assert!(p.mesh.patch_id("right").is_some());
        }
        assert_eq!(parts[0].mesh.patches()[0].size, 2);
        assert_eq!(parts[1].mesh.patches()[0].size, 0);
    }

    #[test]
    fn test_processor_edges_match_globally() {
        let mesh = RectMeshGenerator::new(5, 3, 1.0, 1.0).build_flat().unwrap();
        let parts = decompose(&mesh, 3).unwrap();
        for p in &parts {
            for patch in p.mesh.patches().iter().filter(|pt| pt.is_processor()) {
                let PatchKind::Processor { neighbour } = patch.kind else { unreachable!() };
                let mine: Vec<usize> = patch.edges().map(|e| p.info.edge_addressing[e]).collect();
                let other = &parts[neighbour];
                let theirs_id = other
                    .mesh
                    .patch_id(&processor_patch_name(neighbour, p.info.rank))
                    .unwrap();
                let theirs: Vec<usize> = other.mesh.patches()[theirs_id]
                    .edges()
                    .map(|e| other.info.edge_addressing[e])
                    .collect();
                assert_eq!(mine, theirs);
                assert!(mine.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn test_face_addressing_covers_mesh() {
        let mesh = RectMeshGenerator::new(6, 2, 1.0, 1.0).build_flat().unwrap();
        let parts = decompose(&mesh, 3).unwrap();
        let mut all: Vec<usize> = parts
            .iter()
            .flat_map(|p| p.info.face_addressing.iter().copied())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..mesh.n_faces()).collect::<Vec<_>>());
        // 中间分区与两侧都相邻
        assert_eq!(parts[1].info.neighbours, vec![0, 2]);
    }

    #[test]
    fn test_too_many_partitions() {
        let mesh = RectMeshGenerator::new(2, 1, 1.0, 1.0).build_flat().unwrap();
        assert!(decompose(&mesh, 3).is_err());
        assert_eq!(decompose(&mesh, 1).unwrap().len(), 1);
    }
}
