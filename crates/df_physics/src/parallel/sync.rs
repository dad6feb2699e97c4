// crates/df_physics/src/parallel/sync.rs

//! 分区同步
//!
//! [`DistributedSync`] 在构建时完成一次握手：
//!
//! 1. 与每个共点邻居交换 `[面数, 全局面号...]`，保存对方的面编号
//! 2. 与每个交界链路交换 `[边数, 全局边号...]`，核对两侧边序一致
//!
//! 之后所有交换都按链路边序打包，本地边序号与对方一一对应。
//! 每次交换先向全部邻居发送、再依次接收，调用顺序在所有分区上相同。

use df_foundation::{DfError, DfResult};
use df_mesh::{DVec3, FaMesh, PartitionInfo, PatchKind};

use super::comm::{Communicator, Phase, ReduceOp, SerialComm};

/// 一条分区交界链路
#[derive(Debug, Clone)]
pub struct ProcessorLink {
    /// 邻居分区
    pub neighbour: usize,
    /// 边界片序号
    pub patch: usize,
    /// 边界槽位（按全局边号升序）
    pub slots: Vec<usize>,
    /// 槽位对应的本地所属面
    pub owners: Vec<usize>,
}

impl ProcessorLink {
    /// 边数
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// 分区同步上下文，握手后只读
pub struct DistributedSync {
    comm: Box<dyn Communicator>,
    info: PartitionInfo,
    links: Vec<ProcessorLink>,
    /// 共点邻居的全局面编号，与 `info.neighbours` 同序
    neighbour_faces: Vec<Vec<usize>>,
}

impl std::fmt::Debug for DistributedSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedSync")
            .field("rank", &self.info.rank)
            .field("size", &self.info.n_partitions)
            .field("links", &self.links.len())
            .finish()
    }
}

impl DistributedSync {
    /// 单分区
    pub fn serial(mesh: &FaMesh) -> Self {
        Self {
            comm: Box::new(SerialComm),
            info: PartitionInfo::serial(mesh),
            links: Vec::new(),
            neighbour_faces: Vec::new(),
        }
    }

    /// 建立链路并握手
    pub fn new(comm: Box<dyn Communicator>, info: PartitionInfo, mesh: &FaMesh) -> DfResult<Self> {
        if comm.rank() != info.rank || comm.size() != info.n_partitions {
            return Err(DfError::internal(format!(
                "通信器 {}/{} 与分区 {}/{} 不一致",
                comm.rank(),
                comm.size(),
                info.rank,
                info.n_partitions
            )));
        }

        let n_internal = mesh.n_internal_edges();
        let mut links = Vec::new();
        for (pi, patch) in mesh.patches().iter().enumerate() {
            let PatchKind::Processor { neighbour } = patch.kind else {
                continue;
            };
            if !info.neighbours.contains(&neighbour) {
                return Err(DfError::internal(format!(
                    "交界边界 '{}' 的邻居 {neighbour} 不在共点邻居列表中",
                    patch.name
                )));
            }
            links.push(ProcessorLink {
                neighbour,
                patch: pi,
                slots: patch.edges().map(|e| e - n_internal).collect(),
                owners: patch.edges().map(|e| mesh.edge(e).owner).collect(),
            });
        }

        let mut sync = Self {
            comm,
            info,
            links,
            neighbour_faces: Vec::new(),
        };
        sync.handshake(mesh)?;
        Ok(sync)
    }

    fn handshake(&mut self, mesh: &FaMesh) -> DfResult<()> {
        // 1. 面编号
        let mut payload = Vec::with_capacity(self.info.face_addressing.len() + 1);
        payload.push(self.info.face_addressing.len() as f64);
        payload.extend(self.info.face_addressing.iter().map(|&f| f as f64));
        for &nb in &self.info.neighbours {
            self.comm.send(nb, Phase::Handshake, payload.clone())?;
        }
        let mut neighbour_faces = Vec::with_capacity(self.info.neighbours.len());
        for &nb in &self.info.neighbours {
            let data = self.comm.recv(nb, Phase::Handshake)?;
            let count = data.first().copied().unwrap_or(-1.0);
            if count < 0.0 || count as usize + 1 != data.len() {
                return Err(DfError::sync_mismatch(
                    Phase::Handshake.as_str(),
                    nb,
                    format!("面数 {count} 与编号长度一致"),
                    format!("编号长度 {}", data.len().saturating_sub(1)),
                ));
            }
            let faces: Vec<usize> = data[1..].iter().map(|&f| f as usize).collect();
            if let Some(&bad) = faces.iter().find(|&&f| f >= self.info.n_global_faces) {
                return Err(DfError::sync_mismatch(
                    Phase::Handshake.as_str(),
                    nb,
                    format!("全局面号 < {}", self.info.n_global_faces),
                    bad,
                ));
            }
            neighbour_faces.push(faces);
        }
        self.neighbour_faces = neighbour_faces;

        // 2. 交界边序
        let n_internal = mesh.n_internal_edges();
        let global_edges: Vec<Vec<f64>> = self
            .links
            .iter()
            .map(|l| {
                l.slots
                    .iter()
                    .map(|&s| self.info.edge_addressing[s + n_internal] as f64)
                    .collect()
            })
            .collect();
        for (link, edges) in self.links.iter().zip(&global_edges) {
            let mut payload = Vec::with_capacity(edges.len() + 1);
            payload.push(edges.len() as f64);
            payload.extend_from_slice(edges);
            self.comm.send(link.neighbour, Phase::Handshake, payload)?;
        }
        for (link, edges) in self.links.iter().zip(&global_edges) {
            let data = self.comm.recv(link.neighbour, Phase::Handshake)?;
            if data.len() != edges.len() + 1 || data[0] as usize != edges.len() {
                return Err(DfError::sync_mismatch(
                    Phase::Handshake.as_str(),
                    link.neighbour,
                    format!("{} 条交界边", edges.len()),
                    format!("{} 条交界边", data.first().copied().unwrap_or(0.0)),
                ));
            }
            if data[1..] != edges[..] {
                return Err(DfError::sync_mismatch(
                    Phase::Handshake.as_str(),
                    link.neighbour,
                    "交界边全局编号一致",
                    "交界边全局编号不一致",
                ));
            }
        }

        tracing::debug!(
            rank = self.info.rank,
            neighbours = ?self.info.neighbours,
            links = self.links.len(),
            "分区握手完成"
        );
        Ok(())
    }

    // =========================================================================
    // 访问
    // =========================================================================

    /// 分区编号
    pub fn rank(&self) -> usize {
        self.info.rank
    }

    /// 分区总数
    pub fn size(&self) -> usize {
        self.info.n_partitions
    }

    /// 是否多分区
    pub fn is_parallel(&self) -> bool {
        self.info.n_partitions > 1
    }

    /// 分区信息
    pub fn info(&self) -> &PartitionInfo {
        &self.info
    }

    /// 交界链路
    pub fn links(&self) -> &[ProcessorLink] {
        &self.links
    }

    // =========================================================================
    // 交换
    // =========================================================================

    /// 标量面场的交界 ghost 值：`(面场, 槽位场)` 成对给出，写入交界槽位
    pub fn exchange_scalars(&mut self, pairs: &mut [(&[f64], &mut [f64])]) -> DfResult<()> {
        if self.links.is_empty() {
            return Ok(());
        }
        for link in &self.links {
            let mut buf = Vec::with_capacity(pairs.len() * link.len());
            for (face, _) in pairs.iter() {
                buf.extend(link.owners.iter().map(|&f| face[f]));
            }
            self.comm.send(link.neighbour, Phase::Ghost, buf)?;
        }
        for link in &self.links {
            let buf = self.comm.recv(link.neighbour, Phase::Ghost)?;
            let n = link.len();
            if buf.len() != pairs.len() * n {
                return Err(DfError::sync_mismatch(
                    Phase::Ghost.as_str(),
                    link.neighbour,
                    pairs.len() * n,
                    buf.len(),
                ));
            }
            for (k, (_, slots)) in pairs.iter_mut().enumerate() {
                for (j, &slot) in link.slots.iter().enumerate() {
                    slots[slot] = buf[k * n + j];
                }
            }
        }
        Ok(())
    }

    /// 向量面场的交界 ghost 值
    pub fn exchange_vectors(&mut self, face: &[DVec3], slots: &mut [DVec3]) -> DfResult<()> {
        if self.links.is_empty() {
            return Ok(());
        }
        for link in &self.links {
            let buf = link
                .owners
                .iter()
                .flat_map(|&f| face[f].to_array())
                .collect();
            self.comm.send(link.neighbour, Phase::Ghost, buf)?;
        }
        for link in &self.links {
            let buf = self.comm.recv(link.neighbour, Phase::Ghost)?;
            if buf.len() != 3 * link.len() {
                return Err(DfError::sync_mismatch(
                    Phase::Ghost.as_str(),
                    link.neighbour,
                    3 * link.len(),
                    buf.len(),
                ));
            }
            for (j, &slot) in link.slots.iter().enumerate() {
                slots[slot] = DVec3::new(buf[3 * j], buf[3 * j + 1], buf[3 * j + 2]);
            }
        }
        Ok(())
    }

    /// 交换按槽位存放的边量（平滑中越界转移的体积）
    ///
    /// 发送本分区各交界槽位的值，返回对方在同一条边上发来的值（按槽位存放）。
    pub fn exchange_edge_values(&mut self, values: &[f64]) -> DfResult<Vec<f64>> {
        let mut received = vec![0.0; values.len()];
        if self.links.is_empty() {
            return Ok(received);
        }
        for link in &self.links {
            let buf = link.slots.iter().map(|&s| values[s]).collect();
            self.comm.send(link.neighbour, Phase::Smoother, buf)?;
        }
        for link in &self.links {
            let buf = self.comm.recv(link.neighbour, Phase::Smoother)?;
            if buf.len() != link.len() {
                return Err(DfError::sync_mismatch(
                    Phase::Smoother.as_str(),
                    link.neighbour,
                    link.len(),
                    buf.len(),
                ));
            }
            for (&slot, v) in link.slots.iter().zip(buf) {
                received[slot] = v;
            }
        }
        Ok(received)
    }

    /// 收集本分区与全部共点邻居的面值，返回按全局面号存放的数组
    ///
    /// 不属于本分区及其邻居的面为 0。
    pub fn gather_neighbours(&mut self, local: &[f64]) -> DfResult<Vec<f64>> {
        let mut global = vec![0.0; self.info.n_global_faces];
        for (&g, &v) in self.info.face_addressing.iter().zip(local) {
            global[g] = v;
        }
        if self.info.neighbours.is_empty() {
            return Ok(global);
        }
        for &nb in &self.info.neighbours {
            self.comm.send(nb, Phase::Gather, local.to_vec())?;
        }
        for (k, &nb) in self.info.neighbours.iter().enumerate() {
            let data = self.comm.recv(nb, Phase::Gather)?;
            let faces = &self.neighbour_faces[k];
            if data.len() != faces.len() {
                return Err(DfError::sync_mismatch(Phase::Gather.as_str(), nb, faces.len(), data.len()));
            }
            for (&g, v) in faces.iter().zip(data) {
                global[g] = v;
            }
        }
        Ok(global)
    }

    /// 全局最大值
    pub fn all_reduce_max(&mut self, value: f64) -> DfResult<f64> {
        self.comm.all_reduce_max(value)
    }

    /// 全局最小值
    pub fn all_reduce_min(&mut self, value: f64) -> DfResult<f64> {
        self.comm.all_reduce_min(value)
    }

    /// 全局求和
    pub fn all_reduce_sum(&mut self, value: f64) -> DfResult<f64> {
        self.comm.all_reduce_sum(value)
    }

    /// 逐分量全局归约
    pub fn all_reduce(&mut self, values: &[f64], op: ReduceOp) -> DfResult<Vec<f64>> {
        self.comm.all_reduce(values, op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::comm::ChannelComm;
    use df_mesh::{decompose, RectMeshGenerator};
    use std::thread;

    /// 每个分区一个线程运行 `f`
    fn run_partitions<T, F>(n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(DistributedSync, &FaMesh) -> T + Sync,
    {
        let mesh = RectMeshGenerator::new(6, 3, 1.0, 1.0).build_flat().unwrap();
        let parts = decompose(&mesh, n).unwrap();
        let comms = ChannelComm::create(n);
        thread::scope(|s| {
            let handles: Vec<_> = parts
                .into_iter()
                .zip(comms)
                .map(|(p, c)| {
                    let f = &f;
                    s.spawn(move || {
                        let sync = DistributedSync::new(Box::new(c), p.info, &p.mesh).unwrap();
                        f(sync, &p.mesh)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_serial_sync() {
        let mesh = RectMeshGenerator::new(2, 2, 1.0, 1.0).build_flat().unwrap();
        let mut sync = DistributedSync::serial(&mesh);
        assert!(!sync.is_parallel());
        let g = sync.gather_neighbours(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(g, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(sync.all_reduce_max(2.0).unwrap(), 2.0);
    }

    #[test]
    fn test_ghost_values_match_neighbour_owner() {
        let results = run_partitions(3, |mut sync, mesh| {
            // 面值取全局面号
            let values: Vec<f64> = sync.info().face_addressing.iter().map(|&g| g as f64).collect();
            let n_slots = mesh.n_edges() - mesh.n_internal_edges();
            let mut ghost = vec![-1.0; n_slots];
            sync.exchange_scalars(&mut [(&values[..], &mut ghost[..])]).unwrap();
            let links = sync.links().to_vec();
            (sync.info().clone(), links, ghost)
        });

        let global = RectMeshGenerator::new(6, 3, 1.0, 1.0).build_flat().unwrap();
        for (info, links, ghost) in &results {
            for link in links {
                for (&slot, &owner) in link.slots.iter().zip(&link.owners) {
                    // ghost 与本地所属面共享同一条全局边
                    let ge = info.edge_addressing[slot + (info.edge_addressing.len() - ghost.len())];
                    let e = global.edge(ge);
                    let mine = info.face_addressing[owner];
                    let other = if e.owner == mine { e.neighbour.unwrap() } else { e.owner };
                    assert_eq!(ghost[slot], other as f64);
                }
            }
        }
    }

    #[test]
    fn test_gather_neighbours() {
        let results = run_partitions(3, |mut sync, _| {
            let local: Vec<f64> = sync.info().face_addressing.iter().map(|&g| 10.0 + g as f64).collect();
            let global = sync.gather_neighbours(&local).unwrap();
            let total = sync.all_reduce_sum(local.iter().sum()).unwrap();
            (sync.rank(), global, total)
        });
        let expected_total: f64 = (0..18).map(|g| 10.0 + g as f64).sum();
        for (rank, global, total) in results {
            assert!((total - expected_total).abs() < 1e-9);
            // 中间分区能看到全部面
            if rank == 1 {
                for (g, v) in global.iter().enumerate() {
                    assert_eq!(*v, 10.0 + g as f64);
                }
            }
        }
    }

    #[test]
    fn test_edge_values_round_trip() {
        let results = run_partitions(2, |mut sync, mesh| {
            let n_slots = mesh.n_edges() - mesh.n_internal_edges();
            let mut out = vec![0.0; n_slots];
            for link in sync.links() {
                for &s in &link.slots {
                    out[s] = 1.0 + sync.rank() as f64;
                }
            }
            let got = sync.exchange_edge_values(&out).unwrap();
            let link_slots: Vec<usize> = sync.links().iter().flat_map(|l| l.slots.clone()).collect();
            (sync.rank(), link_slots, got)
        });
        for (rank, slots, got) in results {
            assert_eq!(slots.len(), 3);
            for s in slots {
                assert_eq!(got[s], 2.0 - rank as f64);
            }
        }
    }
}
