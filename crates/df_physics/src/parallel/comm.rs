// crates/df_physics/src/parallel/comm.rs

//! 分区间点对点通信
//!
//! 每条消息带阶段标签与逐链路递增的序号，接收方核对二者，
//! 不一致即为同步错误。发送不阻塞（无界通道），接收阻塞，
//! 因此每个阶段都按"先全部发送、再全部接收"的顺序执行。

use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

use df_foundation::{DfError, DfResult};

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 启动握手
    Handshake,
    /// 交界 ghost 值
    Ghost,
    /// 全局归约
    Reduce,
    /// 邻居面值收集
    Gather,
    /// 平滑的跨分区体积转移
    Smoother,
}

impl Phase {
    /// 阶段名
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Ghost => "ghost",
            Self::Reduce => "reduce",
            Self::Gather => "gather",
            Self::Smoother => "smoother",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 归约运算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// 最大值
    Max,
    /// 最小值
    Min,
    /// 求和
    Sum,
}

impl ReduceOp {
    #[inline]
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Max => a.max(b),
            Self::Min => a.min(b),
            Self::Sum => a + b,
        }
    }
}

/// 一条消息
#[derive(Debug, Clone)]
pub struct Message {
    /// 阶段
    pub phase: Phase,
    /// 链路序号
    pub seq: u64,
    /// 数据
    pub data: Vec<f64>,
}

/// 分区通信器
pub trait Communicator: Send {
    /// 本分区编号
    fn rank(&self) -> usize;

    /// 分区总数
    fn size(&self) -> usize;

    /// 发送（不阻塞）
    fn send(&mut self, dest: usize, phase: Phase, data: Vec<f64>) -> DfResult<()>;

    /// 接收（阻塞），核对阶段与序号
    fn recv(&mut self, src: usize, phase: Phase) -> DfResult<Vec<f64>>;

    /// 逐分量全局归约，经 0 号分区汇总后广播
    fn all_reduce(&mut self, values: &[f64], op: ReduceOp) -> DfResult<Vec<f64>> {
        if self.size() == 1 {
            return Ok(values.to_vec());
        }
        if self.rank() == 0 {
            let mut acc = values.to_vec();
            for src in 1..self.size() {
                let other = self.recv(src, Phase::Reduce)?;
                if other.len() != acc.len() {
                    return Err(DfError::sync_mismatch(Phase::Reduce.as_str(), src, acc.len(), other.len()));
                }
                for (a, b) in acc.iter_mut().zip(other) {
                    *a = op.apply(*a, b);
                }
            }
            for dest in 1..self.size() {
                self.send(dest, Phase::Reduce, acc.clone())?;
            }
            Ok(acc)
        } else {
            self.send(0, Phase::Reduce, values.to_vec())?;
            let acc = self.recv(0, Phase::Reduce)?;
            if acc.len() != values.len() {
                return Err(DfError::sync_mismatch(Phase::Reduce.as_str(), 0, values.len(), acc.len()));
            }
            Ok(acc)
        }
    }

    /// 全局最大值
    fn all_reduce_max(&mut self, value: f64) -> DfResult<f64> {
        Ok(self.all_reduce(&[value], ReduceOp::Max)?[0])
    }

    /// 全局最小值
    fn all_reduce_min(&mut self, value: f64) -> DfResult<f64> {
        Ok(self.all_reduce(&[value], ReduceOp::Min)?[0])
    }

    /// 全局求和
    fn all_reduce_sum(&mut self, value: f64) -> DfResult<f64> {
        Ok(self.all_reduce(&[value], ReduceOp::Sum)?[0])
    }
}

// ============================================================================
// 单分区
// ============================================================================

/// 单分区通信器：归约为恒等，收发为内部错误
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&mut self, dest: usize, phase: Phase, _data: Vec<f64>) -> DfResult<()> {
        Err(DfError::internal(format!("单分区运行不应发送消息 (目标 {dest}, 阶段 {phase})")))
    }

    fn recv(&mut self, src: usize, phase: Phase) -> DfResult<Vec<f64>> {
        Err(DfError::internal(format!("单分区运行不应接收消息 (来源 {src}, 阶段 {phase})")))
    }
}

// ============================================================================
// 进程内多分区
// ============================================================================

/// 进程内分区通信器：两两之间一对 mpsc 通道
#[derive(Debug)]
pub struct ChannelComm {
    rank: usize,
    size: usize,
    senders: Vec<Option<Sender<Message>>>,
    receivers: Vec<Option<Receiver<Message>>>,
    send_seq: Vec<u64>,
    recv_seq: Vec<u64>,
}

impl ChannelComm {
    /// 创建 n 个互联的通信器，第 r 个属于 r 号分区
    pub fn create(n: usize) -> Vec<ChannelComm> {
        let mut comms: Vec<ChannelComm> = (0..n)
            .map(|rank| ChannelComm {
                rank,
                size: n,
                senders: (0..n).map(|_| None).collect(),
                receivers: (0..n).map(|_| None).collect(),
                send_seq: vec![0; n],
                recv_seq: vec![0; n],
            })
            .collect();
        for src in 0..n {
            for dest in 0..n {
                if src == dest {
                    continue;
                }
                let (tx, rx) = channel();
                comms[src].senders[dest] = Some(tx);
                comms[dest].receivers[src] = Some(rx);
            }
        }
        comms
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&mut self, dest: usize, phase: Phase, data: Vec<f64>) -> DfResult<()> {
        let tx = self
            .senders
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or_else(|| DfError::communication(format!("分区 {} 没有到分区 {dest} 的链路", self.rank)))?;
        let seq = self.send_seq[dest];
        tx.send(Message { phase, seq, data })
            .map_err(|_| DfError::communication(format!("分区 {dest} 已断开 (阶段 {phase})")))?;
        self.send_seq[dest] += 1;
        Ok(())
    }

    fn recv(&mut self, src: usize, phase: Phase) -> DfResult<Vec<f64>> {
        let rx = self
            .receivers
            .get(src)
            .and_then(Option::as_ref)
            .ok_or_else(|| DfError::communication(format!("分区 {} 没有来自分区 {src} 的链路", self.rank)))?;
        let msg = rx
            .recv()
            .map_err(|_| DfError::communication(format!("分区 {src} 已断开 (阶段 {phase})")))?;
        if msg.phase != phase {
            return Err(DfError::sync_mismatch(phase.as_str(), src, phase, msg.phase));
        }
        let expected = self.recv_seq[src];
        if msg.seq != expected {
            return Err(DfError::sync_mismatch(phase.as_str(), src, expected, msg.seq));
        }
        self.recv_seq[src] += 1;
        Ok(msg.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_serial_reduce_is_identity() {
        let mut comm = SerialComm;
        assert_eq!(comm.all_reduce_max(3.0).unwrap(), 3.0);
        assert_eq!(comm.all_reduce_sum(3.0).unwrap(), 3.0);
        assert!(comm.send(1, Phase::Ghost, vec![]).is_err());
    }

    #[test]
    fn test_channel_reduce() {
        let comms = ChannelComm::create(3);
        let results: Vec<(f64, f64, f64)> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|mut c| {
                    s.spawn(move || {
                        let v = c.rank() as f64 + 1.0;
                        let max = c.all_reduce_max(v).unwrap();
                        let min = c.all_reduce_min(v).unwrap();
                        let sum = c.all_reduce_sum(v).unwrap();
                        (max, min, sum)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for r in results {
            assert_eq!(r, (3.0, 1.0, 6.0));
        }
    }

    #[test]
    fn test_phase_mismatch_detected() {
        let mut comms = ChannelComm::create(2);
        let mut b = comms.pop().unwrap();
        let mut a = comms.pop().unwrap();
        a.send(1, Phase::Ghost, vec![1.0]).unwrap();
        let err = b.recv(0, Phase::Gather).unwrap_err();
        assert!(matches!(err, DfError::SyncMismatch { neighbour: 0, .. }));
    }

    #[test]
    fn test_disconnected_peer() {
        let mut comms = ChannelComm::create(2);
        let b = comms.pop().unwrap();
        let mut a = comms.pop().unwrap();
        drop(b);
        assert!(matches!(a.recv(1, Phase::Ghost), Err(DfError::Communication { .. })));
        assert!(a.send(1, Phase::Ghost, vec![]).is_err());
    }
}
