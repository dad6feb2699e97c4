// crates/df_physics/src/output.rs

//! 面心场快照输出
//!
//! 每个输出时刻写一个目录，目录名为时间标签：
//!
//! ```text
//! <output>/<time>/fields.json              单分区
//! <output>/<time>/fields_proc<rank>.json   多分区，每个分区一份
//! ```
//!
//! 文件内容为时刻、分区编号、面心坐标与全局面号、场值以及本步统计。

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use df_foundation::{DfError, DfResult};
use df_mesh::FaMesh;
use serde::Serialize;

use crate::engine::simulation::StepSummary;
use crate::state::FieldSnapshot;

// ============================================================
// 时间标签
// ============================================================

/// 时间标签：保留 6 位小数后去掉末尾的 0 与小数点
///
/// `0.0 -> "0"`，`1.5 -> "1.5"`，`2.25e-7 -> "0"`
pub fn time_label(t: f64) -> String {
    let s = format!("{t:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-0" => "0".to_owned(),
        _ => s.to_owned(),
    }
}

// ============================================================
// 文件内容
// ============================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile<'a> {
    time: f64,
    rank: usize,
    n_partitions: usize,
    face_addressing: &'a [usize],
    centres: Vec<[f64; 3]>,
    fields: FieldSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<&'a StepSummary>,
}

// ============================================================
// 写出器
// ============================================================

/// 快照写出器
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
    rank: usize,
    n_partitions: usize,
    written: usize,
}

impl SnapshotWriter {
    /// 创建（目录在第一次写出时建立）
    pub fn new(root: impl Into<PathBuf>, rank: usize, n_partitions: usize) -> Self {
        Self {
            root: root.into(),
            rank,
            n_partitions,
            written: 0,
        }
    }

    /// 输出根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 已写出的快照数
    pub fn written(&self) -> usize {
        self.written
    }

    /// 某时刻本分区的文件路径
    pub fn path_for(&self, t: f64) -> PathBuf {
        let name = if self.n_partitions > 1 {
            format!("fields_proc{}.json", self.rank)
        } else {
            "fields.json".to_owned()
        };
        self.root.join(time_label(t)).join(name)
    }

    /// 写出一个快照，返回文件路径
    pub fn write(
        &mut self,
        t: f64,
        mesh: &FaMesh,
        face_addressing: &[usize],
        fields: FieldSnapshot,
        step: Option<&StepSummary>,
    ) -> DfResult<PathBuf> {
        let path = self.path_for(t);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| DfError::io_with_source(format!("无法创建输出目录 {}", dir.display()), e))?;
        }

        let content = SnapshotFile {
            time: t,
            rank: self.rank,
            n_partitions: self.n_partitions,
            face_addressing,
            centres: mesh.centres().iter().map(|c| c.to_array()).collect(),
            fields,
            step,
        };

        let file = File::create(&path)
            .map_err(|e| DfError::io_with_source(format!("无法创建 {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &content)
            .map_err(|e| DfError::serialization(format!("{}: {e}", path.display())))?;
        writer.flush()?;

        self.written += 1;
        tracing::info!(time = t, path = %path.display(), "快照已写出");
        Ok(path)
    }
}
