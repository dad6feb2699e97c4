// crates/df_mesh/src/io.rs

//! JSON 网格文件
//!
//! ```json
//! { "points": [[0,0,0], [1,0,0], [1,1,0], [0,1,0]],
//!   "faces": [[0,1,2,3]],
//!   "patches": [ { "name": "wall", "edges": [[0,1],[1,2],[2,3],[3,0]] } ] }
//! ```

use std::path::Path;

use df_foundation::{DfError, DfResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::mesh::{FaMesh, PatchDef};

/// 边界片（文件格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchFile {
    /// 名称
    pub name: String,
    /// 边端点
    pub edges: Vec<[usize; 2]>,
}

/// 网格文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshFile {
    /// 点坐标
    pub points: Vec<[f64; 3]>,
    /// 面顶点环
    pub faces: Vec<Vec<usize>>,
    /// 物理边界
    pub patches: Vec<PatchFile>,
}

impl MeshFile {
    /// 读取文件
    pub fn load<P: AsRef<Path>>(path: P) -> DfResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DfError::file_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| DfError::serialization(format!("{}: {e}", path.display())))
    }

    /// 构建网格
    pub fn into_mesh(self) -> DfResult<FaMesh> {
        let points = self.points.into_iter().map(DVec3::from_array).collect();
        let patches = self
            .patches
            .into_iter()
            .map(|p| PatchDef::physical(p.name, p.edges))
            .collect();
        FaMesh::from_faces(points, self.faces, patches)
    }
}

/// 从 JSON 文件加载网格
pub fn load_mesh<P: AsRef<Path>>(path: P) -> DfResult<FaMesh> {
    let mesh = MeshFile::load(path.as_ref())?.into_mesh()?;
    tracing::info!(
        path = %path.as_ref().display(),
        faces = mesh.n_faces(),
        "网格文件加载完成"
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_mesh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.json");
        std::fs::write(
            &path,
            r#"{ "points": [[0,0,0],[1,0,0],[1,1,0],[0,1,0],[2,0,0],[2,1,0]],
                 "faces": [[0,1,2,3],[1,4,5,2]],
                 "patches": [ { "name": "inlet", "edges": [[3,0]] },
                              { "name": "wall", "edges": [[0,1],[1,4],[4,5],[5,2],[2,3]] } ] }"#,
        )
        .unwrap();
        let mesh = load_mesh(&path).unwrap();
        assert_eq!(mesh.n_faces(), 2);
        assert_eq!(mesh.n_internal_edges(), 1);
        assert_eq!(mesh.physical_patch_names(), vec!["inlet", "wall"]);
    }

    #[test]
    fn test_missing_file() {
        let res = load_mesh("/nonexistent/mesh.json");
        assert!(matches!(res, Err(DfError::FileNotFound { .. })));
    }
}
