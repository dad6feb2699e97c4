// crates/df_physics/tests/common/mod.rs

//! 集成测试共用的算例构造

#![allow(dead_code)]

use std::path::Path;

use df_config::CaseConfig;
use serde_json::{json, Value};

/// 平坦矩形网格上的基础算例：Manning 摩擦，无侵蚀/淤积，固定步长
pub fn base_case(nx: usize, ny: usize, output: &Path) -> Value {
    json!({
        "mesh": { "type": "rectangle", "nx": nx, "ny": ny, "dx": 1.0, "dy": 1.0 },
        "transportProperties": {
            "hmin": 1e-4, "shi": 1.0, "rho_w": 1000, "rho_s": 2700, "rho_b": 2000,
            "pressureFeedback": true,
            "friction": { "model": "ManningStrickler", "n": 0.05 },
            "entrainment": { "model": "entrainmentOff" },
            "deposition": { "model": "depositionOff" }
        },
        "solution": { "nOuterCorrectors": 10, "minCorrectors": 3 },
        "time": {
            "endTime": 0.03, "deltaT": 0.01, "writeInterval": 0.03,
            "adjustTimeStep": false
        },
        "initialConditions": { "Cv": { "default": 0.4 } },
        "output": { "directory": output, "writeInitial": false }
    })
}

/// 四周为壁面、中心 2x2 m 释放区 h = 1 的封闭算例
pub fn closed_release_case(nx: usize, ny: usize, output: &Path) -> Value {
    let mut case = base_case(nx, ny, output);
    let (cx, cy) = (nx as f64 / 2.0, ny as f64 / 2.0);
    case["boundaries"] = json!([
        { "patch": "left", "type": "wall" },
        { "patch": "right", "type": "wall" },
        { "patch": "bottom", "type": "wall" },
        { "patch": "top", "type": "wall" }
    ]);
    case["initialConditions"]["h"] = json!({
        "default": 0.0,
        "regions": [{
            "type": "polygon",
            "vertices": [[cx - 1.0, cy - 1.0], [cx + 1.0, cy - 1.0], [cx + 1.0, cy + 1.0], [cx - 1.0, cy + 1.0]],
            "value": 1.0
        }]
    });
    case
}

/// 解析并校验
pub fn parse(value: Value) -> CaseConfig {
    let case: CaseConfig = serde_json::from_value(value).unwrap();
    case.validate().unwrap();
    case
}
