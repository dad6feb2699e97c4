// apps/df_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 依次检查算例解析、网格构建、边界与过程线、闭合模型、分区与初始场。

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use df_config::CaseConfig;
use df_mesh::decompose;
use df_physics::{build_mesh, initialise, BoundaryConditions, ClosureSet, MaterialParams};
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 算例文件路径
    #[arg(short, long)]
    pub case: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== DebrisFlow 算例验证 ===");

    let mut result = ValidationResult::default();
    println!("\n检查算例文件: {}", args.case.display());

    match CaseConfig::from_file(&args.case) {
        Ok(case) => {
            println!("  ✓ 算例格式有效");
            validate_case(&case, &mut result);
        }
        Err(e) => result.add_error(format!("算例解析失败: {e}")),
    }

    print_validation_result(&result, args.strict)
}

fn validate_case(case: &CaseConfig, result: &mut ValidationResult) {
    let mesh = match build_mesh(case) {
        Ok(mesh) => mesh,
        Err(e) => {
            result.add_error(format!("网格构建失败: {e}"));
            return;
        }
    };
    println!(
        "  ✓ 网格: {} 面, {} 边, {} 点, 面积 {:.4} m²",
        mesh.n_faces(),
        mesh.n_edges(),
        mesh.n_points(),
        mesh.total_area()
    );

    match BoundaryConditions::new(&mesh, &case.boundaries, &case.hydrographs) {
        Ok(_) => println!("  ✓ 边界: {} 个物理边界, {} 条过程线", case.boundaries.len(), case.hydrographs.len()),
        Err(e) => result.add_error(format!("边界条件无效: {e}")),
    }

    let unused: Vec<String> = mesh
        .physical_patch_names()
        .into_iter()
        .filter(|name| {
            !case.boundaries.iter().any(|b| &b.patch == name)
                && !case.hydrographs.iter().any(|h| &h.boundary == name)
        })
        .collect();
    if !unused.is_empty() {
        result.add_warning(format!("以下边界未指定类型，按 outflow 处理: {}", unused.join(", ")));
    }

    match ClosureSet::from_config(&case.transport, &mesh) {
        Ok(_) => println!(
            "  ✓ 闭合模型: {} / {} / {}",
            case.transport.friction.name(),
            case.transport.entrainment.name(),
            case.transport.deposition.name()
        ),
        Err(e) => result.add_error(format!("闭合模型无效: {e}")),
    }

    let n = case.decomposition.partitions;
    if n > 1 {
        match decompose(&mesh, n) {
            Ok(parts) => println!("  ✓ 分区: {} 个子域", parts.len()),
            Err(e) => result.add_error(format!("分区失败: {e}")),
        }
    }

    let params = MaterialParams::new(&case.transport, case.gravity);
    let state = initialise(&mesh, &case.initial, &params);
    if let Some(msg) = state.check_bounds(&params) {
        result.add_error(format!("初始场越界: {msg}"));
    }
    let volume = state.total_volume(mesh.areas(), &params);
    if volume <= 0.0 && case.hydrographs.is_empty() {
        result.add_warning("初始流体体积为零且没有入流过程线");
    } else {
        println!("  ✓ 初始体积: {volume:.6} m³");
    }

    if case.time.write_interval > case.time.end_time - case.time.start_time {
        result.add_warning("输出间隔大于模拟时长，只会写出结束时刻");
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    if result.is_ok(strict) {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
