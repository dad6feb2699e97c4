// apps/df_cli/src/commands/run.rs

//! 运行模拟命令
//!
//! 读取算例文件，按分区数构建并运行模拟，结束后打印统计。

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use df_config::CaseConfig;
use df_physics::run_case;
use tracing::{info, warn};

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 算例文件路径
    #[arg(short, long)]
    pub case: PathBuf,

    /// 覆盖分区数
    #[arg(short, long)]
    pub partitions: Option<usize>,

    /// 覆盖输出目录
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 覆盖结束时间 [s]
    #[arg(short = 't', long)]
    pub end_time: Option<f64>,

    /// 以 JSON 打印运行统计
    #[arg(long)]
    pub json: bool,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== DebrisFlow 模拟启动 ===");

    let mut case = CaseConfig::from_file(&args.case)
        .with_context(|| format!("无法加载算例 {}", args.case.display()))?;

    if let Some(n) = args.partitions {
        case.decomposition.partitions = n;
    }
    if let Some(dir) = args.output {
        case.output.directory = dir;
    }
    if let Some(t) = args.end_time {
        case.time.end_time = t;
    }
    case.validate().context("命令行覆盖后的配置无效")?;

    info!(
        "摩擦: {}, 挟带: {}, 淤积: {}",
        case.transport.friction.name(),
        case.transport.entrainment.name(),
        case.transport.deposition.name()
    );
    info!(
        "时间: {} → {} s, dt = {} s, 自适应 = {}, 分区 = {}",
        case.time.start_time,
        case.time.end_time,
        case.time.delta_t,
        case.time.adjust_time_step,
        case.decomposition.partitions
    );

    let summary = run_case(&case).context("模拟失败")?;

    info!("=== 模拟完成 ===");
    info!("总步数: {}", summary.steps);
    info!("结束时刻: {} s", summary.end_time);
    info!("计算时间: {:.2} s", summary.wall_seconds);
    info!("输出快照数: {}", summary.snapshots);
    info!("步长调整次数: {}", summary.time_step.adjustments);

    let drift = if summary.initial_mass > 0.0 {
        (summary.final_mass - summary.initial_mass) / summary.initial_mass
    } else {
        0.0
    };
    info!(
        "质量: {:.6e} → {:.6e} kg (相对变化 {:.3e})",
        summary.initial_mass, summary.final_mass, drift
    );

    if summary.unconverged_steps > 0 {
        warn!("{} 步达到内迭代上限", summary.unconverged_steps);
    }
    if summary.terrain_capped_steps > 0 {
        warn!("{} 步地形修正达到迭代上限", summary.terrain_capped_steps);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
