// apps/df_cli/src/commands/info.rs

//! 信息显示命令：可用闭合模型与默认求解控制

use anyhow::Result;
use clap::Args;
use df_config::{
    SolutionControls, TimeControls, TransportProperties, DEPOSITION_MODELS, ENTRAINMENT_MODELS,
    FRICTION_MODELS,
};

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 仅显示闭合模型
    #[arg(long)]
    pub models: bool,

    /// 仅显示默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    let all = !args.models && !args.defaults;

    if args.models || all {
        print_models();
    }
    if all {
        println!();
    }
    if args.defaults || all {
        print_defaults();
    }

    Ok(())
}

fn print_models() {
    println!("=== 闭合模型 ===");
    println!("DebrisFlow CLI 版本: {}", env!("CARGO_PKG_VERSION"));

    println!("\n摩擦 (friction):");
    for name in FRICTION_MODELS {
        println!("  - {name}");
    }
    println!("\n挟带 (entrainment):");
    for name in ENTRAINMENT_MODELS {
        println!("  - {name}");
    }
    println!("\n淤积 (deposition):");
    for name in DEPOSITION_MODELS {
        println!("  - {name}");
    }
}

fn print_defaults() {
    println!("=== 默认配置 ===");

    let transport = TransportProperties::default();
    println!("hmin: {} m", transport.hmin);
    println!("rho_w / rho_s: {} / {} kg/m³", transport.rho_w, transport.rho_s);
    println!("u0 / h0: {} m/s / {} m", transport.u0, transport.h0);

    let solution = SolutionControls::default();
    println!("\n内迭代: {} ~ {} 次", solution.min_correctors, solution.n_outer_correctors);

    let time = TimeControls::default();
    println!("\n时间控制:");
    println!("  maxCo: {}", time.max_co);
    println!("  maxDeltaT: {} s", time.max_delta_t);
    println!("  writeInterval: {} s", time.write_interval);
}
