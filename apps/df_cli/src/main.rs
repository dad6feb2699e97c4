// apps/df_cli/src/main.rs

//! df_cli：泥石流算例的运行、校验与模型查询
//!
//! ```text
//! df_cli run --case case.json [--partitions N] [--log-level debug]
//! df_cli validate --case case.json [--strict]
//! df_cli info [--models | --defaults]
//! ```

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "df_cli", version, about = "DebrisFlow finite-area debris flow solver")]
struct Cli {
    /// 日志级别，可写在子命令前后
    #[arg(short, long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行算例
    Run(commands::run::RunArgs),
    /// 列出闭合模型与默认参数
    Info(commands::info::InfoArgs),
    /// 只校验算例，不推进时间
    Validate(commands::validate::ValidateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_after_subcommand() {
        let cli = Cli::try_parse_from(["df_cli", "run", "--case", "c.json", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.case, std::path::PathBuf::from("c.json"));
                assert_eq!(args.partitions, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_defaults_and_rejections() {
        let cli = Cli::try_parse_from(["df_cli", "info"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Info);
        assert!(Cli::try_parse_from(["df_cli", "-l", "loud", "info"]).is_err());
        assert!(Cli::try_parse_from(["df_cli", "validate"]).is_err());
    }
}
