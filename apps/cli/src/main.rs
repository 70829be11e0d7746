//! # InnovaMotion CLI
//!
//! Command-line interface for InnovaMotion wearable posture sensors.
//!
//! ```bash
//! # 配置默认设备
//! innova-cli config set --device /dev/rfcomm0 --address 00:11:22:33:44:55
//!
//! # 解析录制的原始数据
//! innova-cli parse capture.txt --classify
//!
//! # 实时监控（Ctrl-C 结束）
//! innova-cli monitor --tcp 127.0.0.1:7000
//!
//! # 热量统计
//! innova-cli energy raw.log
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod settings;
mod utils;

use commands::{ClassifyCommand, ConfigCommand, EnergyCommand, MonitorCommand, ParseCommand};

/// InnovaMotion CLI - 可穿戴姿态传感器命令行工具
#[derive(Parser, Debug)]
#[command(name = "innova-cli")]
#[command(about = "Command-line interface for InnovaMotion wearable posture sensors", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 解析行文件（或标准输入）中的包
    Parse {
        #[command(flatten)]
        args: ParseCommand,
    },

    /// 查询设备码对应的姿态
    Classify {
        #[command(flatten)]
        args: ClassifyCommand,
    },

    /// 连接设备并实时显示包和姿态
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 统计原始日志的热量消耗
    Energy {
        #[command(flatten)]
        args: EnergyCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志（输出到 stderr，stdout 留给命令结果）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("innova_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Parse { args } => args.execute(),
        Commands::Classify { args } => args.execute(),
        Commands::Monitor { args } => args.execute(),
        Commands::Energy { args } => args.execute(),
    }
}
