//! 热量统计命令
//!
//! 输入为原始日志：每行一个设备码（旧格式）或 `sensor;code`，
//! 也接受 `RawLogWriter` 写出的 `<时间戳>\t<行>` 格式。

use crate::utils::strip_log_prefix;
use anyhow::{Context, Result};
use clap::Args;
use innova_protocol::{EnergySummary, Posture};
use std::path::PathBuf;

/// 热量统计参数
#[derive(Args, Debug)]
pub struct EnergyCommand {
    /// 原始日志文件
    pub file: PathBuf,

    /// 只统计该传感器
    #[arg(short, long)]
    pub sensor: Option<String>,

    /// 输出 JSON
    #[arg(long)]
    pub json: bool,
}

impl EnergyCommand {
    pub fn execute(&self) -> Result<()> {
        let content = std::fs::read_to_string(&self.file)
            .with_context(|| format!("无法读取日志文件: {}", self.file.display()))?;

        let lines = content
            .lines()
            .map(|line| strip_log_prefix(line.strip_suffix('\r').unwrap_or(line)));
        let summary = EnergySummary::from_log_lines(lines, self.sensor.as_deref());

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        println!("{:<16} {:>8} {:>10}", "posture", "count", "calories");
        for posture in Posture::ALL {
            let energy = summary.get(posture);
            if energy.count > 0 {
                println!(
                    "{:<16} {:>8} {:>10}",
                    posture.name(),
                    energy.count,
                    energy.calories
                );
            }
        }
        println!(
            "total: {} readings, {} calories",
            summary.total_readings, summary.total_calories
        );
        Ok(())
    }
}
