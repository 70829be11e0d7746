//! 解析命令
//!
//! 把行文件（或标准输入）当作设备数据流，经过完整的会话链路解析出包。

use crate::utils::{reading_json, reading_text};
use anyhow::{Context, Result};
use clap::Args;
use innova_driver::{Session, SessionConfig, SessionEvent};
use innova_link::ReaderAdapter;
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;

/// 解析命令参数
#[derive(Args, Debug)]
pub struct ParseCommand {
    /// 输入文件（省略时读取标准输入）
    pub file: Option<PathBuf>,

    /// 每个包输出一行 JSON
    #[arg(long)]
    pub json: bool,

    /// 附带姿态分类
    #[arg(short, long)]
    pub classify: bool,

    /// 事件和记录中使用的设备地址
    #[arg(short, long)]
    pub address: Option<String>,
}

impl ParseCommand {
    pub fn execute(&self) -> Result<()> {
        let config = SessionConfig {
            max_pending_readings: None,
            ..Default::default()
        };

        let session = match &self.file {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("无法打开输入文件: {}", path.display()))?;
                let address = self.address.clone().unwrap_or_else(|| path.display().to_string());
                Session::new(ReaderAdapter::new(file, address), config)?
            },
            None => {
                let address = self.address.clone().unwrap_or_else(|| "stdin".to_string());
                Session::new(ReaderAdapter::new(std::io::stdin(), address), config)?
            },
        };

        for event in session.events().iter() {
            match event {
                SessionEvent::Connected { device_address } => {
                    debug!("Parsing input from {}", device_address);
                },
                SessionEvent::Packet(batch) => {
                    if self.json {
                        let readings: Vec<_> = batch
                            .readings
                            .iter()
                            .map(|r| reading_json(r, self.classify))
                            .collect();
                        let line = json!({
                            "device_address": batch.device_address,
                            "sequence": batch.sequence,
                            "readings": readings,
                        });
                        println!("{}", line);
                    } else {
                        println!(
                            "packet #{} ({} readings)",
                            batch.sequence,
                            batch.readings.len()
                        );
                        for reading in &batch.readings {
                            println!("  {}", reading_text(reading, self.classify));
                        }
                    }
                },
                SessionEvent::Disconnected {
                    discarded_readings, ..
                } => {
                    if !self.json {
                        let metrics = session.metrics();
                        println!(
                            "{} packets, {} readings, {} malformed lines, {} unterminated readings discarded",
                            metrics.packets,
                            metrics.readings_delivered,
                            metrics.malformed_lines,
                            discarded_readings
                        );
                    }
                    break;
                },
            }
        }

        Ok(())
    }
}
