//! 姿态分类命令

use crate::utils::posture_line;
use anyhow::Result;
use clap::Args;
use innova_protocol::classify;
use serde_json::json;

/// 分类命令参数
#[derive(Args, Debug)]
pub struct ClassifyCommand {
    /// 设备码（如 0xAB3311）
    #[arg(required = true)]
    pub codes: Vec<String>,

    /// 输出 JSON
    #[arg(long)]
    pub json: bool,
}

impl ClassifyCommand {
    pub fn execute(&self) -> Result<()> {
        for code in &self.codes {
            let posture = classify(code);
            if self.json {
                let line = json!({
                    "code": code,
                    "posture": posture,
                    "calories": posture.calories(),
                    "risk": posture.risk_id(),
                    "message": posture.message_id(),
                    "video": posture.video_id(),
                    "picture": posture.picture_id(),
                });
                println!("{}", line);
            } else {
                println!("{}", posture_line(code, posture));
            }
        }
        Ok(())
    }
}
