//! # Innova Protocol
//!
//! 可穿戴压力传感器的行协议定义（无硬件依赖、无 IO）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（包结束标记、分隔符、设备码）
//! - `reading`: 单条传感器读数
//! - `parser`: 行 → 包 的有状态累积器
//! - `posture`: 设备码 → 姿态 的全函数分类
//! - `record`: 持久化记录契约
//! - `energy`: 姿态热量统计
//!
//! ## 线路格式
//!
//! ```text
//! sensor001;0xAB3311
//! sensor002;0xEF0112
//! END_PACKET
//! ```
//!
//! 每行一条读数，`END_PACKET` 结束一个包。

pub mod constants;
pub mod energy;
pub mod parser;
pub mod posture;
pub mod reading;
pub mod record;

// 重新导出常用类型
pub use constants::*;
pub use energy::{EnergySummary, PostureEnergy};
pub use parser::{DiscardReason, LineOutcome, PacketParser};
pub use posture::{Posture, classify};
pub use reading::Reading;
pub use record::{PersistableRecord, RecordBuilder};

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// 协议层错误类型
///
/// 注意：`PacketParser::feed` 和 `classify` 永远不会返回错误，
/// 这里的错误只来自显式构造（如 `Reading::new`）和名称解析。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Sensor id must not be empty")]
    EmptySensorId,

    #[error("Posture code must not be empty")]
    EmptyCode,

    #[error("Posture code contains field separator: {code:?}")]
    SeparatorInCode { code: String },

    #[error("Timestamp must be greater than zero")]
    ZeroTimestamp,

    #[error("Unknown posture name: {0}")]
    UnknownPostureName(String),
}

/// 当前 Unix 时间（毫秒），至少为 1
///
/// 读数要求 `received_at > 0`，系统时钟早于纪元时也不会产生 0。
pub fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    millis.max(1)
}
