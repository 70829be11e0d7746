//! 包解析器
//!
//! 把无界的文本行序列切分为离散的读数批次，批次边界由 `END_PACKET` 标记。
//!
//! # 状态
//!
//! 只有一个有序的待提交读数缓冲区，作用域为单个连接会话。
//! 每个物理连接拥有独立的解析器实例，由唯一的读线程驱动，因此不需要加锁。
//!
//! # 容错
//!
//! 协议边缘的格式错误不会上报为错误：缺少分隔符、空传感器 ID、空设备码
//! 的行会被静默丢弃，解析器状态保持不变。`feed` 不会失败，也不会 panic。

use crate::{FIELD_DELIMITER, PACKET_TERMINATOR, Reading, now_millis};

/// 行被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// 行中没有 `;`
    MissingDelimiter,
    /// 分隔符左侧为空
    EmptySensorId,
    /// 分隔符右侧（第一段）为空
    EmptyCode,
}

/// 单行输入的处理结果
///
/// `feed_line` 返回此类型，便于上层（驱动层）统计丢弃行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// 读数已加入缓冲区
    Buffered,
    /// 格式错误，已丢弃（状态未改变）
    Discarded(DiscardReason),
    /// 收到包结束标记，返回整个包（可能为空）
    PacketComplete(Vec<Reading>),
}

impl LineOutcome {
    /// 转换为 `feed` 的返回形式
    pub fn into_batch(self) -> Option<Vec<Reading>> {
        match self {
            LineOutcome::PacketComplete(batch) => Some(batch),
            LineOutcome::Buffered | LineOutcome::Discarded(_) => None,
        }
    }
}

/// 行协议包解析器
///
/// # Example
///
/// ```
/// use innova_protocol::PacketParser;
///
/// let mut parser = PacketParser::new();
/// assert!(parser.feed("sensor001;0xAB3311").is_none());
/// assert!(parser.feed("sensor002;0xEF0112").is_none());
///
/// let batch = parser.feed("END_PACKET").unwrap();
/// assert_eq!(batch.len(), 2);
/// assert_eq!(batch[0].sensor_id(), "sensor001");
/// ```
#[derive(Debug, Default, Clone)]
pub struct PacketParser {
    pending: Vec<Reading>,
}

impl PacketParser {
    /// 创建空解析器
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// 输入一行
    ///
    /// - 收到 `END_PACKET`：返回 `Some(batch)`（即使为空），并清空缓冲区
    /// - 否则：返回 `None`（有效行进入缓冲区，格式错误的行被丢弃）
    ///
    /// 读数时间戳取调用时刻的系统时间。
    pub fn feed(&mut self, line: &str) -> Option<Vec<Reading>> {
        self.feed_line(line).into_batch()
    }

    /// 输入一行，使用调用方提供的时间戳（回放/测试用）
    ///
    /// 时间戳 0 会被钳制为 1，以保持 `received_at > 0`。
    pub fn feed_at(&mut self, line: &str, received_at: u64) -> Option<Vec<Reading>> {
        self.process(line, || received_at.max(1)).into_batch()
    }

    /// 输入一行并返回详细结果
    pub fn feed_line(&mut self, line: &str) -> LineOutcome {
        self.process(line, now_millis)
    }

    fn process(&mut self, line: &str, clock: impl FnOnce() -> u64) -> LineOutcome {
        if line == PACKET_TERMINATOR {
            return LineOutcome::PacketComplete(std::mem::take(&mut self.pending));
        }

        match split_line(line) {
            Ok((sensor_id, code)) => {
                self.pending
                    .push(Reading::from_validated(sensor_id, code, clock()));
                LineOutcome::Buffered
            },
            Err(reason) => LineOutcome::Discarded(reason),
        }
    }

    /// 丢弃缓冲区中的部分包（重连或超限时使用）
    ///
    /// 返回被丢弃的读数数量。
    pub fn reset(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    /// 当前缓冲的读数数量
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 缓冲区是否为空（没有进行中的部分包）
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 当前缓冲内容（诊断用）
    pub fn pending(&self) -> &[Reading] {
        &self.pending
    }
}

/// 按第一个 `;` 拆分一行
///
/// 设备码中若还有 `;`，只取其前的第一段。
pub(crate) fn split_line(line: &str) -> Result<(&str, &str), DiscardReason> {
    let (sensor_id, rest) = line
        .split_once(FIELD_DELIMITER)
        .ok_or(DiscardReason::MissingDelimiter)?;

    if sensor_id.is_empty() {
        return Err(DiscardReason::EmptySensorId);
    }

    let code = rest
        .split_once(FIELD_DELIMITER)
        .map_or(rest, |(first, _)| first);
    if code.is_empty() {
        return Err(DiscardReason::EmptyCode);
    }

    Ok((sensor_id, code))
}
