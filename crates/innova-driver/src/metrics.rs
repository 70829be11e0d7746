//! 会话性能指标
//!
//! 读线程写入、任意线程读取的原子计数器。所有计数均为 `Relaxed`：
//! 指标只用于观测，不参与同步。

use std::sync::atomic::{AtomicU64, Ordering};

/// 会话指标（原子计数器）
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// 从传输层读取的字节数
    pub bytes_read: AtomicU64,
    /// 分帧得到的行数（含结束标记和格式错误的行）
    pub lines: AtomicU64,
    /// 进入缓冲区的读数
    pub readings_buffered: AtomicU64,
    /// 被丢弃的格式错误行
    pub malformed_lines: AtomicU64,
    /// 完成的包
    pub packets: AtomicU64,
    /// 其中的空包
    pub empty_packets: AtomicU64,
    /// 已投递给消费者的读数
    pub readings_delivered: AtomicU64,
    /// 丢弃的读数（缓冲超限或会话结束时的部分包）
    pub readings_discarded: AtomicU64,
    /// 缓冲超限重置次数
    pub overflow_resets: AtomicU64,
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub bytes_read: u64,
    pub lines: u64,
    pub readings_buffered: u64,
    pub malformed_lines: u64,
    pub packets: u64,
    pub empty_packets: u64,
    pub readings_delivered: u64,
    pub readings_discarded: u64,
    pub overflow_resets: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            readings_buffered: self.readings_buffered.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            packets: self.packets.load(Ordering::Relaxed),
            empty_packets: self.empty_packets.load(Ordering::Relaxed),
            readings_delivered: self.readings_delivered.load(Ordering::Relaxed),
            readings_discarded: self.readings_discarded.load(Ordering::Relaxed),
            overflow_resets: self.overflow_resets.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = SessionMetrics::new();
        SessionMetrics::incr(&metrics.lines);
        SessionMetrics::incr(&metrics.lines);
        SessionMetrics::add(&metrics.bytes_read, 42);
        SessionMetrics::incr(&metrics.malformed_lines);

        let snap = metrics.snapshot();
        assert_eq!(snap.lines, 2);
        assert_eq!(snap.bytes_read, 42);
        assert_eq!(snap.malformed_lines, 1);
        assert_eq!(snap.packets, 0);
    }
}
