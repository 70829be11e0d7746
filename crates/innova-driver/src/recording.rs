//! 异步原始日志录制（Async Raw Log Hook）
//!
//! 基于 Channel 的原始行录制钩子：读线程只做 `try_send`，写文件在后台线程完成。
//!
//! - **Bounded Queue**: `bounded(100_000)`，队列满时丢行而非阻塞读线程
//! - **丢行监控**: `dropped_lines` 计数器
//!
//! # 使用示例
//!
//! ```no_run
//! use innova_driver::recording::{AsyncRawLogHook, RawLogWriter};
//! use innova_driver::hooks::LineCallback;
//! use std::sync::Arc;
//!
//! let (hook, rx) = AsyncRawLogHook::new();
//! let dropped = hook.dropped_lines().clone();
//! let callback = Arc::new(hook) as Arc<dyn LineCallback>;
//!
//! let writer = RawLogWriter::spawn(rx, "session.log").unwrap();
//! // ... 注册 callback 到会话，会话结束后 drop callback ...
//! drop(callback);
//! let written = writer.join().unwrap();
//! println!("写入 {} 行，丢了 {} 行", written, dropped.load(std::sync::atomic::Ordering::Relaxed));
//! ```

use crate::error::DriverError;
use crate::hooks::LineCallback;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use innova_protocol::now_millis;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// 默认队列容量
pub const RAW_LOG_QUEUE_CAPACITY: usize = 100_000;

/// 带接收时间的原始行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 接收时间（毫秒 epoch）
    pub received_at: u64,
    /// 行内容（不含换行符）
    pub line: String,
}

/// 异步原始日志钩子
pub struct AsyncRawLogHook {
    tx: Sender<RawLine>,
    /// 队列满时丢弃的行数
    dropped_lines: Arc<AtomicU64>,
    /// 成功入队的行数
    line_counter: Arc<AtomicU64>,
}

impl AsyncRawLogHook {
    /// 创建新的录制钩子（容量 100,000 行）
    #[must_use]
    pub fn new() -> (Self, Receiver<RawLine>) {
        Self::with_capacity(RAW_LOG_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, Receiver<RawLine>) {
        let (tx, rx) = bounded(capacity);
        let hook = Self {
            tx,
            dropped_lines: Arc::new(AtomicU64::new(0)),
            line_counter: Arc::new(AtomicU64::new(0)),
        };
        (hook, rx)
    }

    pub fn dropped_lines(&self) -> &Arc<AtomicU64> {
        &self.dropped_lines
    }

    pub fn line_counter(&self) -> &Arc<AtomicU64> {
        &self.line_counter
    }
}

impl LineCallback for AsyncRawLogHook {
    fn on_line(&self, line: &str) {
        let raw = RawLine {
            received_at: now_millis(),
            line: line.to_string(),
        };
        match self.tx.try_send(raw) {
            Ok(()) => {
                self.line_counter.fetch_add(1, Ordering::Relaxed);
            },
            Err(TrySendError::Full(_)) => {
                self.dropped_lines.fetch_add(1, Ordering::Relaxed);
            },
            // 写线程已退出，静默丢弃
            Err(TrySendError::Disconnected(_)) => {
                self.dropped_lines.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}

/// 原始日志写线程
///
/// 从 `AsyncRawLogHook` 的接收端取行，以 `<received_at>\t<line>` 格式写入文件。
/// 所有发送端 drop 后线程自动结束。
pub struct RawLogWriter {
    handle: JoinHandle<std::io::Result<u64>>,
}

impl RawLogWriter {
    pub fn spawn(rx: Receiver<RawLine>, path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|e| DriverError::IoThread(format!("create {}: {}", path.display(), e)))?;

        let handle = std::thread::Builder::new()
            .name("innova-raw-log".into())
            .spawn(move || write_loop(rx, BufWriter::new(file)))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        debug!("Raw log writer started: {}", path.display());
        Ok(Self { handle })
    }

    /// 等待写线程结束，返回写入的行数
    pub fn join(self) -> Result<u64, DriverError> {
        match self.handle.join() {
            Ok(Ok(written)) => Ok(written),
            Ok(Err(e)) => Err(DriverError::IoThread(format!("raw log write failed: {}", e))),
            Err(_) => Err(DriverError::IoThread("raw log writer panicked".to_string())),
        }
    }
}

fn write_loop<W: Write>(rx: Receiver<RawLine>, mut out: W) -> std::io::Result<u64> {
    let mut written = 0u64;
    for raw in rx.iter() {
        if let Err(e) = writeln!(out, "{}\t{}", raw.received_at, raw.line) {
            warn!("Raw log write failed: {}", e);
            return Err(e);
        }
        written += 1;
    }
    out.flush()?;
    Ok(written)
}
