//! 通用字节流适配器
//!
//! 把任意 `std::io::Read` 包装为 `SerialAdapter`：录制的原始日志文件、
//! 标准输入、测试用的读取器等。
//!
//! 阻塞的 `Read` 没有超时，也无法从其他线程打断，因此源读取器在后台
//! 读取线程中运行，字节块经有界通道转交给适配器。`read` 支持读超时，
//! `closer()` 可以随时唤醒并结束读取。读取线程在源返回数据、EOF 或错误后
//! 发现适配器已释放时退出。设备文件请使用 `DeviceAdapter`（Unix）。

use crate::{LinkError, SerialAdapter, TransportCloser};
use bytes::{Buf, BytesMut};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// 读取线程每次读取的最大字节数
const PUMP_CHUNK_SIZE: usize = 1024;

/// 读取线程和适配器之间最多排队的字节块
const PUMP_QUEUE_CAPACITY: usize = 64;

/// 读取线程 → 适配器
enum Chunk {
    Data(Vec<u8>),
    Eof,
    Failed(std::io::Error),
}

/// 基于 `Read` 的适配器
///
/// 读取线程在第一次 `read` 时启动。默认没有读超时（阻塞直到有数据、EOF
/// 或关闭）；会话会通过 `set_read_timeout` 设置超时。
pub struct ReaderAdapter {
    source: Option<Box<dyn Read + Send>>,
    rx: Receiver<Chunk>,
    /// 给关闭句柄使用，唤醒阻塞中的 `read`
    wake: Sender<Chunk>,
    pending: BytesMut,
    read_timeout: Option<Duration>,
    closed: Arc<AtomicBool>,
    finished: bool,
    device_address: String,
}

impl ReaderAdapter {
    pub fn new<R>(source: R, device_address: impl Into<String>) -> Self
    where
        R: Read + Send + 'static,
    {
        let (wake, rx) = bounded(PUMP_QUEUE_CAPACITY);
        Self {
            source: Some(Box::new(source)),
            rx,
            wake,
            pending: BytesMut::new(),
            read_timeout: None,
            closed: Arc::new(AtomicBool::new(false)),
            finished: false,
            device_address: device_address.into(),
        }
    }

    /// 打开普通文件（如录制的原始日志），设备地址取路径字符串
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                LinkError::Device(format!("device not found: {}", path.display()))
            } else {
                LinkError::Io(e)
            }
        })?;
        debug!("Opened {}", path.display());
        Ok(Self::new(file, path.display().to_string()))
    }

    /// 启动读取线程（只执行一次）
    fn start_pump(&mut self) -> Result<(), LinkError> {
        let Some(source) = self.source.take() else {
            return Ok(());
        };
        let tx = self.wake.clone();
        thread::Builder::new()
            .name("innova-reader".to_string())
            .spawn(move || pump(source, tx))?;
        Ok(())
    }

    fn take_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        n
    }
}

/// 读取线程主循环
fn pump(mut source: Box<dyn Read + Send>, tx: Sender<Chunk>) {
    let mut buf = vec![0u8; PUMP_CHUNK_SIZE];
    loop {
        let chunk = match source.read(&mut buf) {
            Ok(0) => Chunk::Eof,
            Ok(n) => Chunk::Data(buf[..n].to_vec()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => Chunk::Failed(e),
        };
        let last = !matches!(chunk, Chunk::Data(_));
        // 适配器已释放时发送失败，线程退出
        if tx.send(chunk).is_err() || last {
            break;
        }
    }
    trace!("reader thread exiting");
}

impl SerialAdapter for ReaderAdapter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        if !self.pending.is_empty() {
            return Ok(self.take_pending(buf));
        }
        if self.finished {
            return Ok(0);
        }
        self.start_pump()?;

        let chunk = match self.read_timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => return Err(LinkError::Timeout),
                Err(RecvTimeoutError::Disconnected) => Chunk::Eof,
            },
            None => self.rx.recv().unwrap_or(Chunk::Eof),
        };

        match chunk {
            Chunk::Data(data) => {
                self.pending.extend_from_slice(&data);
                Ok(self.take_pending(buf))
            },
            Chunk::Eof if self.closed.load(Ordering::Acquire) => Err(LinkError::Closed),
            Chunk::Eof => {
                self.finished = true;
                Ok(0)
            },
            Chunk::Failed(e) => {
                self.finished = true;
                Err(LinkError::Io(e))
            },
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = Some(timeout);
    }

    fn closer(&self) -> Option<Box<dyn TransportCloser>> {
        Some(Box::new(ReaderCloser {
            closed: self.closed.clone(),
            wake: self.wake.clone(),
        }))
    }

    fn device_address(&self) -> &str {
        &self.device_address
    }
}

struct ReaderCloser {
    closed: Arc<AtomicBool>,
    wake: Sender<Chunk>,
}

impl TransportCloser for ReaderCloser {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // 队列已满说明 read 不会阻塞，下一次调用会看到关闭标志
        let _ = self.wake.try_send(Chunk::Eof);
    }
}
