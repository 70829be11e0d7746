//! # Innova Link Layer
//!
//! 串口传输抽象层：把字节流读取统一到 `SerialAdapter` trait，
//! 并提供字节 → 文本行 的分帧器。
//!
//! 蓝牙 RFCOMM 的配对与连接建立不在本层范围内：本层只消费已经打开的
//! 字节流（tty 设备文件、TCP 桥接、标准输入或测试脚本）。

use std::time::Duration;
use thiserror::Error;

#[cfg(unix)]
pub mod device;
pub mod framer;
pub mod reader;
pub mod tcp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(unix)]
pub use device::DeviceAdapter;
pub use framer::LineFramer;
pub use reader::ReaderAdapter;
pub use tcp::TcpAdapter;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockSerialAdapter};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Transport closed")]
    Closed,
    #[error("Device Error: {0}")]
    Device(String),
}

impl LinkError {
    /// 是否为可恢复的超时（读循环应继续）
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout)
    }
}

/// 从 IO 错误分类：超时类错误映射为 `LinkError::Timeout`
pub(crate) fn classify_io_error(e: std::io::Error) -> LinkError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => LinkError::Timeout,
        ErrorKind::NotConnected | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            LinkError::Closed
        },
        _ => LinkError::Io(e),
    }
}

/// 跨线程关闭传输的句柄
///
/// 由读线程以外的线程调用，使阻塞中的 `read` 返回（EOF 或错误）。
pub trait TransportCloser: Send + Sync {
    fn close(&self);
}

/// 串口字节流适配器
///
/// 读线程独占适配器；`read` 返回 `Ok(0)` 表示对端关闭（EOF）。
pub trait SerialAdapter {
    /// 读取字节，返回读取的字节数
    ///
    /// # Errors
    /// - `LinkError::Timeout`: 超时内没有数据（正常情况，调用方应重试）
    /// - 其他错误：传输失败
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// 设置读超时（不支持超时的适配器忽略此设置）
    fn set_read_timeout(&mut self, _timeout: Duration) {}

    /// 获取跨线程关闭句柄（不支持时返回 None）
    fn closer(&self) -> Option<Box<dyn TransportCloser>> {
        None
    }

    /// 设备地址（蓝牙 MAC、设备路径或对端地址）
    fn device_address(&self) -> &str;
}

impl<A: SerialAdapter + ?Sized> SerialAdapter for Box<A> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        (**self).read(buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        (**self).set_read_timeout(timeout)
    }

    fn closer(&self) -> Option<Box<dyn TransportCloser>> {
        (**self).closer()
    }

    fn device_address(&self) -> &str {
        (**self).device_address()
    }
}

/// 覆盖设备地址的适配器包装
///
/// 设备文件路径或 TCP 对端地址不是设备的蓝牙地址时，用调用方给定的地址标记会话。
pub struct Labeled<A> {
    inner: A,
    device_address: String,
}

impl<A: SerialAdapter> Labeled<A> {
    pub fn new(inner: A, device_address: impl Into<String>) -> Self {
        Self {
            inner,
            device_address: device_address.into(),
        }
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: SerialAdapter> SerialAdapter for Labeled<A> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        self.inner.read(buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.inner.set_read_timeout(timeout)
    }

    fn closer(&self) -> Option<Box<dyn TransportCloser>> {
        self.inner.closer()
    }

    fn device_address(&self) -> &str {
        &self.device_address
    }
}
