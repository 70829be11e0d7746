//! Builder 模式实现
//!
//! 提供链式构造 `Session` 实例的便捷方式。

use crate::error::DriverError;
use crate::hooks::LineCallback;
use crate::pipeline::{SessionConfig, SessionContext};
use crate::session::Session;
#[cfg(unix)]
use innova_link::DeviceAdapter;
#[cfg(not(unix))]
use innova_link::ReaderAdapter;
use innova_link::{Labeled, SerialAdapter, TcpAdapter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 传输类型选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    /// 已绑定的设备文件（如 `/dev/rfcomm0`）或录制的原始日志
    Device(PathBuf),
    /// 通过 TCP 桥接的 RFCOMM 流（`host:port`）
    Tcp(String),
}

/// Session Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use innova_driver::{SessionBuilder, SessionConfig};
/// use std::time::Duration;
///
/// // 默认配置，打开设备文件
/// let session = SessionBuilder::new()
///     .device("/dev/rfcomm0")
///     .build()
///     .unwrap();
///
/// // TCP 桥接 + 有界事件通道
/// let session = SessionBuilder::new()
///     .tcp("127.0.0.1:7000")
///     .device_address("00:11:22:33:44:55")
///     .event_capacity(64)
///     .read_timeout(Duration::from_millis(50))
///     .build()
///     .unwrap();
/// ```
#[derive(Default)]
pub struct SessionBuilder {
    transport: Option<TransportKind>,
    /// 覆盖设备地址（默认取设备路径或对端地址）
    device_address: Option<String>,
    config: SessionConfig,
    hooks: Vec<Arc<dyn LineCallback>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用设备文件
    pub fn device(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport = Some(TransportKind::Device(path.into()));
        self
    }

    /// 使用 TCP 桥接
    pub fn tcp(mut self, addr: impl Into<String>) -> Self {
        self.transport = Some(TransportKind::Tcp(addr.into()));
        self
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 设置设备地址（例如蓝牙 MAC），用于事件和持久化记录
    pub fn device_address(mut self, address: impl Into<String>) -> Self {
        self.device_address = Some(address.into());
        self
    }

    /// 设置完整的会话配置
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// 有界事件通道（背压）
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = Some(capacity);
        self
    }

    /// 单包缓冲上限（None 表示不限制）
    pub fn max_pending_readings(mut self, max: Option<usize>) -> Self {
        self.config.max_pending_readings = max;
        self
    }

    /// 注册原始行回调（读线程启动前生效）
    pub fn hook(mut self, callback: Arc<dyn LineCallback>) -> Self {
        self.hooks.push(callback);
        self
    }

    /// 打开所选传输并启动会话
    pub fn build(self) -> Result<Session, DriverError> {
        self.config.validate()?;

        let transport = self.transport.clone().ok_or_else(|| {
            DriverError::InvalidConfig("no transport selected (device or tcp)".to_string())
        })?;

        match transport {
            TransportKind::Device(path) => {
                #[cfg(unix)]
                let adapter = DeviceAdapter::open(&path)?;
                #[cfg(not(unix))]
                let adapter = ReaderAdapter::open(&path)?;
                self.build_with(adapter)
            },
            TransportKind::Tcp(addr) => {
                let adapter = TcpAdapter::connect(addr.as_str())?;
                self.build_with(adapter)
            },
        }
    }

    /// 使用调用方提供的适配器启动会话（测试、自定义传输）
    ///
    /// 设置了设备地址时用 `Labeled` 覆盖适配器自带的地址。
    pub fn build_with<A>(mut self, adapter: A) -> Result<Session, DriverError>
    where
        A: SerialAdapter + Send + 'static,
    {
        match self.device_address.take() {
            Some(address) => self.start(Labeled::new(adapter, address)),
            None => self.start(adapter),
        }
    }

    fn start<A>(self, adapter: A) -> Result<Session, DriverError>
    where
        A: SerialAdapter + Send + 'static,
    {
        self.config.validate()?;

        let ctx = Arc::new(SessionContext::new());
        if !self.hooks.is_empty() {
            let mut hooks = ctx
                .hooks
                .write()
                .map_err(|_| DriverError::IoThread("hook lock poisoned".to_string()))?;
            for hook in self.hooks {
                hooks.add_callback(hook);
            }
        }

        debug!(
            "Starting session for {} with {:?}",
            adapter.device_address(),
            self.config
        );
        Session::with_context(adapter, self.config, ctx)
    }
}
