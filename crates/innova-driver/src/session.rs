//! 设备会话（对外 API）
//!
//! 每个 `Session` 拥有一个读线程、一个包解析器和一个事件通道发送端。

use crate::error::DriverError;
use crate::event::SessionEvent;
use crate::hooks::LineCallback;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{SessionConfig, SessionContext, io_loop};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded, unbounded};
use innova_link::{SerialAdapter, TransportCloser};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info};

/// Extension trait for timeout-capable thread joins
pub(crate) trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: std::marker::Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程负责 join，本线程带超时等待
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(std::boxed::Box::new(
                std::io::Error::new(std::io::ErrorKind::TimedOut, "Thread join timeout"),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(std::boxed::Box::new(
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "Thread panicked during join",
                ),
            )),
        }
    }
}

/// 关闭句柄
///
/// 可克隆、可跨线程传递；任意线程调用 [`SessionCloseHandle::close`] 都会让读线程退出。
#[derive(Clone)]
pub struct SessionCloseHandle {
    is_running: Arc<AtomicBool>,
    closer: Option<Arc<dyn TransportCloser>>,
}

impl SessionCloseHandle {
    /// 清除运行标志并关闭传输（幂等）
    pub fn close(&self) {
        // Release: All writes before this are visible to threads that see the false value
        let was_running = self.is_running.swap(false, Ordering::AcqRel);
        if was_running && let Some(closer) = &self.closer {
            closer.close();
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SessionCloseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCloseHandle")
            .field("is_running", &self.is_running())
            .field("has_closer", &self.closer.is_some())
            .finish()
    }
}

/// 设备会话
///
/// - 创建即启动读线程，并投递 `SessionEvent::Connected`
/// - 完整的包以 `SessionEvent::Packet` 按完成顺序投递
/// - `close()` / drop / EOF / 传输错误结束会话，投递 `SessionEvent::Disconnected`，
///   未完成的部分包被丢弃
///
/// # Example
///
/// ```
/// use innova_driver::{Session, SessionConfig, SessionEvent};
/// use innova_link::MockSerialAdapter;
/// use std::time::Duration;
///
/// let adapter = MockSerialAdapter::from_lines("AA:BB", ["s1;0xAB3311", "END_PACKET"]);
/// let session = Session::new(adapter, SessionConfig::default()).unwrap();
///
/// let events = session.events();
/// assert!(matches!(events.recv().unwrap(), SessionEvent::Connected { .. }));
/// match events.recv_timeout(Duration::from_secs(1)).unwrap() {
///     SessionEvent::Packet(batch) => assert_eq!(batch.readings.len(), 1),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub struct Session {
    device_address: String,
    events: Receiver<SessionEvent>,
    ctx: Arc<SessionContext>,
    close_handle: SessionCloseHandle,
    io_thread: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl Session {
    /// 创建会话并启动读线程
    pub fn new<A>(adapter: A, config: SessionConfig) -> Result<Self, DriverError>
    where
        A: SerialAdapter + Send + 'static,
    {
        Self::with_context(adapter, config, Arc::new(SessionContext::new()))
    }

    /// 使用预先配置的上下文创建会话（钩子需要在读线程启动前注册时使用）
    pub fn with_context<A>(
        adapter: A,
        config: SessionConfig,
        ctx: Arc<SessionContext>,
    ) -> Result<Self, DriverError>
    where
        A: SerialAdapter + Send + 'static,
    {
        config.validate()?;

        let device_address = adapter.device_address().to_string();
        let (event_tx, events) = match config.event_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };

        let is_running = Arc::new(AtomicBool::new(true));
        let close_handle = SessionCloseHandle {
            is_running: is_running.clone(),
            closer: adapter.closer().map(Arc::from),
        };

        let thread_ctx = ctx.clone();
        let io_thread = std::thread::Builder::new()
            .name(format!("innova-io-{}", device_address))
            .spawn(move || io_loop(adapter, event_tx, thread_ctx, config, is_running))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        info!("Session opened for {}", device_address);

        Ok(Self {
            device_address,
            events,
            ctx,
            close_handle,
            io_thread: Some(io_thread),
            join_timeout: Duration::from_secs(2),
        })
    }

    /// 设备地址
    pub fn device_address(&self) -> &str {
        &self.device_address
    }

    /// 事件接收端（可克隆，会话 drop 后仍可读出剩余事件）
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events.clone()
    }

    /// 带超时接收下一个事件
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, DriverError> {
        self.events.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => DriverError::Timeout,
            RecvTimeoutError::Disconnected => DriverError::ChannelClosed,
        })
    }

    /// 注册原始行回调（对之后读到的行生效）
    pub fn add_hook(&self, callback: Arc<dyn LineCallback>) -> Result<(), DriverError> {
        let mut hooks = self
            .ctx
            .hooks
            .write()
            .map_err(|_| DriverError::IoThread("hook lock poisoned".to_string()))?;
        hooks.add_callback(callback);
        Ok(())
    }

    /// 指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 读线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.close_handle.is_running()
            && self.io_thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 获取跨线程关闭句柄
    pub fn close_handle(&self) -> SessionCloseHandle {
        self.close_handle.clone()
    }

    /// 关闭会话并等待读线程退出（幂等）
    ///
    /// 关闭后不会再投递新的包；仍在通道中的事件可继续读取。
    pub fn close(&mut self) {
        self.close_handle.close();

        if let Some(handle) = self.io_thread.take()
            && let Err(_e) = handle.join_timeout(self.join_timeout)
        {
            error!(
                "IO thread for {} panicked or failed to shut down within {:?}",
                self.device_address, self.join_timeout
            );
        }
    }

    /// 等待读线程自行结束（EOF / 错误），超时返回 `DriverError::Timeout`
    pub fn wait(&mut self, timeout: Duration) -> Result<(), DriverError> {
        match self.io_thread.take() {
            Some(handle) => handle.join_timeout(timeout).map_err(|_| DriverError::Timeout),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device_address", &self.device_address)
            .field("is_running", &self.is_running())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
