//! 设备文件适配器（Unix）
//!
//! 已绑定的 RFCOMM tty（如 `/dev/rfcomm0`）以非阻塞方式打开，用 `poll`
//! 等待数据，每次最多等待一个读超时。关闭句柄设置关闭标志，读循环在
//! 下一次 `poll` 返回时退出，不会留下阻塞的线程。

use crate::{LinkError, SerialAdapter, TransportCloser};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// 未设置读超时时的 poll 间隔
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct DeviceAdapter {
    file: File,
    device_address: String,
    read_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl DeviceAdapter {
    /// 打开设备文件，设备地址取路径字符串
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    LinkError::Device(format!("device not found: {}", path.display()))
                } else {
                    LinkError::Io(e)
                }
            })?;
        debug!("Opened serial device {}", path.display());
        Ok(Self::from_file(file, path.display().to_string()))
    }

    /// 包装已打开的非阻塞文件描述符（socket pair、pipe 等）
    pub fn from_file(file: File, device_address: impl Into<String>) -> Self {
        Self {
            file,
            device_address: device_address.into(),
            read_timeout: DEFAULT_POLL_INTERVAL,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SerialAdapter for DeviceAdapter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(LinkError::Closed);
            }

            // nix 0.30 的 PollTimeout 使用 u16 毫秒
            let timeout_ms = self.read_timeout.as_millis().min(u16::MAX as u128) as u16;
            let pollfd = PollFd::new(self.file.as_fd(), PollFlags::POLLIN);
            match poll(&mut [pollfd], PollTimeout::from(timeout_ms)) {
                Ok(0) => return Err(LinkError::Timeout),
                Ok(_) => {},
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(LinkError::Io(std::io::Error::from(e))),
            }

            if self.closed.load(Ordering::Acquire) {
                return Err(LinkError::Closed);
            }

            match self.file.read(buf) {
                // POLLHUP 之后 read 返回 0：设备断开
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("{}: read failed: {}", self.device_address, e);
                    return Err(LinkError::Io(e));
                },
            }
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn closer(&self) -> Option<Box<dyn TransportCloser>> {
        Some(Box::new(DeviceCloser {
            closed: self.closed.clone(),
        }))
    }

    fn device_address(&self) -> &str {
        &self.device_address
    }
}

struct DeviceCloser {
    closed: Arc<AtomicBool>,
}

impl TransportCloser for DeviceCloser {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
