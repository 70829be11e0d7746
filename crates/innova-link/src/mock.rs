//! Mock 串口适配器（测试用）
//!
//! 按脚本返回数据块、超时或错误；脚本耗尽后返回 EOF，或在
//! `hold_open` 模式下持续超时直到被关闭。测试线程可通过 `MockHandle`
//! 在会话运行期间追加数据。

use crate::{LinkError, SerialAdapter, TransportCloser};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// 脚本步骤
#[derive(Debug, Clone)]
pub enum MockStep {
    Data(Vec<u8>),
    Timeout,
    Error(String),
    Eof,
}

#[derive(Debug, Default)]
struct MockState {
    steps: VecDeque<MockStep>,
    closed: bool,
    hold_open: bool,
    reads: u64,
}

/// 测试线程侧的控制句柄
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.lock().steps.push_back(MockStep::Data(bytes.to_vec()));
    }

    /// 追加一行（自动补 `\n`）
    pub fn push_line(&self, line: &str) {
        self.push_bytes(format!("{line}\n").as_bytes());
    }

    pub fn push_error(&self, message: &str) {
        self.lock()
            .steps
            .push_back(MockStep::Error(message.to_string()));
    }

    /// 脚本末尾追加 EOF
    pub fn push_eof(&self) {
        self.lock().steps.push_back(MockStep::Eof);
    }

    /// 模拟关闭传输
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 已执行的 read 次数
    pub fn reads(&self) -> u64 {
        self.lock().reads
    }
}

/// Mock 串口适配器
pub struct MockSerialAdapter {
    state: Arc<Mutex<MockState>>,
    device_address: String,
    read_delay: Duration,
}

impl MockSerialAdapter {
    /// 创建空脚本的适配器（默认脚本耗尽后 EOF）
    pub fn new(device_address: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            device_address: device_address.into(),
            read_delay: Duration::ZERO,
        }
    }

    /// 以若干行作为脚本（每行一个数据块）
    pub fn from_lines<I, S>(device_address: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let adapter = Self::new(device_address);
        let handle = adapter.handle();
        for line in lines {
            handle.push_line(line.as_ref());
        }
        adapter
    }

    /// 脚本耗尽后保持连接（返回超时而不是 EOF）
    pub fn hold_open(self) -> Self {
        self.lock().hold_open = true;
        self
    }

    /// 每次读取前的延迟（模拟慢速链路）
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: self.state.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }

        let mut state = self.lock();
        state.reads += 1;
        if state.closed {
            return Ok(0);
        }

        match state.steps.pop_front() {
            Some(MockStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    // 缓冲区不够大：剩余部分留到下次读取
                    let rest = data.split_off(n);
                    state.steps.push_front(MockStep::Data(rest));
                }
                Ok(n)
            },
            Some(MockStep::Timeout) => Err(LinkError::Timeout),
            Some(MockStep::Error(message)) => Err(LinkError::Device(message)),
            Some(MockStep::Eof) => Ok(0),
            None if state.hold_open => {
                drop(state);
                // 避免空转
                thread::sleep(Duration::from_millis(1));
                Err(LinkError::Timeout)
            },
            None => Ok(0),
        }
    }

    fn closer(&self) -> Option<Box<dyn TransportCloser>> {
        Some(Box::new(self.handle()))
    }

    fn device_address(&self) -> &str {
        &self.device_address
    }
}

impl TransportCloser for MockHandle {
    fn close(&self) {
        MockHandle::close(self);
    }
}
