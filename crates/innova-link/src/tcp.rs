//! TCP 桥接适配器
//!
//! 部分部署通过串口-网络桥（或 RFCOMM 转发守护进程）暴露设备字节流。
//! 与 tty 不同，TCP 支持读超时，也支持从其他线程 `shutdown` 以解除阻塞读。

use crate::{LinkError, SerialAdapter, TransportCloser, classify_io_error};
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

pub struct TcpAdapter {
    stream: TcpStream,
    device_address: String,
}

impl TcpAdapter {
    /// 连接到桥接地址
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    /// 包装已建立的连接
    pub fn from_stream(stream: TcpStream) -> Result<Self, LinkError> {
        let device_address = stream.peer_addr()?.to_string();
        stream.set_nodelay(true)?;
        debug!("TCP bridge connected: {}", device_address);
        Ok(Self {
            stream,
            device_address,
        })
    }
}

impl SerialAdapter for TcpAdapter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        loop {
            match self.stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify_io_error(e)),
            }
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        // Duration::ZERO 对 set_read_timeout 是非法参数
        let timeout = (!timeout.is_zero()).then_some(timeout);
        if let Err(e) = self.stream.set_read_timeout(timeout) {
            warn!("Failed to set TCP read timeout: {}", e);
        }
    }

    fn closer(&self) -> Option<Box<dyn TransportCloser>> {
        match self.stream.try_clone() {
            Ok(stream) => Some(Box::new(TcpCloser { stream })),
            Err(e) => {
                warn!("Failed to clone TCP stream for closer: {}", e);
                None
            },
        }
    }

    fn device_address(&self) -> &str {
        &self.device_address
    }
}

struct TcpCloser {
    stream: TcpStream,
}

impl TransportCloser for TcpCloser {
    fn close(&self) {
        // 对端可能已断开，忽略 NotConnected
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_adapter_reads_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"sensor001;0xAB3311\nEND_PACKET\n").unwrap();
        });

        let mut adapter = TcpAdapter::connect(addr).unwrap();
        assert_eq!(adapter.device_address(), addr.to_string());

        let mut collected = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = adapter.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        server.join().unwrap();
        assert_eq!(collected, b"sensor001;0xAB3311\nEND_PACKET\n");
    }

    #[test]
    fn test_tcp_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut adapter = TcpAdapter::connect(addr).unwrap();
        let (_conn, _) = listener.accept().unwrap();

        adapter.set_read_timeout(Duration::from_millis(20));
        let mut buf = [0u8; 8];
        assert!(adapter.read(&mut buf).unwrap_err().is_timeout());
    }

    #[test]
    fn test_tcp_closer_unblocks_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut adapter = TcpAdapter::connect(addr).unwrap();
        let (_conn, _) = listener.accept().unwrap();

        let closer = adapter.closer().unwrap();
        let reader = thread::spawn(move || {
            let mut buf = [0u8; 8];
            adapter.read(&mut buf)
        });
        thread::sleep(Duration::from_millis(50));
        closer.close();

        // shutdown 后读返回 EOF 或连接错误，不再阻塞
        let result = reader.join().unwrap();
        assert!(matches!(result, Ok(0) | Err(_)));
    }
}
