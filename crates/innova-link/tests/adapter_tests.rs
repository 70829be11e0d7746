//! 适配器 + 分帧器组合测试

use innova_link::{Labeled, LineFramer, LinkError, ReaderAdapter, SerialAdapter, TcpAdapter};
use std::io::{Cursor, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

/// 读到 EOF，返回所有完整行
fn read_all_lines<A: SerialAdapter>(adapter: &mut A, buf_size: usize) -> Vec<String> {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; buf_size];
    let mut lines = Vec::new();
    loop {
        match adapter.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                framer.push(&buf[..n]);
                lines.extend(framer.drain_lines());
            },
            Err(e) if e.is_timeout() => continue,
            Err(e) => panic!("unexpected read error: {}", e),
        }
    }
    lines
}

#[test]
fn test_small_reads_reassemble_lines() {
    let data = b"sensor001;0xAB3311\r\nsensor002;0xAC4312\r\nEND_PACKET\r\n".to_vec();
    let mut adapter = ReaderAdapter::new(Cursor::new(data), "capture");

    // 3 字节的读缓冲：每行都跨多次读取
    let lines = read_all_lines(&mut adapter, 3);
    assert_eq!(
        lines,
        vec!["sensor001;0xAB3311", "sensor002;0xAC4312", "END_PACKET"]
    );
}

#[test]
fn test_tcp_stream_with_label() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"s1;0xBA3311\n").unwrap();
        thread::sleep(Duration::from_millis(20));
        stream.write_all(b"END_PACKET\n").unwrap();
    });

    let tcp = TcpAdapter::connect(addr).unwrap();
    let mut adapter = Labeled::new(tcp, "00:11:22:33:44:55");
    adapter.set_read_timeout(Duration::from_millis(10));
    assert_eq!(adapter.device_address(), "00:11:22:33:44:55");

    let lines = read_all_lines(&mut adapter, 1024);
    assert_eq!(lines, vec!["s1;0xBA3311", "END_PACKET"]);
    server.join().unwrap();
}

#[test]
fn test_connect_refused_is_link_error() {
    // 绑定后立即释放端口，连接应失败
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let result = TcpAdapter::connect(addr);
    assert!(matches!(result, Err(LinkError::Io(_)) | Err(LinkError::Device(_))));
}
