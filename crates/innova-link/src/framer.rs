//! 行分帧器
//!
//! 传输层每次 `read` 返回的字节块与行边界无关：一行可能跨多次读取，
//! 一次读取也可能包含多行。`LineFramer` 累积字节并按 `\n` 切分，
//! 去掉行尾的 `\r`（设备以 `\r\n` 结尾时），其余内容原样保留。
//!
//! 非 UTF-8 字节按 lossy 方式解码（替换为 U+FFFD），不会中断读循环。

use bytes::{Buf, BytesMut};

/// 字节 → 文本行 分帧器
///
/// # Example
///
/// ```
/// use innova_link::LineFramer;
///
/// let mut framer = LineFramer::new();
/// framer.push(b"sensor001;0xAB");
/// assert_eq!(framer.next_line(), None);
///
/// framer.push(b"3311\r\nEND_PACKET\n");
/// assert_eq!(framer.next_line().as_deref(), Some("sensor001;0xAB3311"));
/// assert_eq!(framer.next_line().as_deref(), Some("END_PACKET"));
/// assert_eq!(framer.next_line(), None);
/// ```
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
    /// 已扫描过、确定不含 `\n` 的前缀长度
    scanned: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            scanned: 0,
        }
    }

    /// 追加读取到的字节
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// 取出下一行完整的行（不含行结束符）
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|pos| self.scanned + pos);

        let Some(idx) = newline else {
            self.scanned = self.buf.len();
            return None;
        };

        let mut line = self.buf.split_to(idx);
        self.buf.advance(1);
        self.scanned = 0;

        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// 取出当前所有完整行
    pub fn drain_lines(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.next_line()).collect()
    }

    /// 尚未组成完整行的字节数
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// 流结束时取出残留的半行（仅用于诊断，不应送入解析器）
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return None;
        }
        let rest = self.buf.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
