//! 会话事件
//!
//! 读线程通过有序通道向消费者投递的消息。同一会话内，包按完成顺序投递；
//! 不同会话之间不保证相对顺序。

use innova_protocol::Reading;

/// 一个完整的包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBatch {
    /// 来源设备地址
    pub device_address: String,
    /// 会话内包序号（从 1 开始，每包加 1）
    pub sequence: u64,
    /// 包内读数（保持输入顺序）
    pub readings: Vec<Reading>,
}

impl PacketBatch {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }
}

/// 断开原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// 本端主动关闭（`Session::close` 或 drop）
    Closed,
    /// 对端关闭（EOF）
    EndOfStream,
    /// 传输错误
    TransportError(String),
    /// 消费者已丢弃事件接收端
    ConsumerGone,
}

impl DisconnectReason {
    /// 是否为本端有意关闭（重连策略据此决定是否重连）
    pub fn is_intentional(&self) -> bool {
        matches!(self, DisconnectReason::Closed | DisconnectReason::ConsumerGone)
    }
}

/// 会话事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 读线程已启动，开始接收
    Connected { device_address: String },
    /// 收到完整的包
    Packet(PacketBatch),
    /// 会话结束；`discarded_readings` 为未等到 `END_PACKET` 而丢弃的读数
    Disconnected {
        device_address: String,
        reason: DisconnectReason,
        discarded_readings: usize,
    },
}

impl SessionEvent {
    pub fn device_address(&self) -> &str {
        match self {
            SessionEvent::Connected { device_address }
            | SessionEvent::Disconnected { device_address, .. } => device_address,
            SessionEvent::Packet(batch) => &batch.device_address,
        }
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, SessionEvent::Disconnected { .. })
    }
}
