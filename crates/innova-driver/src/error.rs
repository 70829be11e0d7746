//! 驱动层错误类型定义

use innova_link::LinkError;
use innova_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 事件通道已关闭（读线程退出或消费者已离开）
    #[error("Event channel closed")]
    ChannelClosed,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 无效配置
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// 记录存储失败（外部持久化协作者）
    #[error("Record sink error: {0}")]
    Sink(String),
}
