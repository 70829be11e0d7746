//! 驱动层模块
//!
//! 本模块提供可穿戴设备的会话驱动功能，包括：
//! - 每个设备一个读线程（阻塞读 → 分帧 → 包解析）
//! - 通过有序消息通道向消费者投递包和连接生命周期事件
//! - 包处理：持久化记录、跌倒告警、实时姿态状态（ArcSwap 无锁读取）
//! - 钩子系统：原始行回调、异步原始日志录制
//! - 重连策略（外部连接管理器）
//!
//! # 使用场景
//!
//! ```no_run
//! use innova_driver::{SessionBuilder, SessionEvent};
//!
//! let session = SessionBuilder::new().device("/dev/rfcomm0").build().unwrap();
//! for event in session.events() {
//!     match event {
//!         SessionEvent::Packet(batch) => println!("{} readings", batch.readings.len()),
//!         SessionEvent::Disconnected { .. } => break,
//!         SessionEvent::Connected { .. } => {},
//!     }
//! }
//! ```

mod builder;
mod error;
pub mod event;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod reconnect;
pub mod recording;
mod session;
pub mod state;

pub use builder::{SessionBuilder, TransportKind};
pub use error::DriverError;
pub use event::{DisconnectReason, PacketBatch, SessionEvent};
pub use hooks::{HookManager, LineCallback};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use pipeline::{SessionConfig, SessionContext, io_loop};
pub use processor::{
    ChannelSink, FallAlert, PacketProcessor, PacketSummary, ProcessedPacket, RecordSink, VecSink,
};
pub use reconnect::{ConnectionManager, ManagedConnection, ManagerEvent, ReconnectPolicy};
pub use recording::{AsyncRawLogHook, RawLine, RawLogWriter};
pub use session::{Session, SessionCloseHandle};
pub use state::{LivePostures, LiveSnapshot, SensorPosture};
