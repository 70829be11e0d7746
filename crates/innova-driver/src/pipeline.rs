//! Pipeline IO 循环模块
//!
//! 负责单个设备的读循环：阻塞读字节 → 分帧 → 包解析 → 通过事件通道投递完整的包。

use crate::event::{DisconnectReason, PacketBatch, SessionEvent};
use crate::hooks::HookManager;
use crate::metrics::SessionMetrics;
use crossbeam_channel::{SendTimeoutError, Sender};
use innova_link::{LineFramer, LinkError, SerialAdapter};
use innova_protocol::{LineOutcome, MAX_READINGS_PER_PACKET, PACKET_TERMINATOR, PacketParser};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 事件通道满时的重试间隔（期间检查运行标志）
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Pipeline 配置
///
/// POD 数据，运行时组件（回调）放在 [`SessionContext`] 中。
///
/// # Example
///
/// ```
/// # use innova_driver::SessionConfig;
/// let config = SessionConfig {
///     event_capacity: Some(64),
///     ..Default::default()
/// };
/// assert_eq!(config.read_buffer_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// 每次读取的缓冲区大小（字节）
    pub read_buffer_size: usize,
    /// 读超时；超时后检查运行标志再继续读
    pub read_timeout: Duration,
    /// 事件通道容量（None 表示无界；Some(n) 时满了会阻塞读线程，形成背压）
    pub event_capacity: Option<usize>,
    /// 单个包最多缓冲的读数（None 表示不限制）
    ///
    /// 缓冲达到上限后再来一行非结束标记，部分包会被丢弃并记录 warn。
    pub max_pending_readings: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            read_timeout: Duration::from_millis(100),
            event_capacity: None,
            max_pending_readings: Some(MAX_READINGS_PER_PACKET),
        }
    }
}

impl SessionConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), crate::DriverError> {
        if self.read_buffer_size == 0 {
            return Err(crate::DriverError::InvalidConfig(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == Some(0) {
            return Err(crate::DriverError::InvalidConfig(
                "event_capacity must be greater than zero (use None for unbounded)".to_string(),
            ));
        }
        if self.max_pending_readings == Some(0) {
            return Err(crate::DriverError::InvalidConfig(
                "max_pending_readings must be greater than zero (use None for no limit)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// 会话上下文（读线程与 `Session` 共享）
#[derive(Debug, Default)]
pub struct SessionContext {
    /// 运行时钩子
    pub hooks: RwLock<HookManager>,
    /// 性能指标
    pub metrics: SessionMetrics,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 读循环内部状态
struct LoopState {
    device_address: String,
    parser: PacketParser,
    sequence: u64,
}

/// 处理一行的结果
enum LineFlow {
    Continue,
    Stop(DisconnectReason),
}

/// IO 线程主循环
///
/// 直到以下任一情况发生才返回：
/// - `is_running` 被清除（`Session::close` / drop）→ `Closed`
/// - 传输返回 EOF → `EndOfStream`
/// - 传输错误 → `TransportError`
/// - 事件接收端全部 drop → `ConsumerGone`
///
/// 退出时丢弃未完成的部分包，并投递 `Disconnected` 事件（消费者已离开时除外）。
pub fn io_loop(
    mut adapter: impl SerialAdapter,
    event_tx: Sender<SessionEvent>,
    ctx: Arc<SessionContext>,
    config: SessionConfig,
    is_running: Arc<AtomicBool>,
) {
    let mut state = LoopState {
        device_address: adapter.device_address().to_string(),
        parser: PacketParser::new(),
        sequence: 0,
    };

    adapter.set_read_timeout(config.read_timeout);
    let mut framer = LineFramer::with_capacity(config.read_buffer_size);
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];

    info!("IO thread started for {}", state.device_address);

    let connected = SessionEvent::Connected {
        device_address: state.device_address.clone(),
    };
    let reason = if deliver(&event_tx, connected, &is_running).is_err() {
        DisconnectReason::ConsumerGone
    } else {
        read_until_stopped(
            &mut adapter,
            &mut framer,
            &mut buf,
            &mut state,
            &event_tx,
            &ctx,
            &config,
            &is_running,
        )
    };

    // === 会话结束：丢弃部分包 ===
    let discarded = state.parser.reset();
    if discarded > 0 {
        SessionMetrics::add(&ctx.metrics.readings_discarded, discarded as u64);
        debug!(
            "{}: discarding {} readings of an unterminated packet",
            state.device_address, discarded
        );
    }
    if let Some(partial) = framer.finish() {
        trace!(
            "{}: dropping unterminated line fragment {:?}",
            state.device_address, partial
        );
    }

    is_running.store(false, Ordering::Release);

    match &reason {
        DisconnectReason::TransportError(e) => {
            error!("{}: transport error, session ended: {}", state.device_address, e)
        },
        other => info!("{}: session ended ({:?})", state.device_address, other),
    }

    if reason != DisconnectReason::ConsumerGone {
        // 接收端可能已 drop，忽略发送失败
        let _ = event_tx.send(SessionEvent::Disconnected {
            device_address: state.device_address.clone(),
            reason,
            discarded_readings: discarded,
        });
    }

    trace!("IO thread: loop exited");
}

#[allow(clippy::too_many_arguments)]
fn read_until_stopped(
    adapter: &mut impl SerialAdapter,
    framer: &mut LineFramer,
    buf: &mut [u8],
    state: &mut LoopState,
    event_tx: &Sender<SessionEvent>,
    ctx: &SessionContext,
    config: &SessionConfig,
    is_running: &AtomicBool,
) -> DisconnectReason {
    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("IO thread: is_running flag is false, exiting");
            return DisconnectReason::Closed;
        }

        let n = match adapter.read(buf) {
            Ok(0) => {
                return if is_running.load(Ordering::Acquire) {
                    DisconnectReason::EndOfStream
                } else {
                    DisconnectReason::Closed
                };
            },
            Ok(n) => n,
            Err(LinkError::Timeout) => continue,
            Err(e) => {
                // 关闭传输会让阻塞的 read 出错，这属于主动关闭
                return if is_running.load(Ordering::Acquire) {
                    DisconnectReason::TransportError(e.to_string())
                } else {
                    DisconnectReason::Closed
                };
            },
        };

        SessionMetrics::add(&ctx.metrics.bytes_read, n as u64);
        framer.push(&buf[..n]);

        while let Some(line) = framer.next_line() {
            if !is_running.load(Ordering::Acquire) {
                return DisconnectReason::Closed;
            }
            if let LineFlow::Stop(reason) =
                handle_line(&line, state, event_tx, ctx, config, is_running)
            {
                return reason;
            }
        }
    }
}

fn handle_line(
    line: &str,
    state: &mut LoopState,
    event_tx: &Sender<SessionEvent>,
    ctx: &SessionContext,
    config: &SessionConfig,
    is_running: &AtomicBool,
) -> LineFlow {
    let metrics = &ctx.metrics;
    SessionMetrics::incr(&metrics.lines);

    // 使用 try_read 避免阻塞，如果锁被持有则跳过本次触发
    if let Ok(hooks) = ctx.hooks.try_read() {
        hooks.trigger_all(line);
    }

    // 缓冲上限：先清空再接收新行，新行本身保留
    if line != PACKET_TERMINATOR
        && let Some(max) = config.max_pending_readings
        && state.parser.pending_len() >= max
    {
        let dropped = state.parser.reset();
        SessionMetrics::incr(&metrics.overflow_resets);
        SessionMetrics::add(&metrics.readings_discarded, dropped as u64);
        warn!(
            "{}: packet exceeded {} readings without {}, discarded {} readings",
            state.device_address, max, PACKET_TERMINATOR, dropped
        );
    }

    match state.parser.feed_line(line) {
        LineOutcome::Buffered => {
            SessionMetrics::incr(&metrics.readings_buffered);
            LineFlow::Continue
        },
        LineOutcome::Discarded(reason) => {
            SessionMetrics::incr(&metrics.malformed_lines);
            trace!(
                "{}: discarded malformed line {:?} ({:?})",
                state.device_address, line, reason
            );
            LineFlow::Continue
        },
        LineOutcome::PacketComplete(readings) => {
            state.sequence += 1;
            let count = readings.len();
            SessionMetrics::incr(&metrics.packets);
            if count == 0 {
                SessionMetrics::incr(&metrics.empty_packets);
            }
            debug!(
                "{}: packet #{} complete with {} readings",
                state.device_address, state.sequence, count
            );

            let event = SessionEvent::Packet(PacketBatch {
                device_address: state.device_address.clone(),
                sequence: state.sequence,
                readings,
            });
            match deliver(event_tx, event, is_running) {
                Ok(()) => {
                    SessionMetrics::add(&metrics.readings_delivered, count as u64);
                    LineFlow::Continue
                },
                Err(DeliverError::Disconnected) => {
                    SessionMetrics::add(&metrics.readings_discarded, count as u64);
                    LineFlow::Stop(DisconnectReason::ConsumerGone)
                },
                Err(DeliverError::Stopped) => {
                    SessionMetrics::add(&metrics.readings_discarded, count as u64);
                    LineFlow::Stop(DisconnectReason::Closed)
                },
            }
        },
    }
}

enum DeliverError {
    /// 所有接收端已 drop
    Disconnected,
    /// 通道满期间会话被关闭
    Stopped,
}

/// 投递事件；有界通道满时阻塞（背压），但会周期性检查运行标志
fn deliver(
    event_tx: &Sender<SessionEvent>,
    mut event: SessionEvent,
    is_running: &AtomicBool,
) -> Result<(), DeliverError> {
    loop {
        match event_tx.send_timeout(event, SEND_RETRY_INTERVAL) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Disconnected(_)) => return Err(DeliverError::Disconnected),
            Err(SendTimeoutError::Timeout(returned)) => {
                if !is_running.load(Ordering::Acquire) {
                    return Err(DeliverError::Stopped);
                }
                event = returned;
            },
        }
    }
}
