//! 重连策略（连接管理器）
//!
//! 会话本身不重试。`ConnectionManager` 在后台监督线程中：
//! 建立连接 → 启动新会话（新解析器、空状态）→ 转发事件 → 非主动断开时重连。
//!
//! 连续失败次数达到 `max_attempts` 后放弃；任何一次成功连接都会清零计数。

use crate::error::DriverError;
use crate::event::SessionEvent;
use crate::hooks::LineCallback;
use crate::pipeline::{SessionConfig, SessionContext};
use crate::session::{JoinTimeout, Session, SessionCloseHandle};
use crossbeam_channel::{Receiver, Sender, unbounded};
use innova_link::{LinkError, SerialAdapter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

type Connector = Box<dyn FnMut() -> Result<Box<dyn SerialAdapter + Send>, LinkError> + Send>;

/// 重连策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 连续重连次数上限
    pub max_attempts: u32,
    /// 两次连接尝试之间的等待
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// 连接管理器事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// 当前会话的事件
    Session(SessionEvent),
    /// 连接建立失败
    ConnectFailed { error: String },
    /// 即将进行第 `attempt` 次重连
    Reconnecting { attempt: u32 },
    /// 连续失败达到上限，放弃
    GaveUp { attempts: u32 },
    /// 监督线程退出（最后一个事件）
    Stopped,
}

/// 连接管理器
///
/// # Example
///
/// ```no_run
/// use innova_driver::{ConnectionManager, ManagerEvent, ReconnectPolicy};
/// use innova_link::TcpAdapter;
///
/// let mut connection = ConnectionManager::new(|| TcpAdapter::connect("127.0.0.1:7000"))
///     .policy(ReconnectPolicy::default())
///     .start()
///     .unwrap();
///
/// for event in connection.events() {
///     if let ManagerEvent::GaveUp { .. } = event {
///         break;
///     }
/// }
/// connection.stop();
/// ```
pub struct ConnectionManager {
    connector: Connector,
    config: SessionConfig,
    policy: ReconnectPolicy,
    hooks: Vec<Arc<dyn LineCallback>>,
}

impl ConnectionManager {
    pub fn new<F, A>(mut connector: F) -> Self
    where
        F: FnMut() -> Result<A, LinkError> + Send + 'static,
        A: SerialAdapter + Send + 'static,
    {
        Self {
            connector: Box::new(move || {
                connector().map(|adapter| Box::new(adapter) as Box<dyn SerialAdapter + Send>)
            }),
            config: SessionConfig::default(),
            policy: ReconnectPolicy::default(),
            hooks: Vec::new(),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 注册原始行回调（对每个新会话生效）
    pub fn hook(mut self, callback: Arc<dyn LineCallback>) -> Self {
        self.hooks.push(callback);
        self
    }

    /// 启动监督线程
    pub fn start(self) -> Result<ManagedConnection, DriverError> {
        self.config.validate()?;

        let (event_tx, events) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let current = Arc::new(Mutex::new(None));

        let supervisor = Supervisor {
            connector: self.connector,
            config: self.config,
            policy: self.policy,
            hooks: self.hooks,
            event_tx,
            stop: stop.clone(),
            current: current.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("innova-reconnect".into())
            .spawn(move || supervisor.run())
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        Ok(ManagedConnection {
            events,
            stop,
            current,
            supervisor: Some(handle),
        })
    }
}

/// 受管连接（监督线程句柄）
pub struct ManagedConnection {
    events: Receiver<ManagerEvent>,
    stop: Arc<AtomicBool>,
    current: Arc<Mutex<Option<SessionCloseHandle>>>,
    supervisor: Option<JoinHandle<()>>,
}

impl ManagedConnection {
    pub fn events(&self) -> Receiver<ManagerEvent> {
        self.events.clone()
    }

    /// 主动停止：关闭当前会话，不再重连（幂等）
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(session) = lock(&self.current).as_ref() {
            session.close();
        }

        let join_timeout = Duration::from_secs(3);
        if let Some(handle) = self.supervisor.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "Reconnect supervisor panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }

    pub fn is_finished(&self) -> bool {
        self.supervisor.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for ManagedConnection {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(current: &Mutex<Option<SessionCloseHandle>>) -> MutexGuard<'_, Option<SessionCloseHandle>> {
    current.lock().unwrap_or_else(|e| e.into_inner())
}

struct Supervisor {
    connector: Connector,
    config: SessionConfig,
    policy: ReconnectPolicy,
    hooks: Vec<Arc<dyn LineCallback>>,
    event_tx: Sender<ManagerEvent>,
    stop: Arc<AtomicBool>,
    current: Arc<Mutex<Option<SessionCloseHandle>>>,
}

impl Supervisor {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn emit(&self, event: ManagerEvent) {
        if self.event_tx.send(event).is_err() {
            // 消费者已离开，停止监督
            self.stop.store(true, Ordering::Release);
        }
    }

    fn run(mut self) {
        let mut attempts: u32 = 0;

        loop {
            if self.stopping() {
                break;
            }

            let intentional = match (self.connector)() {
                Ok(adapter) => self.run_session(adapter, &mut attempts),
                Err(e) => {
                    warn!("Connection attempt failed: {}", e);
                    self.emit(ManagerEvent::ConnectFailed {
                        error: e.to_string(),
                    });
                    false
                },
            };

            if intentional || self.stopping() {
                break;
            }

            if attempts >= self.policy.max_attempts {
                warn!(
                    "Max reconnection attempts ({}) reached, giving up",
                    self.policy.max_attempts
                );
                self.emit(ManagerEvent::GaveUp { attempts });
                break;
            }

            attempts += 1;
            info!("Attempting to reconnect, attempt {}", attempts);
            self.emit(ManagerEvent::Reconnecting { attempt: attempts });
            self.sleep_unless_stopped(self.policy.retry_delay);
        }

        let _ = self.event_tx.send(ManagerEvent::Stopped);
    }

    /// 运行一个会话直到结束；返回是否为主动断开
    fn run_session(&mut self, adapter: Box<dyn SerialAdapter + Send>, attempts: &mut u32) -> bool {
        let ctx = Arc::new(SessionContext::new());
        if let Ok(mut hooks) = ctx.hooks.write() {
            for hook in &self.hooks {
                hooks.add_callback(hook.clone());
            }
        }

        let mut session = match Session::with_context(adapter, self.config.clone(), ctx) {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to start session: {}", e);
                self.emit(ManagerEvent::ConnectFailed {
                    error: e.to_string(),
                });
                return false;
            },
        };

        let close_handle = session.close_handle();
        *lock(&self.current) = Some(close_handle.clone());
        // stop() 可能在登记句柄之前被调用
        if self.stopping() {
            close_handle.close();
        }

        let mut intentional = false;
        // 会话线程退出后发送端 drop，迭代结束
        for event in session.events().iter() {
            match &event {
                SessionEvent::Connected { .. } => *attempts = 0,
                SessionEvent::Disconnected { reason, .. } => {
                    intentional = reason.is_intentional();
                },
                SessionEvent::Packet(_) => {},
            }
            self.emit(ManagerEvent::Session(event));
            if self.stopping() {
                close_handle.close();
            }
        }

        session.close();
        *lock(&self.current) = None;
        intentional || self.stopping()
    }

    fn sleep_unless_stopped(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.stopping() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DisconnectReason;
    use innova_link::MockSerialAdapter;
    use std::sync::atomic::AtomicU32;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn collect_until_stopped(connection: &ManagedConnection) -> Vec<ManagerEvent> {
        let events = connection.events();
        let mut out = Vec::new();
        while let Ok(event) = events.recv_timeout(Duration::from_secs(5)) {
            let done = event == ManagerEvent::Stopped;
            out.push(event);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 2);
    }

    #[test]
    fn test_gives_up_after_consecutive_connect_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let connection = ConnectionManager::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<MockSerialAdapter, _>(LinkError::Device("unreachable".to_string()))
        })
        .policy(fast_policy(2))
        .start()
        .unwrap();

        let events = collect_until_stopped(&connection);
        // 初次连接 + 2 次重连
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(events.contains(&ManagerEvent::Reconnecting { attempt: 1 }));
        assert!(events.contains(&ManagerEvent::Reconnecting { attempt: 2 }));
        assert!(events.contains(&ManagerEvent::GaveUp { attempts: 2 }));
        assert_eq!(events.last(), Some(&ManagerEvent::Stopped));
    }

    #[test]
    fn test_successful_connection_resets_counter() {
        // 每次连接都成功但随即 EOF：计数器不断清零，直到脚本用完后连接失败
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let connection = ConnectionManager::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 4 {
                Ok(MockSerialAdapter::from_lines(
                    format!("dev-{}", n),
                    ["s1;0xAB3311", "END_PACKET"],
                ))
            } else {
                Err(LinkError::Device("gone".to_string()))
            }
        })
        .policy(fast_policy(1))
        .start()
        .unwrap();

        let events = collect_until_stopped(&connection);
        let packets = events
            .iter()
            .filter(|e| matches!(e, ManagerEvent::Session(SessionEvent::Packet(_))))
            .count();
        assert_eq!(packets, 4);
        // 第 5 次连接失败时计数已为 1，直接放弃
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(events.contains(&ManagerEvent::GaveUp { attempts: 1 }));
    }

    #[test]
    fn test_each_session_has_fresh_parser() {
        // 第一个连接留下半个包，第二个连接的包不能包含它
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let connection = ConnectionManager::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            match n {
                0 => Ok(MockSerialAdapter::from_lines("dev", ["stale;0xAB3311"])),
                1 => Ok(MockSerialAdapter::from_lines(
                    "dev",
                    ["fresh;0xAC4312", "END_PACKET"],
                )),
                _ => Err(LinkError::Device("gone".to_string())),
            }
        })
        .policy(fast_policy(1))
        .start()
        .unwrap();

        let events = collect_until_stopped(&connection);
        let batches: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ManagerEvent::Session(SessionEvent::Packet(batch)) => Some(batch),
                _ => None,
            })
            .collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].readings.len(), 1);
        assert_eq!(batches[0].readings[0].sensor_id(), "fresh");

        assert!(events.iter().any(|e| matches!(
            e,
            ManagerEvent::Session(SessionEvent::Disconnected {
                discarded_readings: 1,
                ..
            })
        )));
    }

    #[test]
    fn test_stop_never_reconnects() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut connection = ConnectionManager::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MockSerialAdapter::new("dev").hold_open())
        })
        .policy(fast_policy(5))
        .start()
        .unwrap();

        let events = connection.events();
        assert!(matches!(
            events.recv_timeout(Duration::from_secs(2)).unwrap(),
            ManagerEvent::Session(SessionEvent::Connected { .. })
        ));

        connection.stop();
        assert!(connection.is_finished());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let rest: Vec<_> = events.try_iter().collect();
        assert!(rest.iter().any(|e| matches!(
            e,
            ManagerEvent::Session(SessionEvent::Disconnected {
                reason: DisconnectReason::Closed,
                ..
            })
        )));
        assert_eq!(rest.last(), Some(&ManagerEvent::Stopped));
        assert!(!rest.iter().any(|e| matches!(e, ManagerEvent::Reconnecting { .. })));
    }
}
