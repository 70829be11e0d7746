//! 钩子系统（Hook System）
//!
//! 本模块提供运行时钩子管理功能，用于在读线程分帧得到每一行原始文本时触发自定义回调
//! （例如原始日志录制）。
//!
//! # 设计原则
//!
//! - **非阻塞**: 回调在读线程中执行，必须快速返回，推荐使用 Channel 异步处理
//! - **职责分离**: HookManager 管理运行时回调，`SessionConfig` 保持为 POD 数据
//!
//! # 使用示例
//!
//! ```rust
//! use innova_driver::hooks::{HookManager, LineCallback};
//! use innova_driver::recording::AsyncRawLogHook;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//!
//! let (hook, _rx) = AsyncRawLogHook::new();
//! hooks.add_callback(Arc::new(hook) as Arc<dyn LineCallback>);
//!
//! // 在 io_loop 中触发
//! hooks.trigger_all("left_foot;0xAB3311");
//! ```

use std::sync::Arc;

/// 原始行回调 Trait
///
/// 每一行（包括 `END_PACKET` 和格式错误的行）在进入解析器之前都会触发。
///
/// # 性能要求
///
/// - **非阻塞**: 禁止 I/O 和长时间持锁
/// - **Channel 模式**: 推荐使用 `crossbeam_channel::Sender::try_send`
///
/// # 示例
///
/// ```rust
/// use innova_driver::hooks::LineCallback;
/// use crossbeam_channel::{Sender, bounded};
///
/// struct MyCallback {
///     sender: Sender<String>,
/// }
///
/// impl LineCallback for MyCallback {
///     fn on_line(&self, line: &str) {
///         let _ = self.sender.try_send(line.to_string());
///     }
/// }
/// ```
pub trait LineCallback: Send + Sync {
    /// 读线程分帧得到一行时调用（不含行尾换行符）
    fn on_line(&self, line: &str);
}

/// 钩子管理器
///
/// 回调列表本身不是线程安全的，需要外部同步（`SessionContext` 中为 `RwLock<HookManager>`）。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn LineCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// 添加回调
    pub fn add_callback(&mut self, callback: Arc<dyn LineCallback>) {
        self.callbacks.push(callback);
    }

    /// 移除所有回调
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 触发所有回调（在 io_loop 中调用）
    pub fn trigger_all(&self, line: &str) {
        for callback in self.callbacks.iter() {
            callback.on_line(line);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Sender, bounded};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct TestCallback {
        tx: Sender<String>,
        count: Arc<AtomicU64>,
    }

    impl LineCallback for TestCallback {
        fn on_line(&self, line: &str) {
            let _ = self.tx.try_send(line.to_string());
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_hook_manager_add_callback() {
        let mut hooks = HookManager::new();
        assert!(hooks.is_empty());

        let (tx, _rx) = bounded(10);
        let count = Arc::new(AtomicU64::new(0));
        hooks.add_callback(Arc::new(TestCallback { tx, count }));
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn test_hook_manager_trigger_all() {
        let mut hooks = HookManager::new();

        let (tx, rx) = bounded::<String>(10);
        let count = Arc::new(AtomicU64::new(0));
        hooks.add_callback(Arc::new(TestCallback {
            tx: tx.clone(),
            count: count.clone(),
        }));
        hooks.add_callback(Arc::new(TestCallback {
            tx,
            count: count.clone(),
        }));

        hooks.trigger_all("s1;0xAB3311");

        assert_eq!(count.load(Ordering::Relaxed), 2);
        assert_eq!(rx.try_recv().unwrap(), "s1;0xAB3311");
        assert_eq!(rx.try_recv().unwrap(), "s1;0xAB3311");
    }

    #[test]
    fn test_hook_manager_clear() {
        let mut hooks = HookManager::new();

        let (tx, _rx) = bounded(10);
        let count = Arc::new(AtomicU64::new(0));
        hooks.add_callback(Arc::new(TestCallback { tx, count }));
        assert_eq!(hooks.len(), 1);

        hooks.clear();
        assert!(hooks.is_empty());
        // 清空后触发不应 panic
        hooks.trigger_all("END_PACKET");
    }
}
