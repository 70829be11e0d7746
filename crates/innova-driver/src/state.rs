//! 实时姿态状态
//!
//! 处理线程写入、显示线程无锁读取（`ArcSwap`）。

use arc_swap::ArcSwap;
use innova_protocol::{Posture, Reading};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 某个传感器的最新姿态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorPosture {
    pub sensor_id: String,
    pub posture: Posture,
    pub code: String,
    /// 读数接收时间（毫秒 epoch）
    pub timestamp: u64,
}

impl SensorPosture {
    fn from_reading(reading: &Reading) -> Self {
        Self {
            sensor_id: reading.sensor_id().to_string(),
            posture: reading.posture(),
            code: reading.code().to_string(),
            timestamp: reading.received_at(),
        }
    }
}

/// 实时状态快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSnapshot {
    /// 每个传感器的最新姿态
    pub by_sensor: BTreeMap<String, SensorPosture>,
    /// 最近一次更新的读数（任意传感器）
    pub latest: Option<SensorPosture>,
    /// 已应用的包数量
    pub packets_applied: u64,
}

impl LiveSnapshot {
    pub fn posture_of(&self, sensor_id: &str) -> Option<Posture> {
        self.by_sensor.get(sensor_id).map(|s| s.posture)
    }
}

/// 实时姿态状态（无锁读取）
#[derive(Debug, Default)]
pub struct LivePostures {
    inner: ArcSwap<LiveSnapshot>,
}

impl LivePostures {
    pub fn new() -> Self {
        Self::default()
    }

    /// 应用一个包的读数（按顺序，后到的覆盖先到的）
    ///
    /// 空包不改变状态。
    pub fn apply(&self, readings: &[Reading]) {
        if readings.is_empty() {
            return;
        }
        self.inner.rcu(|current| {
            let mut next = LiveSnapshot::clone(current);
            for reading in readings {
                let entry = SensorPosture::from_reading(reading);
                next.latest = Some(entry.clone());
                next.by_sensor.insert(entry.sensor_id.clone(), entry);
            }
            next.packets_applied += 1;
            next
        });
    }

    /// 当前快照
    pub fn load(&self) -> Arc<LiveSnapshot> {
        self.inner.load_full()
    }

    /// 最近一次的整体姿态
    pub fn latest_posture(&self) -> Option<Posture> {
        self.inner.load().latest.as_ref().map(|s| s.posture)
    }

    /// 清空（重连时使用）
    pub fn clear(&self) {
        self.inner.store(Arc::new(LiveSnapshot::default()));
    }
}
