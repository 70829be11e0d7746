//! 包处理
//!
//! 在消费者线程中处理 `PacketBatch`：构建持久化记录、姿态分类、跌倒告警、
//! 包统计，并更新实时姿态状态。持久化本身由外部 `RecordSink` 完成。

use crate::error::DriverError;
use crate::event::PacketBatch;
use crate::state::LivePostures;
use crossbeam_channel::Sender;
use innova_protocol::{
    FALL_ALERT_RECENT_WINDOW_MS, PersistableRecord, Posture, RecordBuilder, now_millis,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 记录存储（外部持久化协作者）
pub trait RecordSink {
    /// 存储一个包的全部记录（单个事务语义：要么全部成功，要么报错）
    fn store(&mut self, records: Vec<PersistableRecord>) -> Result<(), DriverError>;
}

/// 内存存储（测试、CLI 汇总）
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<PersistableRecord>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for VecSink {
    fn store(&mut self, records: Vec<PersistableRecord>) -> Result<(), DriverError> {
        self.records.extend(records);
        Ok(())
    }
}

/// 通过通道把记录交给持久化线程
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Vec<PersistableRecord>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Vec<PersistableRecord>>) -> Self {
        Self { tx }
    }
}

impl RecordSink for ChannelSink {
    fn store(&mut self, records: Vec<PersistableRecord>) -> Result<(), DriverError> {
        self.tx
            .send(records)
            .map_err(|_| DriverError::Sink("record channel closed".to_string()))
    }
}

/// 跌倒告警
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallAlert {
    pub device_address: String,
    pub sensor_id: String,
    /// 读数接收时间（毫秒 epoch）
    pub timestamp: u64,
}

/// 单个包的统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSummary {
    /// 处理器累计的包编号（从 1 开始，跨会话递增）
    pub packet_number: u64,
    /// 会话内包序号
    pub sequence: u64,
    pub device_address: String,
    /// 处理时间（毫秒 epoch）
    pub processed_at: u64,
    pub reading_count: usize,
    /// 每个传感器的读数数量
    pub per_sensor: BTreeMap<String, usize>,
}

impl fmt::Display for PacketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet #{}: {} readings [",
            self.packet_number, self.reading_count
        )?;
        for (i, (sensor, count)) in self.per_sensor.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", sensor, count)?;
        }
        write!(f, "]")
    }
}

/// 包处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPacket {
    pub summary: PacketSummary,
    pub falls: Vec<FallAlert>,
    /// 每个读数的分类结果（与包内顺序一致）
    pub postures: Vec<Posture>,
}

/// 包处理器
///
/// # Example
///
/// ```
/// use innova_driver::{PacketBatch, PacketProcessor, VecSink};
/// use innova_protocol::Reading;
///
/// let mut processor = PacketProcessor::new("owner@example.com", VecSink::new());
/// let batch = PacketBatch {
///     device_address: "AA:BB".to_string(),
///     sequence: 1,
///     readings: vec![Reading::new("s1", "0xEF0112", innova_protocol::now_millis()).unwrap()],
/// };
///
/// let processed = processor.process(&batch).unwrap().unwrap();
/// assert_eq!(processed.falls.len(), 1);
/// assert_eq!(processor.sink().records.len(), 1);
/// ```
pub struct PacketProcessor<S: RecordSink> {
    owner_id: String,
    sink: S,
    live: Arc<LivePostures>,
    packets_processed: u64,
    fall_window_ms: u64,
    clock: fn() -> u64,
}

impl<S: RecordSink> PacketProcessor<S> {
    pub fn new(owner_id: impl Into<String>, sink: S) -> Self {
        Self {
            owner_id: owner_id.into(),
            sink,
            live: Arc::new(LivePostures::new()),
            packets_processed: 0,
            fall_window_ms: FALL_ALERT_RECENT_WINDOW_MS,
            clock: now_millis,
        }
    }

    /// 共享外部的实时状态
    pub fn with_live_state(mut self, live: Arc<LivePostures>) -> Self {
        self.live = live;
        self
    }

    /// 自定义时钟（回放/测试）
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fall_window(mut self, window_ms: u64) -> Self {
        self.fall_window_ms = window_ms;
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn live_state(&self) -> &Arc<LivePostures> {
        &self.live
    }

    pub fn packets_processed(&self) -> u64 {
        self.packets_processed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// 处理一个包
    ///
    /// - 空包：跳过，返回 `Ok(None)`
    /// - 存储失败：返回错误，统计和实时状态不更新
    pub fn process(&mut self, batch: &PacketBatch) -> Result<Option<ProcessedPacket>, DriverError> {
        if batch.is_empty() {
            debug!(
                "{}: empty packet #{} skipped",
                batch.device_address, batch.sequence
            );
            return Ok(None);
        }

        let now = (self.clock)();
        let builder = RecordBuilder::new(batch.device_address.as_str(), self.owner_id.as_str());

        let mut per_sensor: BTreeMap<String, usize> = BTreeMap::new();
        let mut falls = Vec::new();
        let mut postures = Vec::with_capacity(batch.len());

        for reading in &batch.readings {
            *per_sensor.entry(reading.sensor_id().to_string()).or_default() += 1;

            let posture = reading.posture();
            postures.push(posture);

            if posture == Posture::Unknown {
                debug!(
                    "{}: unknown posture code {:?} from sensor {}",
                    batch.device_address,
                    reading.code(),
                    reading.sensor_id()
                );
            }

            if posture.is_fall()
                && now.saturating_sub(reading.received_at()) <= self.fall_window_ms
            {
                warn!(
                    "{}: fall detected for sensor {}",
                    batch.device_address,
                    reading.sensor_id()
                );
                falls.push(FallAlert {
                    device_address: batch.device_address.clone(),
                    sensor_id: reading.sensor_id().to_string(),
                    timestamp: reading.received_at(),
                });
            }
        }

        let records = builder.build_batch(&batch.readings);
        if let Err(e) = self.sink.store(records) {
            error!(
                "{}: failed to store packet #{}: {}",
                batch.device_address, batch.sequence, e
            );
            return Err(e);
        }

        self.packets_processed += 1;
        self.live.apply(&batch.readings);

        let summary = PacketSummary {
            packet_number: self.packets_processed,
            sequence: batch.sequence,
            device_address: batch.device_address.clone(),
            processed_at: now,
            reading_count: batch.len(),
            per_sensor,
        };
        info!("{}", summary);

        Ok(Some(ProcessedPacket {
            summary,
            falls,
            postures,
        }))
    }
}
