//! 持久化记录契约
//!
//! 读数与记录一一对应：不合并、不去重、不做额外校验。本模块不做任何 IO，
//! 实际存储由外部协作者负责。

use crate::Reading;

/// 一条可持久化的接收记录
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistableRecord {
    /// 设备地址（蓝牙 MAC 或其他传输标识）
    pub device_address: String,
    /// 接收时间（Unix 毫秒）
    pub timestamp: u64,
    /// 原始设备码
    pub received_code: String,
    /// 数据归属（聚合端账号）
    pub owner_id: String,
    /// 传感器 ID
    pub sensor_id: String,
}

/// 记录构建器
///
/// 持有外部提供的设备地址和归属 ID，对每条读数生成一条记录。
///
/// # Example
///
/// ```
/// use innova_protocol::{Reading, RecordBuilder};
///
/// let builder = RecordBuilder::new("00:11:22:33:44:55", "owner@example.com");
/// let reading = Reading::new("sensor001", "0xAB3311", 1000).unwrap();
/// let record = builder.build(&reading);
/// assert_eq!(record.sensor_id, "sensor001");
/// assert_eq!(record.timestamp, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBuilder {
    device_address: String,
    owner_id: String,
}

impl RecordBuilder {
    pub fn new(device_address: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
            owner_id: owner_id.into(),
        }
    }

    pub fn device_address(&self) -> &str {
        &self.device_address
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// 构建单条记录
    pub fn build(&self, reading: &Reading) -> PersistableRecord {
        PersistableRecord {
            device_address: self.device_address.clone(),
            timestamp: reading.received_at(),
            received_code: reading.code().to_owned(),
            owner_id: self.owner_id.clone(),
            sensor_id: reading.sensor_id().to_owned(),
        }
    }

    /// 构建整批记录（保持顺序）
    pub fn build_batch(&self, readings: &[Reading]) -> Vec<PersistableRecord> {
        readings.iter().map(|r| self.build(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_copies_fields() {
        let builder = RecordBuilder::new("AA:BB:CC:DD:EE:FF", "owner-1");
        let reading = Reading::new("sensor007", "0xEF0112", 123_456).unwrap();

        let record = builder.build(&reading);
        assert_eq!(
            record,
            PersistableRecord {
                device_address: "AA:BB:CC:DD:EE:FF".to_string(),
                timestamp: 123_456,
                received_code: "0xEF0112".to_string(),
                owner_id: "owner-1".to_string(),
                sensor_id: "sensor007".to_string(),
            }
        );
    }

    #[test]
    fn test_build_batch_preserves_order_and_duplicates() {
        let builder = RecordBuilder::new("dev", "owner");
        let readings = vec![
            Reading::new("s1", "0xAB3311", 1).unwrap(),
            Reading::new("s2", "0xAC4312", 2).unwrap(),
            Reading::new("s1", "0xAB3311", 3).unwrap(),
        ];

        let records = builder.build_batch(&readings);
        assert_eq!(records.len(), 3);
        let sensors: Vec<&str> = records.iter().map(|r| r.sensor_id.as_str()).collect();
        assert_eq!(sensors, ["s1", "s2", "s1"]);
        assert_eq!(records[2].timestamp, 3);
    }

    #[test]
    fn test_build_batch_empty() {
        let builder = RecordBuilder::new("dev", "owner");
        assert!(builder.build_batch(&[]).is_empty());
    }
}
