//! 单条传感器读数

use crate::{FIELD_DELIMITER, ProtocolError};
use std::fmt;

/// 一行有效协议数据解析出的读数
///
/// 创建后不可变。不变量：
/// - `sensor_id` 非空
/// - `code` 非空，且不含分隔符 `;`
/// - `received_at > 0`（Unix 毫秒）
///
/// # Example
///
/// ```
/// use innova_protocol::Reading;
///
/// let reading = Reading::new("sensor001", "0xAB3311", 1_700_000_000_000).unwrap();
/// assert_eq!(reading.sensor_id(), "sensor001");
/// assert_eq!(reading.code(), "0xAB3311");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawReading"))]
pub struct Reading {
    sensor_id: String,
    code: String,
    received_at: u64,
}

impl Reading {
    /// 创建读数（带校验）
    ///
    /// # Errors
    /// - `ProtocolError::EmptySensorId` / `EmptyCode`
    /// - `ProtocolError::SeparatorInCode`: 设备码中包含 `;`
    /// - `ProtocolError::ZeroTimestamp`
    pub fn new(
        sensor_id: impl Into<String>,
        code: impl Into<String>,
        received_at: u64,
    ) -> Result<Self, ProtocolError> {
        let sensor_id = sensor_id.into();
        let code = code.into();

        if sensor_id.is_empty() {
            return Err(ProtocolError::EmptySensorId);
        }
        if code.is_empty() {
            return Err(ProtocolError::EmptyCode);
        }
        if code.contains(FIELD_DELIMITER) {
            return Err(ProtocolError::SeparatorInCode { code });
        }
        if received_at == 0 {
            return Err(ProtocolError::ZeroTimestamp);
        }

        Ok(Self {
            sensor_id,
            code,
            received_at,
        })
    }

    /// 解析器内部构造：调用方已保证不变量
    pub(crate) fn from_validated(sensor_id: &str, code: &str, received_at: u64) -> Self {
        debug_assert!(!sensor_id.is_empty() && !code.is_empty() && received_at > 0);
        Self {
            sensor_id: sensor_id.to_owned(),
            code: code.to_owned(),
            received_at,
        }
    }

    /// 传感器 / 被监护人标识
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// 原始设备码（如 `0xAB3311`）
    pub fn code(&self) -> &str {
        &self.code
    }

    /// 接收时间（Unix 毫秒）
    pub fn received_at(&self) -> u64 {
        self.received_at
    }

    /// 对设备码进行姿态分类
    pub fn posture(&self) -> crate::Posture {
        crate::classify(&self.code)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.sensor_id, FIELD_DELIMITER, self.code)
    }
}

/// 反序列化中间表示，经 `Reading::new` 校验后转换
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawReading {
    sensor_id: String,
    code: String,
    received_at: u64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawReading> for Reading {
    type Error = ProtocolError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        Reading::new(raw.sensor_id, raw.code, raw.received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Posture;

    #[test]
    fn test_reading_new_valid() {
        let reading = Reading::new("sensor001", "0xAB3311", 42).unwrap();
        assert_eq!(reading.sensor_id(), "sensor001");
        assert_eq!(reading.code(), "0xAB3311");
        assert_eq!(reading.received_at(), 42);
    }

    #[test]
    fn test_reading_new_rejects_empty_fields() {
        assert_eq!(
            Reading::new("", "0xAB3311", 1).unwrap_err(),
            ProtocolError::EmptySensorId
        );
        assert_eq!(
            Reading::new("sensor001", "", 1).unwrap_err(),
            ProtocolError::EmptyCode
        );
    }

    #[test]
    fn test_reading_new_rejects_separator_in_code() {
        let err = Reading::new("sensor001", "0xAB;3311", 1).unwrap_err();
        assert!(matches!(err, ProtocolError::SeparatorInCode { .. }));
    }

    #[test]
    fn test_reading_new_rejects_zero_timestamp() {
        assert_eq!(
            Reading::new("sensor001", "0xAB3311", 0).unwrap_err(),
            ProtocolError::ZeroTimestamp
        );
    }

    #[test]
    fn test_reading_display_is_wire_format() {
        let reading = Reading::new("sensor001", "0xAB3311", 1).unwrap();
        assert_eq!(reading.to_string(), "sensor001;0xAB3311");
    }

    #[test]
    fn test_reading_posture() {
        let reading = Reading::new("sensor001", "0xEF0112", 1).unwrap();
        assert_eq!(reading.posture(), Posture::Falling);
    }

    #[test]
    fn test_uuid_sensor_id() {
        let id = "550e8400-e29b-41d4-a716-446655440000";
        let reading = Reading::new(id, "0xAB3311", 1).unwrap();
        assert_eq!(reading.sensor_id(), id);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_serde_validates() {
        let reading = Reading::new("sensor001", "0xAB3311", 7).unwrap();
        let json = serde_json::to_string(&reading).unwrap();
        let back: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);

        let bad = r#"{"sensor_id":"","code":"0xAB3311","received_at":7}"#;
        assert!(serde_json::from_str::<Reading>(bad).is_err());
    }
}
