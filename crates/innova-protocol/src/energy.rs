//! 姿态热量统计
//!
//! 对一组姿态（或原始设备码）计算总热量，以及每种姿态的次数和热量。

use crate::parser::{DiscardReason, split_line};
use crate::{Posture, classify};
use std::collections::BTreeMap;

/// 单个姿态的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostureEnergy {
    pub count: u64,
    pub calories: u64,
}

/// 热量汇总
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnergySummary {
    pub total_calories: u64,
    pub total_readings: u64,
    pub by_posture: BTreeMap<Posture, PostureEnergy>,
}

impl EnergySummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加一个姿态
    pub fn add(&mut self, posture: Posture) {
        let calories = u64::from(posture.calories());
        self.total_calories += calories;
        self.total_readings += 1;
        let entry = self.by_posture.entry(posture).or_default();
        entry.count += 1;
        entry.calories += calories;
    }

    pub fn from_postures<I>(postures: I) -> Self
    where
        I: IntoIterator<Item = Posture>,
    {
        let mut summary = Self::new();
        for posture in postures {
            summary.add(posture);
        }
        summary
    }

    /// 从原始设备码计算
    pub fn from_codes<'a, I>(codes: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_postures(codes.into_iter().map(classify))
    }

    /// 从原始日志行计算
    ///
    /// 每行可以是单独的设备码（旧格式），也可以是 `sensor;code`（按解析器的
    /// 规则拆分）。`END_PACKET`、空行和格式错误的行会被跳过。指定 `sensor` 时只统计该传感器的行。
    pub fn from_log_lines<'a, I>(lines: I, sensor: Option<&str>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut summary = Self::new();
        for line in lines {
            if line.is_empty() || line == crate::PACKET_TERMINATOR {
                continue;
            }
            let (sensor_id, code) = match split_line(line) {
                Ok((id, code)) => (Some(id), code),
                Err(DiscardReason::MissingDelimiter) => (None, line),
                // 与解析器一致：传感器 ID 或设备码为空的行被丢弃
                Err(_) => continue,
            };
            if let Some(wanted) = sensor
                && sensor_id != Some(wanted)
            {
                continue;
            }
            summary.add(classify(code));
        }
        summary
    }

    /// 合并另一份汇总
    pub fn merge(&mut self, other: &EnergySummary) {
        self.total_calories += other.total_calories;
        self.total_readings += other.total_readings;
        for (posture, energy) in &other.by_posture {
            let entry = self.by_posture.entry(*posture).or_default();
            entry.count += energy.count;
            entry.calories += energy.calories;
        }
    }

    pub fn get(&self, posture: Posture) -> PostureEnergy {
        self.by_posture.get(&posture).copied().unwrap_or_default()
    }
}
