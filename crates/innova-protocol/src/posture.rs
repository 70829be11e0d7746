//! 姿态分类
//!
//! 设备码 → 姿态 的全函数映射。表中未出现的任何输入都映射为 `Unknown`，
//! 不会失败。匹配为精确字符串比较：区分大小写、不做前缀/通配匹配、不做修剪。
//!
//! 每个姿态携带展示层使用的描述符 ID（风险文本、提示文本、演示视频、示意图）
//! 和热量权重。描述符 ID 是不透明标识，由外部展示层解析。

use crate::ProtocolError;
use crate::constants::*;
use std::fmt;
use std::str::FromStr;

/// 姿态（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Posture {
    /// 站立
    Standing,
    /// 坐姿
    Sitting,
    /// 行走
    Walking,
    /// 跌倒
    Falling,
    /// 鞋垫未穿戴
    UnusedFootwear,
    /// 无法识别的设备码
    #[default]
    Unknown,
}

/// 唯一的设备码表
pub const CODE_TABLE: [(&str, Posture); 5] = [
    (CODE_UNUSED_FOOTWEAR, Posture::UnusedFootwear),
    (CODE_STANDING, Posture::Standing),
    (CODE_SITTING, Posture::Sitting),
    (CODE_WALKING, Posture::Walking),
    (CODE_FALLING, Posture::Falling),
];

/// 对设备码进行分类
///
/// # Example
///
/// ```
/// use innova_protocol::{Posture, classify};
///
/// assert_eq!(classify("0xAB3311"), Posture::Standing);
/// assert_eq!(classify("0xab3311"), Posture::Unknown);
/// assert_eq!(classify(""), Posture::Unknown);
/// ```
pub fn classify(code: &str) -> Posture {
    CODE_TABLE
        .iter()
        .find(|(known, _)| *known == code)
        .map_or(Posture::Unknown, |(_, posture)| *posture)
}

impl Posture {
    /// 所有姿态（按声明顺序）
    pub const ALL: [Posture; 6] = [
        Posture::Standing,
        Posture::Sitting,
        Posture::Walking,
        Posture::Falling,
        Posture::UnusedFootwear,
        Posture::Unknown,
    ];

    /// 反向查表：姿态对应的设备码（`Unknown` 没有设备码）
    pub fn code(self) -> Option<&'static str> {
        CODE_TABLE
            .iter()
            .find(|(_, posture)| *posture == self)
            .map(|(code, _)| *code)
    }

    /// 变体名称（与 `FromStr` 互逆）
    pub fn name(self) -> &'static str {
        match self {
            Posture::Standing => "Standing",
            Posture::Sitting => "Sitting",
            Posture::Walking => "Walking",
            Posture::Falling => "Falling",
            Posture::UnusedFootwear => "UnusedFootwear",
            Posture::Unknown => "Unknown",
        }
    }

    /// 风险文本描述符
    pub fn risk_id(self) -> &'static str {
        match self {
            Posture::Standing => "posture_standing_risk",
            Posture::Sitting => "posture_sitting_risk",
            Posture::Walking => "posture_walking_risk",
            Posture::Falling => "posture_falling_risk",
            Posture::UnusedFootwear => "posture_unused_footwear_risk",
            Posture::Unknown => "posture_unknown_risk",
        }
    }

    /// 状态提示文本描述符
    pub fn message_id(self) -> &'static str {
        match self {
            Posture::Standing => "posture_standing_msg",
            Posture::Sitting => "posture_sitting_msg",
            Posture::Walking => "posture_walking_msg",
            Posture::Falling => "posture_falling_msg",
            Posture::UnusedFootwear => "posture_unused_footwear_msg",
            Posture::Unknown => "posture_unknown_msg",
        }
    }

    /// 演示视频描述符（`Unknown` 没有视频）
    pub fn video_id(self) -> Option<&'static str> {
        match self {
            Posture::Standing => Some("in_picioare_movie"),
            Posture::Sitting => Some("pe_scaun_movie"),
            Posture::Walking => Some("mers_movie"),
            Posture::Falling => Some("cadere_video"),
            Posture::UnusedFootwear => Some("neutilizat_video"),
            Posture::Unknown => None,
        }
    }

    /// 示意图描述符
    pub fn picture_id(self) -> Option<&'static str> {
        match self {
            Posture::Standing => Some("in_picioare"),
            Posture::Sitting => Some("pe_scaun"),
            Posture::Walking => Some("mers"),
            Posture::Falling => Some("cadere"),
            Posture::UnusedFootwear => Some("neutilizat"),
            Posture::Unknown => Some("unknown"),
        }
    }

    /// 热量权重（每条读数）
    pub fn calories(self) -> u32 {
        match self {
            Posture::Sitting => 2,
            Posture::Falling => 10,
            Posture::Standing | Posture::Walking | Posture::UnusedFootwear | Posture::Unknown => 0,
        }
    }

    /// 是否为跌倒
    pub fn is_fall(self) -> bool {
        self == Posture::Falling
    }

    /// 是否为已知姿态
    pub fn is_known(self) -> bool {
        self != Posture::Unknown
    }
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Posture {
    type Err = ProtocolError;

    /// 按变体名称解析（不是设备码；设备码请用 `classify`）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Posture::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ProtocolError::UnknownPostureName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table() {
        assert_eq!(classify("0x793248"), Posture::UnusedFootwear);
        assert_eq!(classify("0xAB3311"), Posture::Standing);
        assert_eq!(classify("0xAC4312"), Posture::Sitting);
        assert_eq!(classify("0xBA3311"), Posture::Walking);
        assert_eq!(classify("0xEF0112"), Posture::Falling);
    }

    #[test]
    fn test_classify_unknown_inputs() {
        for code in [
            "",
            "0xab3311",
            "0XAB3311",
            " 0xAB3311",
            "0xAB3311 ",
            "0xAB331",
            "0xAB33110",
            "AB3311",
            "END_PACKET",
            "sensor001;0xAB3311",
        ] {
            assert_eq!(classify(code), Posture::Unknown, "code {code:?}");
        }
    }

    #[test]
    fn test_code_round_trip() {
        for posture in Posture::ALL {
            match posture.code() {
                Some(code) => assert_eq!(classify(code), posture),
                None => assert_eq!(posture, Posture::Unknown),
            }
        }
    }

    #[test]
    fn test_code_table_is_unique() {
        for (i, (code, posture)) in CODE_TABLE.iter().enumerate() {
            for (other_code, other_posture) in &CODE_TABLE[i + 1..] {
                assert_ne!(code, other_code);
                assert_ne!(posture, other_posture);
            }
        }
        assert!(CODE_TABLE.iter().all(|(_, p)| *p != Posture::Unknown));
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(Posture::Falling.risk_id(), "posture_falling_risk");
        assert_eq!(Posture::Falling.message_id(), "posture_falling_msg");
        assert_eq!(Posture::Falling.video_id(), Some("cadere_video"));
        assert_eq!(Posture::Falling.picture_id(), Some("cadere"));
        assert_eq!(Posture::Unknown.video_id(), None);
        assert_eq!(Posture::Unknown.picture_id(), Some("unknown"));
    }

    #[test]
    fn test_calories() {
        assert_eq!(Posture::Sitting.calories(), 2);
        assert_eq!(Posture::Falling.calories(), 10);
        assert_eq!(Posture::Standing.calories(), 0);
        assert_eq!(Posture::Walking.calories(), 0);
        assert_eq!(Posture::UnusedFootwear.calories(), 0);
        assert_eq!(Posture::Unknown.calories(), 0);
    }

    #[test]
    fn test_name_roundtrip() {
        for posture in Posture::ALL {
            assert_eq!(posture.name().parse::<Posture>().unwrap(), posture);
            assert_eq!(posture.to_string(), posture.name());
        }
        assert!(matches!(
            "standing".parse::<Posture>(),
            Err(ProtocolError::UnknownPostureName(_))
        ));
    }

    #[test]
    fn test_is_fall_and_known() {
        assert!(Posture::Falling.is_fall());
        assert!(!Posture::Standing.is_fall());
        assert!(Posture::Walking.is_known());
        assert!(!Posture::Unknown.is_known());
        assert_eq!(Posture::default(), Posture::Unknown);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_posture_serde() {
        let json = serde_json::to_string(&Posture::UnusedFootwear).unwrap();
        assert_eq!(json, "\"UnusedFootwear\"");
        let back: Posture = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Posture::UnusedFootwear);
    }
}
