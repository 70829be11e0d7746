//! 协议常量定义

/// 包结束标记（精确匹配，区分大小写）
pub const PACKET_TERMINATOR: &str = "END_PACKET";

/// 传感器 ID 与设备码之间的分隔符
pub const FIELD_DELIMITER: char = ';';

// ============================================================================
// 设备码
// ============================================================================

/// 鞋垫未穿戴
pub const CODE_UNUSED_FOOTWEAR: &str = "0x793248";
/// 站立
pub const CODE_STANDING: &str = "0xAB3311";
/// 坐姿
pub const CODE_SITTING: &str = "0xAC4312";
/// 行走
pub const CODE_WALKING: &str = "0xBA3311";
/// 跌倒
pub const CODE_FALLING: &str = "0xEF0112";

/// 跌倒告警的"近期"窗口（24 小时，毫秒）
pub const FALL_ALERT_RECENT_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// 单个包最多缓冲的读数（会话层的背压上限，解析器本身不限制）
pub const MAX_READINGS_PER_PACKET: usize = 1000;
